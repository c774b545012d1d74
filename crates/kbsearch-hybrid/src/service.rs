//! Request boundary: typed messages in, structured replies out.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use kbsearch_core::traits::{LexicalIndex, VectorIndex};
use kbsearch_core::types::{SearchRequest, SearchResponse};

use crate::engine::HybridSearchEngine;

/// Outcome of one request. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(flatten)]
    pub response: Option<SearchResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Query(SearchRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostReply {
    Results(ServiceReply),
}

impl ServiceReply {
    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, elapsed_ms: None, response: None, error: Some(error.into()) }
    }
}

pub fn handle_request<L: LexicalIndex, V: VectorIndex>(engine: &HybridSearchEngine<L, V>, request: &SearchRequest) -> ServiceReply {
    let start = Instant::now();
    match engine.search(request) {
        Ok(response) => ServiceReply { success: true, elapsed_ms: Some(start.elapsed().as_millis() as u64), response: Some(response), error: None },
        Err(e) => {
            warn!(error = %e, "search request failed");
            ServiceReply::failure(e.to_string())
        }
    }
}

pub fn handle_message<L: LexicalIndex, V: VectorIndex>(engine: &HybridSearchEngine<L, V>, message: &HostMessage) -> HostReply {
    match message {
        HostMessage::Query(request) => HostReply::Results(handle_request(engine, request)),
    }
}

/// One JSON-lines exchange. Blank lines get no reply; every other line gets
/// exactly one, including lines that are not a valid message.
pub fn handle_line<L: LexicalIndex, V: VectorIndex>(engine: &HybridSearchEngine<L, V>, line: &str) -> Option<HostReply> {
    if line.trim().is_empty() { return None; }
    match serde_json::from_str::<HostMessage>(line) {
        Ok(message) => Some(handle_message(engine, &message)),
        Err(e) => {
            warn!(error = %e, "malformed message");
            Some(HostReply::Results(ServiceReply::failure(format!("Invalid message: {e}"))))
        }
    }
}
