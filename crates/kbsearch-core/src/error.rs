use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid filter '{key}': {reason}")]
    InvalidFilter { key: String, reason: String },

    #[error("{stage} failed: {source:#}")]
    Provider {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn provider(stage: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Provider { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
