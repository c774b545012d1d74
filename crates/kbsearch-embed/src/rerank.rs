//! Second-pass rerankers over `(query, text)` pairs.

use anyhow::Result;
use candle_core::{Device, Module};
use candle_nn::Linear;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::collections::HashSet;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use kbsearch_core::traits::Reranker;

use crate::{tokenize, weights};

/// BERT sequence-classification cross-encoder with a single relevance logit
/// (ms-marco style). Scores are squashed through a sigmoid.
pub struct CrossEncoderReranker {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    batch_size: usize,
}

impl CrossEncoderReranker {
    pub fn load(model_dir: &Path, device: Device, max_len: usize, batch_size: usize) -> Result<Self> {
        let (config_json, hidden) = weights::read_model_config(model_dir)?;
        let config: BertConfig = serde_json::from_value(config_json)?;
        let tokenizer = tokenize::load_tokenizer(&model_dir.join("tokenizer.json"), max_len)?;
        let vb = weights::load_var_builder(model_dir, &device)?;
        let bert = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))?;
        let classifier = candle_nn::linear(hidden, 1, vb.pp("classifier"))?;
        info!(path = %model_dir.display(), batch_size, "cross-encoder loaded");
        Ok(Self { bert, pooler, classifier, tokenizer, device, max_len, batch_size: batch_size.max(1) })
    }

    fn score_batch(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        let batch = tokenize::tokenize_pairs_on_device(&self.tokenizer, pairs, self.max_len, &self.device)?;
        let hidden = self.bert.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?.squeeze(1)?;
        let probs = candle_nn::ops::sigmoid(&logits)?;
        Ok(probs.to_device(&Device::Cpu)?.to_vec1::<f32>()?)
    }
}

impl Reranker for CrossEncoderReranker {
    fn score(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(pairs.len());
        for chunk in pairs.chunks(self.batch_size) {
            scores.extend(self.score_batch(chunk)?);
        }
        debug!(pairs = pairs.len(), "cross-encoder scored");
        Ok(scores)
    }
}

/// Model-free reranker: fraction of query words found in the text.
pub struct OverlapReranker;

impl Reranker for OverlapReranker {
    fn score(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        Ok(pairs
            .iter()
            .map(|(query, text)| {
                let query_lower = query.to_lowercase();
                let query_words: HashSet<&str> = query_lower.split_whitespace().collect();
                if query_words.is_empty() { return 0.0; }
                let text_lower = text.to_lowercase();
                let hits = query_words.iter().filter(|w| text_lower.contains(**w)).count();
                hits as f32 / query_words.len() as f32
            })
            .collect())
    }
}
