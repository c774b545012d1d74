//! kbsearch-embed
//!
//! Candle-backed sentence embedder and cross-encoder reranker, plus
//! deterministic fakes for tests and offline development.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::Device;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{info, warn};

use kbsearch_core::config::{resolve_with_base, ModelSettings};
use kbsearch_core::traits::{Embedder, Reranker};

pub mod device;
pub mod pool;
pub mod rerank;
pub mod tokenize;
pub mod weights;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use rerank::{CrossEncoderReranker, OverlapReranker};

/// Short model aliases accepted in `models.alias`, mapped to hub model ids.
pub const MODEL_ALIASES: &[(&str, &str)] = &[
    ("stk-mpnet", "flax-sentence-embeddings/stackoverflow_mpnet-base"),
    ("all-mpnet", "sentence-transformers/all-mpnet-base-v2"),
    ("bge-base", "BAAI/bge-base-en-v1.5"),
    ("e5-base", "intfloat/e5-base-v2"),
    ("miniLM", "sentence-transformers/all-MiniLM-L6-v2"),
    ("arctic-l", "Snowflake/snowflake-arctic-embed-l-v2.0"),
];

pub fn model_id(alias: &str) -> Option<&'static str> {
    MODEL_ALIASES.iter().find(|(a, _)| *a == alias).map(|(_, id)| *id)
}

/// Mean-pooled, L2-normalized BERT sentence embedder.
pub struct BertEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize }

impl BertEmbedder {
    pub fn load(model_dir: &Path, device: Device, max_len: usize) -> Result<Self> {
        let (config_json, dim) = weights::read_model_config(model_dir)?;
        let config: BertConfig = serde_json::from_value(config_json)?;
        let tokenizer = tokenize::load_tokenizer(&model_dir.join("tokenizer.json"), max_len)?;
        let vb = weights::load_var_builder(model_dir, &device)?;
        let model = BertModel::load(vb, &config)?;
        info!(path = %model_dir.display(), dim, max_len, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let batch = tokenize::tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        let emb = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1::<f32>()?;
        if emb.len() != self.dim { return Err(anyhow!("embedding has {} dims, expected {}", emb.len(), self.dim)); }
        if start.elapsed().as_millis() > 100 { warn!(elapsed_ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(emb)
    }
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { texts.iter().map(|t| self.embed_text(t)).collect() }
}

/// Hashed bag-of-words embedder: deterministic, normalized, no model files.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder { pub fn new(dim: usize) -> Self { Self { dim } } }

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let mut v = vec![0f32; self.dim];
            for (i, token) in text.to_lowercase().split_whitespace().enumerate() { let mut hasher = XxHash64::with_seed(0); token.hash(&mut hasher); let h = hasher.finish(); let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32); v[idx] += val + (i as f32 % 3.0) * 0.01; }
            let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; }
            out.push(v);
        }
        Ok(out)
    }
}

fn use_fakes() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

fn model_dir(base: &Path, settings: &ModelSettings, name: &str) -> PathBuf {
    resolve_with_base(base, &settings.model_root).join(name)
}

/// Embedder for `settings.alias`; `APP_USE_FAKE_EMBEDDINGS=1` swaps in [`FakeEmbedder`].
pub fn get_default_embedder(base: &Path, settings: &ModelSettings) -> Result<Box<dyn Embedder>> {
    let hub_id = model_id(&settings.alias).ok_or_else(|| {
        let known: Vec<&str> = MODEL_ALIASES.iter().map(|(a, _)| *a).collect();
        anyhow!("Unknown model alias '{}'. Choose one of: {}", settings.alias, known.join(", "))
    })?;
    if use_fakes() { info!("using FakeEmbedder"); return Ok(Box::new(FakeEmbedder::new(384))); }
    info!(alias = %settings.alias, model = hub_id, "loading embedding model");
    let device = select_device(&settings.device)?;
    Ok(Box::new(BertEmbedder::load(&model_dir(base, settings, &settings.alias), device, settings.max_seq_len)?))
}

/// Cross-encoder for `settings.rerank_model`; `APP_USE_FAKE_EMBEDDINGS=1` swaps in [`OverlapReranker`].
pub fn get_default_reranker(base: &Path, settings: &ModelSettings) -> Result<Box<dyn Reranker>> {
    if use_fakes() { info!("using OverlapReranker"); return Ok(Box::new(OverlapReranker)); }
    let device = select_device(&settings.device)?;
    let dir = model_dir(base, settings, &settings.rerank_model);
    Ok(Box::new(CrossEncoderReranker::load(&dir, device, settings.rerank_max_len, settings.rerank_batch_size)?))
}
