//! Lightweight configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load from the current working directory.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load `config.toml` (and the `RUST_ENV` overlay) from `dir`.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub models: ModelSettings,
    pub retrieval: RetrievalSettings,
    pub spelling: SpellingSettings,
    pub vector: VectorSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        let r = &self.retrieval;
        if r.rerank_candidates == 0 {
            return Err(Error::InvalidConfig("retrieval.rerank_candidates must be > 0".into()));
        }
        if r.n_candidates == 0 {
            return Err(Error::InvalidConfig("retrieval.n_candidates must be > 0".into()));
        }
        for (name, alpha) in [("long_query_alpha", r.long_query_alpha), ("short_query_alpha", r.short_query_alpha)] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(Error::InvalidConfig(format!("retrieval.{name} must lie in [0, 1], got {alpha}")));
            }
        }
        if self.spelling.fuzzy_min_score > 100 {
            return Err(Error::InvalidConfig("spelling.fuzzy_min_score is on a 0-100 scale".into()));
        }
        if self.models.rerank_batch_size == 0 {
            return Err(Error::InvalidConfig("models.rerank_batch_size must be > 0".into()));
        }
        Ok(())
    }

    /// Directory holding the lexical and vector indexes for the active model.
    pub fn index_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.data.index_root).join(format!("index_{}", self.models.alias))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub index_root: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { index_root: "data/index".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub alias: String,
    pub device: String,
    pub model_root: String,
    pub max_seq_len: usize,
    pub rerank_model: String,
    pub rerank_batch_size: usize,
    pub rerank_max_len: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            alias: "miniLM".into(),
            device: "cpu".into(),
            model_root: "models".into(),
            max_seq_len: 320,
            rerank_model: "ms-marco-MiniLM-L12-v2".into(),
            rerank_batch_size: 16,
            rerank_max_len: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub snippet_len: usize,
    /// First-stage dense pool size.
    pub n_candidates: usize,
    /// Lexical pool is `n_candidates * bm25_candidate_multiplier`.
    pub bm25_candidate_multiplier: usize,
    pub bm25_fallback: usize,
    pub rerank_candidates: usize,
    pub long_query_alpha: f32,
    pub short_query_alpha: f32,
    /// Queries with at most this many whitespace tokens count as short.
    pub short_query_max_tokens: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 10,
            snippet_len: 160,
            n_candidates: 60,
            bm25_candidate_multiplier: 40,
            bm25_fallback: 400,
            rerank_candidates: 50,
            long_query_alpha: 0.85,
            short_query_alpha: 0.65,
            short_query_max_tokens: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellingSettings {
    pub max_edit_distance: usize,
    pub prefix_length: usize,
    pub min_term_len: usize,
    pub fuzzy_min_score: u32,
    pub vocab_max_docs: usize,
}

impl Default for SpellingSettings {
    fn default() -> Self {
        Self { max_edit_distance: 3, prefix_length: 7, min_term_len: 4, fuzzy_min_score: 85, vocab_max_docs: 100_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub table: String,
    pub nprobes: usize,
    pub refine_factor: Option<u32>,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self { table: "chunks".into(), nprobes: 32, refine_factor: None }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
