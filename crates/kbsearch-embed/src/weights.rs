use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Load a model directory's weights (`model.safetensors` or `pytorch_model.bin`).
pub fn load_var_builder(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let pickle = model_dir.join("pytorch_model.bin");
    let weights: HashMap<String, Tensor> = if safetensors.exists() {
        debug!(path = %safetensors.display(), "loading safetensors weights");
        candle_core::safetensors::load(&safetensors, device)?
    } else if pickle.exists() {
        debug!(path = %pickle.display(), "loading pickled weights");
        candle_core::pickle::read_all(&pickle)?.into_iter().collect()
    } else {
        return Err(anyhow!("No model weights found in {}", model_dir.display()));
    };
    Ok(VarBuilder::from_tensors(weights, DType::F32, device))
}

/// Read `config.json` as raw JSON plus its `hidden_size`.
pub fn read_model_config(model_dir: &Path) -> Result<(serde_json::Value, usize)> {
    let config_path = model_dir.join("config.json");
    let raw = std::fs::read_to_string(&config_path).map_err(|e| anyhow!("Failed to read {}: {}", config_path.display(), e))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let hidden = value
        .get("hidden_size")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))?;
    Ok((value, hidden as usize))
}
