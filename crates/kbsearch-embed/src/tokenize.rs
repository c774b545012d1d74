use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::{Encoding, Tokenizer, TruncationParams};

/// Token tensors for a batch: `(input_ids, token_type_ids, attention_mask)`, each `[B,T]`.
pub struct TokenBatch {
    pub input_ids: Tensor,
    pub token_type_ids: Tensor,
    pub attention_mask: Tensor,
}

/// Load a tokenizer and cap sequences at `max_len` tokens.
pub fn load_tokenizer(path: &std::path::Path, max_len: usize) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path).map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
    tokenizer
        .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
        .map_err(|e| anyhow!("Invalid truncation for {}: {}", path.display(), e))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

pub fn tokenize_on_device(tokenizer: &Tokenizer, text: &str, max_len: usize, device: &Device) -> Result<TokenBatch> {
    let enc = tokenizer.encode(text, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    batch_on_device(&[enc], max_len, pad_id(tokenizer), device)
}

/// Encode `(query, text)` pairs as one sentence-pair batch.
pub fn tokenize_pairs_on_device(tokenizer: &Tokenizer, pairs: &[(String, String)], max_len: usize, device: &Device) -> Result<TokenBatch> {
    let mut encodings = Vec::with_capacity(pairs.len());
    for (query, text) in pairs {
        let enc = tokenizer.encode((query.as_str(), text.as_str()), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        encodings.push(enc);
    }
    batch_on_device(&encodings, max_len, pad_id(tokenizer), device)
}

fn pad_id(tokenizer: &Tokenizer) -> u32 {
    tokenizer.get_padding().map(|p| p.pad_id).or_else(|| tokenizer.token_to_id("[PAD]")).unwrap_or(0)
}

fn batch_on_device(encodings: &[Encoding], max_len: usize, pad: u32, device: &Device) -> Result<TokenBatch> {
    let seq_len = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);
    let batch = encodings.len();
    let mut ids = Vec::with_capacity(batch * seq_len);
    let mut type_ids = Vec::with_capacity(batch * seq_len);
    let mut mask = Vec::with_capacity(batch * seq_len);
    for enc in encodings {
        let n = enc.get_ids().len().min(max_len);
        ids.extend_from_slice(&enc.get_ids()[..n]);
        type_ids.extend_from_slice(&enc.get_type_ids()[..n]);
        mask.extend_from_slice(&enc.get_attention_mask()[..n]);
        let pad_len = seq_len - n;
        ids.extend(std::iter::repeat(pad).take(pad_len));
        type_ids.extend(std::iter::repeat(0).take(pad_len));
        mask.extend(std::iter::repeat(0).take(pad_len));
    }
    Ok(TokenBatch {
        input_ids: Tensor::from_vec(ids, (batch, seq_len), device)?,
        token_type_ids: Tensor::from_vec(type_ids, (batch, seq_len), device)?,
        attention_mask: Tensor::from_vec(mask, (batch, seq_len), device)?,
    })
}
