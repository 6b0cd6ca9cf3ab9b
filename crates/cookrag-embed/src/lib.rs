//! cookrag-embed
//!
//! Sentence embeddings for dense retrieval. [`BertEmbedder`] runs a local BERT
//! checkpoint (the bge-small family) through candle; [`HashEmbedder`] is a
//! deterministic stand-in for tests and offline development.

pub mod device;
pub mod pool;
pub mod tokenize;

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tantivy::tokenizer::TextAnalyzer;
use tokenizers::Tokenizer;
use tracing::{info, warn};
use twox_hash::XxHash64;

pub use cookrag_core::traits::Embedder;
use cookrag_text::analyzer::{analyze, terms_analyzer};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

const BATCH_SIZE: usize = 32;

pub struct BertEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize, pad_id: u32 }

impl BertEmbedder {
    /// Loads `tokenizer.json`, `config.json` and `model.safetensors` (or
    /// `pytorch_model.bin`) from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_text = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: BertConfig = serde_json::from_str(&config_text)?;
        let raw: serde_json::Value = serde_json::from_str(&config_text)?;
        let dim = raw.get("hidden_size").and_then(|v| v.as_u64()).ok_or_else(|| anyhow!("config.json lacks hidden_size"))? as usize;
        let max_len = raw.get("max_position_embeddings").and_then(|v| v.as_u64()).unwrap_or(512) as usize;
        let pad_id = raw.get("pad_token_id").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

        let safetensors = model_dir.join("model.safetensors");
        let weights: HashMap<String, Tensor> = if safetensors.exists() {
            candle_core::safetensors::load(&safetensors, &device)?
        } else {
            candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?.into_iter().collect()
        };
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        info!(dim, max_len, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len, pad_id })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2::<f32>()?)
    }
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) { out.extend(self.embed_chunk(batch)?); }
        if texts.len() == 1 && start.elapsed().as_millis() > 100 { warn!(elapsed_ms = start.elapsed().as_millis() as u64, "slow query embedding"); }
        Ok(out)
    }
}

/// Feature-hashing embedder over the keyword index's analyzer terms. Texts
/// sharing terms land close together, which is enough to exercise the dense
/// path without a model.
pub struct HashEmbedder { dim: usize, analyzer: TextAnalyzer }

impl HashEmbedder { pub fn new(dim: usize) -> Self { Self { dim: dim.max(1), analyzer: terms_analyzer() } } }

impl HashEmbedder {
    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in analyze(&mut self.analyzer.clone(), text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign * (0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

pub const HASH_EMBEDDER_DIM: usize = 512;

/// `APP_USE_FAKE_EMBEDDINGS=1` selects the hash embedder; otherwise the BERT
/// model is loaded from `model_dir`, `APP_MODEL_DIR` or `models/bge-small-zh-v1.5`.
pub fn get_default_embedder(model_dir: Option<&Path>) -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake { info!("using hash embedder"); return Ok(Box::new(HashEmbedder::new(HASH_EMBEDDER_DIM))); }
    let dir = resolve_model_dir(model_dir)?;
    Ok(Box::new(BertEmbedder::load(&dir)?))
}

fn resolve_model_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit { if p.exists() { return Ok(p.to_path_buf()); } warn!(dir = %p.display(), "configured model dir does not exist"); }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { return Ok(p); } }
    let local = Path::new("models/bge-small-zh-v1.5"); if local.exists() { return Ok(local.to_path_buf()); }
    Err(anyhow!("Could not locate an embedding model directory; set embedding_model_dir or APP_USE_FAKE_EMBEDDINGS=1"))
}
