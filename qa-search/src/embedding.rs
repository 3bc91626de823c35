//! Text embedding backends.
//!
//! [`FastEmbedder`] wraps a fastembed ONNX model. [`HashEmbedder`] is a
//! deterministic bag-of-words hasher used by tests and offline demos; it is
//! selected with the model id `hash-<dim>`.

use crate::error::{Error, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;
use std::sync::Arc;

/// Prefix selecting the hashing embedder, e.g. `hash-64`.
pub const HASH_MODEL_PREFIX: &str = "hash-";

/// Anything that turns texts into fixed-length vectors.
///
/// Implementations are blocking; async callers go through [`embed_texts`].
pub trait Embedder: Send + Sync {
    /// Identifier the embedder was resolved from.
    fn model_id(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// Run the embedder on the blocking pool.
pub async fn embed_texts(embedder: Arc<dyn Embedder>, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    tokio::task::spawn_blocking(move || embedder.embed(texts))
        .await
        .map_err(|e| Error::Embedding(format!("embedding task failed: {}", e)))?
}

/// Resolve `model_id` and load the matching embedder.
pub async fn load_embedder(model_id: &str, cache_dir: &Path) -> Result<Arc<dyn Embedder>> {
    if let Some(dim) = model_id.strip_prefix(HASH_MODEL_PREFIX) {
        let dimension: usize = dim
            .parse()
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| Error::Configuration(format!("invalid hashing model '{}'", model_id)))?;
        return Ok(Arc::new(HashEmbedder::new(dimension)));
    }

    let embedder = FastEmbedder::load(model_id, cache_dir).await?;
    Ok(Arc::new(embedder))
}

/// Scale `vector` to unit length in place. Zero vectors are left alone.
pub fn normalize(vector: &mut [f32]) {
    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for val in vector.iter_mut() {
            *val /= magnitude;
        }
    }
}

/// fastembed model resolved from a model code.
pub struct FastEmbedder {
    model_id: String,
    dimension: usize,
    model: TextEmbedding,
}

impl FastEmbedder {
    /// Load the model on the blocking pool, downloading it into `cache_dir` on first use.
    pub async fn load(model_id: &str, cache_dir: &Path) -> Result<Self> {
        let (model_name, dimension) = resolve_model(model_id)?;
        let cache_dir = cache_dir.to_path_buf();
        tracing::info!(model = %model_id, dim = dimension, cache = %cache_dir.display(), "loading embedding model");

        let model = tokio::task::spawn_blocking(move || {
            let mut options = InitOptions::default();
            options.model_name = model_name;
            options.show_download_progress = true;
            options.cache_dir = cache_dir;
            TextEmbedding::try_new(options)
        })
        .await
        .map_err(|e| Error::Embedding(format!("model load task failed: {}", e)))?
        .map_err(|e| Error::Embedding(format!("failed to load '{}': {}", model_id, e)))?;

        tracing::info!(model = %model_id, "embedding model loaded");
        Ok(Self {
            model_id: model_id.to_string(),
            dimension,
            model,
        })
    }
}

impl Embedder for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.model
            .embed(texts, None)
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}

/// Map a user-facing model id to a fastembed model and its dimension.
///
/// Matches case-insensitively on the model code, also accepting it without the
/// org prefix or the `-onnx` suffix, so `sentence-transformers/all-MiniLM-L6-v2`
/// finds `Qdrant/all-MiniLM-L6-v2-onnx`.
pub fn resolve_model(model_id: &str) -> Result<(EmbeddingModel, usize)> {
    let supported = TextEmbedding::list_supported_models();
    let wanted = short_model_name(model_id);
    supported
        .iter()
        .find(|info| info.model_code.eq_ignore_ascii_case(model_id))
        .or_else(|| supported.iter().find(|info| short_model_name(&info.model_code) == wanted))
        .map(|info| (info.model.clone(), info.dim))
        .ok_or_else(|| Error::Configuration(format!("unsupported embedding model '{}'", model_id)))
}

fn short_model_name(code: &str) -> String {
    let name = code.rsplit('/').next().unwrap_or(code).to_lowercase();
    name.strip_suffix("-onnx").map(str::to_string).unwrap_or(name)
}

/// 64-bit FNV-1a. Stored hash-model vectors depend on these exact values.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Word and bigram feature hashing into a fixed number of buckets.
pub struct HashEmbedder {
    model_id: String,
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model_id: format!("{}{}", HASH_MODEL_PREFIX, dimension),
            dimension,
        }
    }

    fn bucket(&self, feature: &str, shift: u32) -> usize {
        ((fnv1a(feature.as_bytes()) >> shift) % self.dimension as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let normalized_text = text.to_lowercase();
        let words: Vec<&str> = normalized_text.split_whitespace().collect();
        let mut embedding = vec![0.0f32; self.dimension];

        for word in &words {
            embedding[self.bucket(word, 0)] += 1.0;
            embedding[self.bucket(word, 32)] += 0.5;
        }

        for pair in words.windows(2) {
            embedding[self.bucket(&format!("{} {}", pair[0], pair[1]), 0)] += 0.8;
        }

        // Character bigrams keep unsegmented scripts (Japanese) comparable
        let chars: Vec<char> = normalized_text.chars().filter(|c| !c.is_whitespace()).collect();
        for pair in chars.windows(2) {
            let bigram: String = pair.iter().collect();
            embedding[self.bucket(&bigram, 16)] += 0.3;
        }

        if embedding.iter().all(|v| *v == 0.0) {
            embedding[0] = 1.0;
        }
        normalize(&mut embedding);
        embedding
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_hash_embedder_is_deterministic_and_unit_length() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed(vec!["Is data encrypted?".to_string()]).unwrap();
        let b = embedder.embed(vec!["is data ENCRYPTED?".to_string()]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 64);
        assert!((cosine(&a[0], &a[0]) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_hash_embedder_vectors_are_stable() {
        // "a" lands in bucket 4 for both the word and the shifted word feature
        let embedder = HashEmbedder::new(8);
        let v = embedder.embed(vec!["A".to_string()]).unwrap();
        assert_eq!(v[0], vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_hash_embedder_handles_empty_text() {
        let embedder = HashEmbedder::new(8);
        let v = embedder.embed(vec![String::new()]).unwrap();
        assert!((cosine(&v[0], &v[0]) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_resolve_model_accepts_aliases() {
        let (model, dim) = resolve_model("sentence-transformers/all-MiniLM-L6-v2").unwrap();
        assert_eq!(model, EmbeddingModel::AllMiniLML6V2);
        assert_eq!(dim, 384);
        assert!(resolve_model("Qdrant/all-MiniLM-L6-v2-onnx").is_ok());
        assert!(matches!(resolve_model("no-such-model"), Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_load_embedder_hash_ids() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = load_embedder("hash-32", dir.path()).await.unwrap();
        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.model_id(), "hash-32");
        assert!(load_embedder("hash-0", dir.path()).await.is_err());
        assert!(load_embedder("hash-x", dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_embed_texts_empty_input() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(4));
        assert!(embed_texts(embedder, Vec::new()).await.unwrap().is_empty());
    }
}
