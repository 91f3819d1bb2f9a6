//! Embedding capability: turns text into fixed-length vectors for similarity search.
//!
//! Vectors are always passed through [`normalize_embedding`] before they are stored or
//! compared, so every vector in the system is exactly [`EMBEDDING_DIM`] finite values.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

pub const EMBEDDING_DIM: usize = 768;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding service returned status {0}")]
    Status(u16),

    #[error("embedding response did not contain a vector")]
    MissingVector,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbeddingError>;
}

/// Zeroes non-finite values in place, then truncates or zero-pads to `length`.
pub fn normalize_embedding(vec: &[f64], length: usize) -> Vec<f64> {
    let mut sanitized: Vec<f64> = vec
        .iter()
        .map(|&v| if v.is_finite() { v } else { 0.0 })
        .collect();
    sanitized.resize(length, 0.0);
    sanitized
}

// ────────────────────────────────────────────────────────────────────────────
// HttpEmbedder: OpenAI-compatible embeddings endpoint
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Flat { embedding: Vec<f64> },
    OpenAi { data: Vec<EmbeddingDatum> },
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f64>,
}

#[derive(Clone)]
pub struct HttpEmbedder {
    client: Client,
    url: String,
}

impl HttpEmbedder {
    pub fn new(url: String) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            url,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbeddingError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "input": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::Status(status.as_u16()));
        }

        let raw = match response.json::<EmbeddingResponse>().await? {
            EmbeddingResponse::Flat { embedding } => embedding,
            EmbeddingResponse::OpenAi { data } => data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .ok_or(EmbeddingError::MissingVector)?,
        };
        debug!("Embedded {} chars into {} dims", text.len(), raw.len());
        Ok(normalize_embedding(&raw, EMBEDDING_DIM))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HashingEmbedder: deterministic local fallback
// ────────────────────────────────────────────────────────────────────────────

/// Feature-hashing embedder used when no embedding service is configured.
///
/// Each lowercase alphanumeric token is hashed to a dimension and a sign; the
/// resulting bag is L2-normalized. The same text always yields the same vector,
/// and texts sharing vocabulary have positive cosine similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashingEmbedder;

impl HashingEmbedder {
    pub fn encode(text: &str) -> Vec<f64> {
        let mut vec = vec![0.0_f64; EMBEDDING_DIM];
        for token in tokenize(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let index = (h % EMBEDDING_DIM as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vec[index] += sign;
        }
        let norm = vec.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbeddingError> {
        Ok(Self::encode(text))
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine;

    #[test]
    fn test_normalize_embedding_pads_and_truncates() {
        let short = normalize_embedding(&[1.0, 2.0], 4);
        assert_eq!(short, vec![1.0, 2.0, 0.0, 0.0]);

        let long = normalize_embedding(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(long, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_normalize_embedding_zeroes_non_finite_values_in_place() {
        let v = normalize_embedding(&[1.0, f64::NAN, 2.0], 3);
        assert_eq!(v, vec![1.0, 0.0, 2.0]);

        let v = normalize_embedding(&[f64::NEG_INFINITY, 0.5, f64::INFINITY, 2.0], 5);
        assert_eq!(v, vec![0.0, 0.5, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_hashing_embedder_is_deterministic_and_unit_length() {
        let a = HashingEmbedder::encode("Senior Rust engineer, distributed systems");
        let b = HashingEmbedder::encode("Senior Rust engineer, distributed systems");
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
        let norm: f64 = a.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hashing_embedder_shared_vocabulary_ranks_higher() {
        let query = HashingEmbedder::encode("python django postgres backend");
        let close = HashingEmbedder::encode("backend developer: python, django, postgres, redis");
        let far = HashingEmbedder::encode("graphic designer figma illustrator branding");
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[test]
    fn test_hashing_embedder_empty_text_is_zero_vector() {
        let v = HashingEmbedder::encode("   ");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
