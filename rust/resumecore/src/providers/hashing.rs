//! Feature-hashing embedder
//!
//! Offline stand-in for a sentence model: each lowercase alphanumeric token of
//! two or more characters is hashed (FNV-1a) into one of `dimensions` signed
//! buckets, and the result is L2-normalised. Texts sharing vocabulary end up
//! close under cosine distance; texts with no shared token are orthogonal
//! unless their tokens collide.

use async_trait::async_trait;

use crate::error::EmbedError;

use super::EmbeddingProvider;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl HashingEmbedder {
    /// `dimensions` is clamped to at least 1.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        for token in lower.split(|c: char| !c.is_alphanumeric()) {
            if token.chars().count() < 2 {
                continue;
            }
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.embed_sync(text))
    }
}
