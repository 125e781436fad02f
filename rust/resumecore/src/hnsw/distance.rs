//! Distance kernels shared by the graph and the exact scan.
//!
//! Both paths must rank with the same function, so every distance the crate
//! reports goes through [`Metric::distance`].

use serde::{Deserialize, Serialize};

/// Distance metric for one index instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// `1 - cosine similarity`. Suits unit-normalised embeddings.
    #[default]
    Cosine,
    /// Plain L2 distance.
    Euclidean,
}

impl Metric {
    /// Distance between two vectors, lower is closer.
    ///
    /// Magnitudes are only read by the cosine metric; pass them when they are
    /// already cached to skip the recomputation.
    pub fn distance(&self, a: &[f32], mag_a: Option<f32>, b: &[f32], mag_b: Option<f32>) -> f32 {
        match self {
            Metric::Cosine => 1.0 - cosine_similarity(a, b, mag_a, mag_b),
            Metric::Euclidean => euclidean_distance_squared(a, b).sqrt(),
        }
    }

    /// Similarity used while walking the graph, higher is closer.
    pub fn similarity(&self, a: &[f32], mag_a: Option<f32>, b: &[f32], mag_b: Option<f32>) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b, mag_a, mag_b),
            Metric::Euclidean => -euclidean_distance_squared(a, b).sqrt(),
        }
    }
}

pub fn magnitude(v: &[f32]) -> f32 {
    let mut sum = 0.0;
    let n = v.len();
    let mut i = 0;

    // Unrolling 4
    while i + 3 < n {
        sum += v[i] * v[i] + v[i + 1] * v[i + 1] + v[i + 2] * v[i + 2] + v[i + 3] * v[i + 3];
        i += 4;
    }

    while i < n {
        sum += v[i] * v[i];
        i += 1;
    }

    sum.sqrt()
}

/// Callers guarantee equal lengths; the index checks dimensions on the way in.
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0;
    let n = a.len().min(b.len());
    let mut i = 0;

    // Unrolling 4
    while i + 3 < n {
        let d0 = a[i] - b[i];
        let d1 = a[i + 1] - b[i + 1];
        let d2 = a[i + 2] - b[i + 2];
        let d3 = a[i + 3] - b[i + 3];
        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
        i += 4;
    }

    // Remainder
    while i < n {
        let d = a[i] - b[i];
        sum += d * d;
        i += 1;
    }

    sum
}

/// Zero-magnitude inputs have similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32], mag_a: Option<f32>, mag_b: Option<f32>) -> f32 {
    let mut dot = 0.0;
    let n = a.len().min(b.len());
    let mut i = 0;

    // Unrolling 4
    while i + 3 < n {
        dot += a[i] * b[i] + a[i + 1] * b[i + 1] + a[i + 2] * b[i + 2] + a[i + 3] * b[i + 3];
        i += 4;
    }

    while i < n {
        dot += a[i] * b[i];
        i += 1;
    }

    let ma = mag_a.unwrap_or_else(|| magnitude(a));
    let mb = mag_b.unwrap_or_else(|| magnitude(b));

    if ma == 0.0 || mb == 0.0 {
        return 0.0;
    }

    dot / (ma * mb)
}
