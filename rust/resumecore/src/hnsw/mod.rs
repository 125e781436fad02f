//! HNSW graph used by the vector index as an approximate candidate generator.

pub mod distance;
pub mod index;
pub mod node;
pub mod pqueue;

pub use distance::Metric;
pub use index::{Hnsw, HnswError};
