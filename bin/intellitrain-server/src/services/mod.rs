//! Orchestration between HTTP handlers, the store and the ML core.
//!
//! CPU-bound work (decoding, feature extraction, training, inference) runs
//! on tokio's blocking pool.

pub mod classes;
pub mod prediction;
pub mod training;
pub mod upload;
