//! Statistical n-gram language models for sentence acceptability.
//!
//! This crate provides:
//! - Training of raw, Laplace and Kneser-Ney (plain, stingy, tag-factored,
//!   symmetric-context) models, plus back-off over external count tables
//! - Sentence scoring: log probability, entropy, perplexity, SLOR and
//!   normalized minimum/percentile scores
//! - Saving models to disk and loading them, fully or restricted to the keys
//!   needed by a known evaluation set
//! - Discount estimation on held-out data

/// Training parameters (smoothing, order, cutoff, discount).
pub mod config;

/// The error type shared by the crate.
pub mod error;

/// Discount estimation seam and the default hill-climbing estimator.
pub mod estimate;

/// Corpus readers and path helpers.
pub mod io;

/// Counting, smoothing, the model façade and sentence metrics.
pub mod model;

/// Model index and count tables on disk.
///
/// Tables are streamed record by record so that a filter can drop the keys
/// a caller does not need.
pub mod persistence;

pub use config::ModelConfig;
pub use error::{LmError, Result};
pub use model::language_model::{LanguageModel, required_keys};
pub use model::smoothing::Smoothing;
