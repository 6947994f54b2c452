//! Language model internals.
//!
//! - Sentence framing (`tokenizer`)
//! - Count stores (`counts`)
//! - Probability estimators (`smoothing`, `google`)
//! - The trained model façade (`LanguageModel`)
//! - Sentence-level scores (`metrics`)

/// Boundary markers and `word/TAG` handling.
pub mod tokenizer;

/// Raw, Kneser-Ney and frequency count stores.
///
/// Includes the interpolated counting walk shared by every Kneser-Ney variant.
pub mod counts;

/// Smoothing kinds, n-gram windows and the shared estimators.
pub mod smoothing;

/// Back-off over externally computed count tables.
pub mod google;

/// The trained model: training, n-gram probabilities and sentence scoring.
pub mod language_model;

/// Sentence metrics built on per-token log probabilities.
pub mod metrics;
