//! Sentence-level acceptability scores derived from per-token log probabilities.
//!
//! All scores are computed from two parallel vectors: the `log10` probability of
//! each scored token under the full model and under its unigram estimate. The
//! normalized value of a token is `-(logprob / unigram_logprob)`.

use serde::Serialize;

/// Base of the logarithms used by every score.
pub const LOG_BASE: f64 = 10.0;

/// Number of lowest normalized values reported by `combined_scores`.
pub const BOTTOM_COUNT: usize = 5;

/// `log10(p)`, with `log(0) = -inf`.
pub fn log_prob(p: f64) -> f64 {
	if p == 0.0 { f64::NEG_INFINITY } else { p.log10() }
}

/// Percentile of `values` (NIST method, `p` in `[0, 100)`).
///
/// The rank is `p / 100 * (N + 1)` over the sorted values (1-based); the result
/// is interpolated between the two neighbouring values, and ranks outside
/// `[1, N]` clamp to the first or last value.
///
/// Returns `None` for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
	if values.is_empty() {
		return None;
	}
	let mut sorted = values.to_vec();
	sorted.sort_by(f64::total_cmp);

	let n = sorted.len();
	let rank = p / 100.0 * (n as f64 + 1.0);
	let k = rank.floor();
	let fraction = rank - k;
	if k < 1.0 {
		return Some(sorted[0]);
	}
	let k = k as usize;
	if k >= n {
		return Some(sorted[n - 1]);
	}
	if fraction == 0.0 {
		return Some(sorted[k - 1]);
	}
	Some(sorted[k - 1] + fraction * (sorted[k] - sorted[k - 1]))
}

/// Arithmetic mean, NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
	values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of the values lower than or equal to the `p`-th percentile.
///
/// Falls back to the first value when no value qualifies.
pub fn mean_of_percentile(values: &[f64], p: f64) -> f64 {
	let Some(threshold) = percentile(values, p) else {
		return f64::NAN;
	};
	let low: Vec<f64> = values.iter().copied().filter(|v| *v <= threshold).collect();
	if low.is_empty() { values[0] } else { mean(&low) }
}

/// Sum of the `n` smallest values divided by `n`.
pub fn mean_of_n_smallest(values: &[f64], n: usize) -> f64 {
	let mut sorted = values.to_vec();
	sorted.sort_by(f64::total_cmp);
	sorted.iter().take(n).sum::<f64>() / n as f64
}

/// The `n` smallest values in ascending order, padded with zeros.
pub fn n_smallest_padded(values: &[f64], n: usize) -> Vec<f64> {
	let mut sorted = values.to_vec();
	sorted.sort_by(f64::total_cmp);
	sorted.resize(n, 0.0);
	sorted
}

/// Shannon entropy (bits) of a probability distribution; zero entries are skipped.
pub fn information_entropy(probabilities: &[f64]) -> f64 {
	probabilities.iter().filter(|p| **p != 0.0).map(|p| -p * p.log2()).sum()
}

fn minimum(values: &[f64]) -> f64 {
	values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn maximum(values: &[f64]) -> f64 {
	values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Per-token log probabilities of one sentence under the model and its unigram estimate.
///
/// # Invariants
/// - `logprobs.len() == unigram_logprobs.len()`
#[derive(Clone, Debug, PartialEq)]
pub struct SentenceLogprobs {
	pub logprobs: Vec<f64>,
	pub unigram_logprobs: Vec<f64>,
}

impl SentenceLogprobs {
	pub fn new(logprobs: Vec<f64>, unigram_logprobs: Vec<f64>) -> Self {
		debug_assert_eq!(logprobs.len(), unigram_logprobs.len());
		Self { logprobs, unigram_logprobs }
	}

	/// Number of scored tokens.
	pub fn len(&self) -> usize {
		self.logprobs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.logprobs.is_empty()
	}

	/// Sentence log probability.
	pub fn logprob(&self) -> f64 {
		self.logprobs.iter().sum()
	}

	/// Sentence log probability under the unigram estimate.
	pub fn unigram_logprob(&self) -> f64 {
		self.unigram_logprobs.iter().sum()
	}

	/// `-mean(logprobs)`, NaN when no token was scored.
	pub fn entropy(&self) -> f64 {
		-mean(&self.logprobs)
	}

	/// `10^entropy`.
	pub fn perplexity(&self) -> f64 {
		LOG_BASE.powf(self.entropy())
	}

	/// `-(logprob / unigram_logprob)` for each token.
	pub fn normalized(&self) -> Vec<f64> {
		self.logprobs.iter().zip(&self.unigram_logprobs).map(|(x, y)| -(x / y)).collect()
	}

	/// Log probability divided by the number of scored tokens.
	pub fn mean_logprob(&self) -> f64 {
		self.logprob() / self.len() as f64
	}

	/// Log probability divided by minus the unigram log probability.
	pub fn weighted_mean_logprob(&self) -> f64 {
		self.logprob() / (-self.unigram_logprob())
	}

	/// Log probability minus the unigram log probability.
	pub fn logprob_minus_unigram(&self) -> f64 {
		self.logprob() - self.unigram_logprob()
	}

	/// Syntactic log-odds ratio (Pauls and Klein 2012), NaN when no token was scored.
	pub fn slor(&self) -> f64 {
		self.logprob_minus_unigram() / self.len() as f64
	}

	pub fn normalized_min(&self) -> f64 {
		minimum(&self.normalized())
	}

	pub fn normalized_max(&self) -> f64 {
		maximum(&self.normalized())
	}

	pub fn distance_between_min_max(&self) -> f64 {
		let normalized = self.normalized();
		maximum(&normalized) - minimum(&normalized)
	}

	/// Mean of the `n` lowest normalized values.
	pub fn mean_of_n_smallest(&self, n: usize) -> f64 {
		mean_of_n_smallest(&self.normalized(), n)
	}

	/// Mean of the normalized values in the first quartile.
	pub fn mean_of_first_quartile(&self) -> f64 {
		mean_of_percentile(&self.normalized(), 25.0)
	}

	/// Mean of the normalized values below the `p`-th percentile.
	pub fn mean_of_percentile(&self, p: f64) -> f64 {
		mean_of_percentile(&self.normalized(), p)
	}

	/// Computes every score of `sentence` at once, normalizing only once.
	///
	/// Each field is produced by the same helper as the matching method.
	pub fn combined_scores(&self, sentence: &str) -> Scores {
		let normalized = self.normalized();
		let normalized_min = minimum(&normalized);
		let normalized_max = maximum(&normalized);
		let bottom = n_smallest_padded(&normalized, BOTTOM_COUNT);

		Scores {
			sentence: sentence.to_owned(),
			logprob: self.logprob(),
			unigram_logprob: self.unigram_logprob(),
			mean_logprob: self.mean_logprob(),
			weighted_mean_logprob: self.weighted_mean_logprob(),
			logprob_minus_unigram: self.logprob_minus_unigram(),
			slor: self.slor(),
			normalized_bottom_1: bottom[0],
			normalized_bottom_2: bottom[1],
			normalized_bottom_3: bottom[2],
			normalized_bottom_4: bottom[3],
			normalized_bottom_5: bottom[4],
			normalized_mean: mean(&normalized),
			mean_of_first_quartile: mean_of_percentile(&normalized, 25.0),
			mean_below_median: mean_of_percentile(&normalized, 50.0),
			normalized_min,
			normalized_max,
			distance_between_min_max: normalized_max - normalized_min,
			mean_of_two_smallest: mean_of_n_smallest(&normalized, 2),
			first_quartile: percentile(&normalized, 25.0).unwrap_or(f64::NAN),
			median: percentile(&normalized, 50.0).unwrap_or(f64::NAN),
		}
	}
}

/// Every score of one sentence; serializes as one CSV record, in column order.
///
/// `normalized_bottom_*` are the five lowest normalized values, ascending,
/// zero padded.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Scores {
	pub sentence: String,
	pub logprob: f64,
	pub unigram_logprob: f64,
	pub mean_logprob: f64,
	#[serde(rename = "norm_logprob_div")]
	pub weighted_mean_logprob: f64,
	#[serde(rename = "norm_logprob_sub")]
	pub logprob_minus_unigram: f64,
	pub slor: f64,
	#[serde(rename = "wlogprob-bot-1")]
	pub normalized_bottom_1: f64,
	#[serde(rename = "wlogprob-bot-2")]
	pub normalized_bottom_2: f64,
	#[serde(rename = "wlogprob-bot-3")]
	pub normalized_bottom_3: f64,
	#[serde(rename = "wlogprob-bot-4")]
	pub normalized_bottom_4: f64,
	#[serde(rename = "wlogprob-bot-5")]
	pub normalized_bottom_5: f64,
	#[serde(rename = "wlogprob_mean")]
	pub normalized_mean: f64,
	#[serde(rename = "wlogprob_m1q")]
	pub mean_of_first_quartile: f64,
	#[serde(rename = "wlogprob_m2q")]
	pub mean_below_median: f64,
	#[serde(rename = "wlogprob_min")]
	pub normalized_min: f64,
	#[serde(rename = "wlogprob_max")]
	pub normalized_max: f64,
	#[serde(rename = "wlogprob_range")]
	pub distance_between_min_max: f64,
	#[serde(rename = "wlogprob_bot2_mean")]
	pub mean_of_two_smallest: f64,
	#[serde(rename = "wlogprob_1q")]
	pub first_quartile: f64,
	#[serde(rename = "wlogprob_2q")]
	pub median: f64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_percentile() {
		assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0, 5.0], 50.0), Some(3.0));
		assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 0.0), Some(1.0));
		assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 99.999), Some(4.0));
		assert_eq!(percentile(&[], 50.0), None);
	}

	#[test]
	fn test_percentile_interpolates() {
		// rank = 0.25 * 5 = 1.25
		let p = percentile(&[10.0, 20.0, 30.0, 40.0], 25.0).unwrap();
		assert!((p - 12.5).abs() < 1e-12);
	}

	#[test]
	fn test_percentile_with_infinite_values() {
		let values = [f64::NEG_INFINITY, 1.0, 2.0, 3.0, 4.0];
		assert_eq!(percentile(&values, 50.0), Some(2.0));
	}

	#[test]
	fn test_mean_of_percentile() {
		let values = [5.0, 1.0, 4.0, 2.0, 3.0];
		assert_eq!(mean_of_percentile(&values, 50.0), 2.0);
	}

	#[test]
	fn test_mean_of_n_smallest() {
		assert_eq!(mean_of_n_smallest(&[3.0, 1.0, 2.0], 2), 1.5);
		assert_eq!(mean_of_n_smallest(&[3.0], 2), 1.5);
		assert_eq!(n_smallest_padded(&[3.0, 1.0], 4), vec![1.0, 3.0, 0.0, 0.0]);
	}

	#[test]
	fn test_log_prob() {
		assert_eq!(log_prob(0.0), f64::NEG_INFINITY);
		assert_eq!(log_prob(1.0), 0.0);
		assert!((log_prob(0.01) + 2.0).abs() < 1e-12);
	}

	#[test]
	fn test_information_entropy() {
		assert_eq!(information_entropy(&[0.5, 0.5, 0.0]), 1.0);
	}

	fn sample() -> SentenceLogprobs {
		SentenceLogprobs::new(vec![-1.0, -0.5, -3.0, -2.0], vec![-2.0, -1.0, -2.0, -4.0])
	}

	#[test]
	fn test_sentence_scores() {
		let s = sample();
		assert_eq!(s.logprob(), -6.5);
		assert_eq!(s.unigram_logprob(), -9.0);
		assert_eq!(s.normalized(), vec![-0.5, -0.5, -1.5, -0.5]);
		assert_eq!(s.slor(), 2.5 / 4.0);
		assert_eq!(s.normalized_min(), -1.5);
		assert_eq!(s.normalized_max(), -0.5);
		assert_eq!(s.distance_between_min_max(), 1.0);
		assert!((s.perplexity() - 10f64.powf(s.entropy())).abs() < 1e-12);
	}

	#[test]
	fn test_combined_scores_match_individual_scores() {
		let s = sample();
		let scores = s.combined_scores("a b c");
		assert_eq!(scores.sentence, "a b c");
		assert_eq!(scores.logprob, s.logprob());
		assert_eq!(scores.unigram_logprob, s.unigram_logprob());
		assert_eq!(scores.mean_logprob, s.mean_logprob());
		assert_eq!(scores.weighted_mean_logprob, s.weighted_mean_logprob());
		assert_eq!(scores.logprob_minus_unigram, s.logprob_minus_unigram());
		assert_eq!(scores.slor, s.slor());
		assert_eq!(scores.normalized_min, s.normalized_min());
		assert_eq!(scores.normalized_max, s.normalized_max());
		assert_eq!(scores.distance_between_min_max, s.distance_between_min_max());
		assert_eq!(scores.mean_of_two_smallest, s.mean_of_n_smallest(2));
		assert_eq!(scores.mean_of_first_quartile, s.mean_of_first_quartile());
		assert_eq!(scores.mean_below_median, s.mean_of_percentile(50.0));
		let bottom = [
			scores.normalized_bottom_1,
			scores.normalized_bottom_2,
			scores.normalized_bottom_3,
			scores.normalized_bottom_4,
			scores.normalized_bottom_5,
		];
		assert_eq!(bottom, [-1.5, -0.5, -0.5, -0.5, 0.0]);
	}

	#[test]
	fn test_scores_column_names() {
		let value = serde_json::to_value(sample().combined_scores("a b c")).unwrap();
		let columns: Vec<&String> = value.as_object().unwrap().keys().collect();
		assert_eq!(columns.len(), 21);
		for column in ["sentence", "norm_logprob_div", "wlogprob-bot-1", "wlogprob-bot-5", "wlogprob_2q"] {
			assert!(value.get(column).is_some(), "missing {column}");
		}
	}

	#[test]
	fn test_empty_sentence_scores_are_nan() {
		let s = SentenceLogprobs::new(Vec::new(), Vec::new());
		assert!(s.is_empty());
		assert!(s.entropy().is_nan());
		assert!(s.slor().is_nan());
	}
}
