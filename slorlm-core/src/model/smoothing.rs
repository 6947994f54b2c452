//! Smoothing kinds and the probability estimators they share.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::counts::{KneserNeyCounts, RawCounts, order_key};
use super::tokenizer::Framing;
use crate::error::LmError;

/// The smoothing method of a model. Serialized as the tag stored in model indexes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Smoothing {
	/// Raw counts, maximum-likelihood estimates (debugging only).
	None,
	/// Add-one smoothing.
	Laplace,
	/// Interpolated Kneser-Ney.
	KneserNey,
	/// Interpolated Kneser-Ney restricted to a known vocabulary.
	StingyKneserNey,
	/// Kneser-Ney over tags, times a word-given-tag emission.
	TagKneserNey,
	/// Kneser-Ney over two-sided contexts.
	ContextKneserNey,
	/// Fixed back-off over external count tables.
	Google,
}

impl Smoothing {
	pub const ALL: [Smoothing; 7] = [
		Smoothing::None,
		Smoothing::Laplace,
		Smoothing::KneserNey,
		Smoothing::StingyKneserNey,
		Smoothing::TagKneserNey,
		Smoothing::ContextKneserNey,
		Smoothing::Google,
	];

	/// The tag used in indexes and on the command line.
	pub fn name(self) -> &'static str {
		match self {
			Smoothing::None => "none",
			Smoothing::Laplace => "laplace",
			Smoothing::KneserNey => "kneser-ney",
			Smoothing::StingyKneserNey => "stingy-kneser-ney",
			Smoothing::TagKneserNey => "tag-kneser-ney",
			Smoothing::ContextKneserNey => "context-kneser-ney",
			Smoothing::Google => "google",
		}
	}

	/// How sentences are framed for this smoothing.
	pub fn framing(self) -> Framing {
		match self {
			Smoothing::TagKneserNey => Framing::Tagged,
			Smoothing::ContextKneserNey => Framing::Symmetric,
			Smoothing::Google => Framing::Google,
			_ => Framing::Standard,
		}
	}

	/// How n-grams are windowed around the scored token.
	pub fn window(self) -> Window {
		match self {
			Smoothing::ContextKneserNey => Window::Symmetric,
			_ => Window::Left,
		}
	}

	pub fn is_kneser_ney(self) -> bool {
		matches!(
			self,
			Smoothing::KneserNey | Smoothing::StingyKneserNey | Smoothing::TagKneserNey | Smoothing::ContextKneserNey
		)
	}
}

impl fmt::Display for Smoothing {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Smoothing {
	type Err = LmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Smoothing::ALL
			.into_iter()
			.find(|smoothing| smoothing.name() == s.trim())
			.ok_or_else(|| LmError::InvalidParameter(format!("unknown smoothing method '{s}'")))
	}
}

/// Shape of the n-gram around the pivot (the token being predicted).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Window {
	/// `order - 1` tokens of history, then the pivot.
	Left,
	/// `order - 1` tokens on each side of the pivot.
	Symmetric,
}

impl Window {
	/// Pivots of a framed sentence of length `len` that have a full window.
	pub fn pivots(self, len: usize, order: usize) -> Range<usize> {
		let first = order.saturating_sub(1);
		match self {
			Window::Left => first..len,
			Window::Symmetric => first..(len + 1).saturating_sub(order),
		}
	}

	/// The n-gram of the given order around `pivot`.
	pub fn ngram(self, tokens: &[String], pivot: usize, order: usize) -> &[String] {
		match self {
			Window::Left => &tokens[pivot + 1 - order..=pivot],
			Window::Symmetric => &tokens[pivot + 1 - order..pivot + order],
		}
	}

	/// Position of the pivot inside an n-gram built by `ngram`.
	pub fn pivot_of(self, ngram: &[String]) -> usize {
		match self {
			Window::Left => ngram.len().saturating_sub(1),
			Window::Symmetric => ngram.len() / 2,
		}
	}

	/// Highest order whose window fits around `pivot` inside `tokens`.
	pub fn max_order(self, tokens: &[String], pivot: usize) -> usize {
		match self {
			Window::Left => pivot + 1,
			Window::Symmetric => (pivot + 1).min(tokens.len() - pivot),
		}
	}

	/// Order-annotated (context key, n-gram key) at order `d >= 2` around `pivot`.
	pub fn keys(self, tokens: &[String], pivot: usize, d: usize) -> (String, String) {
		let left = &tokens[pivot + 1 - d..pivot];
		match self {
			Window::Left => (order_key(d, left), order_key(d, &tokens[pivot + 1 - d..=pivot])),
			Window::Symmetric => {
				let right = &tokens[pivot + 1..pivot + d];
				let context: Vec<&String> = left.iter().chain(right).collect();
				(order_key(d, &context), order_key(d, &tokens[pivot + 1 - d..pivot + d]))
			}
		}
	}
}

/// Unigram base case of the Kneser-Ney recursion.
///
/// - `numerator / unigram_denominator` for seen tokens
/// - `floor` for unseen tokens, when a floor is reserved
/// - 0 when nothing has been counted
pub fn kneser_ney_unigram(counts: &KneserNeyCounts, key: &str, floor: Option<f64>) -> f64 {
	if counts.unigram_denominator == 0 {
		return 0.0;
	}
	match (counts.numerator(key), floor) {
		(0, Some(floor)) => floor,
		(num, _) => num as f64 / counts.unigram_denominator as f64,
	}
}

/// Interpolated Kneser-Ney recursion, shared by every Kneser-Ney variant.
///
/// Starts from `unigram` and, for each order `d` in `2..=order`, interpolates
/// the discounted estimate of order `d` with the previous one. `keys(d)` returns
/// the (context key, n-gram key) of order `d`. A context never seen stops the
/// recursion and the last computed probability is returned unchanged.
pub fn interpolated_kneser_ney<K>(counts: &KneserNeyCounts, discount: f64, order: usize, unigram: f64, keys: K) -> f64
where
	K: Fn(usize) -> (String, String),
{
	let mut probability = unigram;
	for d in 2..=order {
		let (den_key, num_key) = keys(d);
		let den = counts.denominator(&den_key);
		if den == 0 {
			break;
		}
		let den = den as f64;
		let num = counts.numerator(&num_key);
		let discounted = if num > 0 { (num as f64 - discount) / den } else { 0.0 };
		probability = discounted + counts.non_zero(&den_key) as f64 * discount / den * probability;
	}
	probability
}

/// Add-one estimate. `ngram` must hold exactly `order` tokens.
pub fn laplace(counts: &RawCounts, ngram: &[String], vocab_size: usize) -> f64 {
	let count = counts.count(ngram) as f64 + 1.0;
	let denominator = match ngram.len() {
		0 | 1 => counts.total_tokens,
		n => counts.count(&ngram[..n - 1]),
	};
	count / (denominator as f64 + vocab_size as f64)
}

/// Maximum-likelihood estimate, 0 when the context was never seen.
pub fn maximum_likelihood(counts: &RawCounts, ngram: &[String]) -> f64 {
	let denominator = match ngram.len() {
		0 | 1 => counts.total_tokens,
		n => counts.count(&ngram[..n - 1]),
	};
	if denominator == 0 {
		return 0.0;
	}
	counts.count(ngram) as f64 / denominator as f64
}
