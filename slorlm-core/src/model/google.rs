//! Fixed back-off over externally computed n-gram counts ("google" counts).
//!
//! Count file format:
//! ```text
//! *****
//! the 120
//! cat 8
//! *****
//! the cat 5
//! *****
//! ```
//! A separator line, then for each order 1..=N one `t1 .. td count` line per
//! n-gram, each order terminated by a separator line.

use std::io::BufRead;

use super::counts::{RawCounts, glue};
use crate::error::{LmError, Result};
use crate::io::sentences;

/// Line separating the orders of a count file.
pub const SECTION_SEPARATOR: &str = "*****";

/// External count tables queried with a plain back-off (no discount, no interpolation).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GoogleCounts {
	pub counts: RawCounts,
}

impl GoogleCounts {
	/// Reads count tables for orders 1..=order.
	///
	/// # Errors
	/// `MalformedInput` when a line has fewer than `d + 1` fields or a bad count.
	pub fn read<R: BufRead>(reader: R, order: usize) -> Result<Self> {
		let mut counts = RawCounts::new(order);
		let mut lines = sentences(reader);

		// leading separator
		lines.next().transpose()?;
		for d in 1..=order {
			for line in lines.by_ref() {
				let line = line?;
				if line.trim() == SECTION_SEPARATOR {
					break;
				}
				let fields: Vec<&str> = line.split_whitespace().collect();
				if fields.len() < d + 1 {
					return Err(LmError::MalformedInput(format!("expected {} tokens and a count in '{line}'", d)));
				}
				let count = fields[fields.len() - 1]
					.parse::<u64>()
					.map_err(|err| LmError::MalformedInput(format!("bad count in '{line}': {err}")))?;
				counts.insert(d, fields[..d].join(" "), count);
			}
		}

		counts.total_tokens = counts.unigram_total();
		log::info!("Loaded external counts up to order {} ({} tokens)", order, counts.total_tokens);
		Ok(Self { counts })
	}

	/// Probability of the last token of `ngram` using at most `order` tokens.
	///
	/// Backs off to the `order - 1` suffix whenever the n-gram (or its context)
	/// has no count.
	///
	/// # Errors
	/// `CoverageGap` when every order down to 1 has a zero count.
	pub fn probability(&self, ngram: &[String], order: usize) -> Result<f64> {
		let mut d = order.min(ngram.len());
		while d > 0 {
			let suffix = &ngram[ngram.len() - d..];
			let count = self.counts.count_key(d, &glue(suffix));
			if count != 0 {
				let denominator = if d == 1 {
					self.counts.total_tokens
				} else {
					self.counts.count_key(d - 1, &glue(&suffix[..d - 1]))
				};
				if denominator != 0 {
					return Ok(count as f64 / denominator as f64);
				}
			}
			d -= 1;
		}
		Err(LmError::CoverageGap(ngram.to_vec()))
	}
}
