//! Discount estimation on held-out data.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{LmError, Result};
use crate::model::language_model::LanguageModel;

/// Chooses a Kneser-Ney discount for a trained model.
pub trait DiscountEstimator {
	/// Returns the discount to use, strictly between 0 and 1.
	///
	/// # Errors
	/// Propagates scoring errors on the held-out sentences.
	fn estimate(&self, model: &LanguageModel, held_out: &[String]) -> Result<f64>;
}

/// Multiple-restart hill climbing over the discount.
///
/// Each restart starts from a random point of `[lower, upper]` and moves by
/// `step` while the held-out log probability improves. The best point of all
/// restarts wins.
#[derive(Clone, Debug, PartialEq)]
pub struct HillClimbing {
	lower: f64,
	upper: f64,
	step: f64,
	restarts: usize,
	seed: u64,
}

impl Default for HillClimbing {
	fn default() -> Self {
		Self { lower: 0.05, upper: 0.95, step: 0.05, restarts: 4, seed: 0 }
	}
}

impl HillClimbing {
	/// Creates an estimator searching `[lower, upper]`.
	///
	/// # Errors
	/// Returns an error if the bounds are not inside (0, 1), `lower > upper`,
	/// `step <= 0` or `restarts == 0`.
	pub fn new(lower: f64, upper: f64, step: f64, restarts: usize, seed: u64) -> Result<Self> {
		if !(lower > 0.0 && upper < 1.0 && lower <= upper) {
			return Err(LmError::InvalidParameter(format!("invalid discount range [{lower}, {upper}]")));
		}
		if !(step > 0.0) || restarts == 0 {
			return Err(LmError::InvalidParameter("step and restarts must be positive".to_owned()));
		}
		Ok(Self { lower, upper, step, restarts, seed })
	}

	pub fn with_seed(mut self, seed: u64) -> Self {
		self.seed = seed;
		self
	}

	fn climb<F>(&self, start: f64, score: &F) -> Result<(f64, f64)>
	where
		F: Fn(f64) -> Result<f64>,
	{
		let mut best = (start, score(start)?);
		loop {
			let mut improved = false;
			for candidate in [best.0 - self.step, best.0 + self.step] {
				if candidate < self.lower || candidate > self.upper {
					continue;
				}
				let value = score(candidate)?;
				if value > best.1 {
					best = (candidate, value);
					improved = true;
				}
			}
			if !improved {
				return Ok(best);
			}
		}
	}
}

impl DiscountEstimator for HillClimbing {
	fn estimate(&self, model: &LanguageModel, held_out: &[String]) -> Result<f64> {
		let mut rng = StdRng::seed_from_u64(self.seed);
		let score = |discount: f64| model.held_out_logprob(held_out, discount);

		let mut best: Option<(f64, f64)> = None;
		for restart in 0..self.restarts {
			let start = rng.random_range(self.lower..=self.upper);
			let (discount, value) = self.climb(start, &score)?;
			log::debug!("Restart {}: discount {:.4}, held-out logprob {:.4}", restart, discount, value);
			// NaN scores (an empty held-out set) never replace a candidate
			if best.is_none_or(|(_, best_value)| value > best_value) {
				best = Some((discount, value));
			}
		}
		Ok(best.map_or(self.lower, |(discount, _)| discount))
	}
}
