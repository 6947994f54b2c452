use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LmError, Result};
use crate::model::smoothing::Smoothing;

/// Discount used by Kneser-Ney models when none is estimated.
pub const DEFAULT_DISCOUNT: f64 = 0.7;

/// Training parameters of a language model.
///
/// # Invariants
/// - `order >= 1`
/// - `0 < discount < 1`
///
/// Fields are private so that the setters can enforce the invariants.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
	/// Smoothing method.
	smoothing: Smoothing,

	/// Order of the model (3 = trigram).
	order: usize,

	/// Top-order n-grams seen this many times or fewer are dropped after training.
	cutoff: u64,

	/// Kneser-Ney discount.
	discount: f64,

	/// Reserve one vocabulary slot for unseen tokens.
	add_unknown_tag: bool,
}

impl Default for ModelConfig {
	fn default() -> Self {
		Self {
			smoothing: Smoothing::KneserNey,
			order: 3,
			cutoff: 0,
			discount: DEFAULT_DISCOUNT,
			add_unknown_tag: true,
		}
	}
}

impl ModelConfig {
	/// Creates a configuration with default cutoff, discount and unknown slot.
	///
	/// # Errors
	/// Returns an error if `order < 1`.
	pub fn new(smoothing: Smoothing, order: usize) -> Result<Self> {
		let mut config = Self { smoothing, ..Self::default() };
		config.set_order(order)?;
		Ok(config)
	}

	/// Reads a JSON configuration file; missing fields take their default value.
	pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path)?;
		let config: Self = serde_json::from_str(&text)
			.map_err(|err| LmError::InvalidParameter(format!("{}: {}", path.display(), err)))?;
		config.validate()?;
		Ok(config)
	}

	/// Checks the invariants (used after deserialization).
	pub fn validate(&self) -> Result<()> {
		check_order(self.order)?;
		check_discount(self.discount)
	}

	pub fn smoothing(&self) -> Smoothing {
		self.smoothing
	}

	pub fn order(&self) -> usize {
		self.order
	}

	pub fn cutoff(&self) -> u64 {
		self.cutoff
	}

	pub fn discount(&self) -> f64 {
		self.discount
	}

	pub fn add_unknown_tag(&self) -> bool {
		self.add_unknown_tag
	}

	pub fn set_smoothing(&mut self, smoothing: Smoothing) {
		self.smoothing = smoothing;
	}

	/// Sets the order of the model.
	///
	/// # Errors
	/// Returns an error if `order < 1`.
	pub fn set_order(&mut self, order: usize) -> Result<()> {
		check_order(order)?;
		self.order = order;
		Ok(())
	}

	pub fn set_cutoff(&mut self, cutoff: u64) {
		self.cutoff = cutoff;
	}

	/// Sets the Kneser-Ney discount.
	///
	/// # Errors
	/// Returns an error if the value is not strictly between 0 and 1.
	pub fn set_discount(&mut self, discount: f64) -> Result<()> {
		check_discount(discount)?;
		self.discount = discount;
		Ok(())
	}

	pub fn set_add_unknown_tag(&mut self, add_unknown_tag: bool) {
		self.add_unknown_tag = add_unknown_tag;
	}
}

fn check_order(order: usize) -> Result<()> {
	if order < 1 {
		return Err(LmError::InvalidParameter("order must be >= 1".to_owned()));
	}
	Ok(())
}

fn check_discount(discount: f64) -> Result<()> {
	if !(discount > 0.0 && discount < 1.0) {
		return Err(LmError::InvalidParameter(format!("discount must be between 0 and 1, got {discount}")));
	}
	Ok(())
}
