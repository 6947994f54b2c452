use std::io;
use std::path::PathBuf;

/// Errors raised while training, querying, saving or loading a model.
#[derive(Debug, thiserror::Error)]
pub enum LmError {
	/// A sentence or token could not be parsed (missing tag, bad encoding).
	#[error("malformed input: {0}")]
	MalformedInput(String),

	/// Every back-off level was exhausted without evidence for the n-gram.
	#[error("no coverage for n-gram [{}]", .0.join(" "))]
	CoverageGap(Vec<String>),

	/// A model table or index on disk is truncated or cannot be decoded.
	#[error("corrupted model file {}: {reason}", path.display())]
	PersistenceCorruption { path: PathBuf, reason: String },

	/// A configuration value or query argument is out of range.
	#[error("invalid parameter: {0}")]
	InvalidParameter(String),

	#[error(transparent)]
	Io(#[from] io::Error),
}

impl LmError {
	pub(crate) fn corruption<P: Into<PathBuf>>(path: P, reason: impl ToString) -> Self {
		LmError::PersistenceCorruption { path: path.into(), reason: reason.to_string() }
	}
}

pub type Result<T> = std::result::Result<T, LmError>;
