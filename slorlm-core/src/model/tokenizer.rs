//! Sentence framing: splits a raw sentence into tokens and adds the
//! boundary markers each model family expects.

use crate::error::{LmError, Result};

/// Sentence start marker.
pub const START_MARKER: &str = "<s>";
/// Sentence end marker.
pub const END_MARKER: &str = "</s>";
/// Start marker used by externally computed (google) count tables.
pub const GOOGLE_START_MARKER: &str = "<S>";
/// End marker used by externally computed (google) count tables.
pub const GOOGLE_END_MARKER: &str = "</S>";
/// Separator between the word and the tag of a tagged token (`word/TAG`).
pub const TAG_SEPARATOR: char = '/';

/// The way a sentence is framed before counting or scoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
	/// `order-1` start markers, the tokens, one end marker.
	Standard,
	/// `order-1` start markers, the tokens, `order-1` end markers.
	Symmetric,
	/// Like `Standard`, but every token is a `word/TAG` pair.
	Tagged,
	/// Like `Standard`, with the markers of google count tables.
	Google,
}

impl Framing {
	/// Frames `sentence` for a model of the given order.
	///
	/// # Errors
	/// `Tagged` framing fails with `MalformedInput` on a token without a tag.
	pub fn tokenize(self, sentence: &str, order: usize) -> Result<Vec<String>> {
		let prefix = order.saturating_sub(1);
		let (start, end, suffix) = match self {
			Framing::Standard => (START_MARKER.to_owned(), END_MARKER.to_owned(), 1),
			Framing::Symmetric => (START_MARKER.to_owned(), END_MARKER.to_owned(), prefix),
			Framing::Tagged => (tagged_marker(START_MARKER), tagged_marker(END_MARKER), 1),
			Framing::Google => (GOOGLE_START_MARKER.to_owned(), GOOGLE_END_MARKER.to_owned(), 1),
		};

		let words = sentence.split_whitespace();
		let mut tokens = Vec::with_capacity(prefix + suffix + words.clone().count());
		tokens.extend(std::iter::repeat_n(start, prefix));
		for word in words {
			if self == Framing::Tagged {
				split_tagged(word)?;
			}
			tokens.push(word.to_owned());
		}
		tokens.extend(std::iter::repeat_n(end, suffix));
		Ok(tokens)
	}
}

fn tagged_marker(marker: &str) -> String {
	format!("{marker}{TAG_SEPARATOR}{marker}")
}

/// Splits a `word/TAG` token at the last separator.
///
/// # Errors
/// Returns `MalformedInput` if the separator is missing or either side is empty.
pub fn split_tagged(token: &str) -> Result<(&str, &str)> {
	// the end marker contains the separator
	if token.strip_prefix(END_MARKER).and_then(|rest| rest.strip_prefix(TAG_SEPARATOR)) == Some(END_MARKER) {
		return Ok((END_MARKER, END_MARKER));
	}
	match token.rsplit_once(TAG_SEPARATOR) {
		Some((word, tag)) if !word.is_empty() && !tag.is_empty() => Ok((word, tag)),
		_ => Err(LmError::MalformedInput(format!("token '{token}' has no tag"))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_standard_framing() {
		let tokens = Framing::Standard.tokenize("the cat sat", 3).unwrap();
		assert_eq!(tokens, vec!["<s>", "<s>", "the", "cat", "sat", "</s>"]);
	}

	#[test]
	fn test_unigram_framing_has_no_start_markers() {
		let tokens = Framing::Standard.tokenize("a b", 1).unwrap();
		assert_eq!(tokens, vec!["a", "b", "</s>"]);
	}

	#[test]
	fn test_symmetric_framing() {
		let tokens = Framing::Symmetric.tokenize("a b", 3).unwrap();
		assert_eq!(tokens, vec!["<s>", "<s>", "a", "b", "</s>", "</s>"]);
	}

	#[test]
	fn test_tagged_framing() {
		let tokens = Framing::Tagged.tokenize("dogs/NNS bark/VBP", 2).unwrap();
		assert_eq!(tokens, vec!["<s>/<s>", "dogs/NNS", "bark/VBP", "</s>/</s>"]);
	}

	#[test]
	fn test_tagged_framing_rejects_untagged_token() {
		let err = Framing::Tagged.tokenize("dogs/NNS bark", 2).unwrap_err();
		assert!(matches!(err, LmError::MalformedInput(_)));
	}

	#[test]
	fn test_split_tagged_uses_last_separator() {
		assert_eq!(split_tagged("and/or/CC").unwrap(), ("and/or", "CC"));
		assert_eq!(split_tagged("</s>/</s>").unwrap(), ("</s>", "</s>"));
		assert!(split_tagged("word/").is_err());
		assert!(split_tagged("/TAG").is_err());
	}

	#[test]
	fn test_google_framing() {
		let tokens = Framing::Google.tokenize("hi", 2).unwrap();
		assert_eq!(tokens, vec!["<S>", "hi", "</S>"]);
	}
}
