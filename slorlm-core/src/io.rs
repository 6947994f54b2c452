use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{LmError, Result};
use crate::model::tokenizer::{END_MARKER, START_MARKER};

/// Opens a corpus file for streaming, one sentence per line.
pub fn open_corpus<P: AsRef<Path>>(filename: P) -> io::Result<BufReader<File>> {
	Ok(BufReader::new(File::open(filename)?))
}

/// Iterates over the sentences of a reader.
///
/// - Lines are yielded without their terminator
/// - A line that is not valid UTF-8 yields `MalformedInput` with its line number
pub fn sentences<R: BufRead>(reader: R) -> impl Iterator<Item = Result<String>> {
	reader.lines().enumerate().map(|(index, line)| {
		line.map_err(|err| match err.kind() {
			io::ErrorKind::InvalidData => LmError::MalformedInput(format!("line {}: {}", index + 1, err)),
			_ => LmError::Io(err),
		})
	})
}

/// Reads every sentence of a file into memory.
pub fn read_sentences<P: AsRef<Path>>(filename: P) -> Result<Vec<String>> {
	sentences(open_corpus(filename)?).collect()
}

/// Collects the whitespace-separated words of a corpus, plus the sentence markers.
///
/// Used to build the restriction vocabulary of a stingy model.
pub fn collect_words<R: BufRead>(reader: R) -> Result<HashSet<String>> {
	let mut words = HashSet::new();
	for sentence in sentences(reader) {
		words.extend(sentence?.split_whitespace().map(str::to_owned));
	}
	words.insert(START_MARKER.to_owned());
	words.insert(END_MARKER.to_owned());
	Ok(words)
}

/// Builds the absolute path of a table stored next to an index file.
///
/// Example:
/// `models/bnc.lm` + `"num.db"` → `/abs/models/bnc.lm.num.db`
pub(crate) fn companion_path<P: AsRef<Path>>(index_path: P, suffix: &str) -> io::Result<PathBuf> {
	let index_path = std::path::absolute(index_path.as_ref())?;
	let file_name = index_path
		.file_name()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Index path has no filename"))?;

	let mut name = file_name.to_os_string();
	name.push(".");
	name.push(suffix);
	Ok(index_path.with_file_name(name))
}
