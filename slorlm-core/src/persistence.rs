//! Saving and loading trained models.
//!
//! A model is stored as a JSON index plus one companion table per statistic,
//! next to the index:
//! ```text
//! bnc.lm            index (smoothing, order, discount, table paths, ...)
//! bnc.lm.num.db     Kneser-Ney numerators
//! bnc.lm.den.db     Kneser-Ney denominators
//! bnc.lm.nz.db      Kneser-Ney continuation counts
//! bnc.lm.wfreq.db   word frequencies (tagged models)
//! bnc.lm.tfreq.db   tag frequencies (tagged models)
//! bnc.lm.counts-2.db  raw counts of order 2 (raw, Laplace and google models)
//! ```
//! A table is a sequence of records, each a little-endian `u32` length followed
//! by a `postcard` encoded `(key, count)` pair.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::ModelConfig;
use crate::error::{LmError, Result};
use crate::io::companion_path;
use crate::model::counts::{FrequencyDistribution, KneserNeyCounts, RawCounts, TaggedCounts};
use crate::model::google::GoogleCounts;
use crate::model::language_model::{Estimator, LanguageModel};
use crate::model::smoothing::Smoothing;

const NUMERATOR: &str = "num";
const DENOMINATOR: &str = "den";
const NON_ZERO: &str = "nz";
const WORD_FREQUENCIES: &str = "wfreq";
const TAG_FREQUENCIES: &str = "tfreq";

/// Metadata record of a saved model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelIndex {
	pub smoothing: Smoothing,
	pub order: usize,
	pub discount: f64,
	pub cutoff: u64,
	pub add_unknown_tag: bool,
	/// Kneser-Ney unigram denominator (0 for raw counts).
	pub unigram_den: u64,
	/// Framed tokens seen during training (raw counts).
	pub total_tokens: u64,
	pub vocab_size: usize,
	/// Table name → absolute path of the table.
	pub tables: BTreeMap<String, PathBuf>,
}

impl ModelIndex {
	/// Reads an index file.
	///
	/// # Errors
	/// `PersistenceCorruption` when the file is not a valid index.
	pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path)?;
		serde_json::from_str(&text).map_err(|err| LmError::corruption(path, err))
	}

	fn table(&self, index_path: &Path, name: &str) -> Result<&Path> {
		self.tables
			.get(name)
			.map(PathBuf::as_path)
			.ok_or_else(|| LmError::corruption(index_path, format!("missing table '{name}'")))
	}

	fn config(&self, index_path: &Path) -> Result<ModelConfig> {
		let mut config = ModelConfig::new(self.smoothing, self.order)?;
		config.set_cutoff(self.cutoff);
		config.set_add_unknown_tag(self.add_unknown_tag);
		config.set_discount(self.discount).map_err(|err| LmError::corruption(index_path, err))?;
		Ok(config)
	}
}

fn counts_table(order: usize) -> String {
	format!("counts-{order}")
}

/// Saves a model to `index_path` and its companion tables.
///
/// Every file is written to a temporary file first, then moved in place.
pub fn save<P: AsRef<Path>>(model: &LanguageModel, index_path: P) -> Result<()> {
	let index_path = index_path.as_ref();
	let config = model.config();
	let mut index = ModelIndex {
		smoothing: config.smoothing(),
		order: config.order(),
		discount: config.discount(),
		cutoff: config.cutoff(),
		add_unknown_tag: config.add_unknown_tag(),
		unigram_den: 0,
		total_tokens: 0,
		vocab_size: model.vocab_size(),
		tables: BTreeMap::new(),
	};

	let mut write = |name: &str, records: Vec<(&String, &u64)>| -> Result<()> {
		let path = companion_path(index_path, &format!("{name}.db"))?;
		write_table(&path, records)?;
		index.tables.insert(name.to_owned(), path);
		Ok(())
	};

	match model.estimator() {
		Estimator::Basic(counts) | Estimator::Laplace(counts) | Estimator::Google(GoogleCounts { counts }) => {
			for d in 1..=counts.order() {
				let records = counts.map(d).map(|map| map.iter().collect()).unwrap_or_default();
				write(&counts_table(d), records)?;
			}
			index.total_tokens = counts.total_tokens;
		}
		Estimator::KneserNey(counts) | Estimator::StingyKneserNey(counts) | Estimator::ContextKneserNey(counts) => {
			write_kneser_ney(&mut write, counts)?;
			index.unigram_den = counts.unigram_denominator;
		}
		Estimator::TagKneserNey(tagged) => {
			write_kneser_ney(&mut write, &tagged.tags_ngrams)?;
			write(WORD_FREQUENCIES, tagged.words.iter().collect())?;
			write(TAG_FREQUENCIES, tagged.tags.iter().collect())?;
			index.unigram_den = tagged.tags_ngrams.unigram_denominator;
		}
	}

	let json = serde_json::to_string_pretty(&index).map_err(io::Error::from)?;
	write_atomically(index_path, |writer| writer.write_all(json.as_bytes()))?;
	log::info!("Saved {} model of order {} to {}", index.smoothing, index.order, index_path.display());
	Ok(())
}

fn write_kneser_ney<W>(write: &mut W, counts: &KneserNeyCounts) -> Result<()>
where
	W: FnMut(&str, Vec<(&String, &u64)>) -> Result<()>,
{
	write(NUMERATOR, counts.numerator.iter().collect())?;
	write(DENOMINATOR, counts.denominator.iter().collect())?;
	write(NON_ZERO, counts.non_zero.iter().collect())
}

/// Loads a saved model with every count.
pub fn load<P: AsRef<Path>>(index_path: P) -> Result<LanguageModel> {
	load_with(index_path, |_| true)
}

/// Loads a saved model keeping only the keys of `keys`.
///
/// See `model::language_model::required_keys` to build the allow-list from
/// the sentences to score.
pub fn load_restricted<P: AsRef<Path>>(index_path: P, keys: &HashSet<String>) -> Result<LanguageModel> {
	load_with(index_path, |key| keys.contains(key))
}

/// Loads a saved model keeping only the keys accepted by `keep`.
///
/// Frequency tables of tagged models are always loaded fully. The vocabulary
/// size is the one of the saved model, whatever the filter.
///
/// # Errors
/// - `PersistenceCorruption` on a bad index, a missing or truncated table, or
///   an undecodable record
/// - `Io` when a file cannot be read
pub fn load_with<P, F>(index_path: P, keep: F) -> Result<LanguageModel>
where
	P: AsRef<Path>,
	F: Fn(&str) -> bool,
{
	let index_path = index_path.as_ref();
	let index = ModelIndex::read(index_path)?;
	let config = index.config(index_path)?;

	let estimator = match index.smoothing {
		Smoothing::None | Smoothing::Laplace | Smoothing::Google => {
			let mut counts = RawCounts::new(index.order);
			for d in 1..=index.order {
				read_table(index.table(index_path, &counts_table(d))?, &keep, |key, value| {
					counts.insert(d, key, value)
				})?;
			}
			counts.total_tokens = index.total_tokens;
			match index.smoothing {
				Smoothing::None => Estimator::Basic(counts),
				Smoothing::Laplace => Estimator::Laplace(counts),
				_ => Estimator::Google(GoogleCounts { counts }),
			}
		}
		Smoothing::KneserNey => Estimator::KneserNey(read_kneser_ney(&index, index_path, &keep)?),
		Smoothing::StingyKneserNey => Estimator::StingyKneserNey(read_kneser_ney(&index, index_path, &keep)?),
		Smoothing::ContextKneserNey => Estimator::ContextKneserNey(read_kneser_ney(&index, index_path, &keep)?),
		Smoothing::TagKneserNey => {
			let tags_ngrams = read_kneser_ney(&index, index_path, &keep)?;
			let words = read_frequencies(&index, index_path, WORD_FREQUENCIES)?;
			let tags = read_frequencies(&index, index_path, TAG_FREQUENCIES)?;
			Estimator::TagKneserNey(TaggedCounts { tags_ngrams, words, tags })
		}
	};

	log::info!("Loaded {} model of order {} from {}", index.smoothing, index.order, index_path.display());
	Ok(LanguageModel::from_parts(config, estimator).with_vocab_size(index.vocab_size))
}

fn read_kneser_ney<F>(index: &ModelIndex, index_path: &Path, keep: &F) -> Result<KneserNeyCounts>
where
	F: Fn(&str) -> bool,
{
	let mut counts = KneserNeyCounts::new();
	read_table(index.table(index_path, NUMERATOR)?, keep, |key, value| {
		counts.numerator.insert(key, value);
	})?;
	read_table(index.table(index_path, DENOMINATOR)?, keep, |key, value| {
		counts.denominator.insert(key, value);
	})?;
	read_table(index.table(index_path, NON_ZERO)?, keep, |key, value| {
		counts.non_zero.insert(key, value);
	})?;
	counts.unigram_denominator = index.unigram_den;
	Ok(counts)
}

fn read_frequencies(index: &ModelIndex, index_path: &Path, name: &str) -> Result<FrequencyDistribution> {
	let mut frequencies = FrequencyDistribution::new();
	read_table(index.table(index_path, name)?, |_| true, |key, value| frequencies.insert(key, value))?;
	Ok(frequencies)
}

/// Writes `(key, count)` records, sorted by key, to `path`.
pub fn write_table<P: AsRef<Path>>(path: P, mut records: Vec<(&String, &u64)>) -> Result<()> {
	records.sort_unstable();
	let path = path.as_ref();
	write_atomically(path, |writer| {
		for (key, value) in &records {
			let buffer = postcard::to_stdvec(&(key.as_str(), **value))
				.map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
			let length = u32::try_from(buffer.len())
				.map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("record '{key}' is too large")))?;
			writer.write_all(&length.to_le_bytes())?;
			writer.write_all(&buffer)?;
		}
		Ok(())
	})?;
	log::debug!("Wrote {} records to {}", records.len(), path.display());
	Ok(())
}

fn write_atomically<F>(path: &Path, body: F) -> Result<()>
where
	F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> io::Result<()>,
{
	let directory = match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent,
		_ => Path::new("."),
	};
	let mut file = NamedTempFile::new_in(directory)?;
	{
		let mut writer = BufWriter::new(&mut file);
		body(&mut writer)?;
		writer.flush()?;
	}
	file.persist(path).map_err(|err| LmError::Io(err.error))?;
	Ok(())
}

/// Streams the records of a table, passing those whose key passes `keep` to `sink`.
///
/// The table ends at a clean end of file between two records.
///
/// # Errors
/// `PersistenceCorruption` on a truncated record or an undecodable body.
pub fn read_table<P, F, S>(path: P, keep: F, mut sink: S) -> Result<usize>
where
	P: AsRef<Path>,
	F: Fn(&str) -> bool,
	S: FnMut(String, u64),
{
	let path = path.as_ref();
	let mut reader = BufReader::new(File::open(path)?);
	let mut body = Vec::new();
	let mut kept = 0;
	let mut record = 0;

	while let Some(length) = read_length(&mut reader).map_err(|err| LmError::corruption(path, err))? {
		record += 1;
		// the length is untrusted: read at most that much instead of allocating it
		body.clear();
		reader.by_ref().take(u64::from(length)).read_to_end(&mut body)?;
		if body.len() != length as usize {
			return Err(LmError::corruption(
				path,
				format!("record {record} is truncated ({} of {length} bytes)", body.len()),
			));
		}
		let (key, value): (String, u64) = postcard::from_bytes(&body)
			.map_err(|err| LmError::corruption(path, format!("record {record}: {err}")))?;
		if keep(&key) {
			sink(key, value);
			kept += 1;
		}
	}
	log::debug!("Read {} of {} records from {}", kept, record, path.display());
	Ok(kept)
}

/// Reads a record length; `None` on a clean end of file.
fn read_length<R: Read>(reader: &mut R) -> io::Result<Option<u32>> {
	let mut bytes = [0u8; 4];
	let mut filled = 0;
	while filled < bytes.len() {
		match reader.read(&mut bytes[filled..]) {
			Ok(0) if filled == 0 => return Ok(None),
			Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated record length")),
			Ok(n) => filled += n,
			Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
			Err(err) => return Err(err),
		}
	}
	Ok(Some(u32::from_le_bytes(bytes)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_read_length_distinguishes_clean_eof() {
		let empty: &[u8] = &[];
		assert_eq!(read_length(&mut &*empty).unwrap(), None);
		let partial: &[u8] = &[1, 0];
		assert!(read_length(&mut &*partial).is_err());
		let full: &[u8] = &[5, 0, 0, 0];
		assert_eq!(read_length(&mut &*full).unwrap(), Some(5));
	}

	#[test]
	fn test_table_round_trip_with_filter() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("t.db");
		let (a, b) = ("1@a".to_owned(), "2@a b".to_owned());
		write_table(&path, vec![(&b, &3), (&a, &7)]).unwrap();

		let mut all = Vec::new();
		assert_eq!(read_table(&path, |_| true, |k, v| all.push((k, v))).unwrap(), 2);
		assert_eq!(all, vec![(a.clone(), 7), (b.clone(), 3)]);

		let mut some = Vec::new();
		read_table(&path, |k| k.starts_with("2@"), |k, v| some.push((k, v))).unwrap();
		assert_eq!(some, vec![(b, 3)]);
	}

	#[test]
	fn test_oversized_length_prefix_is_corruption() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("t.db");
		std::fs::write(&path, [0xff, 0xff, 0xff, 0xff, 1, 2]).unwrap();
		let err = read_table(&path, |_| true, |_, _| {}).unwrap_err();
		assert!(matches!(err, LmError::PersistenceCorruption { reason, .. } if reason.contains("2 of 4294967295")));
	}

	#[test]
	fn test_missing_table_in_index() {
		let index = ModelIndex {
			smoothing: Smoothing::KneserNey,
			order: 2,
			discount: 0.7,
			cutoff: 0,
			add_unknown_tag: true,
			unigram_den: 0,
			total_tokens: 0,
			vocab_size: 1,
			tables: BTreeMap::new(),
		};
		let err = index.table(Path::new("x.lm"), NUMERATOR).unwrap_err();
		assert!(matches!(err, LmError::PersistenceCorruption { .. }));
	}
}
