use std::collections::HashSet;
use std::io::BufRead;

use super::counts::{KneserNeyCounts, RawCounts, TaggedCounts, glue, order_key};
use super::google::GoogleCounts;
use super::metrics::{LOG_BASE, Scores, SentenceLogprobs, log_prob, mean};
use super::smoothing::{self, Smoothing, Window};
use super::tokenizer::split_tagged;
use crate::config::ModelConfig;
use crate::error::{LmError, Result};
use crate::estimate::DiscountEstimator;
use crate::io::sentences;

/// Number of training sentences between two progress messages.
const PROGRESS_EVERY: usize = 100_000;

/// The count store of a model, one variant per smoothing family.
#[derive(Clone, Debug, PartialEq)]
pub enum Estimator {
	Basic(RawCounts),
	Laplace(RawCounts),
	KneserNey(KneserNeyCounts),
	StingyKneserNey(KneserNeyCounts),
	TagKneserNey(TaggedCounts),
	ContextKneserNey(KneserNeyCounts),
	Google(GoogleCounts),
}

impl Estimator {
	fn empty(smoothing: Smoothing, order: usize) -> Self {
		match smoothing {
			Smoothing::None => Estimator::Basic(RawCounts::new(order)),
			Smoothing::Laplace => Estimator::Laplace(RawCounts::new(order)),
			Smoothing::KneserNey => Estimator::KneserNey(KneserNeyCounts::new()),
			Smoothing::StingyKneserNey => Estimator::StingyKneserNey(KneserNeyCounts::new()),
			Smoothing::TagKneserNey => Estimator::TagKneserNey(TaggedCounts::default()),
			Smoothing::ContextKneserNey => Estimator::ContextKneserNey(KneserNeyCounts::new()),
			Smoothing::Google => Estimator::Google(GoogleCounts::default()),
		}
	}

	/// The smoothing method implemented by this variant.
	pub fn smoothing(&self) -> Smoothing {
		match self {
			Estimator::Basic(_) => Smoothing::None,
			Estimator::Laplace(_) => Smoothing::Laplace,
			Estimator::KneserNey(_) => Smoothing::KneserNey,
			Estimator::StingyKneserNey(_) => Smoothing::StingyKneserNey,
			Estimator::TagKneserNey(_) => Smoothing::TagKneserNey,
			Estimator::ContextKneserNey(_) => Smoothing::ContextKneserNey,
			Estimator::Google(_) => Smoothing::Google,
		}
	}

	/// Number of distinct unigrams (tags for the tag-factored model).
	fn distinct_unigrams(&self) -> usize {
		match self {
			Estimator::Basic(counts) | Estimator::Laplace(counts) => counts.distinct_unigrams(),
			Estimator::Google(google) => google.counts.distinct_unigrams(),
			Estimator::KneserNey(counts) | Estimator::StingyKneserNey(counts) | Estimator::ContextKneserNey(counts) => {
				counts.distinct_unigrams()
			}
			Estimator::TagKneserNey(tagged) => tagged.tags_ngrams.distinct_unigrams(),
		}
	}

	/// Drops the top-order events seen `cutoff` times or fewer.
	fn prune(&mut self, order: usize, cutoff: u64) -> usize {
		match self {
			Estimator::Basic(counts) | Estimator::Laplace(counts) => counts.prune(cutoff),
			Estimator::Google(google) => google.counts.prune(cutoff),
			Estimator::KneserNey(counts) | Estimator::StingyKneserNey(counts) | Estimator::ContextKneserNey(counts) => {
				counts.prune(order, cutoff)
			}
			Estimator::TagKneserNey(tagged) => tagged.tags_ngrams.prune(order, cutoff),
		}
	}
}

/// An n-gram language model: a configuration plus the counts it was trained on.
///
/// # Responsibilities
/// - Train the counts in a single pass over a corpus
/// - Compute n-gram probabilities with the configured smoothing
/// - Score sentences (log probability, entropy, perplexity, acceptability scores)
///
/// # Invariants
/// - `estimator.smoothing() == config.smoothing()`
/// - The counts are never modified after training
#[derive(Clone, Debug, PartialEq)]
pub struct LanguageModel {
	config: ModelConfig,
	estimator: Estimator,
	/// Distinct unigrams, plus one when an unknown slot is reserved.
	vocab_size: usize,
}

impl LanguageModel {
	/// Trains a model on a corpus, one sentence per line.
	///
	/// # Errors
	/// - `MalformedInput` on an undecodable line or an untagged token (tagged models)
	/// - `InvalidParameter` for stingy models (use `train_restricted`) and google
	///   models (use `from_google_counts`)
	pub fn train<R: BufRead>(config: ModelConfig, corpus: R) -> Result<Self> {
		match config.smoothing() {
			Smoothing::StingyKneserNey => Err(LmError::InvalidParameter(
				"a stingy model needs a restriction vocabulary".to_owned(),
			)),
			Smoothing::Google => Err(LmError::InvalidParameter(
				"google models are built from external count tables".to_owned(),
			)),
			_ => Self::train_with(config, corpus, None),
		}
	}

	/// Trains a stingy Kneser-Ney model: only tokens in `vocabulary` are counted.
	///
	/// # Errors
	/// `InvalidParameter` when the configuration is not stingy Kneser-Ney.
	pub fn train_restricted<R: BufRead>(config: ModelConfig, corpus: R, vocabulary: &HashSet<String>) -> Result<Self> {
		if config.smoothing() != Smoothing::StingyKneserNey {
			return Err(LmError::InvalidParameter(format!(
				"vocabulary restriction is only supported by {}",
				Smoothing::StingyKneserNey
			)));
		}
		Self::train_with(config, corpus, Some(vocabulary))
	}

	/// Builds a back-off model from external count tables (see `model::google`).
	pub fn from_google_counts<R: BufRead>(reader: R, order: usize) -> Result<Self> {
		let config = ModelConfig::new(Smoothing::Google, order)?;
		let google = GoogleCounts::read(reader, order)?;
		Ok(Self::from_parts(config, Estimator::Google(google)))
	}

	/// Assembles a model from already computed counts.
	pub(crate) fn from_parts(config: ModelConfig, estimator: Estimator) -> Self {
		let unknown = usize::from(config.add_unknown_tag());
		let vocab_size = estimator.distinct_unigrams() + unknown;
		Self { config, estimator, vocab_size }
	}

	pub(crate) fn with_vocab_size(mut self, vocab_size: usize) -> Self {
		self.vocab_size = vocab_size;
		self
	}

	fn train_with<R: BufRead>(config: ModelConfig, corpus: R, restriction: Option<&HashSet<String>>) -> Result<Self> {
		let order = config.order();
		let smoothing = config.smoothing();
		let framing = smoothing.framing();
		let window = smoothing.window();
		let mut estimator = Estimator::empty(smoothing, order);

		let mut lines = 0;
		for sentence in sentences(corpus) {
			let tokens = framing.tokenize(&sentence?, order)?;
			match &mut estimator {
				Estimator::Basic(counts) | Estimator::Laplace(counts) => counts.add_sentence(&tokens),
				Estimator::KneserNey(counts) | Estimator::ContextKneserNey(counts) => counts.add_pivots(
					order,
					window.pivots(tokens.len(), order),
					|i, d| window.keys(&tokens, i, d),
					|i| order_key(1, &tokens[i..=i]),
				),
				Estimator::StingyKneserNey(counts) => {
					let pivots = window
						.pivots(tokens.len(), order)
						.filter(|i| restriction.is_some_and(|vocabulary| vocabulary.contains(&tokens[*i])));
					counts.add_pivots(order, pivots, |i, d| window.keys(&tokens, i, d), |i| order_key(1, &tokens[i..=i]));
				}
				Estimator::TagKneserNey(tagged) => {
					let mut tags = Vec::with_capacity(tokens.len());
					for token in &tokens {
						let (word, tag) = split_tagged(token)?;
						tagged.words.add(word);
						tagged.tags.add(tag);
						tags.push(tag.to_owned());
					}
					tagged.tags_ngrams.add_pivots(
						order,
						window.pivots(tags.len(), order),
						|i, d| window.keys(&tags, i, d),
						|i| order_key(1, &tags[i..=i]),
					);
				}
				Estimator::Google(_) => {
					return Err(LmError::InvalidParameter("google models are not trained".to_owned()));
				}
			}

			lines += 1;
			if lines % PROGRESS_EVERY == 0 {
				log::debug!("Trained on {} sentences", lines);
			}
		}

		let mut model = Self::from_parts(config, estimator);
		log::info!(
			"Trained {} model of order {} on {} sentences ({} vocabulary entries)",
			smoothing,
			order,
			lines,
			model.vocab_size
		);

		let cutoff = model.config.cutoff();
		if cutoff > 0 {
			let removed = model.estimator.prune(order, cutoff);
			log::info!("Pruned {} {}-grams with count <= {}", removed, order, cutoff);
		}
		Ok(model)
	}

	pub fn config(&self) -> &ModelConfig {
		&self.config
	}

	pub fn estimator(&self) -> &Estimator {
		&self.estimator
	}

	pub fn smoothing(&self) -> Smoothing {
		self.config.smoothing()
	}

	pub fn order(&self) -> usize {
		self.config.order()
	}

	pub fn discount(&self) -> f64 {
		self.config.discount()
	}

	pub fn vocab_size(&self) -> usize {
		self.vocab_size
	}

	/// Sets the Kneser-Ney discount.
	///
	/// # Errors
	/// Returns an error if the value is not strictly between 0 and 1.
	pub fn set_discount(&mut self, discount: f64) -> Result<()> {
		self.config.set_discount(discount)
	}

	/// Chooses the discount with `estimator` on held-out sentences and keeps it.
	pub fn estimate_discount<E>(&mut self, estimator: &E, held_out: &[String]) -> Result<f64>
	where
		E: DiscountEstimator + ?Sized,
	{
		let discount = estimator.estimate(self, held_out)?;
		self.set_discount(discount)?;
		log::info!("Estimated discount {:.4} on {} held-out sentences", discount, held_out.len());
		Ok(discount)
	}

	/// Frames a sentence the way this model expects.
	pub fn tokenize(&self, sentence: &str) -> Result<Vec<String>> {
		self.smoothing().framing().tokenize(sentence, self.order())
	}

	/// Probability of the pivot of `ngram` at the given order.
	///
	/// `ngram` is a window built by `Window::ngram`: the history followed by the
	/// token for most models, or the token surrounded by its two-sided context
	/// for the context model. Only the innermost `order` levels are used.
	///
	/// # Errors
	/// - `InvalidParameter` when `order` is 0 or larger than the window allows
	/// - `CoverageGap` when a google or stingy model has no evidence at all
	/// - `MalformedInput` when a tagged model receives an untagged token
	pub fn ngram_prob(&self, ngram: &[String], order: usize) -> Result<f64> {
		self.ngram_prob_with_discount(ngram, order, self.discount())
	}

	/// Same as `ngram_prob`, with an explicit Kneser-Ney discount.
	pub fn ngram_prob_with_discount(&self, ngram: &[String], order: usize, discount: f64) -> Result<f64> {
		let window = self.smoothing().window();
		let pivot = window.pivot_of(ngram);
		if order == 0 || order > self.order() || ngram.is_empty() || order > window.max_order(ngram, pivot) {
			return Err(LmError::InvalidParameter(format!(
				"cannot compute an order {} probability from [{}]",
				order,
				ngram.join(" ")
			)));
		}
		let suffix = &ngram[ngram.len() - order..];

		match &self.estimator {
			Estimator::Basic(counts) => Ok(smoothing::maximum_likelihood(counts, suffix)),
			Estimator::Laplace(counts) => Ok(smoothing::laplace(counts, suffix, self.vocab_size)),
			Estimator::Google(google) => google.probability(suffix, order),
			Estimator::KneserNey(counts) | Estimator::ContextKneserNey(counts) => {
				Ok(self.kneser_ney(counts, window, ngram, pivot, order, discount))
			}
			Estimator::StingyKneserNey(counts) => {
				let probability = self.kneser_ney(counts, window, ngram, pivot, order, discount);
				if probability == 0.0 {
					return Err(LmError::CoverageGap(suffix.to_vec()));
				}
				Ok(probability)
			}
			Estimator::TagKneserNey(tagged) => {
				let mut tags = Vec::with_capacity(ngram.len());
				for token in ngram {
					tags.push(split_tagged(token)?.1.to_owned());
				}
				let (word, tag) = split_tagged(&ngram[pivot])?;
				let tag_count = tagged.tags.get(tag);
				if tag_count == 0 {
					return Ok(0.0);
				}
				let emission = (tagged.words.get(word) + 1) as f64 / tag_count as f64;
				Ok(emission * self.kneser_ney(&tagged.tags_ngrams, window, &tags, pivot, order, discount))
			}
		}
	}

	fn kneser_ney(
		&self,
		counts: &KneserNeyCounts,
		window: Window,
		ngram: &[String],
		pivot: usize,
		order: usize,
		discount: f64,
	) -> f64 {
		let floor = (self.config.add_unknown_tag() && counts.unigram_denominator > 0)
			.then(|| 1.0 / (counts.unigram_denominator as f64 + self.vocab_size as f64));
		let unigram = smoothing::kneser_ney_unigram(counts, &order_key(1, &ngram[pivot..=pivot]), floor);
		smoothing::interpolated_kneser_ney(counts, discount, order, unigram, |d| window.keys(ngram, pivot, d))
	}

	/// `log10` probability of every scored token of a framed sentence at `order`.
	///
	/// Windows always span the model order; `order` only limits how many
	/// levels of each window are used (1 gives the unigram estimates).
	pub fn tokens_logprob(&self, tokens: &[String], order: usize) -> Result<Vec<f64>> {
		self.tokens_logprob_with_discount(tokens, order, self.discount())
	}

	fn tokens_logprob_with_discount(&self, tokens: &[String], order: usize, discount: f64) -> Result<Vec<f64>> {
		let window = self.smoothing().window();
		window
			.pivots(tokens.len(), self.order())
			.map(|pivot| {
				let ngram = window.ngram(tokens, pivot, self.order());
				Ok(log_prob(self.ngram_prob_with_discount(ngram, order, discount)?))
			})
			.collect()
	}

	/// Model and unigram log probabilities of every scored token of a sentence.
	pub fn sentence_logprobs(&self, sentence: &str) -> Result<SentenceLogprobs> {
		let tokens = self.tokenize(sentence)?;
		Ok(SentenceLogprobs::new(self.tokens_logprob(&tokens, self.order())?, self.tokens_logprob(&tokens, 1)?))
	}

	/// `log10` probability of a sentence.
	pub fn logprob(&self, sentence: &str) -> Result<f64> {
		let tokens = self.tokenize(sentence)?;
		Ok(self.tokens_logprob(&tokens, self.order())?.iter().sum())
	}

	/// Mean negative `log10` probability of the scored tokens of a sentence.
	///
	/// NaN when no token is scored, which only happens for an empty sentence
	/// under the context model (its framing has no real token to pivot on).
	pub fn entropy(&self, sentence: &str) -> Result<f64> {
		let tokens = self.tokenize(sentence)?;
		Ok(-mean(&self.tokens_logprob(&tokens, self.order())?))
	}

	/// `10^entropy`.
	pub fn perplexity(&self, sentence: &str) -> Result<f64> {
		Ok(LOG_BASE.powf(self.entropy(sentence)?))
	}

	/// Every acceptability score of a sentence.
	pub fn combined_scores(&self, sentence: &str) -> Result<Scores> {
		Ok(self.sentence_logprobs(sentence)?.combined_scores(sentence))
	}

	/// Total `log10` probability of held-out sentences under another discount.
	///
	/// Used to estimate the discount; the model itself is not modified.
	pub fn held_out_logprob(&self, sentences: &[String], discount: f64) -> Result<f64> {
		let mut total = 0.0;
		for sentence in sentences {
			let tokens = self.tokenize(sentence)?;
			total += self.tokens_logprob_with_discount(&tokens, self.order(), discount)?.iter().sum::<f64>();
		}
		Ok(total)
	}
}

/// Keys of the count tables needed to score `sentences` with a model of the
/// given smoothing and order.
///
/// Loading a model restricted to these keys gives the same scores on these
/// sentences as loading it fully.
pub fn required_keys<S: AsRef<str>>(smoothing: Smoothing, order: usize, sentences: &[S]) -> Result<HashSet<String>> {
	let framing = smoothing.framing();
	let window = smoothing.window();
	let mut keys = HashSet::new();

	for sentence in sentences {
		let mut tokens = framing.tokenize(sentence.as_ref(), order)?;
		match smoothing {
			Smoothing::None | Smoothing::Laplace | Smoothing::Google => {
				for i in 0..tokens.len() {
					for j in i + 1..=(i + order).min(tokens.len()) {
						keys.insert(glue(&tokens[i..j]));
					}
				}
			}
			_ => {
				if smoothing == Smoothing::TagKneserNey {
					tokens = tokens
						.iter()
						.map(|token| split_tagged(token).map(|(_, tag)| tag.to_owned()))
						.collect::<Result<_>>()?;
				}
				for pivot in window.pivots(tokens.len(), order) {
					keys.insert(order_key(1, &tokens[pivot..=pivot]));
					for d in 2..=order {
						let (den_key, num_key) = window.keys(&tokens, pivot, d);
						keys.insert(den_key);
						keys.insert(num_key);
					}
				}
			}
		}
	}
	Ok(keys)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn model(smoothing: Smoothing, order: usize, corpus: &str) -> LanguageModel {
		let config = ModelConfig::new(smoothing, order).unwrap();
		LanguageModel::train(config, corpus.as_bytes()).unwrap()
	}

	fn tokens(s: &str) -> Vec<String> {
		s.split_whitespace().map(str::to_owned).collect()
	}

	#[test]
	fn test_unigram_counts_sum_to_total_tokens() {
		let lm = model(Smoothing::None, 3, "the cat sat\nthe dog sat on the mat\n\n");
		let Estimator::Basic(counts) = lm.estimator() else { panic!("expected raw counts") };
		assert_eq!(counts.unigram_total(), counts.total_tokens);
		// 2 + 3 + 1, 2 + 6 + 1, 2 + 0 + 1
		assert_eq!(counts.total_tokens, 6 + 9 + 3);
	}

	#[test]
	fn test_laplace_sanity() {
		let lm = model(Smoothing::Laplace, 2, "a b\n");
		// vocabulary: <s> a b </s>, plus the unknown slot
		assert_eq!(lm.vocab_size(), 5);
		let p = lm.ngram_prob(&tokens("a b"), 2).unwrap();
		assert_eq!(p, (1.0 + 1.0) / (1.0 + lm.vocab_size() as f64));
	}

	#[test]
	fn test_laplace_never_divides_by_zero() {
		let lm = model(Smoothing::Laplace, 2, "");
		let p = lm.ngram_prob(&tokens("x y"), 2).unwrap();
		assert_eq!(p, 1.0);
		assert!(p.is_finite());
	}

	#[test]
	fn test_kneser_ney_positive_for_seen_unigrams() {
		let corpus = "the cat sat\nthe dog sat\na cat ran\n";
		let lm = model(Smoothing::KneserNey, 3, corpus);
		let seen = ["the", "cat", "sat", "dog", "a", "ran", "</s>"];
		for w1 in seen {
			for w2 in seen {
				for w3 in seen {
					let ngram = tokens(&format!("{w1} {w2} {w3}"));
					for order in 1..=3 {
						let p = lm.ngram_prob(&ngram, order).unwrap();
						assert!(p > 0.0 && p <= 1.0, "p({ngram:?}, {order}) = {p}");
					}
				}
			}
		}
	}

	#[test]
	fn test_kneser_ney_unseen_context_returns_lower_order() {
		let lm = model(Smoothing::KneserNey, 3, "the cat sat\nthe dog sat\n");
		// "dog cat" was never a context: order 3 must equal order 2
		let ngram = tokens("dog cat sat");
		assert_eq!(lm.ngram_prob(&ngram, 3).unwrap(), lm.ngram_prob(&ngram, 2).unwrap());
		// "zebra" was never a context either: order 2 equals the unigram estimate
		let ngram = tokens("zebra cat");
		assert_eq!(lm.ngram_prob(&ngram, 2).unwrap(), lm.ngram_prob(&ngram, 1).unwrap());
	}

	#[test]
	fn test_kneser_ney_unigram_is_relative_frequency() {
		let lm = model(Smoothing::KneserNey, 2, "a a a\n");
		let Estimator::KneserNey(counts) = lm.estimator() else { panic!("expected kneser-ney counts") };
		let expected = counts.numerator("1@a") as f64 / counts.unigram_denominator as f64;
		assert_eq!(lm.ngram_prob(&tokens("a"), 1).unwrap(), expected);
	}

	#[test]
	fn test_end_to_end_kneser_ney() {
		let lm = model(Smoothing::KneserNey, 3, "the cat sat\nthe dog sat\n");
		let entropy = lm.entropy("the cat sat").unwrap();
		assert!(entropy.is_finite());
		assert!(entropy > 0.0);
		let perplexity = lm.perplexity("the cat sat").unwrap();
		assert!((perplexity - 10f64.powf(entropy)).abs() < 1e-9);

		let unseen = lm.entropy("purple elephants dance").unwrap();
		assert!(unseen.is_finite());
		assert!(unseen > entropy);
	}

	#[test]
	fn test_no_unknown_slot_gives_zero_for_unseen() {
		let mut config = ModelConfig::new(Smoothing::KneserNey, 2).unwrap();
		config.set_add_unknown_tag(false);
		let lm = LanguageModel::train(config, "a b\n".as_bytes()).unwrap();
		assert_eq!(lm.ngram_prob(&tokens("a zebra"), 2).unwrap(), 0.0);
		assert_eq!(lm.logprob("zebra").unwrap(), f64::NEG_INFINITY);
	}

	#[test]
	fn test_empty_corpus_has_no_coverage() {
		let lm = model(Smoothing::KneserNey, 2, "");
		assert_eq!(lm.vocab_size(), 1);
		let p = lm.ngram_prob(&tokens("a b"), 2).unwrap();
		assert_eq!(p, 0.0);
	}

	#[test]
	fn test_order_above_model_is_rejected() {
		let lm = model(Smoothing::KneserNey, 2, "a b\n");
		assert!(matches!(lm.ngram_prob(&tokens("a b"), 3), Err(LmError::InvalidParameter(_))));
		assert!(matches!(lm.ngram_prob(&tokens("a b"), 0), Err(LmError::InvalidParameter(_))));
	}

	#[test]
	fn test_cutoff_prunes_top_order_only() {
		let mut config = ModelConfig::new(Smoothing::Laplace, 2).unwrap();
		config.set_cutoff(1);
		let lm = LanguageModel::train(config, "a b\na b\nb c\n".as_bytes()).unwrap();
		let Estimator::Laplace(counts) = lm.estimator() else { panic!("expected raw counts") };
		assert_eq!(counts.count(&tokens("a b")), 2);
		assert_eq!(counts.count(&tokens("b c")), 0);
		assert_eq!(counts.count(&tokens("c")), 1);
	}

	#[test]
	fn test_stingy_skips_tokens_outside_vocabulary() {
		let config = ModelConfig::new(Smoothing::StingyKneserNey, 2).unwrap();
		let vocabulary: HashSet<String> = ["<s>", "</s>", "the", "cat"].into_iter().map(str::to_owned).collect();
		let lm = LanguageModel::train_restricted(config, "the cat sat\nthe dog\n".as_bytes(), &vocabulary).unwrap();
		let Estimator::StingyKneserNey(counts) = lm.estimator() else { panic!("expected stingy counts") };
		assert_eq!(counts.numerator("1@sat"), 0);
		assert_eq!(counts.numerator("1@dog"), 0);
		assert_eq!(counts.numerator("2@the cat"), 1);
		assert!(lm.ngram_prob(&tokens("the cat"), 2).unwrap() > 0.0);
	}

	#[test]
	fn test_stingy_zero_probability_is_a_coverage_gap() {
		let mut config = ModelConfig::new(Smoothing::StingyKneserNey, 2).unwrap();
		config.set_add_unknown_tag(false);
		let vocabulary: HashSet<String> = ["the"].into_iter().map(str::to_owned).collect();
		let lm = LanguageModel::train_restricted(config, "the cat\n".as_bytes(), &vocabulary).unwrap();
		let err = lm.ngram_prob(&tokens("the cat"), 2).unwrap_err();
		assert!(matches!(err, LmError::CoverageGap(_)));
	}

	#[test]
	fn test_stingy_requires_vocabulary() {
		let config = ModelConfig::new(Smoothing::StingyKneserNey, 2).unwrap();
		assert!(LanguageModel::train(config, "a\n".as_bytes()).is_err());
	}

	#[test]
	fn test_tagged_model() {
		let corpus = "dogs/NNS bark/VBP\ncats/NNS sleep/VBP\ndogs/NNS sleep/VBP\n";
		let lm = model(Smoothing::TagKneserNey, 2, corpus);
		let Estimator::TagKneserNey(tagged) = lm.estimator() else { panic!("expected tagged counts") };
		assert_eq!(tagged.words.get("dogs"), 2);
		assert_eq!(tagged.tags.get("NNS"), 3);
		assert_eq!(tagged.tags_ngrams.numerator("2@NNS VBP"), 3);

		let p = lm.ngram_prob(&tokens("dogs/NNS bark/VBP"), 2).unwrap();
		// same tag sequence, trained as plain tokens
		let tags_lm = model(Smoothing::KneserNey, 2, "NNS VBP\nNNS VBP\nNNS VBP\n");
		let tag_p = tags_lm.ngram_prob(&tokens("NNS VBP"), 2).unwrap();
		assert!((p - tag_p * (1.0 + 1.0) / 3.0).abs() < 1e-12);
	}

	#[test]
	fn test_tagged_model_rejects_untagged_sentence() {
		let config = ModelConfig::new(Smoothing::TagKneserNey, 2).unwrap();
		let err = LanguageModel::train(config, "dogs/NNS bark\n".as_bytes()).unwrap_err();
		assert!(matches!(err, LmError::MalformedInput(_)));
		let lm = model(Smoothing::TagKneserNey, 2, "dogs/NNS bark/VBP\n");
		assert!(matches!(lm.entropy("dogs bark"), Err(LmError::MalformedInput(_))));
	}

	#[test]
	fn test_context_model_scores_every_token() {
		let lm = model(Smoothing::ContextKneserNey, 2, "a b c\na b d\n");
		let tokens = lm.tokenize("a b c").unwrap();
		assert_eq!(tokens.len(), 5);
		let logprobs = lm.tokens_logprob(&tokens, 2).unwrap();
		assert_eq!(logprobs.len(), 3);
		assert!(logprobs.iter().all(|lp| lp.is_finite()));

		let Estimator::ContextKneserNey(counts) = lm.estimator() else { panic!("expected context counts") };
		assert_eq!(counts.denominator("2@a c"), 1);
		assert_eq!(counts.numerator("2@a b c"), 1);
		assert_eq!(counts.denominator("2@<s> b"), 2);
	}

	#[test]
	fn test_google_model() {
		let counts = "*****\n<S> 2\nhi 2\n</S> 2\n*****\n<S> hi 2\nhi </S> 2\n*****\n";
		let lm = LanguageModel::from_google_counts(counts.as_bytes(), 2).unwrap();
		assert_eq!(lm.logprob("hi").unwrap(), 0.0);
		assert!(matches!(lm.logprob("bye"), Err(LmError::CoverageGap(_))));
	}

	#[test]
	fn test_sentence_scores_are_consistent() {
		let lm = model(Smoothing::KneserNey, 3, "the cat sat\nthe dog sat\n");
		let logprobs = lm.sentence_logprobs("the dog sat").unwrap();
		assert_eq!(logprobs.len(), 4);
		assert_eq!(logprobs.logprob(), lm.logprob("the dog sat").unwrap());
		assert_eq!(logprobs.entropy(), lm.entropy("the dog sat").unwrap());
		assert_eq!(lm.combined_scores("the dog sat").unwrap().slor, logprobs.slor());
	}

	#[test]
	fn test_held_out_logprob_uses_given_discount() {
		let lm = model(Smoothing::KneserNey, 2, "a b\na c\n");
		let held_out = vec!["a b".to_owned()];
		assert_eq!(lm.held_out_logprob(&held_out, lm.discount()).unwrap(), lm.logprob("a b").unwrap());
		assert_ne!(lm.held_out_logprob(&held_out, 0.1).unwrap(), lm.logprob("a b").unwrap());
	}

	#[test]
	fn test_required_keys() {
		let keys = required_keys(Smoothing::KneserNey, 2, &["a"]).unwrap();
		let expected: HashSet<String> =
			["1@a", "2@<s>", "2@<s> a", "1@</s>", "2@a", "2@a </s>"].into_iter().map(str::to_owned).collect();
		assert_eq!(keys, expected);

		let keys = required_keys(Smoothing::Laplace, 2, &["a"]).unwrap();
		let expected: HashSet<String> =
			["<s>", "a", "</s>", "<s> a", "a </s>"].into_iter().map(str::to_owned).collect();
		assert_eq!(keys, expected);
	}

	/// Context key of an order-annotated n-gram key: the pivot token removed.
	fn context_key(window: Window, key: &str) -> Option<String> {
		let (order, tokens) = key.split_once('@')?;
		let order: usize = order.parse().ok()?;
		let mut tokens: Vec<&str> = tokens.split(' ').collect();
		let pivot = match window {
			Window::Left => tokens.len() - 1,
			Window::Symmetric => tokens.len() / 2,
		};
		tokens.remove(pivot);
		Some(order_key(order, &tokens))
	}

	#[test]
	fn test_trained_kneser_ney_counts_are_consistent() {
		let corpus = "the cat sat on the mat\nthe dog sat on the log\nthe cat sat\na dog ran on the mat\n";
		for smoothing in [Smoothing::KneserNey, Smoothing::ContextKneserNey] {
			let lm = model(smoothing, 3, corpus);
			let (Estimator::KneserNey(counts) | Estimator::ContextKneserNey(counts)) = lm.estimator() else {
				panic!("expected kneser-ney counts")
			};
			for (context, non_zero) in &counts.non_zero {
				assert!(counts.denominator(context) >= *non_zero, "{smoothing}: non_zero[{context}]");
			}
			let mut checked = 0;
			for (key, numerator) in counts.numerator.iter().filter(|(key, _)| !key.starts_with("1@")) {
				let context = context_key(smoothing.window(), key).unwrap();
				assert!(*numerator <= counts.denominator(&context), "{smoothing}: numerator[{key}] > denominator[{context}]");
				checked += 1;
			}
			assert!(checked > 0);
		}
	}

	#[test]
	fn test_empty_sentence_under_context_model_is_nan() {
		let lm = model(Smoothing::ContextKneserNey, 2, "a b\n");
		assert_eq!(lm.sentence_logprobs("").unwrap().len(), 0);
		assert!(lm.entropy("").unwrap().is_nan());
		assert!(lm.combined_scores("").unwrap().slor.is_nan());
	}
}
