use std::collections::HashMap;

/// Glues tokens into the key of a per-order map.
pub fn glue(tokens: &[String]) -> String {
	tokens.join(" ")
}

/// Glues tokens into an order-annotated key, for maps shared by all orders.
///
/// Example: `order_key(2, ["the", "cat"])` → `"2@the cat"`
pub fn order_key<S: AsRef<str>>(order: usize, tokens: &[S]) -> String {
	let mut key = format!("{order}@");
	for (i, token) in tokens.iter().enumerate() {
		if i > 0 {
			key.push(' ');
		}
		key.push_str(token.as_ref());
	}
	key
}

/// Raw per-order n-gram counts.
///
/// # Invariants
/// - `maps[d - 1]` holds the counts of the n-grams of order `d`
/// - Without pruning of order 1, the unigram counts sum to `total_tokens`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawCounts {
	maps: Vec<HashMap<String, u64>>,
	/// Number of framed tokens seen during training.
	pub total_tokens: u64,
}

impl RawCounts {
	pub fn new(order: usize) -> Self {
		Self { maps: vec![HashMap::new(); order], total_tokens: 0 }
	}

	/// Highest order stored.
	pub fn order(&self) -> usize {
		self.maps.len()
	}

	/// Counts every n-gram of order 1..=order of a framed sentence.
	pub fn add_sentence(&mut self, tokens: &[String]) {
		self.total_tokens += tokens.len() as u64;
		for i in 0..tokens.len() {
			for (d, map) in self.maps.iter_mut().enumerate() {
				let j = i + d + 1;
				if j > tokens.len() {
					break;
				}
				*map.entry(glue(&tokens[i..j])).or_insert(0) += 1;
			}
		}
	}

	/// Count of an n-gram; its order is the number of tokens.
	pub fn count(&self, tokens: &[String]) -> u64 {
		self.count_key(tokens.len(), &glue(tokens))
	}

	pub fn count_key(&self, order: usize, key: &str) -> u64 {
		order
			.checked_sub(1)
			.and_then(|i| self.maps.get(i))
			.and_then(|map| map.get(key))
			.copied()
			.unwrap_or(0)
	}

	pub fn insert(&mut self, order: usize, key: String, value: u64) {
		if order == 0 {
			return;
		}
		if self.maps.len() < order {
			self.maps.resize_with(order, HashMap::new);
		}
		self.maps[order - 1].insert(key, value);
	}

	/// The map of order `order`, if any.
	pub fn map(&self, order: usize) -> Option<&HashMap<String, u64>> {
		order.checked_sub(1).and_then(|i| self.maps.get(i))
	}

	/// Number of distinct unigrams.
	pub fn distinct_unigrams(&self) -> usize {
		self.map(1).map_or(0, HashMap::len)
	}

	/// Sum of all unigram counts.
	pub fn unigram_total(&self) -> u64 {
		self.map(1).map_or(0, |map| map.values().sum())
	}

	/// Removes the top-order n-grams seen `cutoff` times or fewer.
	///
	/// Returns the number of removed entries.
	pub fn prune(&mut self, cutoff: u64) -> usize {
		match self.maps.last_mut() {
			Some(top) => {
				let before = top.len();
				top.retain(|_, count| *count > cutoff);
				before - top.len()
			}
			None => 0,
		}
	}
}

/// Counts for interpolated Kneser-Ney smoothing.
///
/// All orders share the three maps; keys are order-annotated (see `order_key`).
///
/// # Invariants
/// - `denominator[ctx] >= non_zero[ctx]`
/// - `numerator[key] <= denominator[context(key)]` for orders >= 2
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KneserNeyCounts {
	/// Occurrences of context + token (after the interpolated-count trick).
	pub numerator: HashMap<String, u64>,
	/// Occurrences of each context.
	pub denominator: HashMap<String, u64>,
	/// Distinct continuations observed after each context.
	pub non_zero: HashMap<String, u64>,
	/// Number of unigram tokens counted.
	pub unigram_denominator: u64,
}

impl KneserNeyCounts {
	pub fn new() -> Self {
		Self::default()
	}

	/// Performs the interpolated counting walk over the given pivots.
	///
	/// For each pivot, orders are walked from `order` down to 1. At order `d > 1`
	/// the context is counted and the n-gram numerator incremented; the walk only
	/// descends to `d - 1` when the n-gram was never seen before (Goodman 2001,
	/// generalized to any order). Order 1 increments the unigram counts.
	///
	/// - `keys(pivot, d)` returns the (context key, n-gram key) at order `d`
	/// - `unigram(pivot)` returns the order 1 key
	pub fn add_pivots<P, K, U>(&mut self, order: usize, pivots: P, keys: K, unigram: U)
	where
		P: IntoIterator<Item = usize>,
		K: Fn(usize, usize) -> (String, String),
		U: Fn(usize) -> String,
	{
		for pivot in pivots {
			for d in (1..=order).rev() {
				if d == 1 {
					self.unigram_denominator += 1;
					*self.numerator.entry(unigram(pivot)).or_insert(0) += 1;
					break;
				}

				let (den_key, num_key) = keys(pivot, d);
				*self.denominator.entry(den_key.clone()).or_insert(0) += 1;
				let seen = self.numerator.entry(num_key).or_insert(0);
				let previous = *seen;
				*seen += 1;
				if previous != 0 {
					break;
				}
				*self.non_zero.entry(den_key).or_insert(0) += 1;
			}
		}
	}

	pub fn numerator(&self, key: &str) -> u64 {
		self.numerator.get(key).copied().unwrap_or(0)
	}

	pub fn denominator(&self, key: &str) -> u64 {
		self.denominator.get(key).copied().unwrap_or(0)
	}

	pub fn non_zero(&self, key: &str) -> u64 {
		self.non_zero.get(key).copied().unwrap_or(0)
	}

	/// Number of distinct unigrams.
	pub fn distinct_unigrams(&self) -> usize {
		self.numerator.keys().filter(|key| key.starts_with("1@")).count()
	}

	/// Removes the numerators of order `order` seen `cutoff` times or fewer.
	///
	/// Contexts keep their denominator and continuation counts, so the pruned
	/// mass is redistributed to the lower orders.
	pub fn prune(&mut self, order: usize, cutoff: u64) -> usize {
		let prefix = format!("{order}@");
		let before = self.numerator.len();
		self.numerator.retain(|key, count| !key.starts_with(&prefix) || *count > cutoff);
		before - self.numerator.len()
	}
}

/// Occurrence counts of single items (words or tags).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrequencyDistribution {
	counts: HashMap<String, u64>,
}

impl FrequencyDistribution {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, item: &str) {
		*self.counts.entry(item.to_owned()).or_insert(0) += 1;
	}

	pub fn get(&self, item: &str) -> u64 {
		self.counts.get(item).copied().unwrap_or(0)
	}

	pub fn insert(&mut self, item: String, count: u64) {
		self.counts.insert(item, count);
	}

	pub fn len(&self) -> usize {
		self.counts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.counts.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
		self.counts.iter()
	}
}

/// Counts of a tag-factored model: Kneser-Ney counts over tags, plus the word
/// and tag frequencies used by the emission estimate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaggedCounts {
	pub tags_ngrams: KneserNeyCounts,
	pub words: FrequencyDistribution,
	pub tags: FrequencyDistribution,
}
