//! This module provides [`WeightedLruCache`], a least-recently-used cache bounded by the summed
//! weight (usually the byte size) of its entries instead of their count.
//!
//! Inserting an entry evicts least recently used entries until the new total fits the limit. The
//! evicted entries are handed back to the caller, so it can log them or notify an owner.
//!
//! ```rust
//! use geostream_core::WeightedLruCache;
//!
//! let mut cache = WeightedLruCache::new(100);
//! cache.insert("a", 1, 40);
//! cache.insert("b", 2, 40);
//! cache.get(&"a"); // "a" is now the most recently used entry
//! let evicted = cache.insert("c", 3, 40);
//! assert_eq!(evicted, vec![("b", 2)]);
//! assert_eq!(cache.total_weight(), 80);
//! ```

use lru::LruCache;
use std::{fmt::Debug, hash::Hash};

/// An LRU cache whose capacity is a total weight.
pub struct WeightedLruCache<K, V> {
	cache: LruCache<K, (V, u64)>,
	total_weight: u64,
	max_weight: u64,
}

impl<K, V> WeightedLruCache<K, V>
where
	K: Eq + Hash,
{
	/// Creates an empty cache that holds at most `max_weight` in total.
	pub fn new(max_weight: u64) -> Self {
		Self {
			cache: LruCache::unbounded(),
			total_weight: 0,
			max_weight,
		}
	}

	/// Returns the value for `key` and marks it as most recently used.
	pub fn get(&mut self, key: &K) -> Option<&V> {
		self.cache.get(key).map(|(value, _)| value)
	}

	/// Returns the value for `key` without touching its recency.
	pub fn peek(&self, key: &K) -> Option<&V> {
		self.cache.peek(key).map(|(value, _)| value)
	}

	pub fn contains(&self, key: &K) -> bool {
		self.cache.contains(key)
	}

	/// Inserts `value` with the given `weight` and returns the entries evicted to make room.
	///
	/// An existing entry for `key` is replaced and not reported. A value heavier than the whole
	/// cache is not stored; it is returned as the only evicted entry.
	pub fn insert(&mut self, key: K, value: V, weight: u64) -> Vec<(K, V)> {
		if let Some((_, old_weight)) = self.cache.pop(&key) {
			self.total_weight -= old_weight;
		}

		if weight > self.max_weight {
			return vec![(key, value)];
		}

		let mut evicted = Vec::new();
		while self.total_weight + weight > self.max_weight {
			match self.cache.pop_lru() {
				Some((old_key, (old_value, old_weight))) => {
					self.total_weight -= old_weight;
					evicted.push((old_key, old_value));
				}
				None => break,
			}
		}

		self.cache.put(key, (value, weight));
		self.total_weight += weight;
		evicted
	}

	/// Removes the entry for `key`, returning its value.
	pub fn remove(&mut self, key: &K) -> Option<V> {
		self.cache.pop(key).map(|(value, weight)| {
			self.total_weight -= weight;
			value
		})
	}

	/// Removes all entries, returning them from least to most recently used.
	pub fn clear(&mut self) -> Vec<(K, V)> {
		let mut drained = Vec::with_capacity(self.cache.len());
		while let Some((key, (value, _))) = self.cache.pop_lru() {
			drained.push((key, value));
		}
		self.total_weight = 0;
		drained
	}

	pub fn len(&self) -> usize {
		self.cache.len()
	}

	pub fn is_empty(&self) -> bool {
		self.cache.is_empty()
	}

	/// The summed weight of all entries. Never exceeds [`Self::max_weight`].
	pub fn total_weight(&self) -> u64 {
		self.total_weight
	}

	pub fn max_weight(&self) -> u64 {
		self.max_weight
	}
}

impl<K: Eq + Hash, V> Debug for WeightedLruCache<K, V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WeightedLruCache")
			.field("length", &self.cache.len())
			.field("total_weight", &self.total_weight)
			.field("max_weight", &self.max_weight)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn get_and_peek() {
		let mut cache = WeightedLruCache::new(10);
		cache.insert(1, "one", 1);
		cache.insert(2, "two", 1);
		assert_eq!(cache.get(&1), Some(&"one"));
		assert_eq!(cache.peek(&2), Some(&"two"));
		assert_eq!(cache.get(&3), None);
		assert!(cache.contains(&1));
		assert_eq!(cache.len(), 2);
	}

	#[test]
	fn evicts_least_recently_used_until_it_fits() {
		let mut cache = WeightedLruCache::new(10);
		for i in 0..5 {
			assert!(cache.insert(i, i * 100, 2).is_empty());
		}
		assert_eq!(cache.total_weight(), 10);

		cache.get(&0);
		let evicted = cache.insert(9, 900, 5);
		assert_eq!(evicted, vec![(1, 100), (2, 200), (3, 300)]);
		assert_eq!(cache.total_weight(), 9);
		assert!(cache.contains(&0));
		assert!(cache.contains(&4));
		assert!(cache.contains(&9));
	}

	#[test]
	fn weight_never_exceeds_limit() {
		let mut cache = WeightedLruCache::new(1000);
		for i in 0..200u64 {
			cache.insert(i, (), 1 + (i * 37) % 150);
			assert!(cache.total_weight() <= cache.max_weight());
		}
	}

	#[test]
	fn too_heavy_is_rejected() {
		let mut cache = WeightedLruCache::new(10);
		cache.insert("small", 1, 5);
		let evicted = cache.insert("huge", 2, 11);
		assert_eq!(evicted, vec![("huge", 2)]);
		assert!(cache.contains(&"small"));
		assert!(!cache.contains(&"huge"));
		assert_eq!(cache.total_weight(), 5);
	}

	#[test]
	fn replace_adjusts_weight() {
		let mut cache = WeightedLruCache::new(10);
		cache.insert("a", 1, 6);
		assert!(cache.insert("a", 2, 8).is_empty());
		assert_eq!(cache.total_weight(), 8);
		assert_eq!(cache.peek(&"a"), Some(&2));
	}

	#[test]
	fn remove_and_clear() {
		let mut cache = WeightedLruCache::new(10);
		cache.insert('a', 1, 3);
		cache.insert('b', 2, 3);
		cache.insert('c', 3, 3);
		assert_eq!(cache.remove(&'b'), Some(2));
		assert_eq!(cache.remove(&'b'), None);
		assert_eq!(cache.total_weight(), 6);
		assert_eq!(cache.clear(), vec![('a', 1), ('c', 3)]);
		assert!(cache.is_empty());
		assert_eq!(cache.total_weight(), 0);
	}

	#[test]
	fn debug() {
		let mut cache = WeightedLruCache::new(10);
		cache.insert(1, 1, 4);
		assert_eq!(
			format!("{cache:?}"),
			"WeightedLruCache { length: 1, total_weight: 4, max_weight: 10 }"
		);
	}
}
