//! A byte-budgeted LRU of opened sources, keyed by URL or name.
//!
//! Concurrent requests for a key that is not cached yet share a single bootstrap. The weight of
//! an entry is its index size plus the page-cache budget of the source, so the limit bounds the
//! memory of all cached sources together.

use super::{Source, SourceOptions};
use anyhow::Result;
use futures::{
	FutureExt,
	future::{BoxFuture, Shared},
};
use geostream_core::WeightedLruCache;
use parking_lot::Mutex;
use std::{collections::HashMap, error::Error, fmt, sync::Arc};

/// Why a source left the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionReason {
	/// Removed by [`SourceCache::delete`].
	Deleted,
	/// Pushed out by the size limit.
	Capacity,
	/// Removed by [`SourceCache::clear`].
	Cleared,
}

pub type EvictionCallback = Arc<dyn Fn(&str, &Arc<Source>, EvictionReason) + Send + Sync>;

#[derive(Clone)]
pub struct SourceCacheOptions {
	/// Total weight of all cached sources.
	pub size_limit: u64,
	/// Options for every source; options passed to [`SourceCache::get`] override them.
	pub defaults: SourceOptions,
	/// Called for every source that leaves the cache, after the cache is unlocked.
	pub on_evict: Option<EvictionCallback>,
}

impl SourceCacheOptions {
	pub fn new(size_limit: u64) -> SourceCacheOptions {
		SourceCacheOptions {
			size_limit,
			defaults: SourceOptions::default(),
			on_evict: None,
		}
	}
}

/// A bootstrap error shared by every waiter. Keeps the original chain reachable through
/// `source()`, so the error can still be classified.
#[derive(Clone)]
struct SharedError(Arc<anyhow::Error>);

impl fmt::Debug for SharedError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&self.0, f)
	}
}

impl fmt::Display for SharedError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

impl Error for SharedError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		self.0.source()
	}
}

type SharedOpen = Shared<BoxFuture<'static, Result<Arc<Source>, SharedError>>>;

struct CacheState {
	sources: WeightedLruCache<String, Arc<Source>>,
	pending: HashMap<String, SharedOpen>,
	/// Bumped by `clear`, so bootstraps started before it do not insert their source.
	generation: u64,
}

struct Inner {
	defaults: SourceOptions,
	on_evict: Option<EvictionCallback>,
	state: Mutex<CacheState>,
}

impl Inner {
	fn notify(&self, evicted: Vec<(String, Arc<Source>)>, reason: EvictionReason) {
		for (key, source) in evicted {
			log::debug!("source '{key}' evicted: {reason:?}");
			if let Some(callback) = &self.on_evict {
				callback(&key, &source, reason);
			}
		}
	}
}

/// Cloning shares the cache.
#[derive(Clone)]
pub struct SourceCache {
	inner: Arc<Inner>,
}

impl SourceCache {
	pub fn new(size_limit: u64, defaults: SourceOptions) -> SourceCache {
		SourceCache::with_options(SourceCacheOptions {
			defaults,
			..SourceCacheOptions::new(size_limit)
		})
	}

	pub fn with_options(options: SourceCacheOptions) -> SourceCache {
		SourceCache {
			inner: Arc::new(Inner {
				defaults: options.defaults,
				on_evict: options.on_evict,
				state: Mutex::new(CacheState {
					sources: WeightedLruCache::new(options.size_limit),
					pending: HashMap::new(),
					generation: 0,
				}),
			}),
		}
	}

	/// Returns the cached source for `key`, or opens it.
	///
	/// `options` are merged over the cache's defaults and only apply when this call opens the
	/// source. A cached source, or a bootstrap already in flight for `key`, is returned as it is
	/// and `options` are ignored. A failed bootstrap is not cached.
	pub async fn get(&self, key: &str, options: Option<SourceOptions>) -> Result<Arc<Source>> {
		let open = {
			let mut state = self.inner.state.lock();
			if let Some(source) = state.sources.get(&key.to_string()) {
				return Ok(source.clone());
			}
			if let Some(pending) = state.pending.get(key) {
				if options.is_some() {
					log::trace!("joining bootstrap of '{key}', ignoring the passed options");
				} else {
					log::trace!("joining bootstrap of '{key}'");
				}
				pending.clone()
			} else {
				let options = options.unwrap_or_default().merged_over(&self.inner.defaults);
				let open = self.spawn_open(key.to_string(), options, state.generation);
				state.pending.insert(key.to_string(), open.clone());
				open
			}
		};
		Ok(open.await?)
	}

	fn spawn_open(&self, key: String, options: SourceOptions, generation: u64) -> SharedOpen {
		let inner = self.inner.clone();
		let handle = tokio::spawn(async move {
			let result = Source::open(&key, options).await.map(Arc::new);

			let evicted = {
				let mut state = inner.state.lock();
				if state.generation == generation {
					state.pending.remove(&key);
					match &result {
						Ok(source) => {
							let weight = source.index_size_bytes() + source.max_cache_size();
							state.sources.insert(key.clone(), source.clone(), weight)
						}
						Err(_) => Vec::new(),
					}
				} else {
					Vec::new()
				}
			};
			inner.notify(evicted, EvictionReason::Capacity);

			result.map_err(|err| SharedError(Arc::new(err)))
		});

		async move {
			handle
				.await
				.unwrap_or_else(|err| Err(SharedError(Arc::new(anyhow::anyhow!("bootstrap task failed: {err}")))))
		}
		.boxed()
		.shared()
	}

	/// Removes `key` and reports whether it was cached.
	pub fn delete(&self, key: &str) -> bool {
		let removed = self.inner.state.lock().sources.remove(&key.to_string());
		match removed {
			Some(source) => {
				self.inner.notify(vec![(key.to_string(), source)], EvictionReason::Deleted);
				true
			}
			None => false,
		}
	}

	/// Removes every source and forgets running bootstraps.
	pub fn clear(&self) {
		let evicted = {
			let mut state = self.inner.state.lock();
			state.pending.clear();
			state.generation += 1;
			state.sources.clear()
		};
		self.inner.notify(evicted, EvictionReason::Cleared);
	}

	pub fn len(&self) -> usize {
		self.inner.state.lock().sources.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Summed weight of all cached sources.
	pub fn total_size(&self) -> u64 {
		self.inner.state.lock().sources.total_weight()
	}

	pub fn contains(&self, key: &str) -> bool {
		self.inner.state.lock().sources.contains(&key.to_string())
	}
}

impl fmt::Debug for SourceCache {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("SourceCache")
			.field("sources", &state.sources.len())
			.field("pending", &state.pending.len())
			.field("total_size", &state.sources.total_weight())
			.field("size_limit", &state.sources.max_weight())
			.finish()
	}
}
