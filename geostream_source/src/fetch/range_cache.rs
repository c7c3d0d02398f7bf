//! Paged byte-range cache for the feature-data section of one source.
//!
//! Logical range requests are split into fixed-size pages. Pages live in a byte-weighted LRU,
//! and every page and every logical range has at most one fetch in flight: concurrent requests
//! for the same key await the same shared result. Fetches run as spawned tasks, so a caller
//! that stops waiting does not cancel them; they finish and fill the cache.

use anyhow::{Result, bail};
use futures::{
	FutureExt,
	future::{BoxFuture, Shared, try_join_all},
};
use geostream_core::{Blob, ByteRange, GeoStreamError, WeightedLruCache, io::DataReader};
use parking_lot::Mutex;
use std::{
	collections::HashMap,
	fmt,
	future::Future,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Blob>, GeoStreamError>>>;

/// Counters and sizes of a page cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
	pub hits: u64,
	pub misses: u64,
	pub pages: u64,
	pub bytes: u64,
	pub max_bytes: u64,
}

struct CacheState {
	pages: WeightedLruCache<u64, Arc<Blob>>,
	pending_pages: HashMap<u64, SharedFetch>,
	pending_ranges: HashMap<String, SharedFetch>,
	/// Bumped by `clear`, so fetches started before it leave the state alone.
	generation: u64,
}

struct Inner {
	reader: DataReader,
	feature_data_offset: u64,
	page_size: u64,
	timeout: Duration,
	state: Mutex<CacheState>,
	hits: AtomicU64,
	misses: AtomicU64,
}

/// Reads `range` from `reader`, failing with [`GeoStreamError::FetchFailure`] on transport
/// errors or when `timeout` elapses first.
pub(crate) async fn fetch_with_timeout(
	reader: &DataReader,
	range: ByteRange,
	timeout: Duration,
) -> Result<Blob, GeoStreamError> {
	log::trace!("fetching {range} from '{}'", reader.get_name());
	match tokio::time::timeout(timeout, reader.read_range(&range)).await {
		Ok(Ok(blob)) => Ok(blob),
		Ok(Err(err)) => Err(GeoStreamError::fetch_failure(&err)),
		Err(_) => Err(GeoStreamError::FetchFailure(format!(
			"reading {range} from '{}' timed out after {timeout:?}",
			reader.get_name()
		))),
	}
}

fn spawn_shared<F>(future: F) -> SharedFetch
where
	F: Future<Output = Result<Arc<Blob>, GeoStreamError>> + Send + 'static,
{
	let handle = tokio::spawn(future);
	async move {
		handle
			.await
			.unwrap_or_else(|err| Err(GeoStreamError::FetchFailure(format!("fetch task failed: {err}"))))
	}
	.boxed()
	.shared()
}

/// Page cache and in-flight maps of one source. Cloning shares the cache.
#[derive(Clone)]
pub struct RangeCache {
	inner: Arc<Inner>,
}

impl RangeCache {
	pub fn new(
		reader: DataReader,
		feature_data_offset: u64,
		page_size: u64,
		max_cache_size: u64,
		timeout: Duration,
	) -> Result<RangeCache> {
		if page_size == 0 {
			bail!(GeoStreamError::Misconfiguration("page size must be at least 1 byte".to_string()));
		}
		Ok(RangeCache {
			inner: Arc::new(Inner {
				reader,
				feature_data_offset,
				page_size,
				timeout,
				state: Mutex::new(CacheState {
					pages: WeightedLruCache::new(max_cache_size),
					pending_pages: HashMap::new(),
					pending_ranges: HashMap::new(),
					generation: 0,
				}),
				hits: AtomicU64::new(0),
				misses: AtomicU64::new(0),
			}),
		})
	}

	pub fn feature_data_offset(&self) -> u64 {
		self.inner.feature_data_offset
	}

	pub fn page_size(&self) -> u64 {
		self.inner.page_size
	}

	/// Fetches an absolute byte range inside the feature-data section.
	///
	/// Open-ended ranges read to the end of the file. If the file length is not known yet, an
	/// open-ended range bypasses the page cache.
	pub async fn fetch_range(&self, range: ByteRange) -> Result<Blob> {
		if range.start < self.inner.feature_data_offset {
			bail!(GeoStreamError::Misconfiguration(format!(
				"range {range} starts before the feature data at {}",
				self.inner.feature_data_offset
			)));
		}

		let key = range.to_string();
		let fetch = {
			let mut state = self.inner.state.lock();
			if let Some(pending) = state.pending_ranges.get(&key) {
				log::trace!("joining in-flight fetch of {key}");
				pending.clone()
			} else {
				let cache = self.clone();
				let generation = state.generation;
				let task_key = key.clone();
				let fetch = spawn_shared(async move {
					let result = cache
						.assemble(range)
						.await
						.map(Arc::new)
						.map_err(|err| GeoStreamError::classify(&err).cloned().unwrap_or_else(|| GeoStreamError::fetch_failure(&err)));
					let mut state = cache.inner.state.lock();
					if state.generation == generation {
						state.pending_ranges.remove(&task_key);
					}
					result
				});
				state.pending_ranges.insert(key, fetch.clone());
				fetch
			}
		};

		Ok(Arc::unwrap_or_clone(fetch.await?))
	}

	async fn assemble(&self, range: ByteRange) -> Result<Blob> {
		let inner = &self.inner;
		let size = inner.reader.size();

		let range = match (range.end, size) {
			(None, None) => {
				log::debug!("length of '{}' unknown, fetching {range} unpaged", inner.reader.get_name());
				return Ok(fetch_with_timeout(&inner.reader, range, inner.timeout).await?);
			}
			(_, Some(size)) => range.resolve(size),
			(Some(_), None) => range,
		};

		let (start, end) = (range.start, range.end.unwrap_or(range.start));
		if end <= start {
			return Ok(Blob::new_empty());
		}

		let fdo = inner.feature_data_offset;
		let first_page = (start - fdo) / inner.page_size;
		let last_page = (end - 1 - fdo) / inner.page_size;
		let pages = try_join_all((first_page..=last_page).map(|index| self.get_page(index))).await?;

		let mut blob = Blob::with_capacity((end - start) as usize);
		for (index, page) in (first_page..=last_page).zip(pages) {
			let page_start = fdo + index * inner.page_size;
			let from = start.max(page_start) - page_start;
			let to = (end.min(page_start + page.len()).max(page_start)) - page_start;
			if from >= to {
				break;
			}
			blob.extend_from_slice(page.range(from as usize..to as usize));
			if page.len() < inner.page_size {
				// a short page is the end of the file
				break;
			}
		}
		Ok(blob)
	}

	async fn get_page(&self, index: u64) -> Result<Arc<Blob>> {
		let fetch = {
			let mut state = self.inner.state.lock();
			if let Some(page) = state.pages.get(&index) {
				self.inner.hits.fetch_add(1, Ordering::Relaxed);
				return Ok(page.clone());
			}
			self.inner.misses.fetch_add(1, Ordering::Relaxed);

			if let Some(pending) = state.pending_pages.get(&index) {
				pending.clone()
			} else {
				let inner = self.inner.clone();
				let generation = state.generation;
				let fetch = spawn_shared(async move {
					let start = inner.feature_data_offset + index * inner.page_size;
					let mut end = start + inner.page_size;
					if let Some(size) = inner.reader.size() {
						end = end.min(size).max(start);
					}
					let result = fetch_with_timeout(&inner.reader, ByteRange::new(start, end), inner.timeout)
						.await
						.map(Arc::new);

					let mut state = inner.state.lock();
					if state.generation == generation {
						state.pending_pages.remove(&index);
						if let Ok(page) = &result {
							for (evicted, _) in state.pages.insert(index, page.clone(), page.len()) {
								log::trace!("evicted page {evicted} of '{}'", inner.reader.get_name());
							}
						}
					}
					result
				});
				state.pending_pages.insert(index, fetch.clone());
				fetch
			}
		};
		Ok(fetch.await?)
	}

	pub fn stats(&self) -> CacheStats {
		let state = self.inner.state.lock();
		CacheStats {
			hits: self.inner.hits.load(Ordering::Relaxed),
			misses: self.inner.misses.load(Ordering::Relaxed),
			pages: state.pages.len() as u64,
			bytes: state.pages.total_weight(),
			max_bytes: state.pages.max_weight(),
		}
	}

	/// Drops all pages, forgets in-flight fetches and resets the counters.
	pub fn clear(&self) {
		let mut state = self.inner.state.lock();
		state.pages.clear();
		state.pending_pages.clear();
		state.pending_ranges.clear();
		state.generation += 1;
		self.inner.hits.store(0, Ordering::Relaxed);
		self.inner.misses.store(0, Ordering::Relaxed);
	}
}

impl fmt::Debug for RangeCache {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RangeCache")
			.field("reader", &self.inner.reader.get_name())
			.field("feature_data_offset", &self.inner.feature_data_offset)
			.field("page_size", &self.inner.page_size)
			.field("stats", &self.stats())
			.finish()
	}
}
