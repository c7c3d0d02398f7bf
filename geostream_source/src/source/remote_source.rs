//! An opened dataset: header and spatial index in memory, feature data behind a page cache.

use super::SourceOptions;
use crate::{
	fetch::{CacheStats, RangeCache, execute_plan, fetch_with_timeout, plan_requests, until_first_error},
	format::{
		Feature, GeometryType, Header, IndexLayout, PREAMBLE_SIZE, PackedRTree, PropertyRecord, SIZE_PREFIX_LENGTH,
		SearchHit, decode_feature, decode_properties, read_size_prefix,
	},
};
use anyhow::{Result, bail, ensure};
use futures::{
	StreamExt, TryStreamExt,
	future::ready,
	stream::{self, BoxStream},
};
use geostream_core::{
	Blob, BoundingBox, ByteRange, GeoStreamError,
	io::{DataReader, get_reader},
};
use geostream_derive::context;
use std::{collections::BTreeSet, fmt, sync::Arc, time::Duration};

pub type FeatureStream = BoxStream<'static, Result<Feature>>;
pub type PropertyStream = BoxStream<'static, Result<PropertyRecord>>;

/// Per-query switches of [`Source::get_features`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeatureQueryOptions {
	/// Only fetch the features into the page cache. The stream then yields nothing but errors.
	pub warm_cache: bool,
	/// Overrides the source's `validate` option for this query.
	pub validate: Option<bool>,
}

pub struct Source {
	key: String,
	header: Arc<Header>,
	index: PackedRTree,
	feature_data_offset: u64,
	cache: RangeCache,
	options: SourceOptions,
}

impl Source {
	/// Opens the dataset at `key` and reads its header and spatial index.
	///
	/// `key` is a URL or a file path, unless `options.reader` is set; then it only names the
	/// source.
	#[context("opening source '{}'", key)]
	pub async fn open(key: &str, options: SourceOptions) -> Result<Source> {
		let reader = match &options.reader {
			Some(reader) => reader.clone(),
			None => get_reader(key)?,
		};
		let timeout = options.get_fetch_timeout();

		let (header, index, feature_data_offset) =
			bootstrap(&reader, options.get_initial_header_request_length(), timeout).await?;

		log::debug!(
			"opened '{key}': {} features of type {}, index {} bytes, feature data at {feature_data_offset}",
			header.features_count,
			header.geometry_type,
			index.byte_length()
		);

		let cache = RangeCache::new(
			reader,
			feature_data_offset,
			options.get_page_size(),
			options.get_max_cache_size(),
			timeout,
		)?;

		Ok(Source {
			key: key.to_string(),
			header: Arc::new(header),
			index,
			feature_data_offset,
			cache,
			options,
		})
	}

	/// Streams every feature whose index box intersects one of `bboxes`.
	///
	/// A feature hit by several boxes is yielded once. Features arrive grouped by request, in
	/// the order the requests complete. The stream ends after the first error.
	pub fn get_features(&self, bboxes: &[BoundingBox], options: FeatureQueryOptions) -> Result<FeatureStream> {
		let buffers = self.feature_buffers(bboxes, options.validate)?;

		if options.warm_cache {
			return Ok(buffers.try_filter_map(|_| ready(Ok(None::<Feature>))).boxed());
		}

		let header = self.header.clone();
		Ok(until_first_error(buffers.map(move |item| {
			let (buffer, offset) = item?;
			decode_feature(offset, buffer.as_slice(), &header)
		})))
	}

	/// Fetches the features of `bboxes` into the page cache and returns how many there are.
	pub async fn warm_cache(&self, bboxes: &[BoundingBox]) -> Result<u64> {
		let count = self
			.feature_buffers(bboxes, None)?
			.try_fold(0u64, |count, _| ready(Ok(count + 1)))
			.await?;
		log::debug!("warmed {count} features of '{}'", self.key);
		Ok(count)
	}

	fn feature_buffers(
		&self,
		bboxes: &[BoundingBox],
		validate: Option<bool>,
	) -> Result<BoxStream<'static, Result<(Blob, u64)>>> {
		if let Some(bbox) = bboxes.iter().find(|bbox| bbox.as_array().iter().any(|v| v.is_nan())) {
			bail!(GeoStreamError::Misconfiguration(format!("bounding box {bbox:?} contains NaN")));
		}

		let hits: BTreeSet<SearchHit> = bboxes.iter().flat_map(|bbox| self.index.search(bbox)).collect();
		let hits: Vec<SearchHit> = hits.into_iter().collect();

		let plan = plan_requests(&hits, self.feature_data_offset, self.options.get_overfetch_bytes());
		log::debug!(
			"query on '{}' with {} boxes: {} features in {} requests",
			self.key,
			bboxes.len(),
			hits.len(),
			plan.len()
		);

		let validate = validate.unwrap_or_else(|| self.options.get_validate());
		Ok(execute_plan(plan, self.cache.clone(), validate))
	}

	/// Walks all features in file order with one open-ended fetch of the feature data.
	pub fn scan_all_features(&self) -> FeatureStream {
		let header = self.header.clone();
		until_first_error(self.walk().map(move |item| {
			let (buffer, offset) = item?;
			decode_feature(offset, buffer.as_slice(), &header)
		}))
	}

	/// Like [`Source::scan_all_features`] but decodes only the properties.
	pub fn get_feature_properties(&self) -> PropertyStream {
		let header = self.header.clone();
		until_first_error(self.walk().map(move |item| {
			let (buffer, offset) = item?;
			decode_properties(offset, buffer.as_slice(), &header)
		}))
	}

	fn walk(&self) -> BoxStream<'static, Result<(Blob, u64)>> {
		let cache = self.cache.clone();
		let offset = self.feature_data_offset;
		let count = self.header.features_count;
		stream::once(async move { cache.fetch_range(ByteRange::open(offset)).await })
			.flat_map(move |result| match result {
				Ok(blob) => stream::iter(FeatureWalker::new(blob, offset, count)).boxed(),
				Err(err) => stream::iter([Err(err)]).boxed(),
			})
			.boxed()
	}

	pub fn cache_stats(&self) -> CacheStats {
		self.cache.stats()
	}

	pub fn clear_cache(&self) {
		self.cache.clear();
	}

	/// Bounds of the index root, `None` for an empty dataset.
	pub fn bounds(&self) -> Option<BoundingBox> {
		self.index.bounds()
	}

	pub fn index_size_bytes(&self) -> u64 {
		self.index.byte_length()
	}

	pub fn geometry_type(&self) -> GeometryType {
		self.header.geometry_type
	}

	pub fn header(&self) -> &Header {
		&self.header
	}

	pub fn features_count(&self) -> u64 {
		self.header.features_count
	}

	pub fn feature_data_offset(&self) -> u64 {
		self.feature_data_offset
	}

	pub fn name(&self) -> &str {
		&self.key
	}

	pub fn max_cache_size(&self) -> u64 {
		self.options.get_max_cache_size()
	}

	pub fn options(&self) -> &SourceOptions {
		&self.options
	}
}

impl fmt::Debug for Source {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Source")
			.field("key", &self.key)
			.field("geometry_type", &self.header.geometry_type)
			.field("features_count", &self.header.features_count)
			.field("feature_data_offset", &self.feature_data_offset)
			.field("cache", &self.cache)
			.finish()
	}
}

/// Reads header and index with as few requests as the window allows: one if `window` covers
/// both, at most three otherwise.
async fn bootstrap(reader: &DataReader, window: u64, timeout: Duration) -> Result<(Header, PackedRTree, u64)> {
	let window = window.max(PREAMBLE_SIZE);
	let mut buffer = fetch_with_timeout(reader, ByteRange::new(0, window), timeout).await?;
	ensure!(
		buffer.len() >= PREAMBLE_SIZE,
		GeoStreamError::InvalidFormat(format!("file is only {} bytes long", buffer.len()))
	);

	let header_end = PREAMBLE_SIZE + Header::read_preamble(buffer.as_slice())?;
	extend_to(reader, &mut buffer, header_end, timeout, "header").await?;
	let header = Header::from_bytes(buffer.range(PREAMBLE_SIZE as usize..header_end as usize))?;

	if header.index_node_size == 0 {
		bail!(GeoStreamError::InvalidFormat(
			"dataset has no spatial index (node size 0)".to_string()
		));
	}
	let layout = IndexLayout::new(header.features_count, header.index_node_size)?;
	let index_end = header_end
		.checked_add(layout.total_bytes())
		.ok_or_else(|| GeoStreamError::InvalidFormat("index size overflows".to_string()))?;
	extend_to(reader, &mut buffer, index_end, timeout, "index").await?;

	let index = PackedRTree::from_blob(buffer.slice(header_end as usize..index_end as usize), layout)?;
	Ok((header, index, index_end))
}

/// Fetches the bytes missing between the end of `buffer` and `end`.
async fn extend_to(reader: &DataReader, buffer: &mut Blob, end: u64, timeout: Duration, what: &str) -> Result<()> {
	if buffer.len() >= end {
		return Ok(());
	}
	log::trace!("header window too small, fetching the rest of the {what}");
	let rest = fetch_with_timeout(reader, ByteRange::new(buffer.len(), end), timeout).await?;
	buffer.extend_from_slice(rest.as_slice());
	ensure!(
		buffer.len() >= end,
		GeoStreamError::InvalidFormat(format!(
			"file ends at byte {} inside the {what}, which ends at {end}",
			buffer.len()
		))
	);
	Ok(())
}

/// Cuts a contiguous run of size-prefixed features into single buffers.
struct FeatureWalker {
	blob: Blob,
	base: u64,
	position: u64,
	remaining: u64,
	failed: bool,
}

impl FeatureWalker {
	fn new(blob: Blob, base: u64, count: u64) -> FeatureWalker {
		FeatureWalker {
			blob,
			base,
			position: 0,
			remaining: count,
			failed: false,
		}
	}

	fn cut(&mut self) -> Result<(Blob, u64)> {
		let offset = self.base + self.position;
		let available = self.blob.len() - self.position;
		ensure!(
			available >= SIZE_PREFIX_LENGTH,
			GeoStreamError::InvalidFormat(format!(
				"feature data ends at {offset} with {} features missing",
				self.remaining
			))
		);
		let start = self.position as usize;
		let length = read_size_prefix(self.blob.range(start..start + SIZE_PREFIX_LENGTH as usize))? + SIZE_PREFIX_LENGTH;
		ensure!(
			length <= available,
			GeoStreamError::InvalidFormat(format!(
				"feature at offset {offset} needs {length} bytes, only {available} left"
			))
		);
		self.position += length;
		Ok((self.blob.slice(start..start + length as usize), offset))
	}
}

impl Iterator for FeatureWalker {
	type Item = Result<(Blob, u64)>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed || self.remaining == 0 {
			return None;
		}
		let item = self.cut();
		self.remaining -= 1;
		self.failed = item.is_err();
		Some(item)
	}
}
