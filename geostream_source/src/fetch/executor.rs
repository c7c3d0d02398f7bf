//! Runs a query plan: all requests concurrently, features in completion order.

use super::{QueryPlanRequest, RangeCache};
use crate::format::{SIZE_PREFIX_LENGTH, read_size_prefix, validate_size_prefix};
use anyhow::{Result, bail};
use futures::{
	Stream, StreamExt,
	future::ready,
	stream::{self, BoxStream, FuturesUnordered},
};
use geostream_core::{Blob, GeoStreamError};

/// Fetches every request of `plan` concurrently and yields each feature buffer with its absolute
/// offset.
///
/// Features of one response come in byte order; responses interleave in the order their fetches
/// complete. The first error is yielded and ends the stream.
pub fn execute_plan(
	plan: Vec<QueryPlanRequest>,
	cache: RangeCache,
	validate: bool,
) -> BoxStream<'static, Result<(Blob, u64)>> {
	log::debug!("executing {} requests", plan.len());

	let fetches: FuturesUnordered<_> = plan
		.into_iter()
		.map(|request| {
			let cache = cache.clone();
			async move {
				let result = cache.fetch_range(request.range).await;
				(request, result)
			}
		})
		.collect();

	until_first_error(fetches.flat_map(move |(request, result)| {
		let items = match result {
			Ok(blob) => split_response(&request, &blob, validate),
			Err(err) => vec![Err(err)],
		};
		stream::iter(items)
	}))
}

/// Passes items through up to and including the first error.
pub(crate) fn until_first_error<T, S>(stream: S) -> BoxStream<'static, Result<T>>
where
	S: Stream<Item = Result<T>> + Send + 'static,
	T: Send + 'static,
{
	stream
		.scan(false, |failed, item| {
			if *failed {
				return ready(None);
			}
			*failed = item.is_err();
			ready(Some(item))
		})
		.boxed()
}

/// Cuts one response into feature buffers. Stops at the first broken feature.
fn split_response(request: &QueryPlanRequest, blob: &Blob, validate: bool) -> Vec<Result<(Blob, u64)>> {
	let mut features = Vec::with_capacity(request.offsets.len());
	for (relative, length) in &request.offsets {
		let offset = request.range.start + relative;
		let feature = cut_feature(blob, *relative, *length, offset).and_then(|buffer| {
			if validate {
				validate_size_prefix(offset, buffer.as_slice())?;
			}
			Ok((buffer, offset))
		});
		let failed = feature.is_err();
		features.push(feature);
		if failed {
			break;
		}
	}
	features
}

fn cut_feature(blob: &Blob, relative: u64, length: Option<u64>, offset: u64) -> Result<Blob> {
	let available = blob.len().saturating_sub(relative);
	let length = match length {
		Some(length) => length,
		None => {
			if available < SIZE_PREFIX_LENGTH {
				bail!(GeoStreamError::InvalidFormat(format!(
					"feature at offset {offset} is cut off before its size prefix"
				)));
			}
			let start = relative as usize;
			read_size_prefix(blob.range(start..start + SIZE_PREFIX_LENGTH as usize))? + SIZE_PREFIX_LENGTH
		}
	};
	if length > available {
		bail!(GeoStreamError::InvalidFormat(format!(
			"feature at offset {offset} needs {length} bytes, response has {available}"
		)));
	}
	Ok(blob.slice(relative as usize..(relative + length) as usize))
}
