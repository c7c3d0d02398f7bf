//! Turns index hits into a small set of range requests.
//!
//! Hits close to each other are merged into one request, trading a little overfetch for fewer
//! round trips. A request never grows beyond [`MAX_REQUEST_BYTES`] or
//! [`MAX_FEATURES_PER_REQUEST`] features.

use crate::format::SearchHit;
use geostream_core::ByteRange;

pub const DEFAULT_OVERFETCH_BYTES: u64 = 500 * 1024;
pub const MAX_REQUEST_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_FEATURES_PER_REQUEST: usize = 100;

/// One network request and the features it contains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPlanRequest {
	/// Absolute byte range. Open-ended if it ends with the last feature of the file.
	pub range: ByteRange,
	/// Feature offsets relative to the start of `range`, with their lengths.
	pub offsets: Vec<(u64, Option<u64>)>,
}

impl QueryPlanRequest {
	fn new(start: u64, length: Option<u64>) -> Self {
		QueryPlanRequest {
			range: ByteRange {
				start,
				end: length.map(|length| start + length),
			},
			offsets: vec![(0, length)],
		}
	}

	fn push(&mut self, start: u64, length: Option<u64>) {
		self.offsets.push((start - self.range.start, length));
		self.range.end = match (self.range.end, length) {
			(Some(end), Some(length)) => Some(end.max(start + length)),
			_ => None,
		};
	}

	pub fn len(&self) -> usize {
		self.offsets.len()
	}

	pub fn is_empty(&self) -> bool {
		self.offsets.is_empty()
	}
}

/// Plans the requests for `hits` (offsets relative to the feature data at
/// `feature_data_offset`). Hits are processed in ascending offset order; the plan is sorted the
/// same way.
pub fn plan_requests(hits: &[SearchHit], feature_data_offset: u64, overfetch_bytes: u64) -> Vec<QueryPlanRequest> {
	let mut hits = hits.to_vec();
	hits.sort_by_key(|hit| hit.offset);

	let mut iter = hits.into_iter();
	let Some(first) = iter.next() else {
		return Vec::new();
	};

	let mut plan = Vec::new();
	let mut request = QueryPlanRequest::new(feature_data_offset + first.offset, first.length);

	for hit in iter {
		let start = feature_data_offset + hit.offset;
		let merge = match request.range.end {
			Some(end) => {
				let gap = start.saturating_sub(end);
				let merged_end = hit.length.map_or(start, |length| start + length);
				gap < overfetch_bytes
					&& merged_end - request.range.start < MAX_REQUEST_BYTES
					&& request.len() < MAX_FEATURES_PER_REQUEST
			}
			// an open-ended request already reaches the end of the file
			None => false,
		};

		if merge {
			request.push(start, hit.length);
		} else {
			plan.push(request);
			request = QueryPlanRequest::new(start, hit.length);
		}
	}
	plan.push(request);

	log::trace!("planned {} requests", plan.len());
	plan
}
