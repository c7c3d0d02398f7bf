//! This module provides the [`ByteRange`] struct, a half-open range of bytes inside a resource
//! whose end may be unknown ("read to the end").
//!
//! # Examples
//!
//! ```rust
//! use geostream_core::ByteRange;
//!
//! let range = ByteRange::new(23, 65);
//! assert_eq!(range.length(), Some(42));
//! assert_eq!(range.to_string(), "23-65");
//!
//! let open = ByteRange::open(100);
//! assert_eq!(open.length(), None);
//! assert_eq!(open.resolve(150), ByteRange::new(100, 150));
//! ```

use std::fmt;
use std::ops::Range;

/// A half-open byte range `[start, end)`. An `end` of `None` means "to the end of the resource".
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct ByteRange {
	/// First byte of the range.
	pub start: u64,
	/// One past the last byte, or `None` for an open-ended range.
	pub end: Option<u64>,
}

impl ByteRange {
	/// Creates a bounded range `[start, end)`.
	#[must_use]
	pub fn new(start: u64, end: u64) -> Self {
		Self { start, end: Some(end) }
	}

	/// Creates an open-ended range starting at `start`.
	#[must_use]
	pub fn open(start: u64) -> Self {
		Self { start, end: None }
	}

	/// Returns the number of bytes, or `None` if the range is open-ended.
	#[must_use]
	pub fn length(&self) -> Option<u64> {
		self.end.map(|end| end.saturating_sub(self.start))
	}

	#[must_use]
	pub fn is_open(&self) -> bool {
		self.end.is_none()
	}

	/// Replaces a missing end with `total_length` and clamps a given end to it.
	#[must_use]
	pub fn resolve(&self, total_length: u64) -> ByteRange {
		let end = self.end.map_or(total_length, |end| end.min(total_length));
		ByteRange::new(self.start.min(end), end)
	}

	/// Converts a bounded range into a `Range<usize>`.
	///
	/// # Panics
	///
	/// Panics if the range is open-ended.
	#[must_use]
	pub fn as_range_usize(&self) -> Range<usize> {
		let end = self.end.expect("open-ended ByteRange has no usize range");
		(self.start as usize)..(end as usize)
	}
}

/// `"start-end"`, or `"start-"` when open-ended. Used as the request deduplication key.
impl fmt::Display for ByteRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.end {
			Some(end) => write!(f, "{}-{end}", self.start),
			None => write!(f, "{}-", self.start),
		}
	}
}

impl fmt::Debug for ByteRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ByteRange[{self}]")
	}
}
