//! This module provides the [`Blob`] struct, a thin wrapper around [`Vec<u8>`] used for every
//! chunk of bytes that travels through the readers and caches.
//!
//! # Examples
//!
//! ```rust
//! use geostream_core::Blob;
//!
//! let blob = Blob::from(vec![0, 1, 2, 3, 4, 5, 6, 7]);
//! assert_eq!(blob.len(), 8);
//! assert_eq!(blob.range(2..5), &[2, 3, 4]);
//! assert_eq!(blob.slice(6..8).into_vec(), vec![6, 7]);
//! ```

use std::fmt::Debug;
use std::ops::Range;

/// A simple wrapper around [`Vec<u8>`] with helpers for slicing and concatenation.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
	/// Creates an empty `Blob`.
	#[must_use]
	pub fn new_empty() -> Blob {
		Blob(Vec::new())
	}

	/// Creates a `Blob` of `length` zero bytes.
	///
	/// ```rust
	/// use geostream_core::Blob;
	///
	/// let blob = Blob::new_sized(3);
	/// assert_eq!(blob.as_slice(), &[0, 0, 0]);
	/// ```
	#[must_use]
	pub fn new_sized(length: usize) -> Blob {
		Blob(vec![0u8; length])
	}

	/// Creates an empty `Blob` that can grow to `capacity` bytes without reallocating.
	#[must_use]
	pub fn with_capacity(capacity: usize) -> Blob {
		Blob(Vec::with_capacity(capacity))
	}

	/// Returns the bytes in `range`.
	///
	/// # Panics
	///
	/// Panics if the range is out of bounds.
	#[must_use]
	pub fn range(&self, range: Range<usize>) -> &[u8] {
		&self.0[range]
	}

	/// Returns a copy of the bytes in `range` as a new `Blob`.
	///
	/// # Panics
	///
	/// Panics if the range is out of bounds.
	#[must_use]
	pub fn slice(&self, range: Range<usize>) -> Blob {
		Blob(self.0[range].to_vec())
	}

	/// Appends `bytes` to the end of this `Blob`.
	pub fn extend_from_slice(&mut self, bytes: &[u8]) {
		self.0.extend_from_slice(bytes);
	}

	#[must_use]
	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	pub fn as_mut_slice(&mut self) -> &mut [u8] {
		&mut self.0
	}

	#[must_use]
	pub fn into_vec(self) -> Vec<u8> {
		self.0
	}

	/// Returns the bytes as space separated hex pairs, e.g. `"67 73 62 01"`.
	#[must_use]
	pub fn as_hex(&self) -> String {
		self.0.iter().map(|byte| format!("{byte:02x}")).collect::<Vec<_>>().join(" ")
	}

	/// Returns the length in bytes.
	#[must_use]
	pub fn len(&self) -> u64 {
		self.0.len() as u64
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<Vec<u8>> for Blob {
	fn from(item: Vec<u8>) -> Self {
		Blob(item)
	}
}

impl From<&[u8]> for Blob {
	fn from(item: &[u8]) -> Self {
		Blob(item.to_vec())
	}
}

impl<const N: usize> From<&[u8; N]> for Blob {
	fn from(item: &[u8; N]) -> Self {
		Blob(item.to_vec())
	}
}

impl From<&str> for Blob {
	fn from(item: &str) -> Self {
		Blob(item.as_bytes().to_vec())
	}
}

impl Debug for Blob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		const PREVIEW: usize = 16;
		let preview = Blob(self.0.iter().take(PREVIEW).copied().collect());
		if self.0.len() > PREVIEW {
			write!(f, "Blob({}): {} ...", self.0.len(), preview.as_hex())
		} else {
			write!(f, "Blob({}): {}", self.0.len(), preview.as_hex())
		}
	}
}
