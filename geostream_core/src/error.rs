//! The error taxonomy of the geostream crates.
//!
//! Functions return [`anyhow::Result`]; whenever an error belongs to one of the classes below it
//! is created as a [`GeoStreamError`] so callers can classify it, even through added context:
//!
//! ```rust
//! use geostream_core::GeoStreamError;
//! use anyhow::Context;
//!
//! let err = Err::<(), _>(GeoStreamError::InvalidFormat("bad magic".into()))
//! 	.context("opening 'states.gsb'")
//! 	.unwrap_err();
//! assert!(matches!(GeoStreamError::classify(&err), Some(GeoStreamError::InvalidFormat(_))));
//! ```

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GeoStreamError {
	/// The bytes do not follow the binary layout (magic mismatch, missing index, truncated data).
	#[error("invalid format: {0}")]
	InvalidFormat(String),

	/// A feature's size prefix disagrees with the length the index planned for it.
	#[error("feature at offset {offset}: size prefix says {actual} bytes, expected {expected}")]
	FeatureSizeMismatch { offset: u64, expected: u64, actual: u64 },

	/// The transport failed or timed out. Shared by every waiter of the same request.
	#[error("fetch failed: {0}")]
	FetchFailure(String),

	/// The caller asked for something that cannot work with the given options.
	#[error("misconfiguration: {0}")]
	Misconfiguration(String),
}

impl GeoStreamError {
	/// Finds the `GeoStreamError` inside an `anyhow::Error`, looking through context layers.
	pub fn classify(err: &anyhow::Error) -> Option<&GeoStreamError> {
		err.chain().find_map(|cause| cause.downcast_ref::<GeoStreamError>())
	}

	/// Wraps any error as a [`GeoStreamError::FetchFailure`], keeping the whole context chain.
	pub fn fetch_failure(err: &anyhow::Error) -> GeoStreamError {
		GeoStreamError::FetchFailure(format!("{err:#}"))
	}
}
