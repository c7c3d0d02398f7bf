//! This module defines [`DataReaderTrait`], the byte-range fetch capability, and the shared
//! [`DataReader`] handle.
//!
//! A reader answers `read_range` for a [`ByteRange`]. An open-ended range reads to the end of
//! the resource, and a range reaching past the end returns only the bytes that exist. Readers do
//! not retry; any retry or backoff policy belongs to the reader a caller supplies.
//!
//! # Examples
//!
//! ```rust
//! use geostream_core::{io::{DataReader, DataReaderTrait}, Blob, ByteRange};
//! use anyhow::Result;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct Zeros;
//!
//! #[async_trait]
//! impl DataReaderTrait for Zeros {
//! 	async fn read_range(&self, range: &ByteRange) -> Result<Blob> {
//! 		let length = range.length().unwrap_or(16);
//! 		Ok(Blob::new_sized(length as usize))
//! 	}
//!
//! 	fn get_name(&self) -> &str {
//! 		"zeros"
//! 	}
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//! 	let reader: DataReader = Arc::new(Zeros);
//! 	assert_eq!(reader.read_range(&ByteRange::new(10, 14)).await?.len(), 4);
//! 	assert_eq!(reader.size(), None);
//! 	Ok(())
//! }
//! ```

use crate::{Blob, ByteRange};
use anyhow::Result;
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

/// Shared handle to a reader. Readers are used from spawned fetch tasks, hence `Arc`.
pub type DataReader = Arc<dyn DataReaderTrait>;

/// A source of byte ranges.
#[async_trait]
pub trait DataReaderTrait: Debug + Send + Sync {
	/// Reads `range`. Open-ended ranges read to the end of the resource; bytes past the end are
	/// silently left out.
	async fn read_range(&self, range: &ByteRange) -> Result<Blob>;

	/// Total length of the resource, if known. Readers may learn it only after a first request.
	fn size(&self) -> Option<u64> {
		None
	}

	/// A name for log and error messages, usually the path or URL.
	fn get_name(&self) -> &str;
}
