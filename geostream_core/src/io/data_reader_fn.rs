//! [`DataReaderFn`] adapts a caller supplied async closure into a reader. This is how callers
//! bring their own transport, authentication or retry policy.
//!
//! ```rust
//! use geostream_core::{io::{DataReaderFn, DataReaderTrait}, Blob, ByteRange};
//! use anyhow::Result;
//! use futures::FutureExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//! 	let reader = DataReaderFn::new("counter", |range: ByteRange| {
//! 		async move { Ok(Blob::from(range.to_string().as_str())) }.boxed()
//! 	});
//! 	assert_eq!(reader.read_range(&ByteRange::new(1, 5)).await?.as_slice(), b"1-5");
//! 	Ok(())
//! }
//! ```

use super::DataReaderTrait;
use crate::{Blob, ByteRange};
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;

type RangeFn = dyn Fn(ByteRange) -> BoxFuture<'static, Result<Blob>> + Send + Sync;

/// A reader backed by a closure returning a boxed future per requested range.
pub struct DataReaderFn {
	name: String,
	size: Option<u64>,
	read: Box<RangeFn>,
}

impl DataReaderFn {
	pub fn new<F>(name: &str, read: F) -> DataReaderFn
	where
		F: Fn(ByteRange) -> BoxFuture<'static, Result<Blob>> + Send + Sync + 'static,
	{
		DataReaderFn {
			name: name.to_owned(),
			size: None,
			read: Box::new(read),
		}
	}

	/// Declares the total length of the resource.
	#[must_use]
	pub fn with_size(mut self, size: u64) -> DataReaderFn {
		self.size = Some(size);
		self
	}
}

impl fmt::Debug for DataReaderFn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DataReaderFn")
			.field("name", &self.name)
			.field("size", &self.size)
			.finish()
	}
}

#[async_trait]
impl DataReaderTrait for DataReaderFn {
	async fn read_range(&self, range: &ByteRange) -> Result<Blob> {
		(self.read)(*range).await
	}

	fn size(&self) -> Option<u64> {
		self.size
	}

	fn get_name(&self) -> &str {
		&self.name
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::bail;
	use futures::FutureExt;

	#[tokio::test]
	async fn forwards_ranges() -> Result<()> {
		let reader = DataReaderFn::new("fn", |range: ByteRange| {
			async move { Ok(Blob::new_sized(range.length().unwrap_or(3) as usize)) }.boxed()
		})
		.with_size(99);

		assert_eq!(reader.read_range(&ByteRange::new(10, 17)).await?.len(), 7);
		assert_eq!(reader.read_range(&ByteRange::open(10)).await?.len(), 3);
		assert_eq!(reader.size(), Some(99));
		assert_eq!(format!("{reader:?}"), "DataReaderFn { name: \"fn\", size: Some(99) }");
		Ok(())
	}

	#[tokio::test]
	async fn forwards_errors() {
		let reader = DataReaderFn::new("failing", |_| async { bail!("connection reset") }.boxed());
		let err = reader.read_range(&ByteRange::new(0, 1)).await.unwrap_err();
		assert_eq!(err.to_string(), "connection reset");
	}
}
