//! An in-memory [`DataReaderTrait`] implementation, used for tests and for datasets that are
//! already loaded.

use super::DataReaderTrait;
use crate::{Blob, ByteRange};
use anyhow::Result;
use async_trait::async_trait;

/// Serves byte ranges from a [`Blob`] held in memory.
#[derive(Debug)]
pub struct DataReaderBlob {
	name: String,
	blob: Blob,
}

impl DataReaderBlob {
	pub fn new(name: &str, blob: Blob) -> DataReaderBlob {
		DataReaderBlob {
			name: name.to_owned(),
			blob,
		}
	}

	pub fn from_vec(name: &str, data: Vec<u8>) -> DataReaderBlob {
		DataReaderBlob::new(name, Blob::from(data))
	}
}

#[async_trait]
impl DataReaderTrait for DataReaderBlob {
	async fn read_range(&self, range: &ByteRange) -> Result<Blob> {
		let range = range.resolve(self.blob.len());
		Ok(self.blob.slice(range.as_range_usize()))
	}

	fn size(&self) -> Option<u64> {
		Some(self.blob.len())
	}

	fn get_name(&self) -> &str {
		&self.name
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(ByteRange::new(0, 3), b"abc".as_slice())]
	#[case(ByteRange::new(3, 10), b"def".as_slice())]
	#[case(ByteRange::open(2), b"cdef".as_slice())]
	#[case(ByteRange::new(8, 12), b"".as_slice())]
	#[tokio::test]
	async fn read_range(#[case] range: ByteRange, #[case] expected: &[u8]) -> Result<()> {
		let reader = DataReaderBlob::new("memory", Blob::from("abcdef"));
		assert_eq!(reader.read_range(&range).await?.as_slice(), expected);
		Ok(())
	}

	#[test]
	fn size_and_name() {
		let reader = DataReaderBlob::from_vec("memory", vec![0; 42]);
		assert_eq!(reader.size(), Some(42));
		assert_eq!(reader.get_name(), "memory");
	}
}
