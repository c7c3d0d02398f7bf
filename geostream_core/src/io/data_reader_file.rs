//! This module provides [`DataReaderFile`], a reader for datasets on the local file system.
//!
//! Reads past the end of the file are clamped: a range reaching beyond the last byte returns the
//! bytes that exist, and a range starting beyond it returns an empty blob.
//!
//! # Examples
//!
//! ```rust
//! use geostream_core::{io::{DataReaderFile, DataReaderTrait}, ByteRange};
//! use anyhow::Result;
//! use std::io::Write;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//! 	let mut file = tempfile::NamedTempFile::new()?;
//! 	file.write_all(b"Hello, world!")?;
//!
//! 	let reader = DataReaderFile::open(file.path())?;
//! 	assert_eq!(reader.read_range(&ByteRange::new(7, 12)).await?.as_slice(), b"world");
//! 	assert_eq!(reader.read_range(&ByteRange::new(7, 100)).await?.as_slice(), b"world!");
//! 	Ok(())
//! }
//! ```

use super::DataReaderTrait;
use crate::{Blob, ByteRange};
use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use std::{
	fs::File,
	io::{Read, Seek, SeekFrom},
	path::Path,
};

/// Reads byte ranges from a local file.
#[derive(Debug)]
pub struct DataReaderFile {
	name: String,
	file: File,
	size: u64,
}

impl DataReaderFile {
	/// Opens an existing, absolute file path.
	pub fn open(path: &Path) -> Result<DataReaderFile> {
		ensure!(path.exists(), "file {path:?} does not exist");
		ensure!(path.is_absolute(), "path {path:?} must be absolute");
		ensure!(path.is_file(), "path {path:?} must be a file");

		let path = path.canonicalize()?;
		let file = File::open(&path).with_context(|| format!("failed to open {path:?}"))?;
		let size = file.metadata()?.len();

		Ok(DataReaderFile {
			name: path.to_string_lossy().into_owned(),
			file,
			size,
		})
	}
}

#[async_trait]
impl DataReaderTrait for DataReaderFile {
	async fn read_range(&self, range: &ByteRange) -> Result<Blob> {
		let range = range.resolve(self.size);
		let length = range.length().unwrap_or(0);
		if length == 0 {
			return Ok(Blob::new_empty());
		}

		let mut file = self
			.file
			.try_clone()
			.with_context(|| format!("failed to clone file '{}'", self.name))?;
		file
			.seek(SeekFrom::Start(range.start))
			.with_context(|| format!("failed to seek to offset {} in file '{}'", range.start, self.name))?;

		let mut buffer = Vec::with_capacity(length as usize);
		file
			.take(length)
			.read_to_end(&mut buffer)
			.with_context(|| format!("failed to read range {range} from file '{}'", self.name))?;
		Ok(Blob::from(buffer))
	}

	fn size(&self) -> Option<u64> {
		Some(self.size)
	}

	fn get_name(&self) -> &str {
		&self.name
	}
}
