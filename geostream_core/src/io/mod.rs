//! Data readers: the byte-range fetch capability the engine is built on, and the value reader
//! and writer for the little-endian binary format.
//!
//! Every transport implements [`DataReaderTrait`]. The crate ships readers for local files,
//! HTTP(S) servers, in-memory buffers and caller supplied closures; [`get_reader`] picks one
//! from a dataset key.
//!
//! ```rust
//! use geostream_core::{io::*, Blob, ByteRange};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//! 	let reader = DataReaderBlob::new("memory", Blob::from("hello world"));
//! 	assert_eq!(reader.read_range(&ByteRange::new(6, 11)).await?.as_slice(), b"world");
//! 	assert_eq!(reader.read_range(&ByteRange::open(6)).await?.as_slice(), b"world");
//! 	Ok(())
//! }
//! ```

mod data_reader;
mod data_reader_blob;
mod data_reader_file;
mod data_reader_fn;
mod data_reader_http;
mod value_reader;
mod value_writer;

pub use data_reader::*;
pub use data_reader_blob::*;
pub use data_reader_file::*;
pub use data_reader_fn::*;
pub use data_reader_http::*;
pub use value_reader::*;
pub use value_writer::*;

use crate::GeoStreamError;
use anyhow::{Result, bail};
use reqwest::Url;
use std::{env::current_dir, path::PathBuf, sync::Arc};

/// Opens a reader for a dataset key: `http://` and `https://` URLs are read over HTTP,
/// `file://` URLs and plain paths from the local file system.
pub fn get_reader(key: &str) -> Result<DataReader> {
	if let Some((scheme, _)) = key.split_once("://") {
		return match scheme.to_ascii_lowercase().as_str() {
			"http" | "https" => Ok(Arc::new(DataReaderHttp::from_url(Url::parse(key)?)?)),
			"file" => {
				let url = Url::parse(key)?;
				let path = url
					.to_file_path()
					.map_err(|()| GeoStreamError::Misconfiguration(format!("'{key}' is not a valid file URL")))?;
				Ok(Arc::new(DataReaderFile::open(&path)?))
			}
			other => bail!(GeoStreamError::Misconfiguration(format!(
				"no reader for scheme '{other}' in '{key}', pass a custom reader instead"
			))),
		};
	}

	let mut path = PathBuf::from(key);
	if path.is_relative() {
		path = current_dir()?.join(path);
	}
	Ok(Arc::new(DataReaderFile::open(&path)?))
}
