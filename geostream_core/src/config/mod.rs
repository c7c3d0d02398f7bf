//! YAML configuration for opening sources.
//!
//! Every key is optional; missing keys fall back to the engine defaults. Sizes may be written as
//! plain byte counts or as size strings (`"5MB"`, `"512 KB"`), which are parsed here and nowhere
//! else.
//!
//! ```rust
//! use geostream_core::{ByteSize, SourceConfig};
//!
//! let config = SourceConfig::from_string("page_size: 1MB\nvalidate: true\n").unwrap();
//! assert_eq!(config.page_size, Some(ByteSize::mb(1)));
//! assert_eq!(config.validate, Some(true));
//! assert_eq!(config.max_cache_size, None);
//! ```

use crate::ByteSize;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
	fs::File,
	io::{BufReader, Read},
	path::Path,
	time::Duration,
};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
	/// Byte budget of the page cache of each source.
	pub max_cache_size: Option<ByteSize>,

	/// Size of one cached page of the feature-data section.
	pub page_size: Option<ByteSize>,

	/// Size of the first request made when opening a source.
	pub initial_header_request_length: Option<ByteSize>,

	/// Largest gap between two features that still merges them into one request.
	pub overfetch_bytes: Option<ByteSize>,

	/// Timeout of a single network fetch, in seconds.
	pub fetch_timeout_secs: Option<u64>,

	/// Check every feature's size prefix against the index.
	pub validate: Option<bool>,
}

impl SourceConfig {
	pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
		Ok(serde_yaml_ng::from_reader(reader)?)
	}

	pub fn from_string(text: &str) -> Result<Self> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	pub fn from_path(path: &Path) -> Result<Self> {
		let file = File::open(path).with_context(|| format!("failed to open config file {path:?}"))?;
		SourceConfig::from_reader(BufReader::new(file)).with_context(|| format!("failed to parse config file {path:?}"))
	}

	/// Overwrites every key that is set in `other`.
	pub fn merge(&mut self, other: &SourceConfig) {
		fn take<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
			if value.is_some() {
				target.clone_from(value);
			}
		}
		take(&mut self.max_cache_size, &other.max_cache_size);
		take(&mut self.page_size, &other.page_size);
		take(&mut self.initial_header_request_length, &other.initial_header_request_length);
		take(&mut self.overfetch_bytes, &other.overfetch_bytes);
		take(&mut self.fetch_timeout_secs, &other.fetch_timeout_secs);
		take(&mut self.validate, &other.validate);
	}

	pub fn fetch_timeout(&self) -> Option<Duration> {
		self.fetch_timeout_secs.map(Duration::from_secs)
	}
}
