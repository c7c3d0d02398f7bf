//! Options for opening a [`Source`](super::Source).
//!
//! Every option is optional. Unset options fall back to the engine defaults when read, and
//! [`SourceOptions::merged_over`] layers caller options over a [`SourceCache`](super::SourceCache)'s
//! defaults.

use crate::fetch::DEFAULT_OVERFETCH_BYTES;
use geostream_core::{SourceConfig, io::DataReader};
use std::{fmt, time::Duration};

pub const DEFAULT_MAX_CACHE_SIZE: u64 = 16 * 1024 * 1024;
pub const DEFAULT_PAGE_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_INITIAL_HEADER_REQUEST_LENGTH: u64 = 32 * 1024;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Default)]
pub struct SourceOptions {
	/// Reads the dataset instead of a reader derived from the key.
	pub reader: Option<DataReader>,
	pub max_cache_size: Option<u64>,
	pub page_size: Option<u64>,
	pub initial_header_request_length: Option<u64>,
	pub overfetch_bytes: Option<u64>,
	pub fetch_timeout: Option<Duration>,
	pub validate: Option<bool>,
}

impl SourceOptions {
	#[must_use]
	pub fn new() -> SourceOptions {
		SourceOptions::default()
	}

	#[must_use]
	pub fn with_reader(mut self, reader: DataReader) -> SourceOptions {
		self.reader = Some(reader);
		self
	}

	#[must_use]
	pub fn with_max_cache_size(mut self, bytes: u64) -> SourceOptions {
		self.max_cache_size = Some(bytes);
		self
	}

	#[must_use]
	pub fn with_page_size(mut self, bytes: u64) -> SourceOptions {
		self.page_size = Some(bytes);
		self
	}

	#[must_use]
	pub fn with_initial_header_request_length(mut self, bytes: u64) -> SourceOptions {
		self.initial_header_request_length = Some(bytes);
		self
	}

	#[must_use]
	pub fn with_overfetch_bytes(mut self, bytes: u64) -> SourceOptions {
		self.overfetch_bytes = Some(bytes);
		self
	}

	#[must_use]
	pub fn with_fetch_timeout(mut self, timeout: Duration) -> SourceOptions {
		self.fetch_timeout = Some(timeout);
		self
	}

	#[must_use]
	pub fn with_validate(mut self, validate: bool) -> SourceOptions {
		self.validate = Some(validate);
		self
	}

	pub fn get_max_cache_size(&self) -> u64 {
		self.max_cache_size.unwrap_or(DEFAULT_MAX_CACHE_SIZE)
	}

	pub fn get_page_size(&self) -> u64 {
		self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
	}

	pub fn get_initial_header_request_length(&self) -> u64 {
		self
			.initial_header_request_length
			.unwrap_or(DEFAULT_INITIAL_HEADER_REQUEST_LENGTH)
	}

	pub fn get_overfetch_bytes(&self) -> u64 {
		self.overfetch_bytes.unwrap_or(DEFAULT_OVERFETCH_BYTES)
	}

	pub fn get_fetch_timeout(&self) -> Duration {
		self.fetch_timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT)
	}

	pub fn get_validate(&self) -> bool {
		self.validate.unwrap_or(false)
	}

	/// Returns these options with every unset option taken from `defaults`.
	#[must_use]
	pub fn merged_over(&self, defaults: &SourceOptions) -> SourceOptions {
		SourceOptions {
			reader: self.reader.clone().or_else(|| defaults.reader.clone()),
			max_cache_size: self.max_cache_size.or(defaults.max_cache_size),
			page_size: self.page_size.or(defaults.page_size),
			initial_header_request_length: self
				.initial_header_request_length
				.or(defaults.initial_header_request_length),
			overfetch_bytes: self.overfetch_bytes.or(defaults.overfetch_bytes),
			fetch_timeout: self.fetch_timeout.or(defaults.fetch_timeout),
			validate: self.validate.or(defaults.validate),
		}
	}
}

impl From<&SourceConfig> for SourceOptions {
	fn from(config: &SourceConfig) -> Self {
		SourceOptions {
			reader: None,
			max_cache_size: config.max_cache_size.map(u64::from),
			page_size: config.page_size.map(u64::from),
			initial_header_request_length: config.initial_header_request_length.map(u64::from),
			overfetch_bytes: config.overfetch_bytes.map(u64::from),
			fetch_timeout: config.fetch_timeout(),
			validate: config.validate,
		}
	}
}

impl fmt::Debug for SourceOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SourceOptions")
			.field("reader", &self.reader.as_ref().map(|reader| reader.get_name()))
			.field("max_cache_size", &self.max_cache_size)
			.field("page_size", &self.page_size)
			.field("initial_header_request_length", &self.initial_header_request_length)
			.field("overfetch_bytes", &self.overfetch_bytes)
			.field("fetch_timeout", &self.fetch_timeout)
			.field("validate", &self.validate)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use geostream_core::{Blob, ByteSize, io::DataReaderBlob};
	use std::sync::Arc;

	#[test]
	fn defaults() {
		let options = SourceOptions::new();
		assert_eq!(options.get_max_cache_size(), 16 * 1024 * 1024);
		assert_eq!(options.get_page_size(), 5 * 1024 * 1024);
		assert_eq!(options.get_initial_header_request_length(), 32 * 1024);
		assert_eq!(options.get_overfetch_bytes(), 500 * 1024);
		assert_eq!(options.get_fetch_timeout(), Duration::from_secs(30));
		assert!(!options.get_validate());
	}

	#[test]
	fn caller_options_win() {
		let defaults = SourceOptions::new().with_page_size(1024).with_validate(true);
		let options = SourceOptions::new().with_page_size(2048).merged_over(&defaults);
		assert_eq!(options.get_page_size(), 2048);
		assert!(options.get_validate());
		assert_eq!(options.get_max_cache_size(), DEFAULT_MAX_CACHE_SIZE);
	}

	#[test]
	fn reader_is_inherited() {
		let reader = Arc::new(DataReaderBlob::new("memory", Blob::from("abc")));
		let defaults = SourceOptions::new().with_reader(reader);
		let options = SourceOptions::new().merged_over(&defaults);
		assert_eq!(options.reader.map(|r| r.get_name().to_string()), Some("memory".to_string()));
	}

	#[test]
	fn from_config() {
		let config = SourceConfig {
			page_size: Some(ByteSize::kb(64)),
			fetch_timeout_secs: Some(5),
			..SourceConfig::default()
		};
		let options = SourceOptions::from(&config);
		assert_eq!(options.page_size, Some(65_536));
		assert_eq!(options.fetch_timeout, Some(Duration::from_secs(5)));
		assert_eq!(options.max_cache_size, None);
	}

	#[test]
	fn debug_shows_reader_name() {
		let reader = Arc::new(DataReaderBlob::new("memory", Blob::from("abc")));
		let text = format!("{:?}", SourceOptions::new().with_reader(reader).with_page_size(1));
		assert!(text.contains("\"memory\""));
		assert!(text.contains("page_size: Some(1)"));
	}
}
