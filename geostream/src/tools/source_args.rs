use anyhow::Result;
use clap::Args;
use geostream_core::{ByteSize, SourceConfig};
use geostream_source::SourceOptions;
use std::path::PathBuf;

/// Options shared by every command that opens a dataset.
#[derive(Args, Debug)]
pub struct SourceArgs {
	/// dataset to open: a local path or an http(s) URL
	#[arg(required = true)]
	pub source: String,

	/// YAML file with source options; command line options override it
	#[arg(long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// byte budget of the page cache, e.g. "16MB"
	#[arg(long, value_name = "SIZE")]
	pub cache_size: Option<ByteSize>,

	/// size of a cached page, e.g. "5MB"
	#[arg(long, value_name = "SIZE")]
	pub page_size: Option<ByteSize>,

	/// length of the first request when opening the dataset, e.g. "32KB"
	#[arg(long, value_name = "SIZE")]
	pub header_size: Option<ByteSize>,

	/// largest gap between features that are still fetched in one request, e.g. "500KB"
	#[arg(long, value_name = "SIZE")]
	pub overfetch: Option<ByteSize>,

	/// timeout of a single fetch in seconds
	#[arg(long, value_name = "SECONDS")]
	pub timeout_secs: Option<u64>,

	/// check every feature's size prefix against the index
	#[arg(long)]
	pub validate: bool,
}

impl SourceArgs {
	pub fn to_config(&self) -> Result<SourceConfig> {
		let mut config = match &self.config {
			Some(path) => SourceConfig::from_path(path)?,
			None => SourceConfig::default(),
		};
		config.merge(&SourceConfig {
			max_cache_size: self.cache_size,
			page_size: self.page_size,
			initial_header_request_length: self.header_size,
			overfetch_bytes: self.overfetch,
			fetch_timeout_secs: self.timeout_secs,
			validate: self.validate.then_some(true),
		});
		Ok(config)
	}

	pub fn to_options(&self) -> Result<SourceOptions> {
		let config = self.to_config()?;
		log::debug!("source options: {config:?}");
		Ok(SourceOptions::from(&config))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;

	#[derive(Parser, Debug)]
	struct TestCli {
		#[command(flatten)]
		source: SourceArgs,
	}

	fn parse(args: &[&str]) -> Result<SourceArgs> {
		Ok(TestCli::try_parse_from(args)?.source)
	}

	#[test]
	fn sizes_from_the_command_line() -> Result<()> {
		let args = parse(&["test", "data.gsb", "--cache-size", "1MB", "--page-size", "64KB", "--validate"])?;
		let options = args.to_options()?;
		assert_eq!(options.max_cache_size, Some(1024 * 1024));
		assert_eq!(options.page_size, Some(64 * 1024));
		assert_eq!(options.validate, Some(true));
		assert_eq!(options.overfetch_bytes, None);
		Ok(())
	}

	#[test]
	fn invalid_size_is_rejected() {
		assert!(parse(&["test", "data.gsb", "--page-size", "lots"]).is_err());
	}

	#[test]
	fn command_line_overrides_config_file() -> Result<()> {
		let dir = assert_fs::TempDir::new()?;
		let path = dir.path().join("config.yaml");
		std::fs::write(&path, "page_size: 1MB\noverfetch_bytes: 100KB\nfetch_timeout_secs: 3\n")?;

		let args = parse(&[
			"test",
			"data.gsb",
			"--config",
			path.to_str().unwrap(),
			"--page-size",
			"2MB",
		])?;
		let options = args.to_options()?;
		assert_eq!(options.page_size, Some(2 * 1024 * 1024));
		assert_eq!(options.overfetch_bytes, Some(100 * 1024));
		assert_eq!(options.get_fetch_timeout(), std::time::Duration::from_secs(3));
		assert_eq!(options.validate, None);
		Ok(())
	}

	#[test]
	fn missing_config_file() {
		let args = parse(&["test", "data.gsb", "--config", "/does/not/exist.yaml"]).unwrap();
		let err = args.to_options().unwrap_err();
		assert!(format!("{err:#}").contains("failed to open config file"));
	}
}
