//! This module provides [`DataReaderHttp`], a reader for datasets served over HTTP(S) with
//! `Range` request support.
//!
//! Bounded ranges are requested as `bytes=<start>-<end-1>`, open-ended ones as `bytes=<start>-`.
//! The total length of the resource is learned from the first `Content-Range` header seen and
//! reported by [`DataReaderTrait::size`] from then on. A `416 Range Not Satisfiable` answer is
//! an empty read. Requests are not retried.
//!
//! # Examples
//!
//! ```rust,no_run
//! use geostream_core::{io::{DataReaderHttp, DataReaderTrait}, ByteRange};
//! use anyhow::Result;
//! use reqwest::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//! 	let reader = DataReaderHttp::from_url(Url::parse("https://example.org/states.gsb")?)?;
//! 	let head = reader.read_range(&ByteRange::new(0, 32 * 1024)).await?;
//! 	println!("read {} bytes of {:?}", head.len(), reader.size());
//! 	Ok(())
//! }
//! ```

use super::DataReaderTrait;
use crate::{Blob, ByteRange};
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use geostream_derive::context;
use regex::{Regex, RegexBuilder};
use reqwest::{Client, StatusCode, Url, header};
use std::{
	sync::{LazyLock, OnceLock},
	time::Duration,
};

/// Reads byte ranges from an HTTP(S) endpoint.
#[derive(Debug)]
pub struct DataReaderHttp {
	client: Client,
	name: String,
	url: Url,
	size: OnceLock<u64>,
}

impl DataReaderHttp {
	/// Creates a reader for an `http` or `https` URL.
	pub fn from_url(url: Url) -> Result<DataReaderHttp> {
		match url.scheme() {
			"http" | "https" => (),
			other => bail!("unsupported URL scheme '{other}' in '{url}', expected 'http' or 'https'"),
		}

		let client = Client::builder().tcp_keepalive(Duration::from_secs(600)).build()?;

		Ok(DataReaderHttp {
			client,
			name: url.to_string(),
			url,
			size: OnceLock::new(),
		})
	}

	fn learn_size(&self, size: u64) {
		if self.size.set(size).is_ok() {
			log::trace!("'{}' is {size} bytes long", self.name);
		}
	}
}

/// Parsed `Content-Range` header: `bytes <start>-<end>/<total>` or `bytes */<total>`.
#[derive(Debug, PartialEq)]
struct ContentRange {
	range: Option<(u64, u64)>,
	total: Option<u64>,
}

fn parse_content_range(value: &str) -> Result<ContentRange> {
	static RE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
		RegexBuilder::new(r"^bytes\s+(?:(\d+)-(\d+)|\*)/(\d+|\*)$")
			.case_insensitive(true)
			.build()
			.unwrap()
	});

	let caps = RE_RANGE
		.captures(value.trim())
		.ok_or_else(|| anyhow!("unexpected Content-Range format: '{value}', expected 'bytes <start>-<end>/<total>'"))?;

	let range = match (caps.get(1), caps.get(2)) {
		(Some(start), Some(end)) => Some((start.as_str().parse()?, end.as_str().parse()?)),
		_ => None,
	};
	let total = match &caps[3] {
		"*" => None,
		total => Some(total.parse()?),
	};
	Ok(ContentRange { range, total })
}

fn range_header(range: &ByteRange) -> Option<String> {
	match range.end {
		Some(end) if end <= range.start => None,
		Some(end) => Some(format!("bytes={}-{}", range.start, end - 1)),
		None => Some(format!("bytes={}-", range.start)),
	}
}

#[async_trait]
impl DataReaderTrait for DataReaderHttp {
	#[context("reading range {} from '{}'", range, self.url)]
	async fn read_range(&self, range: &ByteRange) -> Result<Blob> {
		let Some(request_range) = range_header(range) else {
			return Ok(Blob::new_empty());
		};

		log::trace!("GET '{}' {request_range}", self.url);
		let response = self
			.client
			.get(self.url.clone())
			.header(header::RANGE, request_range)
			.send()
			.await?;

		let content_range = match response.headers().get(header::CONTENT_RANGE) {
			Some(value) => Some(parse_content_range(value.to_str()?)?),
			None => None,
		};
		if let Some(total) = content_range.as_ref().and_then(|c| c.total) {
			self.learn_size(total);
		}

		match response.status() {
			StatusCode::PARTIAL_CONTENT => {
				let content_range = content_range.ok_or_else(|| anyhow!("response is missing Content-Range header"))?;
				if let Some((start, _)) = content_range.range
					&& start != range.start
				{
					bail!("Content-Range start mismatch: expected {}, got {start}", range.start);
				}

				let bytes = response.bytes().await?;
				let mut blob = Blob::from(&*bytes);
				if let Some(length) = range.length()
					&& blob.len() > length
				{
					blob = blob.slice(0..length as usize);
				}
				Ok(blob)
			}
			StatusCode::OK if range.start == 0 => {
				// server ignored the Range header and sent the whole resource
				let bytes = response.bytes().await?;
				self.learn_size(bytes.len() as u64);
				let end = range.end.map_or(bytes.len(), |end| (end as usize).min(bytes.len()));
				Ok(Blob::from(&bytes[..end]))
			}
			StatusCode::RANGE_NOT_SATISFIABLE => Ok(Blob::new_empty()),
			status => bail!("expected HTTP 206 (Partial Content), got {status}"),
		}
	}

	fn size(&self) -> Option<u64> {
		self.size.get().copied()
	}

	fn get_name(&self) -> &str {
		&self.name
	}
}
