//! Byte counts that can be written as plain numbers or human readable strings like `"5MB"`.
//!
//! Size strings are only parsed here, at the configuration boundary. Everything behind it works
//! with plain `u64` byte counts.
//!
//! ```rust
//! use geostream_core::ByteSize;
//!
//! assert_eq!("500KB".parse::<ByteSize>().unwrap().as_u64(), 512_000);
//! assert_eq!("5 mb".parse::<ByteSize>().unwrap().as_u64(), 5 * 1024 * 1024);
//! assert_eq!("1.5KB".parse::<ByteSize>().unwrap().as_u64(), 1536);
//! assert_eq!(ByteSize::from(32_768u64).to_string(), "32KB");
//! ```

use crate::GeoStreamError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;
const TB: u64 = 1024 * GB;

/// A number of bytes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(try_from = "RawByteSize", into = "u64")]
pub struct ByteSize(u64);

impl ByteSize {
	#[must_use]
	pub const fn new(bytes: u64) -> Self {
		Self(bytes)
	}

	#[must_use]
	pub const fn kb(value: u64) -> Self {
		Self(value * KB)
	}

	#[must_use]
	pub const fn mb(value: u64) -> Self {
		Self(value * MB)
	}

	#[must_use]
	pub const fn as_u64(self) -> u64 {
		self.0
	}
}

impl From<u64> for ByteSize {
	fn from(bytes: u64) -> Self {
		Self(bytes)
	}
}

impl From<ByteSize> for u64 {
	fn from(size: ByteSize) -> Self {
		size.0
	}
}

impl FromStr for ByteSize {
	type Err = GeoStreamError;

	fn from_str(input: &str) -> Result<Self, Self::Err> {
		let invalid = || {
			GeoStreamError::Misconfiguration(format!(
				"invalid size '{input}', expected a byte count or a value like '500KB', '5MB' or '1GB'"
			))
		};

		let text = input.trim();
		let split = text
			.find(|c: char| !(c.is_ascii_digit() || c == '.'))
			.unwrap_or(text.len());
		let (number, unit) = text.split_at(split);
		if number.is_empty() {
			return Err(invalid());
		}

		let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
			"" | "B" => 1,
			"K" | "KB" => KB,
			"M" | "MB" => MB,
			"G" | "GB" => GB,
			"T" | "TB" => TB,
			_ => return Err(invalid()),
		};

		if let Ok(value) = number.parse::<u64>() {
			return value.checked_mul(multiplier).map(ByteSize).ok_or_else(invalid);
		}

		let value: f64 = number.parse().map_err(|_| invalid())?;
		let bytes = (value * multiplier as f64).floor();
		if !bytes.is_finite() || bytes > u64::MAX as f64 {
			return Err(invalid());
		}
		Ok(ByteSize(bytes as u64))
	}
}

impl fmt::Display for ByteSize {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let bytes = self.0;
		for (unit, name) in [(TB, "TB"), (GB, "GB"), (MB, "MB"), (KB, "KB")] {
			if bytes >= unit && bytes.is_multiple_of(unit) {
				return write!(f, "{}{name}", bytes / unit);
			}
		}
		write!(f, "{bytes}B")
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawByteSize {
	Bytes(u64),
	Text(String),
}

impl TryFrom<RawByteSize> for ByteSize {
	type Error = GeoStreamError;

	fn try_from(raw: RawByteSize) -> Result<Self, Self::Error> {
		match raw {
			RawByteSize::Bytes(bytes) => Ok(ByteSize(bytes)),
			RawByteSize::Text(text) => text.parse(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("0", 0)]
	#[case("1024", 1024)]
	#[case("12B", 12)]
	#[case("1KB", 1024)]
	#[case("1k", 1024)]
	#[case("32KB", 32_768)]
	#[case("500KB", 512_000)]
	#[case(" 5 MB ", 5_242_880)]
	#[case("16mb", 16_777_216)]
	#[case("1GB", 1_073_741_824)]
	#[case("2T", 2_199_023_255_552)]
	#[case("0.5MB", 524_288)]
	fn parses(#[case] input: &str, #[case] bytes: u64) {
		assert_eq!(input.parse::<ByteSize>().unwrap().as_u64(), bytes);
	}

	#[rstest]
	#[case("")]
	#[case("MB")]
	#[case("5XB")]
	#[case("-5MB")]
	#[case("1.2.3KB")]
	#[case("99999999999999999999TB")]
	fn rejects(#[case] input: &str) {
		let err = input.parse::<ByteSize>().unwrap_err();
		assert!(matches!(err, GeoStreamError::Misconfiguration(_)), "{input}: {err}");
	}

	#[rstest]
	#[case(0, "0B")]
	#[case(100, "100B")]
	#[case(1536, "1536B")]
	#[case(512_000, "500KB")]
	#[case(5 * MB, "5MB")]
	#[case(3 * GB, "3GB")]
	fn displays(#[case] bytes: u64, #[case] expected: &str) {
		assert_eq!(ByteSize::new(bytes).to_string(), expected);
	}

	#[test]
	fn deserializes_numbers_and_strings() {
		let sizes: Vec<ByteSize> = serde_yaml_ng::from_str("[1024, '5MB', 500KB]").unwrap();
		assert_eq!(sizes, vec![ByteSize::kb(1), ByteSize::mb(5), ByteSize::kb(500)]);
		assert!(serde_yaml_ng::from_str::<ByteSize>("lots").is_err());
	}
}
