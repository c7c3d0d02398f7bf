//! This module provides [`ValueReader`], a cursor over a little-endian byte slice.
//!
//! All binary structures of the dataset format (header block, index nodes, features) are
//! little-endian, so the reader has no byte order parameter. Every failed read is reported as
//! [`GeoStreamError::InvalidFormat`], because running out of bytes always means the data is
//! truncated or corrupt.
//!
//! # Examples
//!
//! ```rust
//! use geostream_core::io::ValueReader;
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//! 	let data = [0x01, 0x02, 0xAC, 0x02, b'h', b'i'];
//! 	let mut reader = ValueReader::new(&data);
//! 	assert_eq!(reader.read_u16()?, 0x0201);
//! 	assert_eq!(reader.read_varint()?, 300);
//! 	assert_eq!(reader.read_string(2)?, "hi");
//! 	assert!(!reader.has_remaining());
//! 	Ok(())
//! }
//! ```

use crate::GeoStreamError;
use anyhow::{Result, bail};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// A forward reader over a byte slice with little-endian number decoding.
pub struct ValueReader<'a> {
	cursor: Cursor<&'a [u8]>,
}

macro_rules! read_number {
	($name:ident, $type:ty, $read:ident) => {
		pub fn $name(&mut self) -> Result<$type> {
			let position = self.position();
			self.cursor
				.$read::<LittleEndian>()
				.map_err(|_| self.eof_error(position, size_of::<$type>() as u64))
		}
	};
}

impl<'a> ValueReader<'a> {
	#[must_use]
	pub fn new(slice: &'a [u8]) -> ValueReader<'a> {
		ValueReader {
			cursor: Cursor::new(slice),
		}
	}

	/// Total number of bytes in the underlying slice.
	#[must_use]
	pub fn len(&self) -> u64 {
		self.cursor.get_ref().len() as u64
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	#[must_use]
	pub fn position(&self) -> u64 {
		self.cursor.position()
	}

	/// Moves the cursor to `position`. Positions past the end are rejected.
	pub fn set_position(&mut self, position: u64) -> Result<()> {
		if position > self.len() {
			bail!(GeoStreamError::InvalidFormat(format!(
				"position {position} is outside of {} bytes",
				self.len()
			)));
		}
		self.cursor.set_position(position);
		Ok(())
	}

	#[must_use]
	pub fn remaining(&self) -> u64 {
		self.len().saturating_sub(self.position())
	}

	#[must_use]
	pub fn has_remaining(&self) -> bool {
		self.remaining() > 0
	}

	/// Skips `length` bytes.
	pub fn skip(&mut self, length: u64) -> Result<()> {
		self.read_slice(length).map(|_| ())
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		let position = self.position();
		self.cursor.read_u8().map_err(|_| self.eof_error(position, 1))
	}

	pub fn read_i8(&mut self) -> Result<i8> {
		let position = self.position();
		self.cursor.read_i8().map_err(|_| self.eof_error(position, 1))
	}

	read_number!(read_u16, u16, read_u16);
	read_number!(read_i16, i16, read_i16);
	read_number!(read_u32, u32, read_u32);
	read_number!(read_i32, i32, read_i32);
	read_number!(read_u64, u64, read_u64);
	read_number!(read_i64, i64, read_i64);
	read_number!(read_f32, f32, read_f32);
	read_number!(read_f64, f64, read_f64);

	/// Reads an unsigned LEB128 varint.
	pub fn read_varint(&mut self) -> Result<u64> {
		let mut value = 0;
		let mut shift = 0;
		loop {
			let byte = self.read_u8()?;
			value |= (u64::from(byte) & 0x7F) << shift;
			if byte & 0x80 == 0 {
				break;
			}
			shift += 7;
			if shift >= 64 {
				bail!(GeoStreamError::InvalidFormat(format!(
					"varint too long at position {}",
					self.position()
				)));
			}
		}
		Ok(value)
	}

	/// Borrows the next `length` bytes and advances past them.
	pub fn read_slice(&mut self, length: u64) -> Result<&'a [u8]> {
		let start = self.position();
		if length > self.remaining() {
			return Err(self.eof_error(start, length));
		}
		let end = start + length;
		self.cursor.set_position(end);
		let slice: &'a [u8] = *self.cursor.get_ref();
		Ok(&slice[start as usize..end as usize])
	}

	/// Reads `length` bytes of UTF-8 text.
	pub fn read_string(&mut self, length: u64) -> Result<String> {
		let position = self.position();
		let bytes = self.read_slice(length)?;
		String::from_utf8(bytes.to_vec()).map_err(|e| {
			GeoStreamError::InvalidFormat(format!("invalid UTF-8 string at position {position}: {e}")).into()
		})
	}

	/// Reads a varint length followed by that many bytes of UTF-8 text.
	pub fn read_varint_string(&mut self) -> Result<String> {
		let length = self.read_varint()?;
		self.read_string(length)
	}

	/// Returns a reader over the next `length` bytes and advances past them.
	pub fn sub_reader(&mut self, length: u64) -> Result<ValueReader<'a>> {
		Ok(ValueReader::new(self.read_slice(length)?))
	}

	fn eof_error(&self, position: u64, wanted: u64) -> anyhow::Error {
		GeoStreamError::InvalidFormat(format!(
			"unexpected end of data: wanted {wanted} bytes at position {position}, buffer has {}",
			self.len()
		))
		.into()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn numbers() -> Result<()> {
		let mut data = vec![0xFF, 0xFD, 0xFF, 0xFF, 0xFF];
		data.extend_from_slice(&1.5f64.to_le_bytes());
		data.extend_from_slice(&(-2.0f32).to_le_bytes());
		data.extend_from_slice(&u64::MAX.to_le_bytes());
		let mut reader = ValueReader::new(&data);
		assert_eq!(reader.read_i8()?, -1);
		assert_eq!(reader.read_i32()?, -3);
		assert_eq!(reader.read_f64()?, 1.5);
		assert_eq!(reader.read_f32()?, -2.0);
		assert_eq!(reader.read_u64()?, u64::MAX);
		assert!(!reader.has_remaining());
		Ok(())
	}

	#[test]
	fn varint() -> Result<()> {
		let mut reader = ValueReader::new(&[0x00, 0x7F, 0xAC, 0x02]);
		assert_eq!(reader.read_varint()?, 0);
		assert_eq!(reader.read_varint()?, 127);
		assert_eq!(reader.read_varint()?, 300);
		Ok(())
	}

	#[test]
	fn varint_too_long() {
		let mut reader = ValueReader::new(&[0x80; 12]);
		assert!(reader.read_varint().is_err());
	}

	#[test]
	fn end_of_data_is_invalid_format() {
		let mut reader = ValueReader::new(&[1, 2, 3]);
		let err = reader.read_u32().unwrap_err();
		assert_eq!(
			GeoStreamError::classify(&err),
			Some(&GeoStreamError::InvalidFormat(
				"unexpected end of data: wanted 4 bytes at position 0, buffer has 3".into()
			))
		);
	}

	#[test]
	fn slices_and_sub_readers() -> Result<()> {
		let data = [1, 2, 3, 4, 5, 6];
		let mut reader = ValueReader::new(&data);
		reader.skip(1)?;
		assert_eq!(reader.read_slice(2)?, &[2, 3]);
		let mut sub = reader.sub_reader(2)?;
		assert_eq!(sub.read_u8()?, 4);
		assert_eq!(sub.read_u8()?, 5);
		assert!(sub.read_u8().is_err());
		assert_eq!(reader.position(), 5);
		assert!(reader.sub_reader(2).is_err());
		Ok(())
	}

	#[test]
	fn positions() -> Result<()> {
		let mut reader = ValueReader::new(&[1, 2, 3, 4]);
		reader.set_position(2)?;
		assert_eq!(reader.remaining(), 2);
		assert_eq!(reader.read_u8()?, 3);
		reader.set_position(4)?;
		assert!(!reader.has_remaining());
		assert!(reader.set_position(5).is_err());
		Ok(())
	}

	#[test]
	fn strings() -> Result<()> {
		let mut reader = ValueReader::new(&[2, b'H', b'I', 0xFF]);
		assert_eq!(reader.read_varint_string()?, "HI");
		assert!(reader.read_string(1).is_err());
		Ok(())
	}
}
