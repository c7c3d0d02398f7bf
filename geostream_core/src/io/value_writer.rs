//! [`ValueWriter`] is the counterpart of [`super::ValueReader`]: it appends little-endian numbers,
//! varints and strings to an in-memory buffer. It is used to encode test datasets.
//!
//! ```rust
//! use geostream_core::io::ValueWriter;
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//! 	let mut writer = ValueWriter::new();
//! 	writer.write_varint(1025)?;
//! 	writer.write_u16(7)?;
//! 	assert_eq!(writer.into_blob().into_vec(), vec![0b1000_0001, 0b0000_1000, 7, 0]);
//! 	Ok(())
//! }
//! ```

use crate::Blob;
use anyhow::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Cursor, Write};

#[derive(Default)]
pub struct ValueWriter {
	cursor: Cursor<Vec<u8>>,
}

macro_rules! write_number {
	($name:ident, $type:ty, $write:ident) => {
		pub fn $name(&mut self, value: $type) -> Result<()> {
			Ok(self.cursor.$write::<LittleEndian>(value)?)
		}
	};
}

impl ValueWriter {
	#[must_use]
	pub fn new() -> ValueWriter {
		ValueWriter::default()
	}

	#[must_use]
	pub fn position(&self) -> u64 {
		self.cursor.position()
	}

	pub fn write_u8(&mut self, value: u8) -> Result<()> {
		Ok(self.cursor.write_u8(value)?)
	}

	pub fn write_i8(&mut self, value: i8) -> Result<()> {
		Ok(self.cursor.write_i8(value)?)
	}

	write_number!(write_u16, u16, write_u16);
	write_number!(write_i16, i16, write_i16);
	write_number!(write_u32, u32, write_u32);
	write_number!(write_i32, i32, write_i32);
	write_number!(write_u64, u64, write_u64);
	write_number!(write_i64, i64, write_i64);
	write_number!(write_f32, f32, write_f32);
	write_number!(write_f64, f64, write_f64);

	/// Writes an unsigned LEB128 varint.
	pub fn write_varint(&mut self, mut value: u64) -> Result<()> {
		while value >= 0x80 {
			self.cursor.write_all(&[((value & 0x7F) as u8) | 0x80])?;
			value >>= 7;
		}
		self.cursor.write_all(&[value as u8])?;
		Ok(())
	}

	pub fn write_slice(&mut self, bytes: &[u8]) -> Result<()> {
		Ok(self.cursor.write_all(bytes)?)
	}

	/// Writes a varint length followed by the UTF-8 bytes.
	pub fn write_varint_string(&mut self, text: &str) -> Result<()> {
		self.write_varint(text.len() as u64)?;
		self.write_slice(text.as_bytes())
	}

	#[must_use]
	pub fn into_blob(self) -> Blob {
		Blob::from(self.cursor.into_inner())
	}
}
