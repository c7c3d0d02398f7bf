//! The dataset header: magic bytes, header length and the header block with the column schema.

use anyhow::{Result, bail, ensure};
use geostream_core::{BoundingBox, GeoStreamError, io::ValueReader};
use std::fmt;

/// `gsb`, format version 1, `gsb`, format patch 0.
pub const MAGIC: [u8; 8] = *b"gsb\x01gsb\x00";

/// Magic bytes plus the `u32` header length.
pub const PREAMBLE_SIZE: u64 = MAGIC.len() as u64 + 4;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum GeometryType {
	Unknown = 0,
	Point = 1,
	LineString = 2,
	Polygon = 3,
	MultiPoint = 4,
	MultiLineString = 5,
	MultiPolygon = 6,
	GeometryCollection = 7,
}

impl GeometryType {
	pub fn from_u8(value: u8) -> Result<Self> {
		use GeometryType::*;
		Ok(match value {
			0 => Unknown,
			1 => Point,
			2 => LineString,
			3 => Polygon,
			4 => MultiPoint,
			5 => MultiLineString,
			6 => MultiPolygon,
			7 => GeometryCollection,
			_ => bail!(GeoStreamError::InvalidFormat(format!("unknown geometry type {value}"))),
		})
	}

	pub fn as_str(&self) -> &'static str {
		use GeometryType::*;
		match self {
			Unknown => "Unknown",
			Point => "Point",
			LineString => "LineString",
			Polygon => "Polygon",
			MultiPoint => "MultiPoint",
			MultiLineString => "MultiLineString",
			MultiPolygon => "MultiPolygon",
			GeometryCollection => "GeometryCollection",
		}
	}
}

impl fmt::Display for GeometryType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ColumnType {
	Byte = 0,
	UByte = 1,
	Bool = 2,
	Short = 3,
	UShort = 4,
	Int = 5,
	UInt = 6,
	Long = 7,
	ULong = 8,
	Float = 9,
	Double = 10,
	String = 11,
	Json = 12,
	DateTime = 13,
	Binary = 14,
}

impl ColumnType {
	pub fn from_u8(value: u8) -> Result<Self> {
		use ColumnType::*;
		Ok(match value {
			0 => Byte,
			1 => UByte,
			2 => Bool,
			3 => Short,
			4 => UShort,
			5 => Int,
			6 => UInt,
			7 => Long,
			8 => ULong,
			9 => Float,
			10 => Double,
			11 => String,
			12 => Json,
			13 => DateTime,
			14 => Binary,
			_ => bail!(GeoStreamError::InvalidFormat(format!("unknown column type {value}"))),
		})
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
	pub name: String,
	pub column_type: ColumnType,
	pub nullable: bool,
}

impl Column {
	pub fn new(name: &str, column_type: ColumnType) -> Self {
		Column {
			name: name.to_owned(),
			column_type,
			nullable: true,
		}
	}
}

/// Coordinate reference system, e.g. `EPSG:4326`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Crs {
	pub org: String,
	pub code: i32,
	pub wkt: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Header {
	pub geometry_type: GeometryType,
	pub features_count: u64,
	/// Branching factor of the packed R-tree. 0 means the file has no index.
	pub index_node_size: u16,
	pub envelope: Option<BoundingBox>,
	pub name: String,
	pub columns: Vec<Column>,
	pub crs: Option<Crs>,
}

impl Header {
	/// Checks the magic bytes and returns the length of the header block that follows the
	/// preamble. `buffer` must start at byte 0 of the file.
	pub fn read_preamble(buffer: &[u8]) -> Result<u64> {
		if buffer.len() < MAGIC.len() || buffer[..MAGIC.len()] != MAGIC {
			bail!(GeoStreamError::InvalidFormat(
				"magic bytes mismatch, this is not a geostream dataset".to_string()
			));
		}
		let mut reader = ValueReader::new(buffer);
		reader.set_position(MAGIC.len() as u64)?;
		Ok(u64::from(reader.read_u32()?))
	}

	/// Decodes the header block, without the preamble.
	pub fn from_bytes(buffer: &[u8]) -> Result<Header> {
		let mut reader = ValueReader::new(buffer);

		let geometry_type = GeometryType::from_u8(reader.read_u8()?)?;
		let features_count = reader.read_u64()?;
		let index_node_size = reader.read_u16()?;

		let envelope = match reader.read_u8()? {
			0 => None,
			1 => Some(BoundingBox::new(
				reader.read_f64()?,
				reader.read_f64()?,
				reader.read_f64()?,
				reader.read_f64()?,
			)),
			flag => bail!(GeoStreamError::InvalidFormat(format!("invalid envelope flag {flag}"))),
		};

		let name = reader.read_varint_string()?;

		let column_count = reader.read_varint()?;
		ensure!(
			column_count <= u64::from(u16::MAX) + 1,
			GeoStreamError::InvalidFormat(format!("too many columns: {column_count}"))
		);
		let mut columns = Vec::with_capacity(column_count as usize);
		for _ in 0..column_count {
			columns.push(Column {
				name: reader.read_varint_string()?,
				column_type: ColumnType::from_u8(reader.read_u8()?)?,
				nullable: reader.read_u8()? != 0,
			});
		}

		let crs = match reader.read_u8()? {
			0 => None,
			1 => Some(Crs {
				org: reader.read_varint_string()?,
				code: reader.read_i32()?,
				wkt: reader.read_varint_string()?,
			}),
			flag => bail!(GeoStreamError::InvalidFormat(format!("invalid crs flag {flag}"))),
		};

		Ok(Header {
			geometry_type,
			features_count,
			index_node_size,
			envelope,
			name,
			columns,
			crs,
		})
	}

	pub fn column_index(&self, name: &str) -> Option<usize> {
		self.columns.iter().position(|column| column.name == name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::encode_header;

	fn sample_header() -> Header {
		Header {
			geometry_type: GeometryType::MultiPolygon,
			features_count: 52,
			index_node_size: 16,
			envelope: Some(BoundingBox::new(-179.1, 18.9, 179.8, 71.4)),
			name: "us_states".to_string(),
			columns: vec![
				Column::new("STATE", ColumnType::String),
				Column {
					name: "POP".to_string(),
					column_type: ColumnType::Long,
					nullable: false,
				},
			],
			crs: Some(Crs {
				org: "EPSG".to_string(),
				code: 4326,
				wkt: String::new(),
			}),
		}
	}

	#[test]
	fn decode_header_block() -> Result<()> {
		let header = sample_header();
		let bytes = encode_header(&header)?;
		assert_eq!(Header::from_bytes(bytes.as_slice())?, header);
		Ok(())
	}

	#[test]
	fn preamble() -> Result<()> {
		let mut bytes = MAGIC.to_vec();
		bytes.extend_from_slice(&300u32.to_le_bytes());
		assert_eq!(Header::read_preamble(&bytes)?, 300);

		let err = Header::read_preamble(b"PK\x03\x04 this is a zip").unwrap_err();
		assert!(matches!(
			GeoStreamError::classify(&err),
			Some(GeoStreamError::InvalidFormat(_))
		));

		// magic ok, length cut off
		assert!(Header::read_preamble(&MAGIC).is_err());
		Ok(())
	}

	#[test]
	fn truncated_header_block() -> Result<()> {
		let bytes = encode_header(&sample_header())?;
		let err = Header::from_bytes(&bytes.as_slice()[..20]).unwrap_err();
		assert!(matches!(
			GeoStreamError::classify(&err),
			Some(GeoStreamError::InvalidFormat(_))
		));
		Ok(())
	}

	#[test]
	fn unknown_types() {
		assert!(GeometryType::from_u8(8).is_err());
		assert!(ColumnType::from_u8(15).is_err());
		assert_eq!(GeometryType::from_u8(6).unwrap().to_string(), "MultiPolygon");
	}

	#[test]
	fn column_lookup() {
		let header = sample_header();
		assert_eq!(header.column_index("POP"), Some(1));
		assert_eq!(header.column_index("NAME"), None);
	}
}
