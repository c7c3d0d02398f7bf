//! Decoding of single length-prefixed features.

use super::{Header, Properties, Value, decode_geometry};
use anyhow::{Context, Result, bail, ensure};
use geo_types::Geometry;
use geostream_core::{GeoStreamError, io::ValueReader};

/// Every feature starts with a `u32` byte length that does not count itself.
pub const SIZE_PREFIX_LENGTH: u64 = 4;

/// A decoded feature with its provenance.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
	pub geometry: Option<Geometry<f64>>,
	pub properties: Properties,
	/// Length of the encoded feature including its size prefix.
	pub byte_length: u64,
	/// Absolute position in the file. Stable, usable as an id.
	pub offset: u64,
}

impl Feature {
	pub fn geometry_name(&self) -> &'static str {
		match &self.geometry {
			None => "None",
			Some(Geometry::Point(_)) => "Point",
			Some(Geometry::Line(_)) => "Line",
			Some(Geometry::LineString(_)) => "LineString",
			Some(Geometry::Polygon(_)) => "Polygon",
			Some(Geometry::MultiPoint(_)) => "MultiPoint",
			Some(Geometry::MultiLineString(_)) => "MultiLineString",
			Some(Geometry::MultiPolygon(_)) => "MultiPolygon",
			Some(Geometry::GeometryCollection(_)) => "GeometryCollection",
			Some(Geometry::Rect(_)) => "Rect",
			Some(Geometry::Triangle(_)) => "Triangle",
		}
	}
}

/// The properties of a feature, decoded without touching its geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRecord {
	pub properties: Properties,
	pub byte_length: u64,
	pub offset: u64,
}

/// Reads the size prefix at the start of `buffer`.
pub fn read_size_prefix(buffer: &[u8]) -> Result<u64> {
	Ok(u64::from(ValueReader::new(buffer).read_u32()?))
}

/// Checks that the size prefix of `buffer` covers exactly the rest of the buffer.
pub fn validate_size_prefix(offset: u64, buffer: &[u8]) -> Result<()> {
	let expected = (buffer.len() as u64).saturating_sub(SIZE_PREFIX_LENGTH);
	let actual = read_size_prefix(buffer)?;
	if actual != expected {
		bail!(GeoStreamError::FeatureSizeMismatch {
			offset,
			expected,
			actual
		});
	}
	Ok(())
}

fn feature_body(buffer: &[u8]) -> Result<ValueReader<'_>> {
	let mut reader = ValueReader::new(buffer);
	let length = u64::from(reader.read_u32()?);
	ensure!(
		length <= reader.remaining(),
		GeoStreamError::InvalidFormat(format!(
			"feature size prefix says {length} bytes, only {} available",
			reader.remaining()
		))
	);
	reader.sub_reader(length)
}

fn read_properties(reader: &mut ValueReader, header: &Header) -> Result<Properties> {
	let mut properties = Properties::new();
	while reader.has_remaining() {
		let index = reader.read_u16()?;
		let Some(column) = header.columns.get(usize::from(index)) else {
			bail!(GeoStreamError::InvalidFormat(format!(
				"property refers to column {index}, but the schema has {} columns",
				header.columns.len()
			)));
		};
		let value = Value::read(reader, column.column_type)
			.with_context(|| format!("reading property '{}'", column.name))?;
		properties.insert(column.name.clone(), value);
	}
	Ok(properties)
}

/// Decodes a whole feature buffer, size prefix included. `offset` is its absolute position.
pub fn decode_feature(offset: u64, buffer: &[u8], header: &Header) -> Result<Feature> {
	let decode = || -> Result<Feature> {
		let mut body = feature_body(buffer)?;

		let geometry_length = body.read_varint()?;
		let geometry = if geometry_length == 0 {
			None
		} else {
			let mut geometry_reader = body.sub_reader(geometry_length)?;
			Some(decode_geometry(&mut geometry_reader)?)
		};

		Ok(Feature {
			geometry,
			properties: read_properties(&mut body, header)?,
			byte_length: buffer.len() as u64,
			offset,
		})
	};
	decode().with_context(|| format!("decoding feature at offset {offset}"))
}

/// Like [`decode_feature`] but skips the geometry.
pub fn decode_properties(offset: u64, buffer: &[u8], header: &Header) -> Result<PropertyRecord> {
	let decode = || -> Result<PropertyRecord> {
		let mut body = feature_body(buffer)?;
		let geometry_length = body.read_varint()?;
		body.skip(geometry_length)?;

		Ok(PropertyRecord {
			properties: read_properties(&mut body, header)?,
			byte_length: buffer.len() as u64,
			offset,
		})
	};
	decode().with_context(|| format!("decoding properties of feature at offset {offset}"))
}
