use super::ColumnType;
use anyhow::Result;
use geostream_core::io::ValueReader;
use std::{
	collections::{BTreeMap, btree_map},
	fmt::{self, Debug, Display},
};

/// A typed property value, one variant per column type.
#[derive(Clone, PartialEq)]
pub enum Value {
	Byte(i8),
	UByte(u8),
	Bool(bool),
	Short(i16),
	UShort(u16),
	Int(i32),
	UInt(u32),
	Long(i64),
	ULong(u64),
	Float(f32),
	Double(f64),
	String(String),
	Json(String),
	DateTime(String),
	Binary(Vec<u8>),
}

impl Value {
	/// Reads one value of `column_type`. Variable length values carry a `u32` length.
	pub fn read(reader: &mut ValueReader, column_type: ColumnType) -> Result<Value> {
		use ColumnType as C;
		Ok(match column_type {
			C::Byte => Value::Byte(reader.read_i8()?),
			C::UByte => Value::UByte(reader.read_u8()?),
			C::Bool => Value::Bool(reader.read_u8()? != 0),
			C::Short => Value::Short(reader.read_i16()?),
			C::UShort => Value::UShort(reader.read_u16()?),
			C::Int => Value::Int(reader.read_i32()?),
			C::UInt => Value::UInt(reader.read_u32()?),
			C::Long => Value::Long(reader.read_i64()?),
			C::ULong => Value::ULong(reader.read_u64()?),
			C::Float => Value::Float(reader.read_f32()?),
			C::Double => Value::Double(reader.read_f64()?),
			C::String => Value::String(read_string(reader)?),
			C::Json => Value::Json(read_string(reader)?),
			C::DateTime => Value::DateTime(read_string(reader)?),
			C::Binary => {
				let length = reader.read_u32()?;
				Value::Binary(reader.read_slice(u64::from(length))?.to_vec())
			}
		})
	}

	pub fn column_type(&self) -> ColumnType {
		match self {
			Value::Byte(_) => ColumnType::Byte,
			Value::UByte(_) => ColumnType::UByte,
			Value::Bool(_) => ColumnType::Bool,
			Value::Short(_) => ColumnType::Short,
			Value::UShort(_) => ColumnType::UShort,
			Value::Int(_) => ColumnType::Int,
			Value::UInt(_) => ColumnType::UInt,
			Value::Long(_) => ColumnType::Long,
			Value::ULong(_) => ColumnType::ULong,
			Value::Float(_) => ColumnType::Float,
			Value::Double(_) => ColumnType::Double,
			Value::String(_) => ColumnType::String,
			Value::Json(_) => ColumnType::Json,
			Value::DateTime(_) => ColumnType::DateTime,
			Value::Binary(_) => ColumnType::Binary,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) | Value::Json(s) | Value::DateTime(s) => Some(s),
			_ => None,
		}
	}

	/// Numeric values widened to `f64`.
	pub fn as_f64(&self) -> Option<f64> {
		Some(match self {
			Value::Byte(v) => f64::from(*v),
			Value::UByte(v) => f64::from(*v),
			Value::Short(v) => f64::from(*v),
			Value::UShort(v) => f64::from(*v),
			Value::Int(v) => f64::from(*v),
			Value::UInt(v) => f64::from(*v),
			Value::Long(v) => *v as f64,
			Value::ULong(v) => *v as f64,
			Value::Float(v) => f64::from(*v),
			Value::Double(v) => *v,
			_ => return None,
		})
	}
}

fn read_string(reader: &mut ValueReader) -> Result<String> {
	let length = reader.read_u32()?;
	reader.read_string(u64::from(length))
}

impl Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Byte(v) => f.debug_tuple("Byte").field(v).finish(),
			Value::UByte(v) => f.debug_tuple("UByte").field(v).finish(),
			Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
			Value::Short(v) => f.debug_tuple("Short").field(v).finish(),
			Value::UShort(v) => f.debug_tuple("UShort").field(v).finish(),
			Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
			Value::UInt(v) => f.debug_tuple("UInt").field(v).finish(),
			Value::Long(v) => f.debug_tuple("Long").field(v).finish(),
			Value::ULong(v) => f.debug_tuple("ULong").field(v).finish(),
			Value::Float(v) => f.debug_tuple("Float").field(v).finish(),
			Value::Double(v) => f.debug_tuple("Double").field(v).finish(),
			Value::String(v) => f.debug_tuple("String").field(v).finish(),
			Value::Json(v) => f.debug_tuple("Json").field(v).finish(),
			Value::DateTime(v) => f.debug_tuple("DateTime").field(v).finish(),
			Value::Binary(v) => write!(f, "Binary({} bytes)", v.len()),
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Byte(v) => write!(f, "{v}"),
			Value::UByte(v) => write!(f, "{v}"),
			Value::Bool(v) => write!(f, "{v}"),
			Value::Short(v) => write!(f, "{v}"),
			Value::UShort(v) => write!(f, "{v}"),
			Value::Int(v) => write!(f, "{v}"),
			Value::UInt(v) => write!(f, "{v}"),
			Value::Long(v) => write!(f, "{v}"),
			Value::ULong(v) => write!(f, "{v}"),
			Value::Float(v) => write!(f, "{v}"),
			Value::Double(v) => write!(f, "{v}"),
			Value::String(v) | Value::Json(v) | Value::DateTime(v) => write!(f, "{v:?}"),
			Value::Binary(v) => write!(f, "<{} bytes>", v.len()),
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::String(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::String(value)
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Int(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Long(value)
	}
}

impl From<u64> for Value {
	fn from(value: u64) -> Self {
		Value::ULong(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Double(value)
	}
}

/// Property values of one feature, keyed by column name.
#[derive(Clone, Default, PartialEq)]
pub struct Properties {
	properties: BTreeMap<String, Value>,
}

impl Properties {
	pub fn new() -> Properties {
		Properties::default()
	}

	pub fn insert(&mut self, key: String, value: Value) {
		self.properties.insert(key, value);
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.properties.get(key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.properties.contains_key(key)
	}

	pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
		self.properties.iter()
	}

	pub fn len(&self) -> usize {
		self.properties.len()
	}

	pub fn is_empty(&self) -> bool {
		self.properties.is_empty()
	}
}

impl IntoIterator for Properties {
	type Item = (String, Value);
	type IntoIter = btree_map::IntoIter<String, Value>;
	fn into_iter(self) -> Self::IntoIter {
		self.properties.into_iter()
	}
}

impl<'a> IntoIterator for &'a Properties {
	type Item = (&'a String, &'a Value);
	type IntoIter = btree_map::Iter<'a, String, Value>;
	fn into_iter(self) -> Self::IntoIter {
		self.properties.iter()
	}
}

impl From<Vec<(&str, Value)>> for Properties {
	fn from(value: Vec<(&str, Value)>) -> Self {
		value.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
	}
}

impl FromIterator<(String, Value)> for Properties {
	fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
		Properties {
			properties: BTreeMap::from_iter(iter),
		}
	}
}

impl Debug for Properties {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.properties.iter()).finish()
	}
}

impl Display for Properties {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut first = true;
		for (key, value) in &self.properties {
			if !first {
				f.write_str(" ")?;
			}
			first = false;
			write!(f, "{key}={value}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use geostream_core::io::ValueWriter;

	#[test]
	fn read_fixed_and_variable_values() -> Result<()> {
		let mut writer = ValueWriter::new();
		writer.write_i8(-3)?;
		writer.write_u8(1)?;
		writer.write_u16(65000)?;
		writer.write_u32(2)?;
		writer.write_slice(b"HI")?;
		writer.write_u32(3)?;
		writer.write_slice(&[1, 2, 3])?;
		writer.write_f32(1.5)?;
		let blob = writer.into_blob();

		let mut reader = ValueReader::new(blob.as_slice());
		assert_eq!(Value::read(&mut reader, ColumnType::Byte)?, Value::Byte(-3));
		assert_eq!(Value::read(&mut reader, ColumnType::Bool)?, Value::Bool(true));
		assert_eq!(Value::read(&mut reader, ColumnType::UShort)?, Value::UShort(65000));
		assert_eq!(Value::read(&mut reader, ColumnType::String)?, Value::from("HI"));
		assert_eq!(Value::read(&mut reader, ColumnType::Binary)?, Value::Binary(vec![1, 2, 3]));
		assert_eq!(Value::read(&mut reader, ColumnType::Float)?, Value::Float(1.5));
		assert!(!reader.has_remaining());
		Ok(())
	}

	#[test]
	fn truncated_string() {
		let data = [10, 0, 0, 0, b'a'];
		let mut reader = ValueReader::new(&data);
		assert!(Value::read(&mut reader, ColumnType::Json).is_err());
	}

	#[test]
	fn accessors() {
		assert_eq!(Value::from("HI").as_str(), Some("HI"));
		assert_eq!(Value::Short(-7).as_f64(), Some(-7.0));
		assert_eq!(Value::Binary(vec![]).as_f64(), None);
		assert_eq!(Value::UInt(3).column_type(), ColumnType::UInt);
	}

	#[test]
	fn properties_display_and_debug() {
		let properties = Properties::from(vec![("STATE", Value::from("HI")), ("AREA", Value::Double(28311.0))]);
		assert_eq!(properties.to_string(), "AREA=28311 STATE=\"HI\"");
		assert_eq!(format!("{properties:?}"), "{\"AREA\": Double(28311.0), \"STATE\": String(\"HI\")}");
		assert_eq!(properties.len(), 2);
	}
}
