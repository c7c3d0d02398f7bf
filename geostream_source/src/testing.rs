//! Test utilities: an encoder for small datasets, a US states fixture and an instrumented
//! reader that records every request.
//!
//! Only compiled for tests or with the `test` feature.

use crate::format::{
	Column, ColumnType, Crs, GeometryType, Header, IndexLayout, MAGIC, NodeItem, Properties,
	SIZE_PREFIX_LENGTH, Value,
};
use anyhow::{Result, bail, ensure};
use async_trait::async_trait;
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use geostream_core::{
	Blob, BoundingBox, ByteRange,
	io::{DataReaderTrait, ValueWriter},
};
use parking_lot::Mutex;
use std::{
	sync::atomic::{AtomicBool, AtomicU64, Ordering},
	time::Duration,
};

pub fn encode_header(header: &Header) -> Result<Blob> {
	let mut writer = ValueWriter::new();
	writer.write_u8(header.geometry_type as u8)?;
	writer.write_u64(header.features_count)?;
	writer.write_u16(header.index_node_size)?;
	match &header.envelope {
		Some(envelope) => {
			writer.write_u8(1)?;
			for value in envelope.as_array() {
				writer.write_f64(value)?;
			}
		}
		None => writer.write_u8(0)?,
	}
	writer.write_varint_string(&header.name)?;
	writer.write_varint(header.columns.len() as u64)?;
	for column in &header.columns {
		writer.write_varint_string(&column.name)?;
		writer.write_u8(column.column_type as u8)?;
		writer.write_u8(u8::from(column.nullable))?;
	}
	match &header.crs {
		Some(crs) => {
			writer.write_u8(1)?;
			writer.write_varint_string(&crs.org)?;
			writer.write_i32(crs.code)?;
			writer.write_varint_string(&crs.wkt)?;
		}
		None => writer.write_u8(0)?,
	}
	Ok(writer.into_blob())
}

fn write_coords<'a>(writer: &mut ValueWriter, lines: impl IntoIterator<Item = &'a LineString<f64>>) -> Result<()> {
	let lines: Vec<&LineString<f64>> = lines.into_iter().collect();
	if lines.len() > 1 {
		writer.write_varint(lines.len() as u64)?;
		let mut end = 0;
		for line in &lines {
			end += line.0.len() as u64;
			writer.write_varint(end)?;
		}
	} else {
		writer.write_varint(0)?;
	}

	let coords: Vec<&Coord<f64>> = lines.iter().flat_map(|line| line.0.iter()).collect();
	writer.write_varint(coords.len() as u64)?;
	for coord in coords {
		writer.write_f64(coord.x)?;
		writer.write_f64(coord.y)?;
	}
	Ok(())
}

fn write_polygon(writer: &mut ValueWriter, polygon: &Polygon<f64>) -> Result<()> {
	writer.write_u8(GeometryType::Polygon as u8)?;
	writer.write_varint(0)?;
	write_coords(writer, std::iter::once(polygon.exterior()).chain(polygon.interiors()))
}

fn write_geometry(writer: &mut ValueWriter, geometry: &Geometry<f64>) -> Result<()> {
	match geometry {
		Geometry::Point(point) => {
			writer.write_u8(GeometryType::Point as u8)?;
			writer.write_varint(0)?;
			write_coords(writer, [&LineString(vec![point.0])])
		}
		Geometry::Line(line) => write_geometry(writer, &Geometry::LineString(LineString(vec![line.start, line.end]))),
		Geometry::LineString(line) => {
			writer.write_u8(GeometryType::LineString as u8)?;
			writer.write_varint(0)?;
			write_coords(writer, [line])
		}
		Geometry::Polygon(polygon) => write_polygon(writer, polygon),
		Geometry::MultiPoint(points) => {
			writer.write_u8(GeometryType::MultiPoint as u8)?;
			writer.write_varint(0)?;
			write_coords(writer, [&LineString(points.iter().map(|p| p.0).collect())])
		}
		Geometry::MultiLineString(lines) => {
			writer.write_u8(GeometryType::MultiLineString as u8)?;
			writer.write_varint(0)?;
			write_coords(writer, &lines.0)
		}
		Geometry::MultiPolygon(polygons) => {
			writer.write_u8(GeometryType::MultiPolygon as u8)?;
			writer.write_varint(polygons.0.len() as u64)?;
			for polygon in polygons {
				write_polygon(writer, polygon)?;
			}
			Ok(())
		}
		Geometry::GeometryCollection(collection) => {
			writer.write_u8(GeometryType::GeometryCollection as u8)?;
			writer.write_varint(collection.0.len() as u64)?;
			for part in collection {
				write_geometry(writer, part)?;
			}
			Ok(())
		}
		Geometry::Rect(rect) => write_polygon(writer, &rect.to_polygon()),
		Geometry::Triangle(triangle) => write_polygon(writer, &triangle.to_polygon()),
	}
}

pub fn encode_geometry(geometry: &Geometry<f64>) -> Result<Blob> {
	let mut writer = ValueWriter::new();
	write_geometry(&mut writer, geometry)?;
	Ok(writer.into_blob())
}

fn write_value(writer: &mut ValueWriter, value: &Value) -> Result<()> {
	match value {
		Value::Byte(v) => writer.write_i8(*v),
		Value::UByte(v) => writer.write_u8(*v),
		Value::Bool(v) => writer.write_u8(u8::from(*v)),
		Value::Short(v) => writer.write_i16(*v),
		Value::UShort(v) => writer.write_u16(*v),
		Value::Int(v) => writer.write_i32(*v),
		Value::UInt(v) => writer.write_u32(*v),
		Value::Long(v) => writer.write_i64(*v),
		Value::ULong(v) => writer.write_u64(*v),
		Value::Float(v) => writer.write_f32(*v),
		Value::Double(v) => writer.write_f64(*v),
		Value::String(v) | Value::Json(v) | Value::DateTime(v) => {
			writer.write_u32(v.len() as u32)?;
			writer.write_slice(v.as_bytes())
		}
		Value::Binary(v) => {
			writer.write_u32(v.len() as u32)?;
			writer.write_slice(v)
		}
	}
}

/// Encodes one feature including its size prefix.
pub fn encode_feature(geometry: Option<&Geometry<f64>>, properties: &Properties, header: &Header) -> Result<Blob> {
	let mut body = ValueWriter::new();
	match geometry {
		Some(geometry) => {
			let encoded = encode_geometry(geometry)?;
			body.write_varint(encoded.len())?;
			body.write_slice(encoded.as_slice())?;
		}
		None => body.write_varint(0)?,
	}
	for (key, value) in properties {
		let Some(index) = header.column_index(key) else {
			bail!("property '{key}' has no column");
		};
		ensure!(
			header.columns[index].column_type == value.column_type(),
			"property '{key}' does not match its column type"
		);
		body.write_u16(index as u16)?;
		write_value(&mut body, value)?;
	}

	let body = body.into_blob();
	let mut writer = ValueWriter::new();
	writer.write_u32(body.len() as u32)?;
	writer.write_slice(body.as_slice())?;
	Ok(writer.into_blob())
}

pub fn geometry_bbox(geometry: &Geometry<f64>) -> BoundingBox {
	fn extend(bbox: &mut BoundingBox, coords: impl IntoIterator<Item = Coord<f64>>) {
		for c in coords {
			bbox.extend(&BoundingBox::new(c.x, c.y, c.x, c.y));
		}
	}
	fn extend_polygon(bbox: &mut BoundingBox, polygon: &Polygon<f64>) {
		extend(bbox, polygon.exterior().0.iter().copied());
		for ring in polygon.interiors() {
			extend(bbox, ring.0.iter().copied());
		}
	}

	let mut bbox = BoundingBox::new_empty();
	match geometry {
		Geometry::Point(p) => extend(&mut bbox, [p.0]),
		Geometry::Line(l) => extend(&mut bbox, [l.start, l.end]),
		Geometry::LineString(l) => extend(&mut bbox, l.0.iter().copied()),
		Geometry::Polygon(p) => extend_polygon(&mut bbox, p),
		Geometry::MultiPoint(m) => extend(&mut bbox, m.iter().map(|p| p.0)),
		Geometry::MultiLineString(m) => extend(&mut bbox, m.iter().flat_map(|l| l.0.iter().copied())),
		Geometry::MultiPolygon(m) => m.iter().for_each(|p| extend_polygon(&mut bbox, p)),
		Geometry::GeometryCollection(c) => c.iter().for_each(|g| bbox.extend(&geometry_bbox(g))),
		Geometry::Rect(r) => extend(&mut bbox, [r.min(), r.max()]),
		Geometry::Triangle(t) => extend(&mut bbox, t.to_array()),
	}
	bbox
}

/// Builds the packed R-tree bytes for leaves in file order. `offsets` are relative to the
/// feature-data section.
pub fn build_index(boxes: &[BoundingBox], offsets: &[u64], node_size: u16) -> Result<(Blob, IndexLayout)> {
	ensure!(boxes.len() == offsets.len(), "need one offset per box");
	let layout = IndexLayout::new(boxes.len() as u64, node_size)?;
	let mut nodes = vec![
		NodeItem {
			bbox: BoundingBox::new_empty(),
			offset: 0
		};
		layout.node_count() as usize
	];

	let leaves = layout.leaves();
	for (i, (bbox, offset)) in boxes.iter().zip(offsets).enumerate() {
		nodes[leaves.start as usize + i] = NodeItem {
			bbox: *bbox,
			offset: *offset,
		};
	}

	let levels = layout.level_bounds();
	let branching = u64::from(node_size);
	for level in 1..levels.len() {
		let children = &levels[level - 1];
		for (j, parent) in levels[level].clone().enumerate() {
			let first = children.start + j as u64 * branching;
			let end = (first + branching).min(children.end);
			let mut bbox = BoundingBox::new_empty();
			for child in first..end {
				bbox.extend(&nodes[child as usize].bbox);
			}
			nodes[parent as usize] = NodeItem { bbox, offset: first };
		}
	}

	let mut blob = Blob::new_sized(layout.total_bytes() as usize);
	for (i, node) in (0u64..).zip(&nodes) {
		node.write_to(&mut blob.as_mut_slice()[layout.node_byte_range(i)]);
	}
	Ok((blob, layout))
}

/// Assembles a complete dataset in memory.
pub struct DatasetBuilder {
	header: Header,
	features: Vec<(Option<Geometry<f64>>, Properties)>,
}

impl DatasetBuilder {
	pub fn new(name: &str, geometry_type: GeometryType, columns: Vec<Column>) -> DatasetBuilder {
		DatasetBuilder {
			header: Header {
				geometry_type,
				features_count: 0,
				index_node_size: 16,
				envelope: None,
				name: name.to_string(),
				columns,
				crs: None,
			},
			features: Vec::new(),
		}
	}

	#[must_use]
	pub fn with_node_size(mut self, node_size: u16) -> DatasetBuilder {
		self.header.index_node_size = node_size;
		self
	}

	#[must_use]
	pub fn with_crs(mut self, crs: Crs) -> DatasetBuilder {
		self.header.crs = Some(crs);
		self
	}

	pub fn add_feature(&mut self, geometry: Option<Geometry<f64>>, properties: Properties) {
		self.features.push((geometry, properties));
	}

	/// The header as it will be written.
	pub fn header(&self) -> Header {
		let mut header = self.header.clone();
		header.features_count = self.features.len() as u64;
		let mut envelope = BoundingBox::new_empty();
		for geometry in self.features.iter().filter_map(|(g, _)| g.as_ref()) {
			envelope.extend(&geometry_bbox(geometry));
		}
		header.envelope = (!self.features.is_empty() && envelope.min_x.is_finite()).then_some(envelope);
		header
	}

	pub fn build(&self) -> Result<Blob> {
		let header = self.header();

		let mut data = Blob::new_empty();
		let mut boxes = Vec::with_capacity(self.features.len());
		let mut offsets = Vec::with_capacity(self.features.len());
		for (geometry, properties) in &self.features {
			offsets.push(data.len());
			boxes.push(geometry.as_ref().map_or_else(BoundingBox::new_empty, geometry_bbox));
			let feature = encode_feature(geometry.as_ref(), properties, &header)?;
			debug_assert!(feature.len() > SIZE_PREFIX_LENGTH);
			data.extend_from_slice(feature.as_slice());
		}
		let (index, _) = build_index(&boxes, &offsets, header.index_node_size)?;

		let header_block = encode_header(&header)?;
		let mut writer = ValueWriter::new();
		writer.write_slice(&MAGIC)?;
		writer.write_u32(header_block.len() as u32)?;
		writer.write_slice(header_block.as_slice())?;
		writer.write_slice(index.as_slice())?;
		writer.write_slice(data.as_slice())?;
		Ok(writer.into_blob())
	}
}

/// Rough extents of the US states, DC and Puerto Rico. Hawaii is the only entry west of
/// -130° and south of 50°.
pub const US_STATES: &[(&str, &str, [f64; 4])] = &[
	("AL", "Alabama", [-88.5, 30.2, -84.9, 35.0]),
	("AK", "Alaska", [-179.2, 51.2, -129.9, 71.4]),
	("AZ", "Arizona", [-114.8, 31.3, -109.0, 37.0]),
	("AR", "Arkansas", [-94.6, 33.0, -89.6, 36.5]),
	("CA", "California", [-124.4, 32.5, -114.1, 42.0]),
	("CO", "Colorado", [-109.1, 37.0, -102.0, 41.0]),
	("CT", "Connecticut", [-73.7, 41.0, -71.8, 42.1]),
	("DE", "Delaware", [-75.8, 38.5, -75.0, 39.8]),
	("DC", "District of Columbia", [-77.1, 38.8, -76.9, 39.0]),
	("FL", "Florida", [-87.6, 24.5, -80.0, 31.0]),
	("GA", "Georgia", [-85.6, 30.4, -80.8, 35.0]),
	("HI", "Hawaii", [-160.3, 18.9, -154.8, 22.3]),
	("ID", "Idaho", [-117.2, 42.0, -111.0, 49.0]),
	("IL", "Illinois", [-91.5, 37.0, -87.5, 42.5]),
	("IN", "Indiana", [-88.1, 37.8, -84.8, 41.8]),
	("IA", "Iowa", [-96.6, 40.4, -90.1, 43.5]),
	("KS", "Kansas", [-102.1, 37.0, -94.6, 40.0]),
	("KY", "Kentucky", [-89.6, 36.5, -82.0, 39.1]),
	("LA", "Louisiana", [-94.0, 29.0, -89.0, 33.0]),
	("ME", "Maine", [-71.1, 43.1, -66.9, 47.5]),
	("MD", "Maryland", [-79.5, 37.9, -75.0, 39.7]),
	("MA", "Massachusetts", [-73.5, 41.2, -69.9, 42.9]),
	("MI", "Michigan", [-90.4, 41.7, -82.4, 48.3]),
	("MN", "Minnesota", [-97.2, 43.5, -89.5, 49.4]),
	("MS", "Mississippi", [-91.7, 30.2, -88.1, 35.0]),
	("MO", "Missouri", [-95.8, 36.0, -89.1, 40.6]),
	("MT", "Montana", [-116.1, 44.4, -104.0, 49.0]),
	("NE", "Nebraska", [-104.1, 40.0, -95.3, 43.0]),
	("NV", "Nevada", [-120.0, 35.0, -114.0, 42.0]),
	("NH", "New Hampshire", [-72.6, 42.7, -70.6, 45.3]),
	("NJ", "New Jersey", [-75.6, 38.9, -73.9, 41.4]),
	("NM", "New Mexico", [-109.1, 31.3, -103.0, 37.0]),
	("NY", "New York", [-79.8, 40.5, -71.9, 45.0]),
	("NC", "North Carolina", [-84.3, 33.8, -75.5, 36.6]),
	("ND", "North Dakota", [-104.1, 45.9, -96.6, 49.0]),
	("OH", "Ohio", [-84.8, 38.4, -80.5, 42.0]),
	("OK", "Oklahoma", [-103.0, 33.6, -94.4, 37.0]),
	("OR", "Oregon", [-124.6, 42.0, -116.5, 46.3]),
	("PA", "Pennsylvania", [-80.5, 39.7, -74.7, 42.3]),
	("RI", "Rhode Island", [-71.9, 41.1, -71.1, 42.0]),
	("SC", "South Carolina", [-83.4, 32.0, -78.5, 35.2]),
	("SD", "South Dakota", [-104.1, 42.5, -96.4, 45.9]),
	("TN", "Tennessee", [-90.3, 35.0, -81.6, 36.7]),
	("TX", "Texas", [-106.6, 25.8, -93.5, 36.5]),
	("UT", "Utah", [-114.1, 37.0, -109.0, 42.0]),
	("VT", "Vermont", [-73.4, 42.7, -71.5, 45.0]),
	("VA", "Virginia", [-83.7, 36.5, -75.2, 39.5]),
	("WA", "Washington", [-124.8, 45.5, -116.9, 49.0]),
	("WV", "West Virginia", [-82.6, 37.2, -77.7, 40.6]),
	("WI", "Wisconsin", [-92.9, 42.5, -86.8, 47.1]),
	("WY", "Wyoming", [-111.1, 41.0, -104.1, 45.0]),
	("PR", "Puerto Rico", [-67.3, 17.9, -65.2, 18.5]),
];

/// Main islands of Hawaii.
const HAWAII_ISLANDS: [[f64; 4]; 5] = [
	[-156.1, 18.9, -154.8, 20.3],
	[-156.7, 20.5, -155.9, 21.0],
	[-158.3, 21.25, -157.6, 21.7],
	[-159.8, 21.9, -159.3, 22.25],
	[-160.3, 21.75, -160.0, 22.0],
];

fn rectangle(bbox: [f64; 4]) -> Polygon<f64> {
	let [x0, y0, x1, y1] = bbox;
	Polygon::new(
		LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
		vec![],
	)
}

/// A dataset of [`US_STATES`] as multipolygons with `STATE`, `NAME` and `ORDER` properties.
pub fn us_states_builder(node_size: u16) -> DatasetBuilder {
	let mut builder = DatasetBuilder::new(
		"us_states",
		GeometryType::MultiPolygon,
		vec![
			Column::new("STATE", ColumnType::String),
			Column::new("NAME", ColumnType::String),
			Column::new("ORDER", ColumnType::UShort),
		],
	)
	.with_node_size(node_size)
	.with_crs(Crs {
		org: "EPSG".to_string(),
		code: 4326,
		wkt: String::new(),
	});

	for (order, (state, name, bbox)) in US_STATES.iter().enumerate() {
		let polygons = if *state == "HI" {
			HAWAII_ISLANDS.iter().map(|island| rectangle(*island)).collect()
		} else {
			vec![rectangle(*bbox)]
		};
		builder.add_feature(
			Some(Geometry::MultiPolygon(MultiPolygon(polygons))),
			Properties::from(vec![
				("STATE", Value::from(*state)),
				("NAME", Value::from(*name)),
				("ORDER", Value::UShort(order as u16)),
			]),
		);
	}
	builder
}

pub fn us_states() -> Result<Blob> {
	us_states_builder(4).build()
}

/// An in-memory reader that records every request and can delay or fail them.
#[derive(Debug)]
pub struct TestReader {
	name: String,
	data: Blob,
	requests: Mutex<Vec<ByteRange>>,
	delay: Option<Duration>,
	delays_at: Vec<(u64, Duration)>,
	failures: AtomicU64,
	hide_size_until_read: bool,
	size_known: AtomicBool,
}

impl TestReader {
	pub fn new(name: &str, data: Blob) -> TestReader {
		TestReader {
			name: name.to_string(),
			data,
			requests: Mutex::new(Vec::new()),
			delay: None,
			delays_at: Vec::new(),
			failures: AtomicU64::new(0),
			hide_size_until_read: false,
			size_known: AtomicBool::new(true),
		}
	}

	/// Sleeps before answering each request.
	#[must_use]
	pub fn with_delay(mut self, delay: Duration) -> TestReader {
		self.delay = Some(delay);
		self
	}

	/// Sleeps for `delay` instead before answering requests that start at `start`.
	#[must_use]
	pub fn with_delay_at(mut self, start: u64, delay: Duration) -> TestReader {
		self.delays_at.push((start, delay));
		self
	}

	/// Reports the resource length only after the first request, like an HTTP server.
	#[must_use]
	pub fn with_size_learned_on_read(mut self) -> TestReader {
		self.hide_size_until_read = true;
		self.size_known = AtomicBool::new(false);
		self
	}

	/// Lets the next `count` requests fail.
	pub fn fail_next(&self, count: u64) {
		self.failures.store(count, Ordering::SeqCst);
	}

	pub fn request_count(&self) -> usize {
		self.requests.lock().len()
	}

	pub fn requests(&self) -> Vec<ByteRange> {
		self.requests.lock().clone()
	}
}

#[async_trait]
impl DataReaderTrait for TestReader {
	async fn read_range(&self, range: &ByteRange) -> Result<Blob> {
		self.requests.lock().push(*range);
		let delay = self
			.delays_at
			.iter()
			.find(|(start, _)| *start == range.start)
			.map(|(_, delay)| *delay)
			.or(self.delay);
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		if self
			.failures
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok()
		{
			bail!("injected failure reading {range}");
		}
		self.size_known.store(true, Ordering::SeqCst);
		let range = range.resolve(self.data.len());
		Ok(self.data.slice(range.as_range_usize()))
	}

	fn size(&self) -> Option<u64> {
		(!self.hide_size_until_read || self.size_known.load(Ordering::SeqCst)).then_some(self.data.len())
	}

	fn get_name(&self) -> &str {
		&self.name
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn us_states_fixture() -> Result<()> {
		let builder = us_states_builder(4);
		let header = builder.header();
		assert_eq!(header.features_count, US_STATES.len() as u64);
		assert_eq!(header.features_count, 52);
		let envelope = header.envelope.unwrap();
		assert_eq!(envelope.min_x, -179.2);
		assert_eq!(envelope.max_y, 71.4);

		let blob = builder.build()?;
		assert_eq!(&blob.as_slice()[..8], &MAGIC);
		Ok(())
	}

	#[test]
	fn hawaii_is_isolated() {
		let hawaii = BoundingBox::new(-161.0, 18.5, -154.5, 22.5);
		let hits: Vec<&str> = US_STATES
			.iter()
			.filter(|(_, _, [a, b, c, d])| BoundingBox::new(*a, *b, *c, *d).intersects(&hawaii))
			.map(|(state, _, _)| *state)
			.collect();
		assert_eq!(hits, vec!["HI"]);
	}

	#[tokio::test]
	async fn test_reader_records_and_fails() -> Result<()> {
		let reader = TestReader::new("test", Blob::from("0123456789")).with_size_learned_on_read();
		assert_eq!(reader.size(), None);
		reader.fail_next(1);
		assert!(reader.read_range(&ByteRange::new(2, 4)).await.is_err());
		assert_eq!(reader.read_range(&ByteRange::new(2, 4)).await?.as_slice(), b"23");
		assert_eq!(reader.size(), Some(10));
		assert_eq!(reader.requests(), vec![ByteRange::new(2, 4), ByteRange::new(2, 4)]);
		Ok(())
	}

	#[test]
	fn bbox_of_geometries() {
		let polygon = Geometry::Polygon(rectangle([1.0, 2.0, 3.0, 4.0]));
		assert_eq!(geometry_bbox(&polygon), BoundingBox::new(1.0, 2.0, 3.0, 4.0));
	}
}
