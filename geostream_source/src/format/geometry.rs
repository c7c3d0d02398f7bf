//! Decoding of the recursive geometry encoding into `geo_types` geometries.

use super::GeometryType;
use anyhow::{Result, bail, ensure};
use geo_types::{
	Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};
use geostream_core::{GeoStreamError, io::ValueReader};

const MAX_DEPTH: usize = 16;

fn invalid(message: String) -> GeoStreamError {
	GeoStreamError::InvalidFormat(message)
}

/// Decodes one geometry, including all of its parts.
pub fn decode_geometry(reader: &mut ValueReader) -> Result<Geometry<f64>> {
	decode_part(reader, 0)
}

fn decode_part(reader: &mut ValueReader, depth: usize) -> Result<Geometry<f64>> {
	ensure!(depth < MAX_DEPTH, invalid(format!("geometry nesting deeper than {MAX_DEPTH}")));

	let geometry_type = GeometryType::from_u8(reader.read_u8()?)?;
	let part_count = reader.read_varint()?;

	if part_count > 0 {
		ensure!(
			part_count <= reader.remaining(),
			invalid(format!("geometry claims {part_count} parts in {} bytes", reader.remaining()))
		);
		let mut parts = Vec::with_capacity(part_count as usize);
		for _ in 0..part_count {
			parts.push(decode_part(reader, depth + 1)?);
		}
		return combine_parts(geometry_type, parts);
	}

	let ends = read_ends(reader)?;
	let coords = read_coords(reader)?;
	if let Some(last) = ends.last() {
		ensure!(
			*last as usize == coords.len(),
			invalid(format!("geometry ends at {last} but has {} points", coords.len()))
		);
	}

	use GeometryType as G;
	Ok(match geometry_type {
		G::Point => match coords.as_slice() {
			[coord] => Geometry::Point(Point(*coord)),
			_ => bail!(invalid(format!("point with {} coordinates", coords.len()))),
		},
		G::MultiPoint => Geometry::MultiPoint(MultiPoint(coords.into_iter().map(Point).collect())),
		G::LineString => Geometry::LineString(LineString(coords)),
		G::MultiLineString => Geometry::MultiLineString(MultiLineString(split(coords, &ends))),
		G::Polygon => Geometry::Polygon(polygon(split(coords, &ends))?),
		G::MultiPolygon => Geometry::MultiPolygon(MultiPolygon(vec![polygon(split(coords, &ends))?])),
		G::Unknown | G::GeometryCollection => {
			bail!(invalid(format!("{geometry_type} geometry without parts")))
		}
	})
}

fn combine_parts(geometry_type: GeometryType, parts: Vec<Geometry<f64>>) -> Result<Geometry<f64>> {
	use GeometryType as G;
	Ok(match geometry_type {
		G::GeometryCollection => Geometry::GeometryCollection(GeometryCollection(parts)),
		G::MultiPolygon => Geometry::MultiPolygon(MultiPolygon(
			parts
				.into_iter()
				.map(|part| match part {
					Geometry::Polygon(polygon) => Ok(polygon),
					other => bail!(invalid(format!("multipolygon part is not a polygon: {other:?}"))),
				})
				.collect::<Result<_>>()?,
		)),
		G::MultiLineString => Geometry::MultiLineString(MultiLineString(
			parts
				.into_iter()
				.map(|part| match part {
					Geometry::LineString(line) => Ok(line),
					other => bail!(invalid(format!("multilinestring part is not a linestring: {other:?}"))),
				})
				.collect::<Result<_>>()?,
		)),
		G::MultiPoint => Geometry::MultiPoint(MultiPoint(
			parts
				.into_iter()
				.map(|part| match part {
					Geometry::Point(point) => Ok(point),
					other => bail!(invalid(format!("multipoint part is not a point: {other:?}"))),
				})
				.collect::<Result<_>>()?,
		)),
		_ => bail!(invalid(format!("{geometry_type} geometry cannot have parts"))),
	})
}

fn read_ends(reader: &mut ValueReader) -> Result<Vec<u64>> {
	let count = reader.read_varint()?;
	ensure!(
		count <= reader.remaining(),
		invalid(format!("geometry claims {count} ends in {} bytes", reader.remaining()))
	);
	let mut ends = Vec::with_capacity(count as usize);
	let mut previous = 0;
	for _ in 0..count {
		let end = reader.read_varint()?;
		ensure!(end >= previous, invalid(format!("geometry ends are not ascending: {end} after {previous}")));
		previous = end;
		ends.push(end);
	}
	Ok(ends)
}

fn read_coords(reader: &mut ValueReader) -> Result<Vec<Coord<f64>>> {
	let count = reader.read_varint()?;
	ensure!(
		count.saturating_mul(16) <= reader.remaining(),
		invalid(format!("geometry claims {count} points in {} bytes", reader.remaining()))
	);
	let mut coords = Vec::with_capacity(count as usize);
	for _ in 0..count {
		coords.push(Coord {
			x: reader.read_f64()?,
			y: reader.read_f64()?,
		});
	}
	Ok(coords)
}

/// Splits coordinates at the cumulative `ends`. No ends means a single sequence.
fn split(coords: Vec<Coord<f64>>, ends: &[u64]) -> Vec<LineString<f64>> {
	if ends.len() <= 1 {
		return vec![LineString(coords)];
	}
	let mut lines = Vec::with_capacity(ends.len());
	let mut start = 0;
	for end in ends {
		let end = *end as usize;
		lines.push(LineString(coords[start..end].to_vec()));
		start = end;
	}
	lines
}

fn polygon(mut rings: Vec<LineString<f64>>) -> Result<Polygon<f64>> {
	ensure!(!rings.is_empty(), invalid("polygon without rings".to_string()));
	let exterior = rings.remove(0);
	Ok(Polygon::new(exterior, rings))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::encode_geometry;
	use geo_types::{coord, line_string, point, polygon};

	fn round_trip(geometry: &Geometry<f64>) -> Geometry<f64> {
		let blob = encode_geometry(geometry).unwrap();
		let mut reader = ValueReader::new(blob.as_slice());
		let decoded = decode_geometry(&mut reader).unwrap();
		assert!(!reader.has_remaining());
		decoded
	}

	#[test]
	fn simple_geometries() {
		let point: Geometry<f64> = point!(x: -157.8, y: 21.3).into();
		assert_eq!(round_trip(&point), point);

		let line: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 2.0, y: 0.0)].into();
		assert_eq!(round_trip(&line), line);
	}

	#[test]
	fn polygon_with_hole() {
		let polygon: Geometry<f64> = polygon!(
			exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 0.0)],
			interiors: [[(x: 2.0, y: 2.0), (x: 3.0, y: 2.0), (x: 3.0, y: 3.0), (x: 2.0, y: 2.0)]]
		)
		.into();
		assert_eq!(round_trip(&polygon), polygon);
	}

	#[test]
	fn multipolygon_and_collection() {
		let square = |x: f64| polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 0.0)];
		let islands: Geometry<f64> = MultiPolygon(vec![square(0.0), square(5.0), square(9.0)]).into();
		assert_eq!(round_trip(&islands), islands);

		let collection: Geometry<f64> = GeometryCollection(vec![
			point!(x: 1.0, y: 2.0).into(),
			line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)].into(),
			islands,
		])
		.into();
		assert_eq!(round_trip(&collection), collection);
	}

	#[test]
	fn multilinestring_split_by_ends() {
		let lines: Geometry<f64> = MultiLineString(vec![
			line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
			line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 6.0), (x: 7.0, y: 5.0)],
		])
		.into();
		assert_eq!(round_trip(&lines), lines);
	}

	#[test]
	fn point_with_two_coordinates_is_invalid() {
		// type Point, no parts, no ends, two coordinates
		let mut bytes = vec![1, 0, 0, 2];
		for value in [1.0f64, 2.0, 3.0, 4.0] {
			bytes.extend_from_slice(&value.to_le_bytes());
		}
		let err = decode_geometry(&mut ValueReader::new(&bytes)).unwrap_err();
		assert!(matches!(
			GeoStreamError::classify(&err),
			Some(GeoStreamError::InvalidFormat(_))
		));
	}

	#[test]
	fn huge_point_count_is_rejected_before_allocating() {
		// type LineString, no parts, no ends, 2^40 coordinates
		let bytes = [2, 0, 0, 0x80, 0x80, 0x80, 0x80, 0x80, 0x20];
		assert!(decode_geometry(&mut ValueReader::new(&bytes)).is_err());
	}

	#[test]
	fn coordinates_survive() {
		let point: Geometry<f64> = Point(coord! { x: 1.5, y: -2.25 }).into();
		assert_eq!(round_trip(&point), point);
	}
}
