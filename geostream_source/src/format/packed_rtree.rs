//! Read-only packed Hilbert R-tree, searched directly on its byte buffer.

use super::IndexLayout;
use anyhow::{Result, ensure};
use byteorder::{ByteOrder, LittleEndian};
use geostream_core::{Blob, BoundingBox, GeoStreamError};
use std::fmt;

/// One node as stored in the index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeItem {
	pub bbox: BoundingBox,
	/// For leaves: byte offset of the feature in the feature-data section. For internal
	/// nodes: index of the first child node.
	pub offset: u64,
}

impl NodeItem {
	pub fn from_bytes(bytes: &[u8]) -> NodeItem {
		NodeItem {
			bbox: BoundingBox::new(
				LittleEndian::read_f64(&bytes[0..8]),
				LittleEndian::read_f64(&bytes[8..16]),
				LittleEndian::read_f64(&bytes[16..24]),
				LittleEndian::read_f64(&bytes[24..32]),
			),
			offset: LittleEndian::read_u64(&bytes[32..40]),
		}
	}

	pub fn write_to(&self, bytes: &mut [u8]) {
		let [min_x, min_y, max_x, max_y] = self.bbox.as_array();
		LittleEndian::write_f64(&mut bytes[0..8], min_x);
		LittleEndian::write_f64(&mut bytes[8..16], min_y);
		LittleEndian::write_f64(&mut bytes[16..24], max_x);
		LittleEndian::write_f64(&mut bytes[24..32], max_y);
		LittleEndian::write_u64(&mut bytes[32..40], self.offset);
	}
}

/// A feature found by [`PackedRTree::search`].
///
/// `offset` is relative to the start of the feature-data section. `length` includes the size
/// prefix and is `None` only for the last feature of the file.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SearchHit {
	pub offset: u64,
	pub length: Option<u64>,
}

impl SearchHit {
	pub fn new(offset: u64, length: Option<u64>) -> Self {
		SearchHit { offset, length }
	}
}

pub struct PackedRTree {
	blob: Blob,
	layout: IndexLayout,
}

impl PackedRTree {
	pub fn from_blob(blob: Blob, layout: IndexLayout) -> Result<PackedRTree> {
		ensure!(
			blob.len() == layout.total_bytes(),
			GeoStreamError::InvalidFormat(format!(
				"index has {} bytes, expected {} for {} features",
				blob.len(),
				layout.total_bytes(),
				layout.feature_count()
			))
		);
		Ok(PackedRTree { blob, layout })
	}

	pub fn layout(&self) -> &IndexLayout {
		&self.layout
	}

	pub fn byte_length(&self) -> u64 {
		self.blob.len()
	}

	/// Envelope of the root node, `None` for an empty tree.
	pub fn bounds(&self) -> Option<BoundingBox> {
		if self.layout.is_empty() {
			None
		} else {
			Some(self.node(0).bbox)
		}
	}

	pub fn node(&self, index: u64) -> NodeItem {
		NodeItem::from_bytes(self.blob.range(self.layout.node_byte_range(index)))
	}

	fn leaf_length(&self, index: u64, offset: u64) -> Option<u64> {
		if index + 1 < self.layout.node_count() {
			Some(self.node(index + 1).offset.saturating_sub(offset))
		} else {
			None
		}
	}

	/// Returns every leaf whose envelope intersects `bbox`, in no particular order.
	pub fn search(&self, bbox: &BoundingBox) -> Vec<SearchHit> {
		let mut hits = Vec::new();
		if self.layout.is_empty() || bbox.is_degenerate() {
			return hits;
		}

		let level_bounds = self.layout.level_bounds();
		let node_size = u64::from(self.layout.node_size());
		let leaves_start = self.layout.leaves().start;

		let mut stack = vec![(0u64, level_bounds.len() - 1)];
		while let Some((first, level)) = stack.pop() {
			let end = (first + node_size).min(level_bounds[level].end);
			for index in first..end {
				let node = self.node(index);
				if !bbox.intersects(&node.bbox) {
					continue;
				}
				if index >= leaves_start {
					hits.push(SearchHit::new(node.offset, self.leaf_length(index, node.offset)));
				} else if level > 0 && level_bounds[level - 1].contains(&node.offset) {
					stack.push((node.offset, level - 1));
				} else {
					log::warn!("index node {index} points to invalid child {}", node.offset);
				}
			}
		}

		hits
	}
}

impl fmt::Debug for PackedRTree {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PackedRTree")
			.field("features", &self.layout.feature_count())
			.field("node_size", &self.layout.node_size())
			.field("bytes", &self.byte_length())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::build_index;

	fn grid_boxes(n: usize) -> Vec<BoundingBox> {
		(0..n)
			.map(|i| {
				let x = (i % 10) as f64;
				let y = (i / 10) as f64;
				BoundingBox::new(x, y, x + 0.5, y + 0.5)
			})
			.collect()
	}

	fn grid_tree(n: usize, node_size: u16) -> (PackedRTree, Vec<u64>) {
		let boxes = grid_boxes(n);
		// every feature is 100 bytes long
		let offsets: Vec<u64> = (0..n as u64).map(|i| i * 100).collect();
		let (blob, layout) = build_index(&boxes, &offsets, node_size).unwrap();
		(PackedRTree::from_blob(blob, layout).unwrap(), offsets)
	}

	fn brute_force(boxes: &[BoundingBox], offsets: &[u64], query: &BoundingBox) -> Vec<u64> {
		let mut result: Vec<u64> = boxes
			.iter()
			.zip(offsets)
			.filter(|(b, _)| b.intersects(query))
			.map(|(_, o)| *o)
			.collect();
		result.sort_unstable();
		result
	}

	#[test]
	fn search_matches_brute_force() {
		let (tree, offsets) = grid_tree(95, 4);
		let boxes = grid_boxes(95);
		for query in [
			BoundingBox::new(2.2, 3.2, 4.7, 5.1),
			BoundingBox::new(-10.0, -10.0, 100.0, 100.0),
			BoundingBox::new(9.6, 0.0, 20.0, 20.0),
			BoundingBox::new(0.25, 0.25, 0.3, 0.3),
		] {
			let mut found: Vec<u64> = tree.search(&query).iter().map(|h| h.offset).collect();
			found.sort_unstable();
			assert_eq!(found, brute_force(&boxes, &offsets, &query), "query {query:?}");
		}
	}

	#[test]
	fn lengths_follow_next_leaf() {
		let (tree, _) = grid_tree(12, 16);
		let mut hits = tree.search(&BoundingBox::new(-1.0, -1.0, 100.0, 100.0));
		hits.sort();
		assert_eq!(hits.len(), 12);
		assert!(hits[..11].iter().all(|h| h.length == Some(100)));
		assert_eq!(hits[11], SearchHit::new(1100, None));
	}

	#[test]
	fn degenerate_query_is_empty() {
		let (tree, _) = grid_tree(20, 4);
		assert!(tree.search(&BoundingBox::new(1.0, 1.0, 1.0, 5.0)).is_empty());
		assert!(tree.search(&BoundingBox::new(3.0, 1.0, 1.0, 5.0)).is_empty());
	}

	#[test]
	fn bounds_of_root() {
		let (tree, _) = grid_tree(30, 4);
		assert_eq!(tree.bounds(), Some(BoundingBox::new(0.0, 0.0, 9.5, 2.5)));
		assert_eq!(tree.byte_length(), tree.layout().total_bytes());
	}

	#[test]
	fn single_feature() {
		let (tree, _) = grid_tree(1, 16);
		let hits = tree.search(&BoundingBox::new(0.0, 0.0, 1.0, 1.0));
		assert_eq!(hits, vec![SearchHit::new(0, None)]);
	}

	#[test]
	fn empty_tree() -> Result<()> {
		let tree = PackedRTree::from_blob(Blob::new_empty(), IndexLayout::new(0, 16)?)?;
		assert_eq!(tree.bounds(), None);
		assert!(tree.search(&BoundingBox::new(0.0, 0.0, 1.0, 1.0)).is_empty());
		Ok(())
	}

	#[test]
	fn wrong_buffer_size() -> Result<()> {
		let err = PackedRTree::from_blob(Blob::new_sized(79), IndexLayout::new(1, 16)?).unwrap_err();
		assert!(matches!(
			GeoStreamError::classify(&err),
			Some(GeoStreamError::InvalidFormat(_))
		));
		Ok(())
	}
}
