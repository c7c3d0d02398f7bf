//! Byte layout of the packed R-tree: a pure function of the feature count and the branching
//! factor.

use anyhow::{Result, bail};
use geostream_core::GeoStreamError;
use std::ops::Range;

/// Four `f64` bounds and one `u64` offset.
pub const NODE_BYTE_SIZE: u64 = 40;

/// Node counts and node index ranges of every tree level.
///
/// Level 0 holds the leaves and the last level holds the root. In the byte buffer the levels
/// are stored root first, so the root is node 0 and the leaves are the final `feature_count`
/// nodes.
///
/// ```rust
/// use geostream_source::format::IndexLayout;
///
/// let layout = IndexLayout::new(100, 16).unwrap();
/// assert_eq!(layout.level_bounds(), &[8..108, 1..8, 0..1]);
/// assert_eq!(layout.total_bytes(), 108 * 40);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexLayout {
	feature_count: u64,
	node_size: u16,
	node_count: u64,
	level_bounds: Vec<Range<u64>>,
}

impl IndexLayout {
	pub fn new(feature_count: u64, node_size: u16) -> Result<IndexLayout> {
		match node_size {
			0 => bail!(GeoStreamError::InvalidFormat(
				"dataset has no spatial index (node size 0)".to_string()
			)),
			1 => bail!(GeoStreamError::InvalidFormat(
				"index node size 1 cannot form a tree".to_string()
			)),
			_ => {}
		}

		if feature_count == 0 {
			return Ok(IndexLayout {
				feature_count,
				node_size,
				node_count: 0,
				level_bounds: Vec::new(),
			});
		}

		let branching = u64::from(node_size);
		let mut level_sizes = vec![feature_count];
		let mut n = feature_count;
		loop {
			n = n.div_ceil(branching);
			level_sizes.push(n);
			if n == 1 {
				break;
			}
		}

		let node_count = level_sizes
			.iter()
			.try_fold(0u64, |sum, size| sum.checked_add(*size))
			.filter(|count| count.checked_mul(NODE_BYTE_SIZE).is_some())
			.ok_or_else(|| {
				GeoStreamError::InvalidFormat(format!("index size of {feature_count} features overflows"))
			})?;
		let mut end = node_count;
		let level_bounds = level_sizes
			.iter()
			.map(|size| {
				let start = end - size;
				let bounds = start..end;
				end = start;
				bounds
			})
			.collect();

		Ok(IndexLayout {
			feature_count,
			node_size,
			node_count,
			level_bounds,
		})
	}

	/// Width of one node in the byte buffer.
	pub fn node_byte_size(&self) -> u64 {
		NODE_BYTE_SIZE
	}

	pub fn total_bytes(&self) -> u64 {
		self.node_count * self.node_byte_size()
	}

	/// Byte range of node `index` inside the index buffer.
	pub fn node_byte_range(&self, index: u64) -> Range<usize> {
		let start = index * self.node_byte_size();
		start as usize..(start + self.node_byte_size()) as usize
	}

	pub fn node_count(&self) -> u64 {
		self.node_count
	}

	pub fn feature_count(&self) -> u64 {
		self.feature_count
	}

	pub fn node_size(&self) -> u16 {
		self.node_size
	}

	/// Node index ranges per level, leaves first.
	pub fn level_bounds(&self) -> &[Range<u64>] {
		&self.level_bounds
	}

	pub fn is_empty(&self) -> bool {
		self.node_count == 0
	}

	/// Node index range of the leaves.
	pub fn leaves(&self) -> Range<u64> {
		self.level_bounds.first().cloned().unwrap_or(0..0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(1, 16, 2)]
	#[case(2, 2, 3)]
	#[case(16, 16, 17)]
	#[case(17, 16, 20)]
	#[case(52, 16, 57)]
	#[case(256, 16, 273)]
	#[case(257, 16, 277)]
	#[case(1000, 2, 2001)]
	fn node_counts(#[case] features: u64, #[case] node_size: u16, #[case] nodes: u64) -> Result<()> {
		let layout = IndexLayout::new(features, node_size)?;
		assert_eq!(layout.node_count(), nodes);
		assert_eq!(layout.total_bytes(), nodes * 40);
		Ok(())
	}

	#[test]
	fn levels_are_stored_root_first() -> Result<()> {
		let layout = IndexLayout::new(17, 16)?;
		assert_eq!(layout.level_bounds(), &[3..20, 1..3, 0..1]);
		assert_eq!(layout.leaves(), 3..20);
		assert_eq!(layout.node_byte_size(), 40);
		assert_eq!(layout.node_byte_range(3), 120..160);
		Ok(())
	}

	#[test]
	fn single_feature_still_has_a_root() -> Result<()> {
		let layout = IndexLayout::new(1, 16)?;
		assert_eq!(layout.level_bounds(), &[1..2, 0..1]);
		Ok(())
	}

	#[test]
	fn empty_dataset() -> Result<()> {
		let layout = IndexLayout::new(0, 16)?;
		assert!(layout.is_empty());
		assert_eq!(layout.total_bytes(), 0);
		assert!(layout.level_bounds().is_empty());
		assert_eq!(layout.leaves(), 0..0);
		Ok(())
	}

	#[rstest]
	#[case(u64::MAX, 2)]
	#[case(1 << 60, 16)]
	fn oversized_feature_count(#[case] features: u64, #[case] node_size: u16) {
		let err = IndexLayout::new(features, node_size).unwrap_err();
		assert!(matches!(
			GeoStreamError::classify(&err),
			Some(GeoStreamError::InvalidFormat(_))
		));
		assert!(err.to_string().contains("overflows"));
	}

	#[test]
	fn largest_addressable_index() -> Result<()> {
		let layout = IndexLayout::new(1 << 55, 16)?;
		assert!(layout.total_bytes() > 1 << 55);
		Ok(())
	}

	#[rstest]
	#[case(0)]
	#[case(1)]
	fn invalid_node_size(#[case] node_size: u16) {
		let err = IndexLayout::new(10, node_size).unwrap_err();
		assert!(matches!(
			GeoStreamError::classify(&err),
			Some(GeoStreamError::InvalidFormat(_))
		));
	}
}
