//! An axis aligned bounding box in dataset coordinates.

use anyhow::{Result, ensure};
use std::fmt::{self, Debug};

/// A rectangle `[min_x, max_x] x [min_y, max_y]`.
///
/// ```rust
/// use geostream_core::BoundingBox;
///
/// let hawaii = BoundingBox::new(-161.0, 18.5, -154.5, 22.5);
/// let alaska = BoundingBox::new(-180.0, 51.0, -129.0, 71.5);
/// assert!(!hawaii.intersects(&alaska));
/// assert!(hawaii.intersects(&BoundingBox::new(-160.0, 19.0, -150.0, 30.0)));
/// ```
#[derive(Clone, Copy, PartialEq)]
pub struct BoundingBox {
	pub min_x: f64,
	pub min_y: f64,
	pub max_x: f64,
	pub max_y: f64,
}

impl BoundingBox {
	#[must_use]
	pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
		Self {
			min_x,
			min_y,
			max_x,
			max_y,
		}
	}

	/// The "nothing" box: extending it with any other box yields that box.
	#[must_use]
	pub fn new_empty() -> Self {
		Self::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY)
	}

	/// Returns `true` if the two boxes overlap or touch.
	#[must_use]
	pub fn intersects(&self, other: &BoundingBox) -> bool {
		!(self.max_x < other.min_x || self.max_y < other.min_y || self.min_x > other.max_x || self.min_y > other.max_y)
	}

	/// Returns `true` if the box has no area: zero or negative width or height, or NaN bounds.
	#[must_use]
	pub fn is_degenerate(&self) -> bool {
		!(self.max_x > self.min_x && self.max_y > self.min_y)
	}

	/// Grows this box to also cover `other`.
	pub fn extend(&mut self, other: &BoundingBox) {
		self.min_x = self.min_x.min(other.min_x);
		self.min_y = self.min_y.min(other.min_y);
		self.max_x = self.max_x.max(other.max_x);
		self.max_y = self.max_y.max(other.max_y);
	}

	#[must_use]
	pub fn as_array(&self) -> [f64; 4] {
		[self.min_x, self.min_y, self.max_x, self.max_y]
	}
}

impl TryFrom<&str> for BoundingBox {
	type Error = anyhow::Error;

	/// Parses `"min_x,min_y,max_x,max_y"`.
	fn try_from(value: &str) -> Result<Self> {
		let numbers = value
			.split(',')
			.map(|part| part.trim().parse::<f64>())
			.collect::<Result<Vec<f64>, _>>()
			.map_err(|e| anyhow::anyhow!("invalid bbox '{value}': {e}"))?;
		ensure!(
			numbers.len() == 4,
			"invalid bbox '{value}': expected 4 comma separated numbers, got {}",
			numbers.len()
		);
		Ok(BoundingBox::new(numbers[0], numbers[1], numbers[2], numbers[3]))
	}
}

impl Debug for BoundingBox {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}, {}, {}, {}]", self.min_x, self.min_y, self.max_x, self.max_y)
	}
}
