//! The binary dataset format.
//!
//! ```text
//! magic (8 bytes) | u32 header length | header block | packed R-tree | features...
//! ```
//!
//! Every feature is a `u32` size prefix followed by its encoded geometry and properties. All
//! numbers are little-endian.

mod decoder;
mod geometry;
mod header;
mod layout;
mod packed_rtree;
mod value;

pub use decoder::*;
pub use geometry::*;
pub use header::*;
pub use layout::*;
pub use packed_rtree::*;
pub use value::*;
