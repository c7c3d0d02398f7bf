//! Plain data types: byte buffers, byte ranges, byte sizes, bounding boxes and caches.

mod blob;
pub use blob::*;

mod bounding_box;
pub use bounding_box::*;

mod byte_range;
pub use byte_range::*;

mod byte_size;
pub use byte_size::*;

mod weighted_lru_cache;
pub use weighted_lru_cache::*;
