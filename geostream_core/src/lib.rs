//! Building blocks shared by the geostream crates: byte buffers and ranges, size parsing,
//! a byte-weighted LRU cache, the error taxonomy, data readers and the configuration layer.

pub mod config;
pub use config::*;

mod error;
pub use error::*;

pub mod io;

pub mod types;
pub use types::*;
