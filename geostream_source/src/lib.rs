//! Streaming access to remote binary geospatial datasets.
//!
//! A dataset is a single file: a header with the column schema, a packed R-tree and the
//! length-prefixed features. Opening a [`Source`] reads header and index; queries then fetch only
//! the byte ranges of the features they need, through a paged, deduplicating cache.
//!
//! # Quick start
//! ```no_run
//! use futures::TryStreamExt;
//! use geostream_core::BoundingBox;
//! use geostream_source::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sources = SourceCache::new(256 * 1024 * 1024, SourceOptions::default());
//!     let source = sources.get("https://example.org/us_states.gsb", None).await?;
//!
//!     let hawaii = BoundingBox::new(-161.0, 18.5, -154.5, 22.5);
//!     let features: Vec<Feature> = source
//!         .get_features(&[hawaii], FeatureQueryOptions::default())?
//!         .try_collect()
//!         .await?;
//!     for feature in features {
//!         println!("{} {}", feature.offset, feature.properties);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//! - `test`: the [`testing`] module with a dataset builder and an instrumented reader.

pub mod fetch;
pub use fetch::{CacheStats, QueryPlanRequest, RangeCache, execute_plan, plan_requests};

pub mod format;
pub use format::{Feature, GeometryType, Header, Properties, PropertyRecord, Value};

mod source;
pub use source::*;

#[cfg(any(test, feature = "test"))]
pub mod testing;
