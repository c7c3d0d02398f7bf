pub mod info;
pub mod query;
pub mod scan;
pub mod stats;

mod source_args;
pub use source_args::SourceArgs;
