mod options;
mod remote_source;
mod source_cache;

pub use options::*;
pub use remote_source::*;
pub use source_cache::*;
