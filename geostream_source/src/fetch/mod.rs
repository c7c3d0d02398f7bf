mod executor;
mod planner;
mod range_cache;

pub use executor::*;
pub use planner::*;
pub use range_cache::*;

pub(crate) use range_cache::fetch_with_timeout;
pub(crate) use executor::until_first_error;
