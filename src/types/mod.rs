//! Typed value variants (spec §3) and the derived-type engines built
//! atop the string encoding (spec §4.3).

mod bitmap;
mod hyperloglog;
mod object;
mod sorted_set;

pub use bitmap::*;
pub use hyperloglog::HyperLogLog;
pub use object::{HashValue, Value};
pub use sorted_set::SortedSet;
