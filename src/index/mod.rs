//! Index descriptors, catalog and bounds
//!
//! The catalog is an ordered list of `IndexEntry`. Ordinals follow
//! declaration order and are what index tags refer to; a name → ordinal
//! map is built once per planning attempt and shared by all branches.

mod bounds;
mod entry;
mod key_pattern;

pub use bounds::{Endpoint, IndexBounds, Interval, OrderedIntervalList};
pub use entry::{IndexCatalog, IndexEntry, IndexMap};
pub use key_pattern::{SortDirection, SortPattern, SortSpec};
