//! Collection catalog
//!
//! Planning runs under the caller's lock scope and acquires no locks of its
//! own. The only catalog state it consults after a yield is existence: a
//! dropped collection or index makes every plan that references it stale.

mod collection;
mod view;

pub use collection::{compare_keys, Collection, IndexKeyEntry, RecordId};
pub use view::CatalogView;
