//! Read-only catalog view used to revalidate state after a yield

/// Existence checks for catalog objects referenced by a plan
pub trait CatalogView {
    /// False once the collection has been dropped
    fn collection_exists(&self) -> bool;

    /// False once the named index has been dropped
    fn index_exists(&self, name: &str) -> bool;
}
