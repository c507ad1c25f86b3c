//! Live product catalog access and name matching.

use axkan_types::catalog::CatalogItem;
use axkan_types::error::RepositoryError;

/// Read-only source of the active product catalog.
pub trait CatalogProvider: Send + Sync {
    /// Active products, ordered by category then name.
    fn list_products(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<CatalogItem>, RepositoryError>> + Send;
}

/// Find a catalog entry by name.
///
/// Tries a case-insensitive exact match first, then the first entry where
/// either name contains the other.
pub fn find_product<'a>(catalog: &'a [CatalogItem], name: &str) -> Option<&'a CatalogItem> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    if let Some(exact) = catalog.iter().find(|p| p.name.to_lowercase() == wanted) {
        return Some(exact);
    }

    catalog.iter().find(|p| {
        let candidate = p.name.to_lowercase();
        wanted.contains(&candidate) || candidate.contains(&wanted)
    })
}
