//! Product catalog entries supplied by the external product system.

use serde::{Deserialize, Serialize};

/// A sellable catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    /// Price per piece in MXN.
    pub price: f64,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Production cost per piece, the cost basis for margins.
    pub cost: f64,
    /// Public image URL, when the product has one to send.
    pub image_url: Option<String>,
}

impl CatalogItem {
    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}
