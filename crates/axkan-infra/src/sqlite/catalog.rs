//! SQLite catalog provider: the live `products` table.

use axkan_core::catalog::CatalogProvider;
use axkan_types::catalog::CatalogItem;
use axkan_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;
use super::query_err;

/// Reads active products on every call so prompt and costing always see
/// the current catalog.
pub struct SqliteCatalogProvider {
    pool: DatabasePool,
}

impl SqliteCatalogProvider {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl CatalogProvider for SqliteCatalogProvider {
    async fn list_products(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT name, base_price, description, category, production_cost, image_url
               FROM products
               WHERE is_active = 1
               ORDER BY category, name"#,
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| {
                Ok(CatalogItem {
                    name: row.try_get("name")?,
                    price: row.try_get("base_price")?,
                    description: row.try_get("description")?,
                    category: row.try_get("category")?,
                    cost: row.try_get("production_cost")?,
                    image_url: row.try_get("image_url")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(query_err)
    }
}
