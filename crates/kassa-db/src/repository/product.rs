//! # Product Repository
//!
//! Catalog facts read at settlement time. The settlement pipeline never
//! writes here; `upsert` exists for catalog import and tests.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use kassa_core::CatalogProduct;

/// Repository for catalog lookups.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Finds an active product by the id the front-end sends in
    /// `OrderItem::product`.
    pub async fn find_by_legacy_id(&self, legacy_id: &str) -> DbResult<Option<CatalogProduct>> {
        let product = sqlx::query_as::<_, CatalogProduct>(
            r#"
            SELECT legacy_id, name, max_discount,
                   is_alcohol, is_marked, is_draught, is_bottled,
                   gtin, alc_code, egais_mark_code, barcode
            FROM products
            WHERE legacy_id = ?1 AND is_active = 1
            "#,
        )
        .bind(legacy_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts or replaces the settlement-relevant facts of a product.
    pub async fn upsert(&self, product: &CatalogProduct) -> DbResult<()> {
        debug!(legacy_id = %product.legacy_id, "Upserting catalog product");

        sqlx::query(
            r#"
            INSERT INTO products (
                legacy_id, name, max_discount,
                is_alcohol, is_marked, is_draught, is_bottled,
                gtin, alc_code, egais_mark_code, barcode
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(legacy_id) DO UPDATE SET
                name = excluded.name,
                max_discount = excluded.max_discount,
                is_alcohol = excluded.is_alcohol,
                is_marked = excluded.is_marked,
                is_draught = excluded.is_draught,
                is_bottled = excluded.is_bottled,
                gtin = excluded.gtin,
                alc_code = excluded.alc_code,
                egais_mark_code = excluded.egais_mark_code,
                barcode = excluded.barcode
            "#,
        )
        .bind(&product.legacy_id)
        .bind(&product.name)
        .bind(product.max_discount)
        .bind(product.is_alcohol)
        .bind(product.is_marked)
        .bind(product.is_draught)
        .bind(product.is_bottled)
        .bind(&product.gtin)
        .bind(&product.alc_code)
        .bind(&product.egais_mark_code)
        .bind(&product.barcode)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn draught_beer() -> CatalogProduct {
        CatalogProduct {
            legacy_id: "42".to_string(),
            name: "Пиво светлое разливное".to_string(),
            max_discount: 5,
            is_alcohol: true,
            is_marked: true,
            is_draught: true,
            is_bottled: false,
            gtin: Some("04600000000001".to_string()),
            alc_code: None,
            egais_mark_code: None,
            barcode: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.upsert(&draught_beer()).await.unwrap();
        let found = repo.find_by_legacy_id("42").await.unwrap();
        assert_eq!(found, Some(draught_beer()));

        let mut changed = draught_beer();
        changed.max_discount = 0;
        repo.upsert(&changed).await.unwrap();
        let found = repo.find_by_legacy_id("42").await.unwrap().unwrap();
        assert_eq!(found.max_discount, 0);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.products().find_by_legacy_id("nope").await.unwrap().is_none());
    }
}
