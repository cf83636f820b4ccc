//! SQLite catalog implementation
//!
//! Stores and products are kept as JSON documents so the loosely-shaped
//! fiscal payloads survive round trips unchanged; name and id are lifted
//! into columns for ordering and lookups.

use async_trait::async_trait;
use fiscal_rules_domain::model::{FiscalProfile, IcmsSimplesMap, Product, Store};
use fiscal_rules_domain::ports::{Catalog, CatalogError};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::Value;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;

/// SQLite-backed product/store catalog
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Open or create the catalog database
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CatalogError::Storage(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| CatalogError::Storage(e.to_string()))?;

        let catalog = Self { pool };
        catalog.run_migrations().await?;

        Ok(catalog)
    }

    /// Create an in-memory catalog (for testing)
    pub async fn in_memory() -> Result<Self, CatalogError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CatalogError::Storage(e.to_string()))?;

        let catalog = Self { pool };
        catalog.run_migrations().await?;

        Ok(catalog)
    }

    async fn run_migrations(&self) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stores (
                id TEXT PRIMARY KEY,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                nome TEXT NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_products_nome ON products(nome)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS icms_simples (
                store_id TEXT NOT NULL,
                codigo INTEGER NOT NULL,
                valor REAL NOT NULL,
                PRIMARY KEY (store_id, codigo)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Insert or replace a store document
    pub async fn upsert_store(&self, store: &Store) -> Result<(), CatalogError> {
        let doc = serde_json::to_string(store)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO stores (id, doc) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET doc = excluded.doc
            "#,
        )
        .bind(&store.id)
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Insert or replace a product document
    pub async fn upsert_product(&self, product: &Product) -> Result<(), CatalogError> {
        let doc = serde_json::to_string(product)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO products (id, nome, doc) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET nome = excluded.nome, doc = excluded.doc
            "#,
        )
        .bind(&product.id)
        .bind(&product.nome)
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Set one ICMS-Simples table entry for a store
    pub async fn set_icms_simples(
        &self,
        store_id: &str,
        codigo: u8,
        valor: f64,
    ) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO icms_simples (store_id, codigo, valor) VALUES (?, ?, ?)
            ON CONFLICT(store_id, codigo) DO UPDATE SET valor = excluded.valor
            "#,
        )
        .bind(store_id)
        .bind(codigo as i64)
        .bind(valor)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn product_doc(&self, product_id: &str) -> Result<Option<String>, CatalogError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT doc FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.to_string()))?;
        Ok(row.map(|(doc,)| doc))
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn get_store(&self, store_id: &str) -> Result<Option<Store>, CatalogError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT doc FROM stores WHERE id = ?")
            .bind(store_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.to_string()))?;

        match row {
            Some((doc,)) => {
                let store = serde_json::from_str(&doc)
                    .map_err(|e| CatalogError::Serialization(e.to_string()))?;
                Ok(Some(store))
            }
            None => Ok(None),
        }
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>, CatalogError> {
        match self.product_doc(product_id).await? {
            Some(doc) => {
                let product = serde_json::from_str(&doc)
                    .map_err(|e| CatalogError::Serialization(e.to_string()))?;
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }

    fn stream_products(&self) -> BoxStream<'_, Result<Product, CatalogError>> {
        sqlx::query_as::<_, (String,)>("SELECT doc FROM products ORDER BY nome, id")
            .fetch(&self.pool)
            .map(|row| {
                let (doc,) = row.map_err(|e| CatalogError::Storage(e.to_string()))?;
                serde_json::from_str(&doc).map_err(|e| CatalogError::Serialization(e.to_string()))
            })
            .boxed()
    }

    async fn save_profile(
        &self,
        product_id: &str,
        store_key: Option<&str>,
        profile: &FiscalProfile,
    ) -> Result<(), CatalogError> {
        let doc = self
            .product_doc(product_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(product_id.to_string()))?;

        let mut doc: Value = serde_json::from_str(&doc)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        let slot = serde_json::to_value(profile)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        match store_key {
            Some(key) => doc["fiscalPorEmpresa"][key] = slot,
            None => doc["fiscal"] = slot,
        }

        let doc = serde_json::to_string(&doc)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        sqlx::query("UPDATE products SET doc = ? WHERE id = ?")
            .bind(&doc)
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn icms_simples(&self, store_id: &str) -> Result<IcmsSimplesMap, CatalogError> {
        let rows: Vec<(i64, f64)> =
            sqlx::query_as("SELECT codigo, valor FROM icms_simples WHERE store_id = ?")
                .bind(store_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| CatalogError::Storage(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(codigo, valor)| u8::try_from(codigo).ok().map(|c| (c, valor)))
            .collect())
    }
}
