//! In-memory catalog for testing and dry runs

use async_trait::async_trait;
use fiscal_rules_domain::model::{FiscalProfile, IcmsSimplesMap, Product, Store};
use fiscal_rules_domain::ports::{Catalog, CatalogError};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Flat-file dataset: everything the catalog serves, in one JSON document
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Dataset {
    pub stores: Vec<Store>,
    pub products: Vec<Product>,
    pub icms_simples: BTreeMap<String, IcmsSimplesMap>,
}

/// In-memory catalog implementation
pub struct InMemoryCatalog {
    stores: RwLock<BTreeMap<String, Store>>,
    products: RwLock<BTreeMap<String, Product>>,
    icms: RwLock<BTreeMap<String, IcmsSimplesMap>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(BTreeMap::new()),
            products: RwLock::new(BTreeMap::new()),
            icms: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build a catalog preloaded from a dataset document
    pub fn from_dataset(dataset: Dataset) -> Self {
        let catalog = Self::new();
        {
            let mut stores = catalog.stores.write().unwrap();
            for store in dataset.stores {
                stores.insert(store.id.clone(), store);
            }
            let mut products = catalog.products.write().unwrap();
            for product in dataset.products {
                products.insert(product.id.clone(), product);
            }
            *catalog.icms.write().unwrap() = dataset.icms_simples;
        }
        catalog
    }

    pub fn insert_store(&self, store: Store) {
        self.stores.write().unwrap().insert(store.id.clone(), store);
    }

    pub fn insert_product(&self, product: Product) {
        self.products
            .write()
            .unwrap()
            .insert(product.id.clone(), product);
    }

    pub fn set_icms_simples(&self, store_id: &str, table: IcmsSimplesMap) {
        self.icms
            .write()
            .unwrap()
            .insert(store_id.to_string(), table);
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_store(&self, store_id: &str) -> Result<Option<Store>, CatalogError> {
        let stores = self
            .stores
            .read()
            .map_err(|e| CatalogError::Storage(e.to_string()))?;
        Ok(stores.get(store_id).cloned())
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>, CatalogError> {
        let products = self
            .products
            .read()
            .map_err(|e| CatalogError::Storage(e.to_string()))?;
        Ok(products.get(product_id).cloned())
    }

    fn stream_products(&self) -> BoxStream<'_, Result<Product, CatalogError>> {
        let snapshot = match self.products.read() {
            Ok(products) => {
                let mut products: Vec<Product> = products.values().cloned().collect();
                products.sort_by(|a, b| a.nome.cmp(&b.nome).then_with(|| a.id.cmp(&b.id)));
                products.into_iter().map(Ok).collect::<Vec<_>>()
            }
            Err(e) => vec![Err(CatalogError::Storage(e.to_string()))],
        };
        futures::stream::iter(snapshot).boxed()
    }

    async fn save_profile(
        &self,
        product_id: &str,
        store_key: Option<&str>,
        profile: &FiscalProfile,
    ) -> Result<(), CatalogError> {
        let mut products = self
            .products
            .write()
            .map_err(|e| CatalogError::Storage(e.to_string()))?;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| CatalogError::NotFound(product_id.to_string()))?;

        let patch = profile.to_patch();
        match store_key {
            Some(key) => {
                product.fiscal_por_empresa.insert(key.to_string(), patch);
            }
            None => product.fiscal = Some(patch),
        }
        Ok(())
    }

    async fn icms_simples(&self, store_id: &str) -> Result<IcmsSimplesMap, CatalogError> {
        let icms = self
            .icms
            .read()
            .map_err(|e| CatalogError::Storage(e.to_string()))?;
        Ok(icms.get(store_id).cloned().unwrap_or_default())
    }
}
