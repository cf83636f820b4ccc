//! Review listing use case: filtered, paginated compliance reports

use std::str::FromStr;
use std::sync::Arc;

use futures::TryStreamExt;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::model::{FiscalStatus, Modalidade, Product, Store, current_profile};
use crate::ports::{Catalog, CatalogError};
use crate::report::{ComplianceReport, build_report};
use crate::rules::RuleSet;

/// Error type for report operations
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Store not found: {0}")]
    StoreNotFound(String),
    #[error("Product not found: {0}")]
    ProductNotFound(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Listing filter: modality for the status axis, optional status, free-text
/// search over name, internal code and barcode
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub modalidade: Modalidade,
    pub status: Option<FiscalStatus>,
    pub search: String,
}

impl ReportFilter {
    /// Build a filter from loosely-typed query-style inputs.
    /// A status outside the known set is ignored, never coerced: a typo in
    /// a filter must not silently select the pending products.
    pub fn parse(modalidade: Option<&str>, status: Option<&str>, search: Option<&str>) -> Self {
        let status = status.and_then(|s| match s.trim().to_lowercase().as_str() {
            "pendente" => Some(FiscalStatus::Pendente),
            "parcial" => Some(FiscalStatus::Parcial),
            "aprovado" => Some(FiscalStatus::Aprovado),
            _ => None,
        });
        Self {
            modalidade: modalidade
                .map(|m| Modalidade::from_str(m).unwrap_or_default())
                .unwrap_or_default(),
            status,
            search: search.unwrap_or_default().trim().to_string(),
        }
    }
}

/// Whether a product passes the listing filter for one store.
///
/// The status axis is evaluated on the CURRENT profile, not the suggestion:
/// the listing answers "what still needs review", and a product whose stored
/// classification is pending stays pending until someone applies something.
pub fn matches_filter(product: &Product, store: &Store, filter: &ReportFilter) -> bool {
    if !filter.search.is_empty() {
        let needle = filter.search.to_lowercase();
        let hit = product.nome.to_lowercase().contains(&needle)
            || product.cod.to_lowercase().contains(&needle)
            || product.codbarras.to_lowercase().contains(&needle);
        if !hit {
            return false;
        }
    }

    if let Some(wanted) = filter.status {
        let current = current_profile(product, &store.id);
        if current.status.get(filter.modalidade) != wanted {
            return false;
        }
    }

    true
}

/// One page of compliance reports
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
    pub reports: Vec<ComplianceReport>,
}

/// Builds compliance reports against an injected rule table
pub struct ReportUseCase<C: Catalog + ?Sized> {
    catalog: Arc<C>,
    ruleset: RuleSet,
}

impl<C: Catalog + ?Sized> ReportUseCase<C> {
    pub fn new(catalog: Arc<C>, ruleset: RuleSet) -> Self {
        Self { catalog, ruleset }
    }

    async fn store(&self, store_id: &str) -> Result<Store, ReportError> {
        self.catalog
            .get_store(store_id)
            .await?
            .ok_or_else(|| ReportError::StoreNotFound(store_id.to_string()))
    }

    /// Full report for a single product/store pair
    pub async fn product_report(
        &self,
        store_id: &str,
        product_id: &str,
    ) -> Result<ComplianceReport, ReportError> {
        let store = self.store(store_id).await?;
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| ReportError::ProductNotFound(product_id.to_string()))?;
        let icms = self.catalog.icms_simples(store_id).await?;
        let icms = (!icms.is_empty()).then_some(icms);

        let report = build_report(&product, &store, &self.ruleset, icms.as_ref());
        debug!(
            product_id,
            store_id,
            divergencias = report.divergencias.len(),
            "Built compliance report"
        );
        Ok(report)
    }

    /// Filtered, paginated listing. Streams the whole catalog once, counting
    /// every match so `total` is exact, but only builds reports for the
    /// requested window. Pages are 1-based.
    pub async fn page(
        &self,
        store_id: &str,
        filter: &ReportFilter,
        page: usize,
        limit: usize,
    ) -> Result<ReportPage, ReportError> {
        let store = self.store(store_id).await?;
        let icms = self.catalog.icms_simples(store_id).await?;
        let icms = (!icms.is_empty()).then_some(icms);

        let page = page.max(1);
        let limit = limit.max(1);
        let skip = (page - 1) * limit;

        let mut total = 0usize;
        let mut reports = Vec::new();
        let mut products = self.catalog.stream_products();
        while let Some(product) = products.try_next().await? {
            if !matches_filter(&product, &store, filter) {
                continue;
            }
            if total >= skip && reports.len() < limit {
                reports.push(build_report(&product, &store, &self.ruleset, icms.as_ref()));
            }
            total += 1;
        }
        drop(products);

        debug!(store_id, total, page, "Listed compliance reports");
        Ok(ReportPage {
            page,
            limit,
            total,
            // an empty listing still reports one page
            pages: total.div_ceil(limit).max(1),
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FiscalProfile, IcmsSimplesMap};
    use crate::patch::ProfilePatch;
    use async_trait::async_trait;
    use futures::StreamExt;
    use futures::stream::BoxStream;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct FakeCatalog {
        stores: BTreeMap<String, Store>,
        products: Mutex<BTreeMap<String, Product>>,
        icms: IcmsSimplesMap,
    }

    impl FakeCatalog {
        fn new(stores: Vec<Store>, products: Vec<Product>) -> Self {
            Self {
                stores: stores.into_iter().map(|s| (s.id.clone(), s)).collect(),
                products: Mutex::new(
                    products.into_iter().map(|p| (p.id.clone(), p)).collect(),
                ),
                icms: IcmsSimplesMap::new(),
            }
        }
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        async fn get_store(&self, store_id: &str) -> Result<Option<Store>, CatalogError> {
            Ok(self.stores.get(store_id).cloned())
        }

        async fn get_product(&self, product_id: &str) -> Result<Option<Product>, CatalogError> {
            Ok(self.products.lock().unwrap().get(product_id).cloned())
        }

        fn stream_products(&self) -> BoxStream<'_, Result<Product, CatalogError>> {
            let mut products: Vec<Product> =
                self.products.lock().unwrap().values().cloned().collect();
            products.sort_by(|a, b| a.nome.cmp(&b.nome));
            futures::stream::iter(products.into_iter().map(Ok)).boxed()
        }

        async fn save_profile(
            &self,
            product_id: &str,
            store_key: Option<&str>,
            profile: &FiscalProfile,
        ) -> Result<(), CatalogError> {
            let mut products = self.products.lock().unwrap();
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

        async fn icms_simples(&self, _store_id: &str) -> Result<IcmsSimplesMap, CatalogError> {
            Ok(self.icms.clone())
        }
    }

    fn store() -> Store {
        Store {
            id: "loja1".to_string(),
            nome: "Loja 1".to_string(),
            regime_tributario: "simples".to_string(),
            uf: "SP".to_string(),
        }
    }

    fn product(id: &str, nome: &str) -> Product {
        Product {
            id: id.to_string(),
            cod: format!("cod-{id}"),
            codbarras: format!("789{id}"),
            nome: nome.to_string(),
            ncm: "30049099".to_string(),
            tipo_produto: "medicamento".to_string(),
            ..Product::default()
        }
    }

    fn approved(mut product: Product, store_id: &str) -> Product {
        product.fiscal_por_empresa.insert(
            store_id.to_string(),
            ProfilePatch::from_value(&json!({ "status": { "nfe": "aprovado" } })),
        );
        product
    }

    fn usecase(catalog: FakeCatalog) -> ReportUseCase<FakeCatalog> {
        ReportUseCase::new(Arc::new(catalog), RuleSet::default())
    }

    #[tokio::test]
    async fn test_product_report_for_unknown_store_fails() {
        let usecase = usecase(FakeCatalog::new(vec![], vec![]));
        let err = usecase.product_report("loja9", "p1").await.unwrap_err();
        assert!(matches!(err, ReportError::StoreNotFound(_)));
    }

    #[tokio::test]
    async fn test_product_report_for_unknown_product_fails() {
        let usecase = usecase(FakeCatalog::new(vec![store()], vec![]));
        let err = usecase.product_report("loja1", "p9").await.unwrap_err();
        assert!(matches!(err, ReportError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_page_counts_all_matches_but_windows_reports() {
        let products = (1..=5)
            .map(|i| product(&format!("p{i}"), &format!("Produto {i}")))
            .collect();
        let usecase = usecase(FakeCatalog::new(vec![store()], products));

        let page = usecase
            .page("loja1", &ReportFilter::default(), 2, 2)
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.pages, 3);
        assert_eq!(page.reports.len(), 2);
        // ordered by name, so page 2 starts at the third product
        assert_eq!(page.reports[0].nome, "Produto 3");
    }

    #[tokio::test]
    async fn test_empty_listing_still_has_one_page() {
        let usecase = usecase(FakeCatalog::new(vec![store()], vec![]));

        let page = usecase
            .page("loja1", &ReportFilter::default(), 1, 20)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.pages, 1);
        assert!(page.reports.is_empty());
    }

    #[tokio::test]
    async fn test_search_matches_name_code_and_barcode() {
        let products = vec![
            product("p1", "Dipirona 500mg"),
            product("p2", "Sabonete"),
        ];
        let usecase = usecase(FakeCatalog::new(vec![store()], products));

        let filter = ReportFilter::parse(None, None, Some("DIPIRONA"));
        let page = usecase.page("loja1", &filter, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.reports[0].nome, "Dipirona 500mg");

        let filter = ReportFilter::parse(None, None, Some("cod-p2"));
        let page = usecase.page("loja1", &filter, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.reports[0].nome, "Sabonete");
    }

    #[tokio::test]
    async fn test_status_filter_reads_current_profile_for_modality() {
        let products = vec![
            approved(product("p1", "Aprovado"), "loja1"),
            product("p2", "Pendente"),
        ];
        let usecase = usecase(FakeCatalog::new(vec![store()], products));

        let filter = ReportFilter::parse(Some("nfe"), Some("aprovado"), None);
        let page = usecase.page("loja1", &filter, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.reports[0].nome, "Aprovado");

        // the same product is still pending on the NFC-e axis
        let filter = ReportFilter::parse(Some("nfce"), Some("aprovado"), None);
        let page = usecase.page("loja1", &filter, 1, 10).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_filter_parse_tolerates_garbage() {
        let filter = ReportFilter::parse(Some("fax"), Some(""), Some("  abc  "));
        assert_eq!(filter.modalidade, Modalidade::Nfe);
        assert_eq!(filter.status, None);
        assert_eq!(filter.search, "abc");
    }

    #[test]
    fn test_filter_parse_ignores_unknown_status() {
        // a misspelled status must not become a filter on anything
        let filter = ReportFilter::parse(Some("nfe"), Some("aprobado"), None);
        assert_eq!(filter.status, None);

        let filter = ReportFilter::parse(Some("nfe"), Some(" Aprovado "), None);
        assert_eq!(filter.status, Some(FiscalStatus::Aprovado));
    }
}
