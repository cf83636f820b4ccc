//! Apply use case: persist manual patches and accepted suggestions

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::model::{FiscalProfile, current_profile};
use crate::patch::ProfilePatch;
use crate::ports::{Catalog, CatalogError, Clock};
use crate::rules::{RuleSet, build_suggestion};
use crate::usecases::report::{ReportFilter, matches_filter};

/// Error type for apply operations
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Store not found: {0}")]
    StoreNotFound(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// One manual classification to persist
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplyItem {
    pub product_id: String,
    /// Target store slot; absent means the legacy single-profile slot
    pub store_id: Option<String>,
    /// Absent means the item carried no classification at all; such items
    /// fail with "Dados incompletos." instead of stamping an unchanged profile
    pub fiscal: Option<ProfilePatch>,
}

/// A profile that was merged and saved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedProfile {
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    pub fiscal: FiscalProfile,
}

/// One item that could not be applied
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub reason: String,
}

/// Outcome of a manual batch: which items went through, which did not
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub updated: Vec<AppliedProfile>,
    pub failures: Vec<ApplyFailure>,
}

/// Outcome of a bulk suggestion run
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionApplyOutcome {
    pub processed: usize,
    pub updated_count: usize,
    pub failures: Vec<ApplyFailure>,
}

/// Tuning knobs for batch application
#[derive(Debug, Clone)]
pub struct ApplyConfig {
    pub max_concurrent: usize,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// Applies patches with per-item isolation: one bad item never aborts the
/// rest of a batch.
pub struct ApplyUseCase<C: Catalog + ?Sized, Cl: Clock> {
    catalog: Arc<C>,
    ruleset: RuleSet,
    clock: Arc<Cl>,
    config: ApplyConfig,
}

impl<C: Catalog + ?Sized, Cl: Clock> ApplyUseCase<C, Cl> {
    pub fn new(catalog: Arc<C>, ruleset: RuleSet, clock: Arc<Cl>, config: ApplyConfig) -> Self {
        Self {
            catalog,
            ruleset,
            clock,
            config,
        }
    }

    /// Merge one manual patch on top of the current profile and persist it.
    /// Failures come back as user-facing reasons, never as errors.
    pub async fn apply_one(&self, item: ApplyItem, actor: &str) -> Result<AppliedProfile, ApplyFailure> {
        let product_id = item.product_id.trim().to_string();
        if product_id.is_empty() {
            return Err(ApplyFailure {
                product_id: None,
                reason: "Dados incompletos.".to_string(),
            });
        }
        let fail = |reason: &str| ApplyFailure {
            product_id: Some(product_id.clone()),
            reason: reason.to_string(),
        };

        let Some(fiscal) = item.fiscal else {
            return Err(fail("Dados incompletos."));
        };

        let product = match self.catalog.get_product(&product_id).await {
            Ok(Some(product)) => product,
            Ok(None) => return Err(fail("Produto não encontrado.")),
            Err(err) => {
                error!(product_id, %err, "Product lookup failed");
                return Err(fail("Erro ao atualizar."));
            }
        };

        let store_key = item
            .store_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if let Some(store_id) = &store_key {
            match self.catalog.get_store(store_id).await {
                Ok(Some(_)) => {}
                Ok(None) => return Err(fail("Empresa não encontrada.")),
                Err(err) => {
                    error!(product_id, store_id, %err, "Store lookup failed");
                    return Err(fail("Erro ao atualizar."));
                }
            }
        }

        let base = current_profile(&product, store_key.as_deref().unwrap_or(""));
        let mut merged = base.apply_patch(&fiscal);
        merged.atualizado_em = Some(self.clock.now());
        merged.atualizado_por = actor.to_string();

        if let Err(err) = self
            .catalog
            .save_profile(&product_id, store_key.as_deref(), &merged)
            .await
        {
            error!(product_id, %err, "Profile save failed");
            return Err(fail("Erro ao atualizar."));
        }

        Ok(AppliedProfile {
            product_id,
            store_id: store_key,
            fiscal: merged,
        })
    }

    /// Apply a batch of manual patches with bounded concurrency. `buffered`
    /// keeps the outcome entries in input order, so batch output is stable
    /// across runs.
    pub async fn apply_many(&self, items: Vec<ApplyItem>, actor: &str) -> ApplyOutcome {
        let results: Vec<_> = futures::stream::iter(items)
            .map(|item| self.apply_one(item, actor))
            .buffered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        let mut outcome = ApplyOutcome::default();
        for result in results {
            match result {
                Ok(applied) => outcome.updated.push(applied),
                Err(failure) => outcome.failures.push(failure),
            }
        }
        info!(
            updated = outcome.updated.len(),
            failures = outcome.failures.len(),
            "Applied fiscal patch batch"
        );
        outcome
    }

    /// Resolve and persist the suggestion for every product matching the
    /// filter, at the store-scoped slot. Per-product save errors are recorded
    /// and the run continues.
    pub async fn apply_suggestions(
        &self,
        store_id: &str,
        filter: &ReportFilter,
        actor: &str,
    ) -> Result<SuggestionApplyOutcome, ApplyError> {
        let store = self
            .catalog
            .get_store(store_id)
            .await?
            .ok_or_else(|| ApplyError::StoreNotFound(store_id.to_string()))?;
        let icms = self.catalog.icms_simples(store_id).await?;
        let icms = (!icms.is_empty()).then_some(icms);

        let mut outcome = SuggestionApplyOutcome::default();
        let mut products = self.catalog.stream_products();
        while let Some(product) = products.try_next().await? {
            if !matches_filter(&product, &store, filter) {
                continue;
            }
            outcome.processed += 1;

            let suggestion = build_suggestion(&product, &store, &self.ruleset, icms.as_ref());
            let current = current_profile(&product, &store.id);
            let mut merged = current.apply_patch(&suggestion.fiscal.to_patch());
            merged.atualizado_em = Some(self.clock.now());
            merged.atualizado_por = actor.to_string();

            match self
                .catalog
                .save_profile(&product.id, Some(&store.id), &merged)
                .await
            {
                Ok(()) => outcome.updated_count += 1,
                Err(err) => {
                    error!(product_id = %product.id, store_id, %err, "Suggestion save failed");
                    outcome.failures.push(ApplyFailure {
                        product_id: Some(product.id.clone()),
                        reason: "Erro ao atualizar.".to_string(),
                    });
                }
            }
        }
        drop(products);

        info!(
            store_id,
            processed = outcome.processed,
            updated = outcome.updated_count,
            failures = outcome.failures.len(),
            "Applied suggestions"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FiscalStatus, IcmsSimplesMap, Product, Store};
    use crate::ports::CatalogError;
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;
    use time::OffsetDateTime;
    use time::macros::datetime;

    struct FakeCatalog {
        stores: BTreeMap<String, Store>,
        products: Mutex<BTreeMap<String, Product>>,
        failing_saves: BTreeSet<String>,
    }

    impl FakeCatalog {
        fn new(stores: Vec<Store>, products: Vec<Product>) -> Self {
            Self {
                stores: stores.into_iter().map(|s| (s.id.clone(), s)).collect(),
                products: Mutex::new(
                    products.into_iter().map(|p| (p.id.clone(), p)).collect(),
                ),
                failing_saves: BTreeSet::new(),
            }
        }

        fn failing_save(mut self, product_id: &str) -> Self {
            self.failing_saves.insert(product_id.to_string());
            self
        }

        fn product(&self, product_id: &str) -> Product {
            self.products
                .lock()
                .unwrap()
                .get(product_id)
                .cloned()
                .unwrap()
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
            StreamExt::boxed(futures::stream::iter(products.into_iter().map(Ok)))
        }

        async fn save_profile(
            &self,
            product_id: &str,
            store_key: Option<&str>,
            profile: &FiscalProfile,
        ) -> Result<(), CatalogError> {
            if self.failing_saves.contains(product_id) {
                return Err(CatalogError::Storage("disk full".to_string()));
            }
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
            Ok(IcmsSimplesMap::new())
        }
    }

    struct FixedClock(OffsetDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            self.0
        }
    }

    const NOW: OffsetDateTime = datetime!(2024-06-01 12:00:00 UTC);

    fn store() -> Store {
        Store {
            id: "loja1".to_string(),
            nome: "Loja 1".to_string(),
            regime_tributario: "simples".to_string(),
            uf: "SP".to_string(),
        }
    }

    fn product(id: &str) -> Product {
        Product {
            id: id.to_string(),
            nome: format!("Produto {id}"),
            ..Product::default()
        }
    }

    fn ruleset() -> RuleSet {
        serde_json::from_value(json!({
            "version": "test",
            "defaults": {
                "origem": "0",
                "cfop": {
                    "nfe": { "dentroEstado": "5102", "foraEstado": "6102" },
                    "nfce": { "dentroEstado": "5102" },
                },
                "pis": { "codigo": "01", "cst": "01", "aliquota": 1.65 },
                "cofins": { "codigo": "01", "cst": "01", "aliquota": 7.6 },
                "ipi": { "cst": "53", "codigoEnquadramento": "999", "aliquota": 0 },
            },
            "regime": { "simples": { "csosn": "102" } },
        }))
        .expect("valid ruleset")
    }

    fn usecase(catalog: FakeCatalog) -> ApplyUseCase<FakeCatalog, FixedClock> {
        ApplyUseCase::new(
            Arc::new(catalog),
            ruleset(),
            Arc::new(FixedClock(NOW)),
            ApplyConfig::default(),
        )
    }

    fn item(product_id: &str, store_id: Option<&str>, fiscal: serde_json::Value) -> ApplyItem {
        ApplyItem {
            product_id: product_id.to_string(),
            store_id: store_id.map(str::to_string),
            fiscal: Some(ProfilePatch::from_value(&fiscal)),
        }
    }

    #[tokio::test]
    async fn test_apply_one_merges_stamps_and_saves() {
        let usecase = usecase(FakeCatalog::new(vec![store()], vec![product("p1")]));

        let applied = usecase
            .apply_one(
                item("p1", Some("loja1"), json!({ "cst": "060", "pis": { "aliquota": 1.65 } })),
                "ana",
            )
            .await
            .unwrap();

        assert_eq!(applied.store_id.as_deref(), Some("loja1"));
        assert_eq!(applied.fiscal.cst, "060");
        assert_eq!(applied.fiscal.pis.aliquota, Some(1.65));
        assert_eq!(applied.fiscal.atualizado_em, Some(NOW));
        assert_eq!(applied.fiscal.atualizado_por, "ana");

        let saved = usecase.catalog.product("p1");
        assert!(saved.fiscal_por_empresa.contains_key("loja1"));
    }

    #[tokio::test]
    async fn test_apply_one_without_store_writes_legacy_slot() {
        let usecase = usecase(FakeCatalog::new(vec![store()], vec![product("p1")]));

        let applied = usecase
            .apply_one(item("p1", None, json!({ "origem": "1" })), "ana")
            .await
            .unwrap();
        assert_eq!(applied.store_id, None);

        let saved = usecase.catalog.product("p1");
        assert!(saved.fiscal.is_some());
        assert!(saved.fiscal_por_empresa.is_empty());
    }

    #[tokio::test]
    async fn test_apply_one_failure_reasons() {
        let usecase = usecase(FakeCatalog::new(vec![store()], vec![product("p1")]));

        let err = usecase
            .apply_one(item("  ", None, json!({})), "ana")
            .await
            .unwrap_err();
        assert_eq!(err.reason, "Dados incompletos.");
        assert_eq!(err.product_id, None);

        let err = usecase
            .apply_one(item("p9", None, json!({})), "ana")
            .await
            .unwrap_err();
        assert_eq!(err.reason, "Produto não encontrado.");

        let err = usecase
            .apply_one(item("p1", Some("loja9"), json!({})), "ana")
            .await
            .unwrap_err();
        assert_eq!(err.reason, "Empresa não encontrada.");
    }

    #[tokio::test]
    async fn test_apply_one_rejects_item_without_fiscal() {
        let usecase = usecase(FakeCatalog::new(vec![store()], vec![product("p1")]));

        let parsed: ApplyItem =
            serde_json::from_value(json!({ "productId": "p1", "storeId": "loja1" })).unwrap();
        assert_eq!(parsed.fiscal, None);

        let err = usecase.apply_one(parsed, "ana").await.unwrap_err();
        assert_eq!(err.reason, "Dados incompletos.");
        assert_eq!(err.product_id.as_deref(), Some("p1"));

        // the profile was not stamped
        let saved = usecase.catalog.product("p1");
        assert!(saved.fiscal.is_none());
        assert!(saved.fiscal_por_empresa.is_empty());
    }

    #[tokio::test]
    async fn test_apply_many_isolates_failures() {
        let catalog = FakeCatalog::new(
            vec![store()],
            vec![product("p1"), product("p2"), product("p3")],
        )
        .failing_save("p2");
        let usecase = usecase(catalog);

        let items = vec![
            item("p1", Some("loja1"), json!({ "cst": "060" })),
            item("p2", Some("loja1"), json!({ "cst": "060" })),
            item("p3", Some("loja1"), json!({ "cst": "060" })),
        ];
        let outcome = usecase.apply_many(items, "ana").await;

        assert_eq!(outcome.updated.len(), 2);
        // entries come back in input order
        assert_eq!(outcome.updated[0].product_id, "p1");
        assert_eq!(outcome.updated[1].product_id, "p3");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].product_id.as_deref(), Some("p2"));
        assert_eq!(outcome.failures[0].reason, "Erro ao atualizar.");
    }

    #[tokio::test]
    async fn test_apply_suggestions_updates_store_slot() {
        let usecase = usecase(FakeCatalog::new(
            vec![store()],
            vec![product("p1"), product("p2")],
        ));

        let outcome = usecase
            .apply_suggestions("loja1", &ReportFilter::default(), "ana")
            .await
            .unwrap();
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.updated_count, 2);
        assert!(outcome.failures.is_empty());

        let saved = usecase.catalog.product("p1");
        let profile = current_profile(&saved, "loja1");
        assert_eq!(profile.csosn, "102");
        assert_eq!(profile.cfop.nfe.dentro_estado, "5102");
        assert_eq!(profile.status.nfe, FiscalStatus::Aprovado);
        assert_eq!(profile.atualizado_por, "ana");
    }

    #[tokio::test]
    async fn test_apply_suggestions_records_save_failures_and_continues() {
        let catalog =
            FakeCatalog::new(vec![store()], vec![product("p1"), product("p2")]).failing_save("p1");
        let usecase = usecase(catalog);

        let outcome = usecase
            .apply_suggestions("loja1", &ReportFilter::default(), "ana")
            .await
            .unwrap();
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.updated_count, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].product_id.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn test_apply_suggestions_for_unknown_store_fails() {
        let usecase = usecase(FakeCatalog::new(vec![], vec![]));
        let err = usecase
            .apply_suggestions("loja9", &ReportFilter::default(), "ana")
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::StoreNotFound(_)));
    }
}
