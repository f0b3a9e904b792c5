//! Composite records: BOM rows enriched with service, module catalog and
//! service catalog data.
//!
//! Enrichment is best effort. A failing source is logged and its field left
//! out; only a missing BOM row or architecture fails the call.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::app::ports::{CatalogReader, ControlMappingReader, ModuleCatalog, ServiceReader};
use crate::catalog::CatalogModule;
use crate::domain::{
    Architecture, Bom, BomFilter, Control, ControlMappingDetail, Service, ServiceWithControls,
};
use crate::error::{ApiError, Result};
use crate::observability::metrics;
use crate::storage::Storage;

/// A BOM row with whatever related data could be fetched.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeBom {
    #[serde(flatten)]
    pub bom: Bom,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceWithControls>,
    /// Module catalog entry for the service's automation id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation: Option<CatalogModule>,
    /// Service catalog entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Value>,
}

/// Everything a compliance report is rendered from.
#[derive(Debug, Clone)]
pub struct ComplianceData {
    pub architecture: Architecture,
    pub boms: Vec<CompositeBom>,
    /// Distinct services referenced by the BOM, in first-seen order.
    pub services: Vec<Service>,
    pub mappings: Vec<ControlMappingDetail>,
    /// Distinct controls referenced by the mappings, in first-seen order.
    pub controls: Vec<Control>,
}

impl ComplianceData {
    /// Catalog entry of the first BOM row that resolved to `service_id`.
    pub fn catalog_for_service(&self, service_id: &str) -> Option<&Value> {
        self.boms
            .iter()
            .filter(|b| {
                b.service
                    .as_ref()
                    .is_some_and(|s| s.service.service_id == service_id)
            })
            .find_map(|b| b.catalog.as_ref())
    }
}

pub struct CompositeAggregator {
    storage: Arc<dyn Storage>,
    services: Arc<dyn ServiceReader>,
    catalog: Arc<dyn CatalogReader>,
    modules: Arc<dyn ModuleCatalog>,
    mappings: Arc<dyn ControlMappingReader>,
}

impl CompositeAggregator {
    pub fn new(
        storage: Arc<dyn Storage>,
        services: Arc<dyn ServiceReader>,
        catalog: Arc<dyn CatalogReader>,
        modules: Arc<dyn ModuleCatalog>,
        mappings: Arc<dyn ControlMappingReader>,
    ) -> Self {
        Self {
            storage,
            services,
            catalog,
            modules,
            mappings,
        }
    }

    async fn bom(&self, bom_id: &str) -> Result<Bom> {
        self.storage
            .get_bom(bom_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Bom", bom_id))
    }

    async fn architecture(&self, arch_id: &str) -> Result<Architecture> {
        self.storage
            .get_architecture(arch_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Architecture", arch_id))
    }

    /// One BOM row with its service (including controls), automation module
    /// and catalog entry.
    #[instrument(skip(self))]
    pub async fn composite_bom(&self, bom_id: &str) -> Result<CompositeBom> {
        let bom = self.bom(bom_id).await?;
        Ok(self.enrich(bom, true).await)
    }

    /// Every BOM row of an architecture, enriched, in row order.
    #[instrument(skip(self))]
    pub async fn composite_architecture(&self, arch_id: &str) -> Result<Vec<CompositeBom>> {
        let rows = self
            .storage
            .find_boms(&BomFilter::for_architecture(arch_id))
            .await?;
        let mut composites = Vec::with_capacity(rows.len());
        for bom in rows {
            composites.push(self.enrich(bom, false).await);
        }
        Ok(composites)
    }

    /// A BOM row flattened with its service and catalog entry. On key
    /// collisions the service overrides the row and the catalog overrides both.
    #[instrument(skip(self))]
    pub async fn catalog_by_bom(&self, bom_id: &str) -> Result<Value> {
        let bom = self.bom(bom_id).await?;
        let (service, catalog) = tokio::join!(
            self.services.service(&bom.service_id),
            self.catalog.catalog_by_service_id(&bom.service_id)
        );

        let mut merged = serde_json::to_value(&bom)?;
        match service {
            Ok(service) => deep_merge(&mut merged, serde_json::to_value(service)?),
            Err(e) => log_fetch_error("service", &bom, &e),
        }
        match catalog {
            Ok(entry) => deep_merge(&mut merged, entry),
            Err(e) => log_fetch_error("catalog", &bom, &e),
        }
        Ok(merged)
    }

    /// Architecture, composite BOM, and the control mappings of its services
    /// under `profile` (every profile when `None`).
    #[instrument(skip(self))]
    pub async fn compliance_data(
        &self,
        arch_id: &str,
        profile: Option<&str>,
    ) -> Result<ComplianceData> {
        let architecture = self.architecture(arch_id).await?;
        let boms = self.composite_architecture(arch_id).await?;

        let mut seen = HashSet::new();
        let services: Vec<Service> = boms
            .iter()
            .filter_map(|b| b.service.as_ref())
            .filter(|s| seen.insert(s.service.service_id.clone()))
            .map(|s| s.service.clone())
            .collect();

        let mut seen = HashSet::new();
        let service_ids: Vec<String> = boms
            .iter()
            .map(|b| b.bom.service_id.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let mappings = self.mappings.mappings_for(&service_ids, profile).await?;

        let mut seen = HashSet::new();
        let controls: Vec<Control> = mappings
            .iter()
            .filter_map(|m| m.control.as_ref())
            .filter(|c| seen.insert(c.control_id.clone()))
            .cloned()
            .collect();

        Ok(ComplianceData {
            architecture,
            boms,
            services,
            mappings,
            controls,
        })
    }

    async fn enrich(&self, bom: Bom, with_controls: bool) -> CompositeBom {
        let service_fut = async {
            if with_controls {
                self.services.service_with_controls(&bom.service_id).await
            } else {
                self.services
                    .service(&bom.service_id)
                    .await
                    .map(ServiceWithControls::from)
            }
        };
        let (service, catalog) = tokio::join!(
            service_fut,
            self.catalog.catalog_by_service_id(&bom.service_id)
        );

        let mut automation = None;
        let service = match service {
            Ok(service) => {
                if let Some(automation_id) = service.service.cloud_automation_id.as_deref() {
                    match self.modules.module(automation_id).await {
                        Ok(module) => automation = module,
                        Err(e) => log_fetch_error("automation", &bom, &e),
                    }
                }
                Some(service)
            }
            Err(e) => {
                log_fetch_error("service", &bom, &e);
                None
            }
        };

        let catalog = match catalog {
            Ok(entry) => Some(entry),
            Err(e) => {
                log_fetch_error("catalog", &bom, &e);
                None
            }
        };

        CompositeBom {
            bom,
            service,
            automation,
            catalog,
        }
    }
}

fn log_fetch_error(source: &'static str, bom: &Bom, err: &ApiError) {
    metrics::composite::fetch_error(source);
    warn!(
        source,
        bom_id = %bom.id,
        service_id = %bom.service_id,
        error = %err,
        "Composite fetch failed"
    );
}

/// Recursively merge `src` into `dst`. Objects merge key by key and arrays
/// element by element; any other value in `src` replaces the one in `dst`.
pub fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(dst), Value::Array(src)) => {
            for (i, value) in src.into_iter().enumerate() {
                match dst.get_mut(i) {
                    Some(existing) => deep_merge(existing, value),
                    None => dst.push(value),
                }
            }
        }
        (dst, src) => *dst = src,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_prefers_later_values() {
        let mut dst = json!({
            "service_id": "vpc",
            "desc": "from service",
            "overview_ui": { "en": { "description": "short" } },
            "tags": ["a", "b"]
        });
        deep_merge(
            &mut dst,
            json!({
                "desc": "from catalog",
                "overview_ui": { "en": { "long_description": "long" } },
                "tags": ["c"]
            }),
        );
        assert_eq!(dst["desc"], "from catalog");
        assert_eq!(dst["service_id"], "vpc");
        assert_eq!(dst["overview_ui"]["en"]["description"], "short");
        assert_eq!(dst["overview_ui"]["en"]["long_description"], "long");
        assert_eq!(dst["tags"], json!(["c", "b"]));
    }

    #[test]
    fn deep_merge_replaces_mismatched_types() {
        let mut dst = json!({ "provider": "ibm" });
        deep_merge(&mut dst, json!({ "provider": { "name": "IBM" } }));
        assert_eq!(dst["provider"]["name"], "IBM");
    }
}
