use async_trait::async_trait;

use crate::catalog::CatalogModule;
use crate::domain::{ControlMappingDetail, Service, ServiceWithControls};
use crate::error::Result;

/// Read access to services and the controls mapped to them.
#[async_trait]
pub trait ServiceReader: Send + Sync {
    async fn service(&self, service_id: &str) -> Result<Service>;
    async fn service_with_controls(&self, service_id: &str) -> Result<ServiceWithControls>;
}

/// Read access to the external service catalog, keyed by service id.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn catalog_by_service_id(&self, service_id: &str) -> Result<serde_json::Value>;

    /// Drop cached entries so the next lookups go to the catalog again.
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait ControlMappingReader: Send + Sync {
    /// Mappings for any of `service_ids`, restricted to `scc_profile` when given,
    /// with related control, goals and profile resolved.
    async fn mappings_for(
        &self,
        service_ids: &[String],
        scc_profile: Option<&str>,
    ) -> Result<Vec<ControlMappingDetail>>;
}

/// The automation module catalog.
#[async_trait]
pub trait ModuleCatalog: Send + Sync {
    /// Check a module configuration (YAML) against the catalog entry for `module_id`.
    async fn validate_module_config(&self, module_id: &str, config_yaml: &str) -> Result<()>;

    async fn module(&self, module_id: &str) -> Result<Option<CatalogModule>>;

    /// Fetch the catalog again instead of serving the cached copy.
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}
