use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mini_moka::sync::Cache;
use tracing::{debug, instrument};

use crate::app::ports::CatalogReader;
use crate::error::{ApiError, Result};
use crate::storage::Storage;

/// Reads service entries from the cloud global catalog.
///
/// A service is looked up by its `ibm_catalog_id`, falling back to its
/// `ibm_catalog_service` display name. Entries are cached per service id.
pub struct HttpServiceCatalog {
    client: reqwest::Client,
    base_url: String,
    storage: Arc<dyn Storage>,
    cache: Cache<String, serde_json::Value>,
}

impl HttpServiceCatalog {
    pub fn new(
        base_url: impl Into<String>,
        storage: Arc<dyn Storage>,
        timeout: Duration,
        ttl: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            storage,
            cache: Cache::builder().max_capacity(1024).time_to_live(ttl).build(),
        })
    }
}

#[async_trait]
impl CatalogReader for HttpServiceCatalog {
    #[instrument(skip(self))]
    async fn catalog_by_service_id(&self, service_id: &str) -> Result<serde_json::Value> {
        if let Some(entry) = self.cache.get(&service_id.to_string()) {
            return Ok(entry);
        }
        let service = self
            .storage
            .get_service(service_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Service", service_id))?;
        let query = service
            .ibm_catalog_id
            .as_deref()
            .or(service.ibm_catalog_service.as_deref())
            .ok_or_else(|| {
                ApiError::Reference(format!(
                    "Service {} has no catalog reference",
                    service_id
                ))
            })?;

        let url = format!("{}/api/v1", self.base_url.trim_end_matches('/'));
        debug!(url = %url, query, "Fetching catalog entry");
        let body: serde_json::Value = self
            .client
            .get(&url)
            .query(&[("q", query), ("complete", "true")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let entry = body
            .get("resources")
            .and_then(|r| r.as_array())
            .and_then(|r| r.first())
            .cloned()
            .ok_or_else(|| ApiError::not_found("CatalogEntry", service_id))?;
        self.cache.insert(service_id.to_string(), entry.clone());
        Ok(entry)
    }

    async fn refresh(&self) -> Result<()> {
        self.cache.invalidate_all();
        debug!("Service catalog cache cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use serde_json::json;

    #[tokio::test]
    async fn refresh_drops_cached_entries() {
        let catalog = HttpServiceCatalog::new(
            "http://localhost:9",
            Arc::new(InMemoryStorage::new()),
            Duration::from_secs(1),
            Duration::from_secs(600),
        )
        .unwrap();
        catalog.cache.insert("vpc".to_string(), json!({ "name": "is.vpc" }));

        let entry = catalog.catalog_by_service_id("vpc").await.unwrap();
        assert_eq!(entry["name"], "is.vpc");

        catalog.refresh().await.unwrap();
        assert!(catalog.cache.get(&"vpc".to_string()).is_none());
        // The store has no such service, so the lookup now misses the cache.
        let err = catalog.catalog_by_service_id("vpc").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }
}
