use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mini_moka::sync::Cache;
use tracing::{debug, info, instrument, warn};

use super::{Catalog, CatalogModule};
use crate::app::ports::ModuleCatalog;
use crate::error::Result;
use crate::observability::metrics;

/// Where a catalog index comes from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load(&self) -> Result<Catalog>;
}

/// Fetches the catalog index YAML over HTTP.
pub struct HttpCatalogSource {
    client: reqwest::Client,
    url: String,
}

impl HttpCatalogSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn load(&self) -> Result<Catalog> {
        let started = Instant::now();
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        let body = match resp {
            Ok(r) => r.text().await?,
            Err(e) => {
                metrics::catalog::fetch_error();
                return Err(e.into());
            }
        };
        let catalog = Catalog::from_yaml(&body)?;
        metrics::catalog::fetch_success(started.elapsed().as_secs_f64());
        info!(
            modules = catalog.modules().count(),
            "Loaded module catalog"
        );
        Ok(catalog)
    }
}

/// A catalog already held in memory, used for offline runs and tests.
pub struct StaticCatalogSource(pub Catalog);

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn load(&self) -> Result<Catalog> {
        Ok(self.0.clone())
    }
}

const CATALOG_KEY: &str = "catalog";

/// Module catalog backed by a time-bounded cache.
///
/// The catalog is fetched on first use and reused until the TTL expires or
/// [`ModuleCatalog::refresh`] is called. Concurrent misses are coalesced
/// so only one fetch is in flight at a time.
pub struct CachedModuleCatalog<S: CatalogSource> {
    source: S,
    cache: Cache<&'static str, Arc<Catalog>>,
    load_lock: tokio::sync::Mutex<()>,
}

impl<S: CatalogSource> CachedModuleCatalog<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn catalog(&self) -> Result<Arc<Catalog>> {
        if let Some(catalog) = self.cache.get(&CATALOG_KEY) {
            return Ok(catalog);
        }
        let _guard = self.load_lock.lock().await;
        if let Some(catalog) = self.cache.get(&CATALOG_KEY) {
            return Ok(catalog);
        }
        debug!("Module catalog cache miss");
        let catalog = Arc::new(self.source.load().await?);
        self.cache.insert(CATALOG_KEY, catalog.clone());
        Ok(catalog)
    }
}

#[async_trait]
impl<S: CatalogSource> ModuleCatalog for CachedModuleCatalog<S> {
    async fn validate_module_config(&self, module_id: &str, config_yaml: &str) -> Result<()> {
        let catalog = self.catalog().await?;
        catalog
            .validate_module_config(module_id, config_yaml)
            .map_err(|e| {
                warn!(module = module_id, error = %e, "Module config rejected");
                e
            })
    }

    async fn module(&self, module_id: &str) -> Result<Option<CatalogModule>> {
        Ok(self.catalog().await?.find_module(module_id).cloned())
    }

    async fn refresh(&self) -> Result<()> {
        self.cache.invalidate(&CATALOG_KEY);
        let catalog = self.catalog().await?;
        info!(modules = catalog.modules().count(), "Module catalog refreshed");
        Ok(())
    }
}
