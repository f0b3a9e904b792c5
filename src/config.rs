use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;
use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub report: ReportConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub module_catalog_url: String,
    pub service_catalog_url: String,
    pub cache_ttl_secs: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub font_path: PathBuf,
    pub images_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_upload_bytes: 10 * constants::MAX_BOM_FILE_BYTES,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            module_catalog_url: constants::DEFAULT_MODULE_CATALOG_URL.to_string(),
            service_catalog_url: constants::DEFAULT_SERVICE_CATALOG_URL.to_string(),
            cache_ttl_secs: 60 * 60,
            timeout_seconds: 30,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("fonts/IBMPlexSans-Regular.ttf"),
            images_dir: PathBuf::from("public/images"),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
        }
    }
}

impl CatalogConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// Load `config.toml` from the working directory (if present), then apply
    /// `.env` and `REFARCH_*` environment overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let path = Path::new(constants::CONFIG_FILE);
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ApiError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("REFARCH_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ApiError::Config(format!("REFARCH_PORT is not a port: {}", port)))?;
        }
        if let Some(url) = lookup("REFARCH_CATALOG_URL") {
            self.catalog.module_catalog_url = url;
        }
        if let Some(url) = lookup("REFARCH_SERVICE_CATALOG_URL") {
            self.catalog.service_catalog_url = url;
        }
        if let Some(path) = lookup("REFARCH_SEED_FILE") {
            self.storage.seed_file = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup("REFARCH_LOG_DIR") {
            self.logging.directory = PathBuf::from(dir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml("[server]\nport = 8080\n").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(
            config.catalog.module_catalog_url,
            constants::DEFAULT_MODULE_CATALOG_URL
        );
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("REFARCH_PORT", "9000"),
            ("REFARCH_SEED_FILE", "seed.yaml"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.seed_file, Some(PathBuf::from("seed.yaml")));
    }

    #[test]
    fn invalid_port_is_a_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(|k| (k == "REFARCH_PORT").then(|| "http".to_string()))
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }
}
