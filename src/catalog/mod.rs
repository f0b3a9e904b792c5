//! Automation module catalog and service catalog clients.
//!
//! The module catalog is a YAML index of terraform automation modules grouped
//! by category. Each module lists its versions, newest first, and every version
//! declares the variables and dependencies a bill-of-materials entry may set.

pub mod module_catalog;
pub mod service_catalog;

pub use module_catalog::{CachedModuleCatalog, CatalogSource, HttpCatalogSource, StaticCatalogSource};
pub use service_catalog::HttpServiceCatalog;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub categories: Vec<CatalogCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogCategory {
    pub category: String,
    #[serde(default)]
    pub modules: Vec<CatalogModule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogModule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub versions: Vec<ModuleVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleVersion {
    pub version: String,
    #[serde(default)]
    pub variables: Vec<ModuleVariable>,
    #[serde(default)]
    pub dependencies: Vec<ModuleDependency>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleVariable {
    pub name: String,
    #[serde(rename = "type", default)]
    pub var_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleDependency {
    pub id: String,
    #[serde(default)]
    pub optional: bool,
}

impl Catalog {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn modules(&self) -> impl Iterator<Item = &CatalogModule> {
        self.categories.iter().flat_map(|c| c.modules.iter())
    }

    /// Look a module up by its short name or its full id (`github.com/org/<name>`).
    pub fn find_module(&self, module_id: &str) -> Option<&CatalogModule> {
        self.modules().find(|m| {
            m.name == module_id
                || m.id == module_id
                || m.id.rsplit('/').next() == Some(module_id)
        })
    }

    /// Check a BOM module config against the module's latest catalog version.
    ///
    /// Every variable and dependency named in the config must be declared by the
    /// module. Modules without published versions accept any config.
    pub fn validate_module_config(&self, module_id: &str, config_yaml: &str) -> Result<()> {
        let module = self.find_module(module_id).ok_or_else(|| {
            ApiError::Reference(format!("Module {} not found in catalog", module_id))
        })?;

        let config: serde_yaml::Value = serde_yaml::from_str(config_yaml)?;
        let config = match config {
            serde_yaml::Value::Null => return Ok(()),
            serde_yaml::Value::Mapping(m) => m,
            _ => {
                return Err(ApiError::Validation(format!(
                    "Config for module {} must be a YAML mapping",
                    module_id
                )))
            }
        };

        if let Some(alias) = config.get("alias") {
            if !matches!(alias, serde_yaml::Value::String(s) if !s.is_empty()) {
                return Err(ApiError::Validation(format!(
                    "Module {} property 'alias' must be a non-empty string",
                    module_id
                )));
            }
        }

        let Some(version) = module.versions.first() else {
            return Ok(());
        };

        for name in variable_names(module_id, config.get("variables"))? {
            if !version.variables.iter().any(|v| v.name == name) {
                return Err(ApiError::Validation(format!(
                    "Module {} ({}) has no variable named '{}'",
                    module_id, version.version, name
                )));
            }
        }

        for name in dependency_names(module_id, config.get("dependencies"))? {
            if !version.dependencies.iter().any(|d| d.id == name) {
                return Err(ApiError::Validation(format!(
                    "Module {} ({}) has no dependency named '{}'",
                    module_id, version.version, name
                )));
            }
        }

        Ok(())
    }
}

// Variables come either as a mapping of name -> value or as a list of
// `{name, value}` items.
fn variable_names(module_id: &str, value: Option<&serde_yaml::Value>) -> Result<Vec<String>> {
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(Vec::new()),
        Some(serde_yaml::Value::Mapping(m)) => Ok(m
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect()),
        Some(serde_yaml::Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                item.get("name")
                    .and_then(|n| n.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ApiError::Validation(format!(
                            "Module {} variables must each have a 'name'",
                            module_id
                        ))
                    })
            })
            .collect(),
        Some(_) => Err(ApiError::Validation(format!(
            "Module {} property 'variables' must be a mapping or a list",
            module_id
        ))),
    }
}

fn dependency_names(module_id: &str, value: Option<&serde_yaml::Value>) -> Result<Vec<String>> {
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(Vec::new()),
        Some(serde_yaml::Value::Sequence(items)) => items
            .iter()
            .map(|item| match item {
                serde_yaml::Value::String(s) => Ok(s.clone()),
                other => other
                    .get("name")
                    .or_else(|| other.get("id"))
                    .and_then(|n| n.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ApiError::Validation(format!(
                            "Module {} dependencies must each have a 'name'",
                            module_id
                        ))
                    }),
            })
            .collect(),
        Some(_) => Err(ApiError::Validation(format!(
            "Module {} property 'dependencies' must be a list",
            module_id
        ))),
    }
}
