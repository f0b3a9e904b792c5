//! Upload checks and shape validation for bill-of-materials YAML documents.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::constants::{BOM_KIND, MAX_BOM_FILE_BYTES, YAML_MIME_TYPES};
use crate::error::{ApiError, Result};

/// One uploaded file as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub mimetype: String,
    pub bytes: Vec<u8>,
    pub size: usize,
}

impl UploadedFile {
    pub fn new(mimetype: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len();
        Self {
            mimetype: mimetype.into(),
            bytes,
            size,
        }
    }

    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes)
            .map_err(|_| ApiError::Validation("Uploaded file is not valid UTF-8.".into()))
    }
}

/// Reject the whole batch if any file has the wrong media type or is too large.
/// Runs before any file is parsed.
pub fn check_upload(files: &[UploadedFile]) -> Result<()> {
    for file in files {
        if !YAML_MIME_TYPES.contains(&file.mimetype.as_str()) {
            return Err(ApiError::Validation(
                "You must only upload YAML files.".into(),
            ));
        }
        if file.size > MAX_BOM_FILE_BYTES || file.bytes.len() > MAX_BOM_FILE_BYTES {
            return Err(ApiError::Validation("Files must be <= 100KB.".into()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomDocument {
    pub kind: String,
    pub metadata: BomMetadata,
    pub spec: BomSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomMetadata {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomSpec {
    pub modules: Vec<BomModule>,
    /// Global variables shared by every module of the architecture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomModule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Value>>,
}

impl BomModule {
    /// The module as YAML, the form the module catalog validates.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// BOM row description: the alias when set, the module name otherwise.
    pub fn desc(&self) -> &str {
        self.alias
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.name)
    }

    /// Serialized `{alias?, variables?, dependencies?}` holding only the keys
    /// the module actually sets. `None` when it sets none of them.
    pub fn automation_variables(&self) -> Result<Option<String>> {
        let vars = AutomationVariables {
            alias: self.alias.clone().filter(|a| !a.is_empty()),
            variables: self.variables.clone().filter(|v| !is_empty_value(v)),
            dependencies: self.dependencies.clone().filter(|d| !d.is_empty()),
        };
        if vars.alias.is_none() && vars.variables.is_none() && vars.dependencies.is_none() {
            return Ok(None);
        }
        Ok(Some(serde_yaml::to_string(&vars)?))
    }
}

#[derive(Debug, Serialize)]
struct AutomationVariables {
    #[serde(skip_serializing_if = "Option::is_none")]
    alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct GlobalVariables<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a Value>,
}

impl BomDocument {
    pub fn arch_id(&self) -> &str {
        &self.metadata.name
    }

    /// Serialized `{variables: ...}` stored on the architecture.
    pub fn global_variables_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&GlobalVariables {
            variables: self.spec.variables.as_ref().filter(|v| !v.is_null()),
        })?)
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Mapping(m) => m.is_empty(),
        Value::Sequence(s) => s.is_empty(),
        _ => false,
    }
}

fn invalid(msg: impl Into<String>) -> ApiError {
    ApiError::Validation(msg.into())
}

/// Parse a BOM document and enforce its required shape.
pub fn parse_bom(raw: &str) -> Result<BomDocument> {
    let doc: Value = serde_yaml::from_str(raw)
        .map_err(|e| invalid(format!("Invalid YAML document: {}", e)))?;

    if doc.get("kind").and_then(Value::as_str) != Some(BOM_KIND) {
        return Err(invalid(format!(
            "YAML property 'kind' must be set to '{}'.",
            BOM_KIND
        )));
    }

    let name = doc
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if name.trim().is_empty() {
        return Err(invalid("YAML property 'metadata.name' must be set."));
    }

    let spec = doc.get("spec");
    let modules = match spec.and_then(|s| s.get("modules")).and_then(Value::as_sequence) {
        Some(modules) if !modules.is_empty() => modules,
        _ => {
            return Err(invalid(
                "YAML property 'spec.modules' must be a list of valid terraform modules.",
            ))
        }
    };

    let mut parsed = Vec::with_capacity(modules.len());
    for (i, module) in modules.iter().enumerate() {
        parsed.push(parse_module(i, module)?);
    }

    Ok(BomDocument {
        kind: BOM_KIND.to_string(),
        metadata: BomMetadata {
            name: name.to_string(),
        },
        spec: BomSpec {
            modules: parsed,
            variables: spec.and_then(|s| s.get("variables")).cloned(),
        },
    })
}

fn parse_module(i: usize, module: &Value) -> Result<BomModule> {
    let name = module
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| invalid(format!("YAML property 'spec.modules[{}].name' must be set.", i)))?;

    let alias = match module.get("alias") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(invalid(format!(
                "YAML property 'spec.modules[{}].alias' must be a string.",
                i
            )))
        }
    };

    let variables = match module.get("variables") {
        None | Some(Value::Null) => None,
        Some(v @ Value::Mapping(_)) => Some(v.clone()),
        Some(_) => {
            return Err(invalid(format!(
                "YAML property 'spec.modules[{}].variables' must be a mapping.",
                i
            )))
        }
    };

    let dependencies = match module.get("dependencies") {
        None | Some(Value::Null) => None,
        Some(Value::Sequence(deps)) => Some(deps.clone()),
        Some(_) => {
            return Err(invalid(format!(
                "YAML property 'spec.modules[{}].dependencies' must be a list.",
                i
            )))
        }
    };

    Ok(BomModule {
        name: name.to_string(),
        alias,
        variables,
        dependencies,
    })
}
