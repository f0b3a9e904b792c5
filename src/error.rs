use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed upload or BOM document shape.
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Conflict { arch_id: String, message: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// A referenced record (service, automation module) could not be resolved.
    #[error("{0}")]
    Reference(String),

    /// The module catalog rejected a module configuration.
    #[error("{message}")]
    ExternalValidation {
        message: String,
        architecture: Option<String>,
        details: String,
    },

    #[error("Invalid file name: {0}")]
    PathSecurity(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report rendering failed: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Wire shape of an error returned to API callers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(arch_id: impl Into<String>) -> Self {
        let arch_id = arch_id.into();
        ApiError::Conflict {
            message: format!(
                "Architecture {} already exists. Set 'overwrite' parameter to overwrite.",
                arch_id
            ),
            arch_id,
        }
    }

    /// True for failures caused by the caller's input rather than infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ApiError::Validation(_)
                | ApiError::Conflict { .. }
                | ApiError::Reference(_)
                | ApiError::ExternalValidation { .. }
                | ApiError::PathSecurity(_)
                | ApiError::Yaml(_)
        )
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Conflict { .. } => "conflict",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Reference(_) => "reference",
            ApiError::ExternalValidation { .. } => "external_validation",
            ApiError::PathSecurity(_) => "path_security",
            ApiError::Http(_) => "http",
            ApiError::Yaml(_) => "yaml",
            ApiError::Json(_) => "json",
            ApiError::Toml(_) => "toml",
            ApiError::Io(_) => "io",
            ApiError::Render(_) => "render",
            ApiError::Config(_) => "config",
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            ApiError::Conflict { arch_id, message } => ErrorBody {
                message: message.clone(),
                architecture: Some(arch_id.clone()),
                details: None,
            },
            ApiError::ExternalValidation {
                message,
                architecture,
                details,
            } => ErrorBody {
                message: message.clone(),
                architecture: architecture.clone(),
                details: Some(details.clone()),
            },
            other => ErrorBody {
                message: other.to_string(),
                architecture: None,
                details: None,
            },
        }
    }
}
