//! BOM import: turns validated BOM documents into architecture and BOM rows.
//!
//! Documents are processed one at a time and modules one at a time within a
//! document, so the delete-then-recreate sequence of an overwrite is always
//! ordered. Writes are not transactional: if a module fails after earlier
//! modules of the same document were stored, those rows stay in place.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::bom_yaml::{check_upload, parse_bom, BomDocument, UploadedFile};
use crate::app::ports::ModuleCatalog;
use crate::domain::{Architecture, ArchitecturePatch, Bom, BomFilter, NewBom};
use crate::error::{ApiError, Result};
use crate::observability::metrics;
use crate::storage::Storage;

/// Result of a batch import, returned to API callers as `{count}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImportSummary {
    pub count: usize,
}

/// What a single document import produced.
#[derive(Debug, Clone)]
pub struct ImportedArchitecture {
    pub architecture: Architecture,
    pub created: bool,
    pub boms: Vec<Bom>,
}

pub struct BomImporter {
    storage: Arc<dyn Storage>,
    catalog: Arc<dyn ModuleCatalog>,
}

impl BomImporter {
    pub fn new(storage: Arc<dyn Storage>, catalog: Arc<dyn ModuleCatalog>) -> Self {
        Self { storage, catalog }
    }

    /// Import uploaded BOM files. Every file is checked for media type and size
    /// first; the batch stops at the first failing document.
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn import_files(
        &self,
        files: &[UploadedFile],
        overwrite: bool,
    ) -> Result<ImportSummary> {
        check_upload(files)?;

        let mut count = 0;
        for file in files {
            let result = match file.text().and_then(parse_bom) {
                Ok(doc) => self.import_document(&doc, overwrite).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(imported) => {
                    metrics::import::document_imported();
                    metrics::import::bom_rows_created(imported.boms.len());
                    count += 1;
                }
                Err(e) => {
                    metrics::import::document_failed(e.kind());
                    warn!(error = %e, imported = count, "BOM import failed");
                    return Err(e);
                }
            }
        }
        info!(count, "BOM import finished");
        Ok(ImportSummary { count })
    }

    /// Import one parsed document, replacing any BOM rows the architecture had.
    #[instrument(skip(self, doc), fields(arch_id = %doc.arch_id()))]
    pub async fn import_document(
        &self,
        doc: &BomDocument,
        overwrite: bool,
    ) -> Result<ImportedArchitecture> {
        let arch_id = doc.arch_id();

        let (architecture, created) = match self.storage.get_architecture(arch_id).await? {
            Some(_) if !overwrite => return Err(ApiError::conflict(arch_id)),
            Some(existing) => (existing, false),
            None => {
                let arch = self
                    .storage
                    .create_architecture(Architecture::placeholder(arch_id))
                    .await?;
                info!("Created architecture {}", arch_id);
                (arch, true)
            }
        };

        let removed = self
            .storage
            .delete_boms(&BomFilter::for_architecture(arch_id))
            .await?;
        if removed > 0 {
            info!(removed, "Removed previous BOM rows");
        }

        let architecture = self
            .storage
            .update_architecture(
                &architecture.arch_id,
                &ArchitecturePatch {
                    automation_variables: Some(doc.global_variables_yaml()?),
                    ..Default::default()
                },
            )
            .await?;

        let mut boms = Vec::with_capacity(doc.spec.modules.len());
        for module in &doc.spec.modules {
            let config = module.to_yaml()?;
            if let Err(e) = self
                .catalog
                .validate_module_config(&module.name, &config)
                .await
            {
                return Err(ApiError::ExternalValidation {
                    message: format!("YAML module config error for module {}", module.name),
                    architecture: Some(arch_id.to_string()),
                    details: e.to_string(),
                });
            }

            let service = self
                .storage
                .find_services_by_automation_id(&module.name)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    ApiError::Reference(format!(
                        "No service matching automation ID {}",
                        module.name
                    ))
                })?;

            let bom = self
                .storage
                .create_bom(NewBom {
                    arch_id: Some(arch_id.to_string()),
                    service_id: service.service_id,
                    desc: module.desc().to_string(),
                    automation_variables: module.automation_variables()?,
                })
                .await?;
            boms.push(bom);
        }

        info!(boms = boms.len(), created, "Imported architecture");
        Ok(ImportedArchitecture {
            architecture,
            created,
            boms,
        })
    }

    /// Create a BOM row after checking that its service exists.
    pub async fn create_bom(&self, bom: NewBom) -> Result<Bom> {
        if self.storage.get_service(&bom.service_id).await?.is_none() {
            return Err(ApiError::not_found("Service", &bom.service_id));
        }
        self.storage.create_bom(bom).await
    }

    /// Create a BOM row under an architecture. Automation variables, when
    /// present, are validated against the catalog entry of the row's service.
    #[instrument(skip(self, bom))]
    pub async fn create_architecture_bom(&self, arch_id: &str, mut bom: NewBom) -> Result<Bom> {
        if self.storage.get_architecture(arch_id).await?.is_none() {
            return Err(ApiError::not_found("Architecture", arch_id));
        }
        let service = self
            .storage
            .get_service(&bom.service_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Service", &bom.service_id))?;

        if let Some(vars) = bom.automation_variables.as_deref() {
            let config_error = |details: String| ApiError::ExternalValidation {
                message: "YAML automation variables config error.".to_string(),
                architecture: Some(arch_id.to_string()),
                details,
            };
            let automation_id = service.cloud_automation_id.as_deref().ok_or_else(|| {
                config_error(format!(
                    "Service {} is missing automation ID.",
                    service.display_name()
                ))
            })?;
            self.catalog
                .validate_module_config(automation_id, vars)
                .await
                .map_err(|e| config_error(e.to_string()))?;
        }

        bom.arch_id = Some(arch_id.to_string());
        self.storage.create_bom(bom).await
    }
}
