//! Compliance report rendering.

pub mod compliance;
pub mod markdown;
pub mod normalize;
pub mod pdf;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument};

use crate::config::ReportConfig;
use crate::constants::MARKDOWN_REPORT_FILE;
use crate::error::{ApiError, Result};
use crate::observability::metrics;
use crate::pipeline::composite::CompositeAggregator;
use crate::storage::Storage;

pub use compliance::{build_compliance_document, markdown_document, markdown_report};
pub use markdown::resolve_report_path;
pub use pdf::{Block, PdfRenderer, ReportDocument};

pub struct ReportRenderer {
    storage: Arc<dyn Storage>,
    aggregator: Arc<CompositeAggregator>,
    config: ReportConfig,
    pdf: PdfRenderer,
}

impl ReportRenderer {
    pub fn new(
        storage: Arc<dyn Storage>,
        aggregator: Arc<CompositeAggregator>,
        config: ReportConfig,
    ) -> Self {
        let pdf = PdfRenderer::new(Some(config.font_path.clone()));
        Self {
            storage,
            aggregator,
            config,
            pdf,
        }
    }

    /// Full compliance report for an architecture. Without a profile, control
    /// mappings of every profile are included.
    #[instrument(skip(self))]
    pub async fn render_compliance_report(
        &self,
        arch_id: &str,
        profile: Option<&str>,
    ) -> Result<Vec<u8>> {
        let started = Instant::now();
        let data = self.aggregator.compliance_data(arch_id, profile).await?;
        let document = build_compliance_document(&data, &self.config.images_dir);
        let bytes = self.render(document).await?;

        metrics::report::rendered("compliance", started.elapsed().as_secs_f64());
        info!(
            services = data.services.len(),
            controls = data.controls.len(),
            bytes = bytes.len(),
            "Rendered compliance report"
        );
        Ok(bytes)
    }

    /// Short report listing an architecture's services, produced from Markdown.
    /// The PDF is written to a transient file in the output directory, returned
    /// and removed.
    #[instrument(skip(self))]
    pub async fn render_markdown_report(&self, arch_id: &str) -> Result<Vec<u8>> {
        let started = Instant::now();
        let arch = self
            .storage
            .get_architecture(arch_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Architecture", arch_id))?;

        let rows = self.aggregator.composite_architecture(arch_id).await?;
        let mut seen = HashSet::new();
        let names: Vec<String> = rows
            .iter()
            .map(|row| {
                row.service
                    .as_ref()
                    .map(|s| s.service.display_name().to_string())
                    .unwrap_or_else(|| row.bom.service_id.clone())
            })
            .filter(|name| seen.insert(name.clone()))
            .collect();

        let path = resolve_report_path(&self.config.output_dir, MARKDOWN_REPORT_FILE)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let document = markdown_document(&arch.name, &markdown_report(&arch, &names));
        let pdf = self.pdf.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || pdf.render_to_path(&document, &target))
            .await
            .map_err(|e| ApiError::Render(e.to_string()))??;
        let bytes = markdown::take_report_file(&path).await?;

        metrics::report::rendered("markdown", started.elapsed().as_secs_f64());
        info!(services = names.len(), "Rendered markdown report");
        Ok(bytes)
    }

    async fn render(&self, document: ReportDocument) -> Result<Vec<u8>> {
        let pdf = self.pdf.clone();
        tokio::task::spawn_blocking(move || pdf.render(&document))
            .await
            .map_err(|e| ApiError::Render(e.to_string()))?
    }
}
