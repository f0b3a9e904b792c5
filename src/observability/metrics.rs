//! Metrics for the BOM service.
//!
//! Names follow the Prometheus conventions and are listed once in
//! [`MetricName`] so call sites never spell them by hand.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Import metrics
    ImportDocumentsSuccess,
    ImportDocumentsError,
    ImportBomRowsCreated,

    // Catalog metrics
    CatalogFetchSuccess,
    CatalogFetchError,
    CatalogFetchDuration,

    // Composite metrics
    CompositeFetchErrors,

    // Report metrics
    ReportRendered,
    ReportRenderDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ImportDocumentsSuccess => "refarch_bom_imports_total",
            MetricName::ImportDocumentsError => "refarch_bom_import_errors_total",
            MetricName::ImportBomRowsCreated => "refarch_bom_rows_created_total",
            MetricName::CatalogFetchSuccess => "refarch_catalog_fetch_total",
            MetricName::CatalogFetchError => "refarch_catalog_fetch_errors_total",
            MetricName::CatalogFetchDuration => "refarch_catalog_fetch_duration_seconds",
            MetricName::CompositeFetchErrors => "refarch_composite_fetch_errors_total",
            MetricName::ReportRendered => "refarch_reports_rendered_total",
            MetricName::ReportRenderDuration => "refarch_report_render_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            ImportDocumentsSuccess,
            ImportDocumentsError,
            ImportBomRowsCreated,
            CatalogFetchSuccess,
            CatalogFetchError,
            CatalogFetchDuration,
            CompositeFetchErrors,
            ReportRendered,
            ReportRenderDuration,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Render the current metrics in the Prometheus text format.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|h| h.render())
}

// ============================================================================
// Import Metrics
// ============================================================================

pub mod import {
    use super::MetricName;

    pub fn document_imported() {
        ::metrics::counter!(MetricName::ImportDocumentsSuccess.as_str()).increment(1);
    }

    pub fn document_failed(kind: &'static str) {
        ::metrics::counter!(MetricName::ImportDocumentsError.as_str(), "kind" => kind)
            .increment(1);
    }

    pub fn bom_rows_created(count: usize) {
        ::metrics::counter!(MetricName::ImportBomRowsCreated.as_str()).increment(count as u64);
    }
}

// ============================================================================
// Catalog Metrics
// ============================================================================

pub mod catalog {
    use super::MetricName;

    pub fn fetch_success(secs: f64) {
        ::metrics::counter!(MetricName::CatalogFetchSuccess.as_str()).increment(1);
        ::metrics::histogram!(MetricName::CatalogFetchDuration.as_str()).record(secs);
    }

    pub fn fetch_error() {
        ::metrics::counter!(MetricName::CatalogFetchError.as_str()).increment(1);
    }
}

// ============================================================================
// Composite Metrics
// ============================================================================

pub mod composite {
    use super::MetricName;

    /// A source failed while enriching a BOM row and was left out.
    pub fn fetch_error(source: &'static str) {
        ::metrics::counter!(MetricName::CompositeFetchErrors.as_str(), "source" => source)
            .increment(1);
    }
}

// ============================================================================
// Report Metrics
// ============================================================================

pub mod report {
    use super::MetricName;

    pub fn rendered(kind: &'static str, secs: f64) {
        ::metrics::counter!(MetricName::ReportRendered.as_str(), "kind" => kind).increment(1);
        ::metrics::histogram!(MetricName::ReportRenderDuration.as_str(), "kind" => kind)
            .record(secs);
    }
}
