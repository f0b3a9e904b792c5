use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hyper::Server;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::app::ports::{CatalogReader, ModuleCatalog};
use crate::config::{Config, ReportConfig};
use crate::domain::{Bom, BomFilter, BomPatch, NewBom};
use crate::error::{ApiError, Result};
use crate::infra::storage_readers::StorageReaders;
use crate::observability::metrics;
use crate::pipeline::bom_yaml::UploadedFile;
use crate::pipeline::composite::{CompositeAggregator, CompositeBom};
use crate::pipeline::import::{BomImporter, ImportSummary};
use crate::report::ReportRenderer;
use crate::storage::Storage;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, kind = self.kind(), "Request failed");
        }
        (status, Json(json!({ "error": self.body() }))).into_response()
    }
}

/// Shared handles used by every route.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub importer: Arc<BomImporter>,
    pub aggregator: Arc<CompositeAggregator>,
    pub reports: Arc<ReportRenderer>,
    pub modules: Arc<dyn ModuleCatalog>,
    pub catalog: Arc<dyn CatalogReader>,
}

impl AppState {
    /// Wire the pipeline around a store and the two catalogs.
    pub fn new(
        storage: Arc<dyn Storage>,
        modules: Arc<dyn ModuleCatalog>,
        catalog: Arc<dyn CatalogReader>,
        report: ReportConfig,
    ) -> Self {
        let readers = Arc::new(StorageReaders::new(storage.clone()));
        let importer = Arc::new(BomImporter::new(storage.clone(), modules.clone()));
        let aggregator = Arc::new(CompositeAggregator::new(
            storage.clone(),
            readers.clone(),
            catalog.clone(),
            modules.clone(),
            readers,
        ));
        let reports = Arc::new(ReportRenderer::new(
            storage.clone(),
            aggregator.clone(),
            report,
        ));
        Self {
            storage,
            importer,
            aggregator,
            reports,
            modules,
            catalog,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct ImportParams {
    overwrite: Option<String>,
}

impl ImportParams {
    /// Any value other than empty, `false` or `0` enables overwrite.
    fn overwrite(&self) -> bool {
        self.overwrite
            .as_deref()
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "false" | "0"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProfileParams {
    profile: Option<String>,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "refarch-bom",
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics_endpoint() -> Response {
    match metrics::render() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

fn pdf_response(bytes: Vec<u8>, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        Bytes::from(bytes),
    )
        .into_response()
}

// ----------------------------------------------------------------------------
// Architecture-scoped BOM routes
// ----------------------------------------------------------------------------

async fn architecture_boms(
    State(state): State<AppState>,
    Path(arch_id): Path<String>,
    Query(mut filter): Query<BomFilter>,
) -> Result<Json<Vec<Bom>>> {
    filter.arch_id = Some(arch_id);
    Ok(Json(state.storage.find_boms(&filter).await?))
}

async fn create_architecture_bom(
    State(state): State<AppState>,
    Path(arch_id): Path<String>,
    Json(bom): Json<NewBom>,
) -> Result<Json<Bom>> {
    Ok(Json(state.importer.create_architecture_bom(&arch_id, bom).await?))
}

async fn patch_architecture_boms(
    State(state): State<AppState>,
    Path(arch_id): Path<String>,
    Query(mut filter): Query<BomFilter>,
    Json(patch): Json<BomPatch>,
) -> Result<Json<CountResponse>> {
    filter.arch_id = Some(arch_id);
    let count = state.storage.update_boms(&filter, &patch).await?;
    Ok(Json(CountResponse { count }))
}

async fn delete_architecture_boms(
    State(state): State<AppState>,
    Path(arch_id): Path<String>,
    Query(mut filter): Query<BomFilter>,
) -> Result<Json<CountResponse>> {
    filter.arch_id = Some(arch_id);
    let count = state.storage.delete_boms(&filter).await?;
    Ok(Json(CountResponse { count }))
}

async fn import_boms(
    State(state): State<AppState>,
    Query(params): Query<ImportParams>,
    mut multipart: Multipart,
) -> Result<Json<ImportSummary>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        let mimetype = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        files.push(UploadedFile::new(mimetype, bytes.to_vec()));
    }
    info!(files = files.len(), overwrite = params.overwrite(), "BOM import requested");
    Ok(Json(
        state
            .importer
            .import_files(&files, params.overwrite())
            .await?,
    ))
}

async fn architecture_compliance_report(
    State(state): State<AppState>,
    Path(arch_id): Path<String>,
    Query(params): Query<ProfileParams>,
) -> Result<Response> {
    let bytes = state
        .reports
        .render_compliance_report(&arch_id, params.profile.as_deref())
        .await?;
    Ok(pdf_response(bytes, &format!("{}-compliance-report.pdf", arch_id)))
}

// ----------------------------------------------------------------------------
// BOM routes
// ----------------------------------------------------------------------------

async fn create_bom(
    State(state): State<AppState>,
    Json(bom): Json<NewBom>,
) -> Result<Json<Bom>> {
    Ok(Json(state.importer.create_bom(bom).await?))
}

async fn list_boms(
    State(state): State<AppState>,
    Query(filter): Query<BomFilter>,
) -> Result<Json<Vec<Bom>>> {
    Ok(Json(state.storage.find_boms(&filter).await?))
}

async fn count_boms(
    State(state): State<AppState>,
    Query(filter): Query<BomFilter>,
) -> Result<Json<CountResponse>> {
    let count = state.storage.count_boms(&filter).await?;
    Ok(Json(CountResponse { count }))
}

async fn patch_boms(
    State(state): State<AppState>,
    Query(filter): Query<BomFilter>,
    Json(patch): Json<BomPatch>,
) -> Result<Json<CountResponse>> {
    let count = state.storage.update_boms(&filter, &patch).await?;
    Ok(Json(CountResponse { count }))
}

async fn get_bom(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Bom>> {
    let bom = state
        .storage
        .get_bom(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Bom", &id))?;
    Ok(Json(bom))
}

async fn patch_bom(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<BomPatch>,
) -> Result<Json<Bom>> {
    Ok(Json(state.storage.update_bom(&id, &patch).await?))
}

async fn delete_bom(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.storage.delete_bom(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn composite_bom(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompositeBom>> {
    Ok(Json(state.aggregator.composite_bom(&id).await?))
}

async fn catalog_by_bom(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    Ok(Json(state.aggregator.catalog_by_bom(&id).await?))
}

async fn composite_architecture(
    State(state): State<AppState>,
    Path(arch_id): Path<String>,
) -> Result<Json<Vec<CompositeBom>>> {
    Ok(Json(state.aggregator.composite_architecture(&arch_id).await?))
}

async fn markdown_report(
    State(state): State<AppState>,
    Path(arch_id): Path<String>,
) -> Result<Response> {
    let bytes = state.reports.render_markdown_report(&arch_id).await?;
    Ok(pdf_response(bytes, crate::constants::MARKDOWN_REPORT_FILE))
}

/// Refetch the module catalog and clear cached service catalog entries.
async fn refresh_catalogs(State(state): State<AppState>) -> Result<StatusCode> {
    state.modules.refresh().await?;
    state.catalog.refresh().await?;
    info!("Catalog caches refreshed");
    Ok(StatusCode::NO_CONTENT)
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    // Path parameters share one name per segment position
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/architectures/:id/boms",
            get(architecture_boms)
                .post(create_architecture_bom)
                .patch(patch_architecture_boms)
                .delete(delete_architecture_boms),
        )
        .route("/architectures/boms/import", post(import_boms))
        .route(
            "/architectures/:id/compliance-report",
            get(architecture_compliance_report),
        )
        .route(
            "/boms",
            get(list_boms).post(create_bom).patch(patch_boms),
        )
        .route("/boms/count", get(count_boms))
        .route("/boms/catalog/:id", get(catalog_by_bom))
        .route("/boms/services/:id", get(composite_architecture))
        .route(
            "/boms/:id",
            get(get_bom).patch(patch_bom).delete(delete_bom),
        )
        .route("/boms/:id/composite", get(composite_bom))
        .route("/boms/:id/compliance-report", get(markdown_report))
        .route("/catalog/refresh", post(refresh_catalogs))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

/// Start the HTTP server with the configured address
pub async fn start_server(state: AppState, config: &Config) -> anyhow::Result<()> {
    let app = create_server(state, config.server.max_upload_bytes);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    info!(%addr, "HTTP server listening");
    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
