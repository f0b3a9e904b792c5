mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use refarch_bom::constants::MAX_BOM_FILE_BYTES;
use refarch_bom::server::create_server;

use common::{app_state, report_config, seeded_storage, vpc_catalog_entry, MockCatalogReader, FIN_SERVICES};

const BOUNDARY: &str = "refarch-test-boundary";

async fn app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MockCatalogReader::default().with_entry("vpc", vpc_catalog_entry()));
    let state = app_state(seeded_storage().await, catalog, report_config(dir.path()));
    (create_server(state, 10 * MAX_BOM_FILE_BYTES), dir)
}

fn multipart_import(uri: &str, mimetype: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"bom.yaml\"\r\nContent-Type: {m}\r\n\r\n",
        b = BOUNDARY,
        m = mimetype
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_status() {
    let (app, _dir) = app().await;
    let (status, body) = send_json(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn import_then_conflict_then_overwrite() {
    let (app, _dir) = app().await;
    let upload = |uri: &str| multipart_import(uri, "application/x-yaml", FIN_SERVICES.as_bytes());

    let (status, body) = send_json(&app, upload("/architectures/boms/import")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = send_json(&app, upload("/architectures/boms/import")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Architecture fin-services already exists. Set 'overwrite' parameter to overwrite."
    );
    assert_eq!(body["error"]["architecture"], "fin-services");

    let (status, body) =
        send_json(&app, upload("/architectures/boms/import?overwrite=true")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (_, count) = send_json(&app, get("/boms/count")).await;
    assert_eq!(count["count"], 1);
}

#[tokio::test]
async fn oversized_upload_is_a_bad_request() {
    let (app, _dir) = app().await;
    let big = vec![b'a'; 150 * 1024];

    let (status, body) = send_json(
        &app,
        multipart_import("/architectures/boms/import", "text/yaml", &big),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Files must be <= 100KB.");
}

#[tokio::test]
async fn bom_routes_serve_rows_and_composites() {
    let (app, _dir) = app().await;
    send(
        &app,
        multipart_import("/architectures/boms/import", "application/x-yaml", FIN_SERVICES.as_bytes()),
    )
    .await;

    let (status, rows) = send_json(&app, get("/architectures/fin-services/boms")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    let id = rows[0]["_id"].as_str().unwrap().to_string();

    let (status, composite) = send_json(&app, get(&format!("/boms/{}/composite", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(composite["service"]["service_id"], "vpc");
    assert_eq!(composite["catalog"]["provider"]["name"], "IBM");

    let (status, merged) = send_json(&app, get(&format!("/boms/catalog/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(merged["name"], "is.vpc");

    let (status, all) = send_json(&app, get("/boms/services/fin-services")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, body) = send_json(&app, get("/boms/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["message"].as_str().unwrap().contains("does-not-exist"));

    let delete = Request::builder()
        .method("DELETE")
        .uri("/architectures/fin-services/boms")
        .body(Body::empty())
        .unwrap();
    let (status, deleted) = send_json(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["count"], 1);
}

#[tokio::test]
async fn compliance_report_route_returns_pdf() {
    let (app, _dir) = app().await;
    send(
        &app,
        multipart_import("/architectures/boms/import", "application/x-yaml", FIN_SERVICES.as_bytes()),
    )
    .await;

    let resp = app
        .clone()
        .oneshot(get("/architectures/fin-services/compliance-report?profile=fs"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    let (status, _) = send(&app, get("/boms/fin-services/compliance-report")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get("/architectures/missing/compliance-report")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn creating_bom_for_unknown_service_is_not_found() {
    let (app, _dir) = app().await;
    let req = Request::builder()
        .method("POST")
        .uri("/boms")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"arch_id":"fin-services","service_id":"nope","desc":"x"}"#,
        ))
        .unwrap();
    let (status, _) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patching_a_bom_returns_the_updated_row() {
    let (app, _dir) = app().await;
    send(
        &app,
        multipart_import("/architectures/boms/import", "application/x-yaml", FIN_SERVICES.as_bytes()),
    )
    .await;
    let (_, rows) = send_json(&app, get("/architectures/fin-services/boms")).await;
    let id = rows[0]["_id"].as_str().unwrap().to_string();

    let patch = Request::builder()
        .method("PATCH")
        .uri(format!("/boms/{}", id))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"desc":"renamed"}"#))
        .unwrap();
    let (status, body) = send_json(&app, patch).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_id"], id.as_str());
    assert_eq!(body["desc"], "renamed");
    assert_eq!(body["service_id"], "vpc");

    let (_, stored) = send_json(&app, get(&format!("/boms/{}", id))).await;
    assert_eq!(stored["desc"], "renamed");
}

#[tokio::test]
async fn catalog_refresh_clears_service_catalog_cache() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MockCatalogReader::default());
    let state = app_state(seeded_storage().await, catalog.clone(), report_config(dir.path()));
    let app = create_server(state, MAX_BOM_FILE_BYTES);

    let refresh = Request::builder()
        .method("POST")
        .uri("/catalog/refresh")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, refresh).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(catalog.refreshes.load(std::sync::atomic::Ordering::SeqCst), 1);
}
