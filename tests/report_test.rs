mod common;

use std::sync::Arc;

use refarch_bom::constants::MARKDOWN_REPORT_FILE;
use refarch_bom::error::ApiError;
use refarch_bom::pipeline::import::BomImporter;
use refarch_bom::report::normalize::{normalize_description, normalize_implementation};
use refarch_bom::report::resolve_report_path;
use tempfile::tempdir;

use common::{
    app_state, module_catalog, report_config, seeded_storage, vpc_catalog_entry, yaml_upload,
    MockCatalogReader, TWO_MODULES,
};

#[tokio::test]
async fn compliance_report_is_a_pdf() {
    let dir = tempdir().unwrap();
    let storage = seeded_storage().await;
    BomImporter::new(storage.clone(), module_catalog())
        .import_files(&[yaml_upload(TWO_MODULES)], false)
        .await
        .unwrap();
    let catalog = Arc::new(MockCatalogReader::default().with_entry("vpc", vpc_catalog_entry()));
    let state = app_state(storage, catalog, report_config(dir.path()));

    let bytes = state
        .reports
        .render_compliance_report("two-modules", Some("fs"))
        .await
        .unwrap();

    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn report_for_unknown_architecture_is_not_found() {
    let dir = tempdir().unwrap();
    let state = app_state(
        seeded_storage().await,
        Arc::new(MockCatalogReader::default()),
        report_config(dir.path()),
    );

    let err = state
        .reports
        .render_compliance_report("missing", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound { .. }));
}

#[tokio::test]
async fn markdown_report_leaves_no_transient_file() {
    let dir = tempdir().unwrap();
    let storage = seeded_storage().await;
    BomImporter::new(storage.clone(), module_catalog())
        .import_files(&[yaml_upload(TWO_MODULES)], false)
        .await
        .unwrap();
    let state = app_state(
        storage,
        Arc::new(MockCatalogReader::default()),
        report_config(dir.path()),
    );

    let bytes = state.reports.render_markdown_report("two-modules").await.unwrap();

    assert!(bytes.starts_with(b"%PDF"));
    assert!(!dir.path().join(MARKDOWN_REPORT_FILE).exists());
}

#[test]
fn report_paths_cannot_escape_output_dir() {
    let dir = tempdir().unwrap();
    assert!(resolve_report_path(dir.path(), MARKDOWN_REPORT_FILE).is_ok());
    assert!(matches!(
        resolve_report_path(dir.path(), "../../etc/compliance-report.pdf"),
        Err(ApiError::PathSecurity(_))
    ));
}

#[test]
fn normalization_is_idempotent_on_control_texts() {
    let samples = [
        "**Control**\n\n**Supplemental Guidance**\nText **NOTE:** see below\n\n\n\nEnd",
        "##### Requirement\n\n#### Sub\n**(b)**\n\n**Note** trailing",
        "\n\n\n",
        "plain text without markup",
        "\n****Note****\n\n****NOTE:****",
        "#### #### ##### Nested\n\n",
        "##########",
    ];
    for sample in samples {
        let d = normalize_description(sample);
        assert_eq!(normalize_description(&d), d);
        let i = normalize_implementation(sample);
        assert_eq!(normalize_implementation(&i), i);
    }
}

#[test]
fn normalization_is_idempotent_on_marker_combinations() {
    const TOKENS: [&str; 11] = [
        "**", "#", "####", "#####", "note", "Note:", "\n", " ", "x", "(a)", ":",
    ];

    // Every concatenation of up to four tokens.
    let mut inputs = Vec::new();
    let mut level = vec![String::new()];
    for _ in 0..4 {
        level = level
            .iter()
            .flat_map(|prefix| TOKENS.iter().map(move |t| format!("{}{}", prefix, t)))
            .collect();
        inputs.extend(level.iter().cloned());
    }

    for input in &inputs {
        let d = normalize_description(input);
        assert_eq!(normalize_description(&d), d, "description of {:?}", input);
        let i = normalize_implementation(input);
        assert_eq!(normalize_implementation(&i), i, "implementation of {:?}", input);
    }
}
