mod common;

use std::sync::Arc;

use serde_json::json;

use refarch_bom::error::ApiError;
use refarch_bom::infra::storage_readers::StorageReaders;
use refarch_bom::pipeline::composite::CompositeAggregator;
use refarch_bom::pipeline::import::BomImporter;
use refarch_bom::storage::InMemoryStorage;

use common::{
    module_catalog, seeded_storage, vpc_catalog_entry, yaml_upload, MockCatalogReader, TWO_MODULES,
};

async fn fixture() -> (CompositeAggregator, Arc<InMemoryStorage>, Arc<MockCatalogReader>) {
    let storage = seeded_storage().await;
    BomImporter::new(storage.clone(), module_catalog())
        .import_files(&[yaml_upload(TWO_MODULES)], false)
        .await
        .unwrap();

    // Only vpc has a catalog entry; every cos lookup fails.
    let catalog = Arc::new(MockCatalogReader::default().with_entry("vpc", vpc_catalog_entry()));
    let readers = Arc::new(StorageReaders::new(storage.clone()));
    let aggregator = CompositeAggregator::new(
        storage.clone(),
        readers.clone(),
        catalog.clone(),
        module_catalog(),
        readers,
    );
    (aggregator, storage, catalog)
}

#[tokio::test]
async fn catalog_failure_keeps_row_and_siblings() {
    let (aggregator, _, catalog) = fixture().await;

    let rows = aggregator.composite_architecture("two-modules").await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(catalog.calls(), 2);
    assert_eq!(rows[0].bom.service_id, "vpc");
    assert_eq!(rows[0].catalog, Some(vpc_catalog_entry()));
    assert_eq!(rows[1].bom.service_id, "cos");
    assert!(rows[1].catalog.is_none());
    assert!(rows[1].service.is_some());
    assert!(rows.iter().all(|r| r.service.as_ref().unwrap().controls.is_none()));
}

#[tokio::test]
async fn single_composite_includes_controls_and_automation() {
    let (aggregator, storage, _) = fixture().await;
    let bom_id = first_bom_id(&storage).await;

    let composite = aggregator.composite_bom(&bom_id).await.unwrap();

    let service = composite.service.unwrap();
    assert_eq!(service.service.service_id, "vpc");
    let controls = service.controls.unwrap();
    assert_eq!(controls.len(), 1);
    assert_eq!(controls[0].control_id, "SC-7");
    assert_eq!(composite.automation.unwrap().name, "terraform-vpc");
}

#[tokio::test]
async fn composite_serializes_flat_row_with_nested_sources() {
    let (aggregator, storage, _) = fixture().await;
    let bom_id = first_bom_id(&storage).await;

    let value = serde_json::to_value(aggregator.composite_bom(&bom_id).await.unwrap()).unwrap();

    assert_eq!(value["_id"], json!(bom_id));
    assert_eq!(value["desc"], "vpc1");
    assert_eq!(value["service"]["service_id"], "vpc");
    assert_eq!(value["catalog"]["name"], "is.vpc");
}

#[tokio::test]
async fn missing_bom_is_not_found() {
    let (aggregator, _, _) = fixture().await;
    assert!(matches!(
        aggregator.composite_bom("nope").await,
        Err(ApiError::NotFound { entity: "Bom", .. })
    ));
    assert!(matches!(
        aggregator.catalog_by_bom("nope").await,
        Err(ApiError::NotFound { .. })
    ));
}

#[tokio::test]
async fn catalog_by_bom_merges_with_catalog_precedence() {
    let (aggregator, storage, _) = fixture().await;
    let bom_id = first_bom_id(&storage).await;

    let merged = aggregator.catalog_by_bom(&bom_id).await.unwrap();

    assert_eq!(merged["_id"], json!(bom_id));
    assert_eq!(merged["service_id"], "vpc");
    assert_eq!(merged["ibm_catalog_service"], "VPC Infrastructure");
    assert_eq!(merged["name"], "is.vpc");
    assert_eq!(merged["provider"]["name"], "IBM");
}

#[tokio::test]
async fn compliance_data_filters_by_profile() {
    let (aggregator, _, _) = fixture().await;

    let all = aggregator.compliance_data("two-modules", None).await.unwrap();
    assert_eq!(all.services.len(), 2);
    assert_eq!(all.mappings.len(), 2);
    assert_eq!(all.controls.len(), 2);

    let fs = aggregator
        .compliance_data("two-modules", Some("fs"))
        .await
        .unwrap();
    assert_eq!(fs.mappings.len(), 1);
    assert_eq!(fs.controls[0].control_id, "SC-7");
    assert_eq!(fs.mappings[0].profile.as_ref().unwrap().name, "Financial Services");
    assert_eq!(fs.catalog_for_service("vpc"), Some(&vpc_catalog_entry()));
    assert!(fs.catalog_for_service("cos").is_none());
}

#[tokio::test]
async fn compliance_data_requires_architecture() {
    let (aggregator, _, _) = fixture().await;
    assert!(matches!(
        aggregator.compliance_data("missing", None).await,
        Err(ApiError::NotFound { entity: "Architecture", .. })
    ));
}

async fn first_bom_id(storage: &InMemoryStorage) -> String {
    use refarch_bom::domain::BomFilter;
    use refarch_bom::storage::Storage;

    storage
        .find_boms(&BomFilter::for_architecture("two-modules"))
        .await
        .unwrap()
        .remove(0)
        .id
}
