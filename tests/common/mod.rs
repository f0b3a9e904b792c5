#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use refarch_bom::app::ports::{CatalogReader, ModuleCatalog};
use refarch_bom::catalog::{CachedModuleCatalog, Catalog, StaticCatalogSource};
use refarch_bom::config::ReportConfig;
use refarch_bom::constants::YAML_MIME_TYPES;
use refarch_bom::domain::{Control, ControlMapping, Goal, Profile, Service};
use refarch_bom::error::{ApiError, Result};
use refarch_bom::pipeline::bom_yaml::UploadedFile;
use refarch_bom::server::AppState;
use refarch_bom::storage::{InMemoryStorage, Storage};

pub const CATALOG_YAML: &str = r#"
categories:
  - category: network
    modules:
      - id: github.com/cloud-native-toolkit/terraform-vpc
        name: terraform-vpc
        versions:
          - version: v1.2.0
            variables:
              - name: region
              - name: name_prefix
  - category: storage
    modules:
      - id: github.com/cloud-native-toolkit/terraform-cos
        name: terraform-cos
        versions: []
  - category: iam
    modules:
      - id: github.com/cloud-native-toolkit/terraform-iam
        name: terraform-iam
        versions: []
"#;

pub const FIN_SERVICES: &str = r#"
kind: BillOfMaterial
metadata:
  name: fin-services
spec:
  modules:
    - name: terraform-vpc
      alias: vpc1
      variables:
        region: us-south
"#;

pub const TWO_MODULES: &str = r#"
kind: BillOfMaterial
metadata:
  name: two-modules
spec:
  variables:
    region: eu-de
  modules:
    - name: terraform-vpc
      alias: vpc1
    - name: terraform-cos
"#;

pub fn service(id: &str, automation_id: &str, display: &str) -> Service {
    Service {
        service_id: id.into(),
        ibm_catalog_id: None,
        ibm_catalog_service: Some(display.into()),
        cloud_automation_id: Some(automation_id.into()),
        desc: Some(format!("{} service", display)),
        grouping: Some("Platform".into()),
        deployment_method: Some("Operator".into()),
        provision: Some("Terraform".into()),
    }
}

/// Store with two services, one control mapped to each, and a profile.
pub async fn seeded_storage() -> Arc<InMemoryStorage> {
    let storage = Arc::new(InMemoryStorage::new());
    storage
        .create_service(service("vpc", "terraform-vpc", "VPC Infrastructure"))
        .await
        .unwrap();
    storage
        .create_service(service("cos", "terraform-cos", "Cloud Object Storage"))
        .await
        .unwrap();
    storage
        .create_profile(Profile {
            profile_id: "fs".into(),
            name: "Financial Services".into(),
            description: None,
        })
        .await
        .unwrap();
    storage
        .create_goal(Goal {
            goal_id: "3000001".into(),
            description: "Check network ACLs".into(),
        })
        .await
        .unwrap();
    for (control_id, service_id, profile) in [("SC-7", "vpc", "fs"), ("SC-28", "cos", "nist")] {
        storage
            .create_control(Control {
                control_id: control_id.into(),
                name: Some(format!("{} name", control_id)),
                description: "**Guidance**\n\n\nProtect boundaries".into(),
                parent_control: None,
                parameters: "**none**".into(),
                implementation: "#### Approach\nUse ACLs".into(),
            })
            .await
            .unwrap();
        storage
            .create_control_mapping(ControlMapping {
                id: format!("{}-{}", service_id, control_id),
                service_id: service_id.into(),
                scc_profile: profile.into(),
                control_id: control_id.into(),
                goal_ids: vec!["3000001".into()],
            })
            .await
            .unwrap();
    }
    storage
}

pub fn module_catalog() -> Arc<dyn ModuleCatalog> {
    Arc::new(CachedModuleCatalog::new(
        StaticCatalogSource(Catalog::from_yaml(CATALOG_YAML).unwrap()),
        Duration::from_secs(60),
    ))
}

/// Service catalog stand-in that answers from a fixed map and fails for
/// every other service id.
#[derive(Default)]
pub struct MockCatalogReader {
    pub entries: HashMap<String, Value>,
    pub calls: AtomicUsize,
    pub refreshes: AtomicUsize,
}

impl MockCatalogReader {
    pub fn with_entry(mut self, service_id: &str, entry: Value) -> Self {
        self.entries.insert(service_id.to_string(), entry);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogReader for MockCatalogReader {
    async fn catalog_by_service_id(&self, service_id: &str) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .get(service_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("CatalogEntry", service_id))
    }

    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn vpc_catalog_entry() -> Value {
    json!({
        "name": "is.vpc",
        "provider": { "name": "IBM" },
        "overview_ui": { "en": { "description": "Virtual private cloud" } }
    })
}

pub fn report_config(dir: &std::path::Path) -> ReportConfig {
    ReportConfig {
        font_path: dir.join("missing-font.ttf"),
        images_dir: dir.join("images"),
        output_dir: dir.to_path_buf(),
    }
}

pub fn app_state(
    storage: Arc<InMemoryStorage>,
    catalog: Arc<MockCatalogReader>,
    report: ReportConfig,
) -> AppState {
    AppState::new(storage, module_catalog(), catalog, report)
}

pub fn yaml_upload(raw: &str) -> UploadedFile {
    UploadedFile::new(YAML_MIME_TYPES[0], raw.as_bytes().to_vec())
}
