use super::Storage;
use crate::domain::*;
use crate::error::Result;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Fixture document used to populate a fresh store.
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub architectures: Vec<Architecture>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub controls: Vec<Control>,
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub control_mappings: Vec<ControlMapping>,
    #[serde(default)]
    pub boms: Vec<NewBom>,
}

impl SeedData {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub async fn apply(self, storage: &dyn Storage) -> Result<()> {
        let counts = (
            self.architectures.len(),
            self.services.len(),
            self.control_mappings.len(),
            self.boms.len(),
        );
        for arch in self.architectures {
            storage.create_architecture(arch).await?;
        }
        for service in self.services {
            storage.create_service(service).await?;
        }
        for control in self.controls {
            storage.create_control(control).await?;
        }
        for goal in self.goals {
            storage.create_goal(goal).await?;
        }
        for profile in self.profiles {
            storage.create_profile(profile).await?;
        }
        for mapping in self.control_mappings {
            storage.create_control_mapping(mapping).await?;
        }
        for bom in self.boms {
            storage.create_bom(bom).await?;
        }
        info!(
            architectures = counts.0,
            services = counts.1,
            control_mappings = counts.2,
            boms = counts.3,
            "Seeded storage"
        );
        Ok(())
    }
}

pub async fn load_seed_file(path: &Path, storage: &dyn Storage) -> Result<()> {
    let raw = tokio::fs::read_to_string(path).await?;
    SeedData::from_yaml(&raw)?.apply(storage).await
}
