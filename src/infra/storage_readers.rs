use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::app::ports::{ControlMappingReader, ServiceReader};
use crate::domain::{Control, ControlMappingDetail, Service, ServiceWithControls};
use crate::error::{ApiError, Result};
use crate::storage::Storage;

/// Serves the read ports straight from the repository.
#[derive(Clone)]
pub struct StorageReaders {
    storage: Arc<dyn Storage>,
}

impl StorageReaders {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ServiceReader for StorageReaders {
    async fn service(&self, service_id: &str) -> Result<Service> {
        self.storage
            .get_service(service_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Service", service_id))
    }

    async fn service_with_controls(&self, service_id: &str) -> Result<ServiceWithControls> {
        let service = self.service(service_id).await?;
        let mappings = self
            .storage
            .find_control_mappings(&[service_id.to_string()], None)
            .await?;

        let mut seen = HashSet::new();
        let mut controls: Vec<Control> = Vec::new();
        for mapping in mappings {
            if !seen.insert(mapping.control_id.clone()) {
                continue;
            }
            if let Some(control) = self.storage.get_control(&mapping.control_id).await? {
                controls.push(control);
            }
        }
        Ok(ServiceWithControls {
            service,
            controls: Some(controls),
        })
    }
}

#[async_trait]
impl ControlMappingReader for StorageReaders {
    async fn mappings_for(
        &self,
        service_ids: &[String],
        scc_profile: Option<&str>,
    ) -> Result<Vec<ControlMappingDetail>> {
        let mappings = self
            .storage
            .find_control_mappings(service_ids, scc_profile)
            .await?;

        let mut details = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let control = self.storage.get_control(&mapping.control_id).await?;
            let profile = self.storage.get_profile(&mapping.scc_profile).await?;
            let mut goals = Vec::new();
            for goal_id in &mapping.goal_ids {
                if let Some(goal) = self.storage.get_goal(goal_id).await? {
                    goals.push(goal);
                }
            }
            details.push(ControlMappingDetail {
                mapping,
                control,
                profile,
                goals,
            });
        }
        Ok(details)
    }
}
