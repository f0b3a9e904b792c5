use super::Storage;
use crate::domain::*;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    architectures: Arc<Mutex<HashMap<String, Architecture>>>,
    boms: Arc<Mutex<Vec<Bom>>>,
    services: Arc<Mutex<HashMap<String, Service>>>,
    controls: Arc<Mutex<HashMap<String, Control>>>,
    goals: Arc<Mutex<HashMap<String, Goal>>>,
    profiles: Arc<Mutex<HashMap<String, Profile>>>,
    control_mappings: Arc<Mutex<Vec<ControlMapping>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            architectures: Arc::new(Mutex::new(HashMap::new())),
            boms: Arc::new(Mutex::new(Vec::new())),
            services: Arc::new(Mutex::new(HashMap::new())),
            controls: Arc::new(Mutex::new(HashMap::new())),
            goals: Arc::new(Mutex::new(HashMap::new())),
            profiles: Arc::new(Mutex::new(HashMap::new())),
            control_mappings: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

// A panic while holding a lock cannot leave these maps half-written, so a
// poisoned mutex is still safe to read.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn list_architectures(&self) -> Result<Vec<Architecture>> {
        let archs = lock(&self.architectures);
        let mut all: Vec<Architecture> = archs.values().cloned().collect();
        all.sort_by(|a, b| a.arch_id.cmp(&b.arch_id));
        Ok(all)
    }

    async fn get_architecture(&self, arch_id: &str) -> Result<Option<Architecture>> {
        Ok(lock(&self.architectures).get(arch_id).cloned())
    }

    async fn create_architecture(&self, arch: Architecture) -> Result<Architecture> {
        let mut archs = lock(&self.architectures);
        if archs.contains_key(&arch.arch_id) {
            return Err(ApiError::conflict(arch.arch_id.clone()));
        }
        archs.insert(arch.arch_id.clone(), arch.clone());
        debug!("Created architecture {}", arch.arch_id);
        Ok(arch)
    }

    async fn update_architecture(
        &self,
        arch_id: &str,
        patch: &ArchitecturePatch,
    ) -> Result<Architecture> {
        let mut archs = lock(&self.architectures);
        let arch = archs
            .get_mut(arch_id)
            .ok_or_else(|| ApiError::not_found("Architecture", arch_id))?;
        patch.apply(arch);
        debug!("Updated architecture {}", arch_id);
        Ok(arch.clone())
    }

    async fn delete_architecture(&self, arch_id: &str) -> Result<()> {
        lock(&self.architectures)
            .remove(arch_id)
            .ok_or_else(|| ApiError::not_found("Architecture", arch_id))?;
        debug!("Deleted architecture {}", arch_id);
        Ok(())
    }

    async fn find_boms(&self, filter: &BomFilter) -> Result<Vec<Bom>> {
        let boms = lock(&self.boms);
        Ok(boms.iter().filter(|b| filter.matches(b)).cloned().collect())
    }

    async fn get_bom(&self, id: &str) -> Result<Option<Bom>> {
        Ok(lock(&self.boms).iter().find(|b| b.id == id).cloned())
    }

    async fn create_bom(&self, bom: NewBom) -> Result<Bom> {
        let arch_id = bom
            .arch_id
            .ok_or_else(|| ApiError::Validation("BOM property 'arch_id' must be set.".into()))?;
        let bom = Bom {
            id: Uuid::new_v4().to_string(),
            arch_id,
            service_id: bom.service_id,
            desc: bom.desc,
            automation_variables: bom.automation_variables,
        };
        lock(&self.boms).push(bom.clone());
        debug!("Created bom {} for architecture {}", bom.id, bom.arch_id);
        Ok(bom)
    }

    async fn update_bom(&self, id: &str, patch: &BomPatch) -> Result<Bom> {
        let mut boms = lock(&self.boms);
        let bom = boms
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| ApiError::not_found("Bom", id))?;
        patch.apply(bom);
        debug!("Updated bom {}", id);
        Ok(bom.clone())
    }

    async fn update_boms(&self, filter: &BomFilter, patch: &BomPatch) -> Result<u64> {
        let mut boms = lock(&self.boms);
        let mut count = 0;
        for bom in boms.iter_mut().filter(|b| filter.matches(b)) {
            patch.apply(bom);
            count += 1;
        }
        debug!("Updated {} bom rows", count);
        Ok(count)
    }

    async fn delete_bom(&self, id: &str) -> Result<()> {
        let mut boms = lock(&self.boms);
        let before = boms.len();
        boms.retain(|b| b.id != id);
        if boms.len() == before {
            return Err(ApiError::not_found("Bom", id));
        }
        debug!("Deleted bom {}", id);
        Ok(())
    }

    async fn delete_boms(&self, filter: &BomFilter) -> Result<u64> {
        let mut boms = lock(&self.boms);
        let before = boms.len();
        boms.retain(|b| !filter.matches(b));
        let removed = (before - boms.len()) as u64;
        debug!("Deleted {} bom rows", removed);
        Ok(removed)
    }

    async fn count_boms(&self, filter: &BomFilter) -> Result<u64> {
        Ok(lock(&self.boms).iter().filter(|b| filter.matches(b)).count() as u64)
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        let services = lock(&self.services);
        let mut all: Vec<Service> = services.values().cloned().collect();
        all.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        Ok(all)
    }

    async fn get_service(&self, service_id: &str) -> Result<Option<Service>> {
        Ok(lock(&self.services).get(service_id).cloned())
    }

    async fn create_service(&self, service: Service) -> Result<Service> {
        lock(&self.services).insert(service.service_id.clone(), service.clone());
        debug!("Created service {}", service.service_id);
        Ok(service)
    }

    async fn find_services_by_automation_id(&self, automation_id: &str) -> Result<Vec<Service>> {
        let services = lock(&self.services);
        let mut matching: Vec<Service> = services
            .values()
            .filter(|s| s.cloud_automation_id.as_deref() == Some(automation_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        Ok(matching)
    }

    async fn create_control(&self, control: Control) -> Result<Control> {
        lock(&self.controls).insert(control.control_id.clone(), control.clone());
        Ok(control)
    }

    async fn get_control(&self, control_id: &str) -> Result<Option<Control>> {
        Ok(lock(&self.controls).get(control_id).cloned())
    }

    async fn create_goal(&self, goal: Goal) -> Result<Goal> {
        lock(&self.goals).insert(goal.goal_id.clone(), goal.clone());
        Ok(goal)
    }

    async fn get_goal(&self, goal_id: &str) -> Result<Option<Goal>> {
        Ok(lock(&self.goals).get(goal_id).cloned())
    }

    async fn create_profile(&self, profile: Profile) -> Result<Profile> {
        lock(&self.profiles).insert(profile.profile_id.clone(), profile.clone());
        Ok(profile)
    }

    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>> {
        Ok(lock(&self.profiles).get(profile_id).cloned())
    }

    async fn create_control_mapping(&self, mapping: ControlMapping) -> Result<ControlMapping> {
        lock(&self.control_mappings).push(mapping.clone());
        Ok(mapping)
    }

    async fn find_control_mappings(
        &self,
        service_ids: &[String],
        scc_profile: Option<&str>,
    ) -> Result<Vec<ControlMapping>> {
        let mappings = lock(&self.control_mappings);
        Ok(mappings
            .iter()
            .filter(|m| service_ids.iter().any(|id| id == &m.service_id))
            .filter(|m| scc_profile.map_or(true, |p| m.scc_profile == p))
            .cloned()
            .collect())
    }
}
