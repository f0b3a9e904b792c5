use crate::domain::*;
use crate::error::Result;
use async_trait::async_trait;

pub mod in_memory;
pub mod seed;

pub use in_memory::InMemoryStorage;

/// Repository interface for architectures, BOM rows, services and compliance data.
///
/// Every call is its own unit of work; callers that issue several writes get no
/// atomicity across them.
#[async_trait]
pub trait Storage: Send + Sync {
    // Architecture operations
    async fn list_architectures(&self) -> Result<Vec<Architecture>>;
    async fn get_architecture(&self, arch_id: &str) -> Result<Option<Architecture>>;
    async fn create_architecture(&self, arch: Architecture) -> Result<Architecture>;
    async fn update_architecture(
        &self,
        arch_id: &str,
        patch: &ArchitecturePatch,
    ) -> Result<Architecture>;
    async fn delete_architecture(&self, arch_id: &str) -> Result<()>;

    // BOM operations. Rows are returned in creation order.
    async fn find_boms(&self, filter: &BomFilter) -> Result<Vec<Bom>>;
    async fn get_bom(&self, id: &str) -> Result<Option<Bom>>;
    async fn create_bom(&self, bom: NewBom) -> Result<Bom>;
    async fn update_bom(&self, id: &str, patch: &BomPatch) -> Result<Bom>;
    async fn update_boms(&self, filter: &BomFilter, patch: &BomPatch) -> Result<u64>;
    async fn delete_bom(&self, id: &str) -> Result<()>;
    async fn delete_boms(&self, filter: &BomFilter) -> Result<u64>;
    async fn count_boms(&self, filter: &BomFilter) -> Result<u64>;

    // Service operations
    async fn list_services(&self) -> Result<Vec<Service>>;
    async fn get_service(&self, service_id: &str) -> Result<Option<Service>>;
    async fn create_service(&self, service: Service) -> Result<Service>;
    async fn find_services_by_automation_id(&self, automation_id: &str) -> Result<Vec<Service>>;

    // Compliance operations
    async fn create_control(&self, control: Control) -> Result<Control>;
    async fn get_control(&self, control_id: &str) -> Result<Option<Control>>;
    async fn create_goal(&self, goal: Goal) -> Result<Goal>;
    async fn get_goal(&self, goal_id: &str) -> Result<Option<Goal>>;
    async fn create_profile(&self, profile: Profile) -> Result<Profile>;
    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>>;
    async fn create_control_mapping(&self, mapping: ControlMapping) -> Result<ControlMapping>;
    async fn find_control_mappings(
        &self,
        service_ids: &[String],
        scc_profile: Option<&str>,
    ) -> Result<Vec<ControlMapping>>;
}
