use serde::{Deserialize, Serialize};

/// A named reference design owning a set of BOM entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Architecture {
    pub arch_id: String,
    pub name: String,
    #[serde(default)]
    pub short_desc: String,
    #[serde(default)]
    pub long_desc: String,
    #[serde(default)]
    pub diagram_folder: Option<String>,
    #[serde(default)]
    pub diagram_link_drawio: Option<String>,
    #[serde(default)]
    pub diagram_link_png: Option<String>,
    /// Serialized YAML of the architecture's global automation variables.
    #[serde(default)]
    pub automation_variables: Option<String>,
    #[serde(default)]
    pub confidential: bool,
}

impl Architecture {
    /// Architecture created on the fly by a BOM import.
    pub fn placeholder(arch_id: &str) -> Self {
        Self {
            arch_id: arch_id.to_string(),
            name: arch_id.to_string(),
            short_desc: format!("{} Architecture.", arch_id),
            long_desc: format!("{} FS Architecture.", arch_id),
            diagram_folder: Some("placeholder".to_string()),
            diagram_link_drawio: Some("none".to_string()),
            diagram_link_png: Some("placeholder.png".to_string()),
            automation_variables: None,
            confidential: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchitecturePatch {
    pub name: Option<String>,
    pub short_desc: Option<String>,
    pub long_desc: Option<String>,
    pub diagram_folder: Option<String>,
    pub diagram_link_drawio: Option<String>,
    pub diagram_link_png: Option<String>,
    pub automation_variables: Option<String>,
    pub confidential: Option<bool>,
}

impl ArchitecturePatch {
    pub fn apply(&self, arch: &mut Architecture) {
        if let Some(v) = &self.name {
            arch.name = v.clone();
        }
        if let Some(v) = &self.short_desc {
            arch.short_desc = v.clone();
        }
        if let Some(v) = &self.long_desc {
            arch.long_desc = v.clone();
        }
        if let Some(v) = &self.diagram_folder {
            arch.diagram_folder = Some(v.clone());
        }
        if let Some(v) = &self.diagram_link_drawio {
            arch.diagram_link_drawio = Some(v.clone());
        }
        if let Some(v) = &self.diagram_link_png {
            arch.diagram_link_png = Some(v.clone());
        }
        if let Some(v) = &self.automation_variables {
            arch.automation_variables = Some(v.clone());
        }
        if let Some(v) = self.confidential {
            arch.confidential = v;
        }
    }
}

/// One line of an architecture's bill of materials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bom {
    #[serde(rename = "_id")]
    pub id: String,
    pub arch_id: String,
    pub service_id: String,
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_variables: Option<String>,
}

/// Payload for creating a BOM row; the id is assigned by storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBom {
    /// Optional when the row is created under an architecture path.
    #[serde(default)]
    pub arch_id: Option<String>,
    pub service_id: String,
    pub desc: String,
    #[serde(default)]
    pub automation_variables: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BomPatch {
    pub arch_id: Option<String>,
    pub service_id: Option<String>,
    pub desc: Option<String>,
    pub automation_variables: Option<String>,
}

impl BomPatch {
    pub fn apply(&self, bom: &mut Bom) {
        if let Some(v) = &self.arch_id {
            bom.arch_id = v.clone();
        }
        if let Some(v) = &self.service_id {
            bom.service_id = v.clone();
        }
        if let Some(v) = &self.desc {
            bom.desc = v.clone();
        }
        if let Some(v) = &self.automation_variables {
            bom.automation_variables = Some(v.clone());
        }
    }
}

/// Equality filter over BOM rows. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BomFilter {
    pub arch_id: Option<String>,
    pub service_id: Option<String>,
    pub desc: Option<String>,
}

impl BomFilter {
    pub fn for_architecture(arch_id: &str) -> Self {
        Self {
            arch_id: Some(arch_id.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, bom: &Bom) -> bool {
        self.arch_id.as_ref().map_or(true, |v| &bom.arch_id == v)
            && self.service_id.as_ref().map_or(true, |v| &bom.service_id == v)
            && self.desc.as_ref().map_or(true, |v| &bom.desc == v)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub service_id: String,
    #[serde(default)]
    pub ibm_catalog_id: Option<String>,
    #[serde(default)]
    pub ibm_catalog_service: Option<String>,
    #[serde(default)]
    pub cloud_automation_id: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub grouping: Option<String>,
    #[serde(default)]
    pub deployment_method: Option<String>,
    #[serde(default)]
    pub provision: Option<String>,
}

impl Service {
    /// Name shown in reports: the catalog display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.ibm_catalog_service
            .as_deref()
            .unwrap_or(&self.service_id)
    }
}

/// A service, optionally together with the controls mapped to it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceWithControls {
    #[serde(flatten)]
    pub service: Service,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controls: Option<Vec<Control>>,
}

impl From<Service> for ServiceWithControls {
    fn from(service: Service) -> Self {
        Self {
            service,
            controls: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Control {
    pub control_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_control: Option<String>,
    #[serde(default)]
    pub parameters: String,
    #[serde(default)]
    pub implementation: String,
}

impl Control {
    pub fn title(&self) -> String {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => format!("{} {}", self.control_id, name),
            None => self.control_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub goal_id: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub profile_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlMapping {
    pub id: String,
    pub service_id: String,
    pub scc_profile: String,
    pub control_id: String,
    #[serde(default)]
    pub goal_ids: Vec<String>,
}

/// A control mapping with its related profile, goals and control resolved.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ControlMappingDetail {
    #[serde(flatten)]
    pub mapping: ControlMapping,
    pub control: Option<Control>,
    pub profile: Option<Profile>,
    pub goals: Vec<Goal>,
}
