/// Config file looked up in the working directory
pub const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_MODULE_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/cloud-native-toolkit/garage-terraform-modules/gh-pages/index.yaml";
pub const DEFAULT_SERVICE_CATALOG_URL: &str = "https://globalcatalog.cloud.ibm.com";

/// Largest accepted BOM upload (100KB)
pub const MAX_BOM_FILE_BYTES: usize = 102_400;

/// Media types accepted for BOM uploads
pub const YAML_MIME_TYPES: [&str; 2] = ["application/x-yaml", "text/yaml"];

pub const BOM_KIND: &str = "BillOfMaterial";

/// Transient file written by the Markdown report variant
pub const MARKDOWN_REPORT_FILE: &str = "compliance-report.pdf";
