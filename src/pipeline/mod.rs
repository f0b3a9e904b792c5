pub mod bom_yaml;
pub mod composite;
pub mod import;
