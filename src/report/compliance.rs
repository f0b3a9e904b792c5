//! Compliance report content: which blocks a report is made of, built from
//! the aggregated architecture data.

use std::path::{Path, PathBuf};

use pulldown_cmark::{Event, HeadingLevel, Parser as MdParser, Tag, TagEnd};
use serde_json::Value;

use super::normalize::{normalize_description, normalize_implementation, strip_parameters};
use super::pdf::{Block, ReportDocument};
use crate::domain::{Architecture, Service};
use crate::pipeline::composite::ComplianceData;

const SECTION_SIZE: f32 = 24.0;
const ITEM_SIZE: f32 = 20.0;
const FIELD_SIZE: f32 = 16.0;

/// Location of the architecture diagram, when the architecture names one.
pub fn diagram_path(images_dir: &Path, arch: &Architecture) -> Option<PathBuf> {
    let folder = arch.diagram_folder.as_deref().filter(|f| !f.is_empty())?;
    let png = arch.diagram_link_png.as_deref().filter(|f| !f.is_empty())?;
    Some(images_dir.join(folder).join(png))
}

fn catalog_str<'a>(catalog: Option<&'a Value>, pointer: &str) -> Option<&'a str> {
    catalog?.pointer(pointer)?.as_str()
}

/// Description shown for a service: the catalog long description, then the
/// catalog description, then the service's own.
pub fn service_description(service: &Service, catalog: Option<&Value>) -> String {
    catalog_str(catalog, "/overview_ui/en/long_description")
        .or_else(|| catalog_str(catalog, "/overview_ui/en/description"))
        .or(service.desc.as_deref())
        .unwrap_or_default()
        .to_string()
}

/// Lay out the full compliance report.
pub fn build_compliance_document(data: &ComplianceData, images_dir: &Path) -> ReportDocument {
    let arch = &data.architecture;
    let mut doc = ReportDocument::new(format!("{} compliance report", arch.name));

    doc.push(Block::Title(arch.name.clone()));
    if let Some(path) = diagram_path(images_dir, arch).filter(|p| p.exists()) {
        doc.push(Block::Image(path));
    }
    doc.push(Block::PageBreak);

    doc.heading("Bill of Materials", SECTION_SIZE);
    for row in &data.boms {
        let name = row
            .service
            .as_ref()
            .map(|s| s.service.display_name())
            .unwrap_or(&row.bom.service_id);
        doc.bullet(format!("{}: {}", row.bom.desc, name));
    }
    doc.push(Block::Spacer(5.0));

    doc.heading("Services", SECTION_SIZE);
    for service in &data.services {
        let catalog = data.catalog_for_service(&service.service_id);
        doc.heading(service.display_name(), ITEM_SIZE)
            .heading("Description", FIELD_SIZE)
            .paragraph(service_description(service, catalog));
        if let Some(provider) = catalog_str(catalog, "/provider/name") {
            doc.bullet(format!("Provider: {}", provider));
        }
        if let Some(group) = &service.grouping {
            doc.bullet(format!("Group: {}", group));
        }
        if let Some(method) = &service.deployment_method {
            doc.bullet(format!("Deployment Method: {}", method));
        }
        if let Some(provision) = &service.provision {
            doc.bullet(format!("Provision: {}", provision));
        }
        doc.push(Block::Spacer(5.0));
    }

    doc.heading("Controls", SECTION_SIZE);
    for control in &data.controls {
        doc.heading(control.title(), ITEM_SIZE)
            .heading("Description", FIELD_SIZE)
            .paragraph(normalize_description(&control.description));
        if let Some(parent) = control.parent_control.as_deref().filter(|p| !p.is_empty()) {
            doc.bullet(format!("Parent control: {}", parent));
        }
        doc.heading("Parameters", FIELD_SIZE)
            .paragraph(strip_parameters(&control.parameters))
            .heading("Solution and Implementation", FIELD_SIZE)
            .paragraph(normalize_implementation(&control.implementation));
        doc.push(Block::Spacer(5.0));
    }

    doc
}

/// Markdown summary of an architecture's services. Line breaks in names are
/// flattened so every name stays a single heading.
pub fn markdown_report(arch: &Architecture, service_names: &[String]) -> String {
    let mut md = format!("# {} compliance report\n## Services\n", single_line(&arch.name));
    for name in service_names {
        md.push_str(&format!("### {}\n", single_line(name)));
    }
    md
}

fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

fn heading_size(level: HeadingLevel) -> f32 {
    match level {
        HeadingLevel::H1 => SECTION_SIZE,
        HeadingLevel::H2 => ITEM_SIZE,
        _ => FIELD_SIZE,
    }
}

/// Lay out Markdown as report blocks. Headings, list items and paragraphs
/// become blocks; inline markup contributes its text only.
pub fn markdown_document(title: &str, markdown: &str) -> ReportDocument {
    let mut doc = ReportDocument::new(title);
    let mut text = String::new();
    // Paragraphs nested in a list item belong to the item.
    let mut item_depth = 0usize;

    for event in MdParser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { .. }) | Event::Start(Tag::Paragraph) => {
                if item_depth == 0 {
                    text.clear();
                }
            }
            Event::Start(Tag::Item) => {
                item_depth += 1;
                text.clear();
            }
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(TagEnd::Heading(level)) => {
                doc.push(Block::Heading(text.trim().to_string(), heading_size(level)));
                text.clear();
            }
            Event::End(TagEnd::Paragraph) if item_depth == 0 => {
                doc.push(Block::Paragraph(text.trim().to_string()));
                text.clear();
            }
            Event::End(TagEnd::Paragraph) => text.push(' '),
            Event::End(TagEnd::Item) => {
                item_depth = item_depth.saturating_sub(1);
                let item = text.trim();
                if !item.is_empty() {
                    doc.push(Block::Bullet(item.to_string()));
                }
                text.clear();
            }
            _ => {}
        }
    }
    doc
}
