use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use refarch_bom::catalog::{CachedModuleCatalog, HttpCatalogSource, HttpServiceCatalog};
use refarch_bom::config::Config;
use refarch_bom::constants::YAML_MIME_TYPES;
use refarch_bom::observability::{init_logging, metrics};
use refarch_bom::pipeline::bom_yaml::UploadedFile;
use refarch_bom::server::{start_server, AppState};
use refarch_bom::storage::{seed, InMemoryStorage, Storage};

#[derive(Parser)]
#[command(name = "refarch_bom")]
#[command(about = "Reference architecture bill-of-materials service")]
#[command(version)]
struct Cli {
    /// Config file (defaults to config.toml in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port override
        #[arg(long)]
        port: Option<u16>,
    },
    /// Import BOM YAML files into the seeded in-memory store
    Import {
        /// BOM documents to import
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Replace architectures that already exist
        #[arg(long)]
        overwrite: bool,
    },
    /// Render the compliance report of an architecture to a PDF file
    Report {
        arch_id: String,
        /// Security and compliance profile; every profile when omitted
        #[arg(long)]
        profile: Option<String>,
        #[arg(long, default_value = "compliance-report.pdf")]
        out: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if path.is_some() {
        dotenv::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok())?;
    }
    Ok(config)
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    if let Some(seed_file) = &config.storage.seed_file {
        seed::load_seed_file(seed_file, storage.as_ref())
            .await
            .with_context(|| format!("loading seed file {}", seed_file.display()))?;
    }

    let source = HttpCatalogSource::new(
        config.catalog.module_catalog_url.clone(),
        config.catalog.timeout(),
    )?;
    let modules = Arc::new(CachedModuleCatalog::new(source, config.catalog.cache_ttl()));
    let services = Arc::new(HttpServiceCatalog::new(
        config.catalog.service_catalog_url.clone(),
        storage.clone(),
        config.catalog.timeout(),
        config.catalog.cache_ttl(),
    )?);

    Ok(AppState::new(
        storage,
        modules,
        services,
        config.report.clone(),
    ))
}

fn mimetype_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => YAML_MIME_TYPES[0],
        _ => "application/octet-stream",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    let _guard = init_logging(&config.logging.directory);

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            metrics::init().map_err(|e| anyhow::anyhow!("{}", e))?;
            let state = build_state(&config).await?;
            start_server(state, &config).await?;
        }
        Commands::Import { files, overwrite } => {
            let state = build_state(&config).await?;
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                uploads.push(UploadedFile::new(mimetype_for(path), bytes));
            }
            match state.importer.import_files(&uploads, overwrite).await {
                Ok(summary) => {
                    info!(count = summary.count, "Import complete");
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                Err(e) => {
                    error!(error = %e, "Import failed");
                    println!("{}", serde_json::to_string_pretty(&e.body())?);
                    std::process::exit(1);
                }
            }
        }
        Commands::Report {
            arch_id,
            profile,
            out,
        } => {
            let state = build_state(&config).await?;
            let bytes = state
                .reports
                .render_compliance_report(&arch_id, profile.as_deref())
                .await?;
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            info!(path = %out.display(), bytes = bytes.len(), "Report written");
        }
    }

    Ok(())
}
