//! `lumiere`: HTTP server and tools for the Lumiere clinic demo.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lumiere_core::report::REPORT_FILENAME;
use lumiere_core::{AnalysisScores, Product};
use lumiere_runtime::{ClinicService, RuntimeConfig};

mod server;
mod voice;

#[derive(Parser, Debug)]
#[command(name = "lumiere", version, about = "Lumiere clinic demo server and tools")]
struct Cli {
    #[arg(long, global = true, help = "YAML runtime configuration")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Refuse fallback answers instead of serving them")]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the clinic API
    Serve {
        #[arg(long, help = "Address to bind, overrides server.bind")]
        bind: Option<String>,
    },
    /// Write a clinical report PDF
    Report {
        #[arg(long, help = "JSON file with spots, moisture, texture and darkCircles")]
        scores: PathBuf,
        #[arg(long, help = "JSON file with an array of recommended products")]
        products: Option<PathBuf>,
        #[arg(long, default_value = REPORT_FILENAME)]
        out: PathBuf,
    },
    /// Run a voice session, reading audio from stdin
    Voice {
        #[arg(long, help = "Image (data URI, base64 or URL) analysed on camera scan requests")]
        image: Option<String>,
    },
    /// Print the voice session configuration
    VoiceConfig,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if cli.strict {
        config.strict_mode = true;
    }
    let service = Arc::new(ClinicService::from_config(&config));

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            server::serve(service, &bind).await
        }
        Commands::Report { scores, products, out } => {
            let scores: AnalysisScores = read_json(&scores)?;
            let products: Vec<Product> = match &products {
                Some(path) => read_json(path)?,
                None => Vec::new(),
            };

            let report = service.clinical_report(&scores, &products).await;
            let source = report.source.to_string();
            let pdf = if config.strict_mode {
                report.into_strict()?
            } else {
                report.value
            };
            std::fs::write(&out, &pdf).with_context(|| format!("failed to write {}", out.display()))?;
            println!("Wrote {} ({} bytes, {})", out.display(), pdf.len(), source);
            Ok(())
        }
        Commands::Voice { image } => voice::run(service, &config, image).await,
        Commands::VoiceConfig => {
            let grant = service.voice_session_config().await;
            let mut json = serde_json::to_value(&grant.value)?;
            if let (Some(source), Some(object)) = (grant.source_label(), json.as_object_mut()) {
                object.insert("source".to_string(), source.into());
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
            Ok(())
        }
    }
}
