//! QuoteDoc CLI - Bridge interface for the quotation service
//!
//! Commands: model, terms, generate
//! Outputs JSON to stdout, logs to stderr
//! Returns non-zero on failure

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quotedoc_core::{
    config::{ENV_ASSETS_DIR, ENV_CONVERTER, ENV_IMAGES_DIR, ENV_LOGO_DIR, ENV_MODE},
    GeneratorConfig, PageSetup, PipelineError, QuotationPayload, QuotationPipeline, RenderMode,
    TermsAssembler,
};

#[derive(Parser)]
#[command(name = "quotedoc-cli")]
#[command(about = "QuoteDoc CLI - Quotation Document Assembly")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Assets directory (logo, images/)
    #[arg(long, global = true, env = ENV_ASSETS_DIR)]
    assets_dir: Option<PathBuf>,

    /// Directory holding raster pages 1..8
    #[arg(long, global = true, env = ENV_IMAGES_DIR)]
    images_dir: Option<PathBuf>,

    /// Directory searched for the logo
    #[arg(long, global = true, env = ENV_LOGO_DIR)]
    logo_dir: Option<PathBuf>,

    /// Path to the wkhtmltopdf binary
    #[arg(long, global = true, env = ENV_CONVERTER)]
    converter: Option<PathBuf>,

    /// Render mode: single, summary or multipage
    #[arg(short, long, global = true, env = ENV_MODE)]
    mode: Option<String>,
}

#[derive(Args)]
struct PayloadArgs {
    /// JSON payload (QuotationPayload)
    #[arg(short, long, conflicts_with = "payload_file")]
    payload: Option<String>,

    /// File containing the JSON payload
    #[arg(long)]
    payload_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the render model for a payload
    Model {
        #[command(flatten)]
        input: PayloadArgs,
    },

    /// Print the assembled terms for a payload
    Terms {
        #[command(flatten)]
        input: PayloadArgs,
    },

    /// Generate the quotation document
    Generate {
        #[command(flatten)]
        input: PayloadArgs,

        /// Output PDF path
        #[arg(short, long)]
        output: PathBuf,

        /// Override the mode's DPI (72..=1200)
        #[arg(long)]
        dpi: Option<u32>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quotedoc=info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    match cli.command {
        Commands::Model { input } => {
            let payload = match read_payload(&input) {
                Ok(p) => p,
                Err(e) => return fail(&e),
            };
            let pipeline = QuotationPipeline::new(&config, Box::new(Unavailable));
            print_json(&pipeline.build_model(&payload, Utc::now()))
        }

        Commands::Terms { input } => {
            let payload = match read_payload(&input) {
                Ok(p) => p,
                Err(e) => return fail(&e),
            };
            print_json(&TermsAssembler::new().assemble(&payload, Utc::now()))
        }

        Commands::Generate { input, output, dpi } => {
            let payload = match read_payload(&input) {
                Ok(p) => p,
                Err(e) => return fail(&e),
            };

            let mut pipeline = match QuotationPipeline::from_config(&config) {
                Ok(p) => p,
                Err(e) => return fail(&e.to_string()),
            };
            if let Some(dpi) = dpi {
                match PageSetup::for_mode(config.mode).with_dpi(dpi) {
                    Ok(setup) => pipeline = pipeline.with_setup(setup),
                    Err(e) => return fail(e),
                }
            }

            match pipeline.generate(&payload, &output) {
                Ok(report) => print_json(&serde_json::json!({
                    "success": true,
                    "report": report,
                })),
                Err(e) => {
                    let debug_markup = match &e {
                        PipelineError::Production { debug_markup, .. } => debug_markup.clone(),
                        _ => None,
                    };
                    let output = serde_json::json!({
                        "success": false,
                        "error": e.to_string(),
                        "debug_markup": debug_markup,
                    });
                    println!("{}", output);
                    ExitCode::from(2)
                }
            }
        }
    }
}

/// Stands in for the converter when only the model is needed.
struct Unavailable;

impl quotedoc_core::PageProducer for Unavailable {
    fn produce(
        &self,
        _markup: &str,
        _setup: &PageSetup,
        _output: &std::path::Path,
    ) -> Result<(), quotedoc_core::ProducerError> {
        Err(quotedoc_core::ProducerError::Other("no converter configured".into()))
    }
}

fn build_config(cli: &Cli) -> Result<GeneratorConfig, String> {
    let mut config = match &cli.assets_dir {
        Some(dir) => GeneratorConfig::new(dir),
        None => GeneratorConfig::from_env(),
    };
    if let Some(dir) = &cli.images_dir {
        config.images_dir = dir.clone();
    }
    if let Some(dir) = &cli.logo_dir {
        config.logo_dir = dir.clone();
    }
    if let Some(path) = &cli.converter {
        config.converter_path = path.clone();
    }
    if let Some(raw) = &cli.mode {
        config.mode = raw.parse::<RenderMode>().map_err(|e| e.to_string())?;
    }
    Ok(config)
}

fn read_payload(input: &PayloadArgs) -> Result<QuotationPayload, String> {
    let text = match (&input.payload, &input.payload_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?,
        (None, None) => return Err("Provide --payload or --payload-file".into()),
    };
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| format!("Invalid payload: {}", e))?;
    Ok(QuotationPayload::from_value(value))
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e.to_string()),
    }
}

fn fail(message: &str) -> ExitCode {
    println!("{}", serde_json::json!({"success": false, "error": message}));
    ExitCode::FAILURE
}
