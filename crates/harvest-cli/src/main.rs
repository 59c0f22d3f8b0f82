use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use harvest_core::CaseTypes;
use harvest_faces::DetectionModel;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{FaceOptions, Summary};
use config::Config;

#[derive(Parser, Debug)]
#[command(name = "harvest", about = "Download NamUs case media and extract faces", version)]
struct Cli {
    /// Root of the output tree (overrides HARVEST_OUTPUT_ROOT)
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,

    /// Case-type table (TOML) to use instead of the built-in one
    #[arg(long = "case-types", value_name = "FILE", global = true)]
    case_types_file: Option<PathBuf>,

    /// Exit non-zero if any item failed
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct SelectArgs {
    /// Process at most this many cases (download) or images (faces) per case type
    #[arg(short, long)]
    limit: Option<usize>,

    /// Only these case types (repeatable; default: all)
    #[arg(long = "case-type", value_name = "NAME")]
    case_type: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct FetchArgs {
    /// Maximum requests in flight (overrides HARVEST_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
struct FaceArgs {
    /// Process every image under this directory instead of the downloads
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Detection model: fast or accurate
    #[arg(short, long, default_value = "fast")]
    model: DetectionModel,

    /// Crop padding as a fraction of the face size (overrides HARVEST_PADDING)
    #[arg(short, long)]
    padding: Option<f32>,

    /// Rewrite face crops that already exist
    #[arg(short, long)]
    force: bool,

    /// Do not record face encodings
    #[arg(long)]
    no_encodings: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download attachments for each case type's catalog
    Download {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Extract faces from downloaded images
    Faces {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        faces: FaceArgs,
    },
    /// Download, then extract faces
    Run {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        fetch: FetchArgs,
        #[command(flatten)]
        faces: FaceArgs,
    },
}

impl FetchArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
    }
}

impl FaceArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(padding) = self.padding {
            config.padding = padding;
        }
        if self.no_encodings {
            config.write_encodings = false;
        }
    }

    fn options(&self, limit: Option<usize>) -> FaceOptions {
        FaceOptions {
            limit,
            input: self.input.clone(),
            model: self.model,
            force: self.force,
        }
    }
}

fn load_case_types(path: Option<&PathBuf>, select: &[String]) -> Result<CaseTypes> {
    let all = match path {
        Some(path) => CaseTypes::load(path)
            .with_context(|| format!("cannot load case types from {}", path.display()))?,
        None => CaseTypes::builtin().context("built-in case types are invalid")?,
    };
    all.select(select).context("bad --case-type")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(root) = &cli.output_root {
        config.output_root = root.clone();
    }

    let mut summary = Summary::default();
    match &cli.command {
        Commands::Download { select, fetch } => {
            fetch.apply(&mut config);
            let case_types = load_case_types(cli.case_types_file.as_ref(), &select.case_type)?;
            commands::download(&config, &case_types, select.limit, &mut summary).await?;
        }
        Commands::Faces { select, faces } => {
            faces.apply(&mut config);
            let case_types = load_case_types(cli.case_types_file.as_ref(), &select.case_type)?;
            let options = faces.options(select.limit);
            commands::faces(&config, &case_types, &options, &mut summary).await?;
        }
        Commands::Run { select, fetch, faces } => {
            fetch.apply(&mut config);
            faces.apply(&mut config);
            let case_types = load_case_types(cli.case_types_file.as_ref(), &select.case_type)?;
            commands::download(&config, &case_types, select.limit, &mut summary).await?;
            let options = faces.options(select.limit);
            commands::faces(&config, &case_types, &options, &mut summary).await?;
        }
    }

    summary.print();
    tracing::info!(failures = summary.has_failures(), "run complete");

    if cli.strict && summary.has_failures() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
