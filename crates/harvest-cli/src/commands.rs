//! Stage orchestration: one batch per case type, summed into a run summary.

use crate::config::Config;
use anyhow::{Context, Result};
use harvest_core::{
    build_work_items, catalog_path, load_catalog, CaseType, CaseTypes, DownloadStats, FaceStats,
};
use harvest_faces::{
    case_type_images, collect_images, ArcFaceEncoder, DetectionModel, EncodingStore, FaceLayout,
    FaceStage, ScrfdDetector, StageConfig, ARCFACE_MODEL_FILE, ENCODINGS_FILE,
};
use harvest_fetch::{ensure_model, Downloader, HttpTransport, RetryPolicy};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct FaceOptions {
    pub limit: Option<usize>,
    /// Scan this directory instead of the per-case-type download folders.
    pub input: Option<PathBuf>,
    pub model: DetectionModel,
    pub force: bool,
}

/// Everything a run did, for the final report and the exit status.
#[derive(Debug, Default)]
pub struct Summary {
    pub downloads: Vec<(String, DownloadStats)>,
    pub faces: Vec<(String, FaceStats)>,
}

impl Summary {
    pub fn has_failures(&self) -> bool {
        self.downloads.iter().any(|(_, s)| s.failed > 0)
            || self.faces.iter().any(|(_, s)| s.errors > 0)
    }

    pub fn print(&self) {
        if !self.downloads.is_empty() {
            let mut total = DownloadStats::default();
            for (name, stats) in &self.downloads {
                println!("{name}: {stats}");
                for failure in &stats.failures {
                    println!("  failed: {} ({})", failure.url, failure.reason);
                }
                total += stats.clone();
            }
            println!("downloads total: {total}");
        }

        if !self.faces.is_empty() {
            let mut total = FaceStats::default();
            for (name, stats) in &self.faces {
                println!("{name}: {stats}");
                total += stats.clone();
            }
            println!("faces total: {total}");
        }
    }
}

fn retry_policy(config: &Config) -> RetryPolicy {
    RetryPolicy::new(config.max_attempts, config.retry_delay)
}

fn transport(config: &Config) -> Result<Arc<HttpTransport>> {
    let transport = HttpTransport::new(&config.user_agent, config.request_timeout)
        .context("failed to build HTTP client")?;
    Ok(Arc::new(transport))
}

/// Download every case type's attachments.
///
/// `limit` truncates each catalog's case list before work items are built.
/// An unreadable catalog or an output directory that cannot be created
/// stops the run.
pub async fn download(
    config: &Config,
    case_types: &CaseTypes,
    limit: Option<usize>,
    summary: &mut Summary,
) -> Result<()> {
    let downloader = Downloader::new(transport(config)?, retry_policy(config), config.concurrency);

    for case_type in case_types.iter() {
        let path = catalog_path(&config.output_root, &case_type.name);
        let mut cases = load_catalog(&path)
            .with_context(|| format!("cannot read {} catalog", case_type.name))?;
        if let Some(limit) = limit {
            cases.truncate(limit);
        }

        let files_root = config.output_root.join(&case_type.name).join("files");
        std::fs::create_dir_all(&files_root)
            .with_context(|| format!("cannot create {}", files_root.display()))?;

        let items = build_work_items(&config.base_endpoint, &config.output_root, case_type, &cases);
        tracing::info!(
            case_type = %case_type.name,
            cases = cases.len(),
            files = items.len(),
            "downloading"
        );

        let stats = downloader.run(items, None).await;
        summary.downloads.push((case_type.name.clone(), stats));
    }

    Ok(())
}

/// Make sure the detector (and encoder, when encodings are on) are on disk.
async fn prepare_models(config: &Config, model: DetectionModel) -> Result<()> {
    let mut files = vec![model.file_name()];
    if config.write_encodings {
        files.push(ARCFACE_MODEL_FILE);
    }

    let transport = transport(config)?;
    let retry = retry_policy(config);
    for file in files {
        let path = config.model_dir.join(file);
        ensure_model(transport.as_ref(), &retry, config.model_base_url.as_deref(), &path)
            .await
            .with_context(|| {
                format!(
                    "model {} unavailable (set HARVEST_MODEL_BASE_URL or place it in {})",
                    file,
                    config.model_dir.display()
                )
            })?;
    }
    Ok(())
}

/// Run the face stage over each case type's downloads, or over `--input`.
pub async fn faces(
    config: &Config,
    case_types: &CaseTypes,
    options: &FaceOptions,
    summary: &mut Summary,
) -> Result<()> {
    prepare_models(config, options.model).await?;

    let config = config.clone();
    let case_types: Vec<CaseType> = case_types.iter().cloned().collect();
    let options = options.clone();

    let results = tokio::task::spawn_blocking(move || -> Result<Vec<(String, FaceStats)>> {
        match &options.input {
            Some(input) => {
                let output_dir = config.output_root.join("faces");
                // Crops from earlier runs are never source images.
                let images = collect_images(input, std::slice::from_ref(&output_dir))
                    .with_context(|| format!("cannot scan {}", input.display()))?;
                let layout = FaceLayout::Flat {
                    input_root: input.clone(),
                    output_dir: output_dir.clone(),
                };
                let stats = run_stage(&config, &options, layout, &output_dir, images)?;
                Ok(vec![(input.display().to_string(), stats)])
            }
            None => {
                let mut results = Vec::new();
                for case_type in &case_types {
                    let images = case_type_images(&config.output_root, case_type);
                    let type_root = config.output_root.join(&case_type.name);
                    let layout = FaceLayout::PerCaseType {
                        faces_dir: type_root.join("faces"),
                    };
                    tracing::info!(case_type = %case_type.name, "extracting faces");
                    let stats = run_stage(&config, &options, layout, &type_root, images)?;
                    results.push((case_type.name.clone(), stats));
                }
                Ok(results)
            }
        }
    })
    .await
    .context("face stage worker panicked")??;

    summary.faces.extend(results);
    Ok(())
}

/// Build a stage for one layout and run it. `store_dir` holds the
/// encoding store when encodings are on.
fn run_stage(
    config: &Config,
    options: &FaceOptions,
    layout: FaceLayout,
    store_dir: &Path,
    mut images: Vec<PathBuf>,
) -> Result<FaceStats> {
    if let Some(limit) = options.limit {
        images.truncate(limit);
    }
    tracing::info!(images = images.len(), model = %options.model, "found images");

    let detector = ScrfdDetector::for_model(&config.model_dir, options.model)
        .context("failed to load face detector")?;
    let stage_config = StageConfig {
        padding: config.padding,
        force_overwrite: options.force,
    };
    let mut stage = FaceStage::new(Box::new(detector), layout, stage_config);

    if config.write_encodings {
        let encoder = ArcFaceEncoder::from_dir(&config.model_dir)
            .context("failed to load face encoder")?;
        let store = EncodingStore::create(&store_dir.join(ENCODINGS_FILE))
            .context("failed to open encoding store")?;
        stage = stage.with_encodings(Box::new(encoder), store);
    }

    Ok(stage.run(&images))
}
