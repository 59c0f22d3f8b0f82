//! Face Extraction Stage.
//!
//! Processes images strictly one at a time in submission order. For each
//! image: decode, detect, optionally record encodings, then write one padded
//! crop per detection unless that crop already exists. A failure on one
//! image is counted and the batch moves on.

use crate::detector::{DetectorError, FaceDetector};
use crate::geometry::pad_and_clamp;
use crate::identity::{face_extension, FaceLayout};
use crate::recognizer::{FaceEncoder, RecognizerError};
use crate::store::{EncodingRecord, EncodingStore, StoreError};
use crate::types::DetectedFace;
use chrono::Utc;
use harvest_core::{write_atomic, FaceStats, FailedImage, FEEDBACK_INTERVAL};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("detection failed: {0}")]
    Detector(#[from] DetectorError),
    #[error("encoding failed: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("cannot encode crop {path}: {source}")]
    EncodeCrop {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageConfig {
    /// Fraction of the box size added around each face; see [`pad_and_clamp`].
    pub padding: f32,
    /// Rewrite crops that already exist.
    pub force_overwrite: bool,
}

/// Per-image counts, folded into [`FaceStats`] by [`FaceStage::run`].
#[derive(Debug, Default)]
struct ImageOutcome {
    detected: usize,
    written: usize,
    skipped: usize,
}

pub struct FaceStage {
    detector: Box<dyn FaceDetector + Send>,
    encodings: Option<(Box<dyn FaceEncoder + Send>, EncodingStore)>,
    layout: FaceLayout,
    config: StageConfig,
    /// First source seen for each output key in this run.
    claimed_keys: HashMap<String, PathBuf>,
}

impl FaceStage {
    pub fn new(detector: Box<dyn FaceDetector + Send>, layout: FaceLayout, config: StageConfig) -> Self {
        Self {
            detector,
            encodings: None,
            layout,
            config,
            claimed_keys: HashMap::new(),
        }
    }

    /// Also record one encoding per detected face into `store`.
    pub fn with_encodings(mut self, encoder: Box<dyn FaceEncoder + Send>, store: EncodingStore) -> Self {
        self.encodings = Some((encoder, store));
        self
    }

    /// Process `images` in order and return the batch counters.
    pub fn run(&mut self, images: &[PathBuf]) -> FaceStats {
        let mut stats = FaceStats::default();
        tracing::info!(
            images = images.len(),
            output = %self.layout.output_dir().display(),
            padding = self.config.padding,
            force = self.config.force_overwrite,
            "face extraction started"
        );

        for path in images {
            stats.processed += 1;
            match self.process_image(path) {
                Ok(outcome) => {
                    stats.faces_detected += outcome.detected;
                    stats.faces_written += outcome.written;
                    stats.skipped_duplicate += outcome.skipped;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "image failed");
                    stats.record_failure(FailedImage {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            if stats.processed % FEEDBACK_INTERVAL == 0 {
                tracing::info!(
                    processed = stats.processed,
                    faces = stats.faces_written,
                    "face extraction progress"
                );
            }
        }

        tracing::info!(%stats, "face extraction finished");
        stats
    }

    fn process_image(&mut self, path: &Path) -> Result<ImageOutcome, StageError> {
        let image = image::open(path)
            .map_err(|source| StageError::Decode {
                path: path.display().to_string(),
                source,
            })?
            .to_rgb8();

        let boxes = self.detector.detect(&image)?;
        let mut outcome = ImageOutcome {
            detected: boxes.len(),
            ..Default::default()
        };
        if boxes.is_empty() {
            tracing::debug!(path = %path.display(), "no faces");
            return Ok(outcome);
        }

        if let Some((encoder, store)) = self.encodings.as_mut() {
            let faces = boxes
                .iter()
                .map(|b| encoder.encode(&image, b))
                .collect::<Result<Vec<_>, _>>()?;
            store.append(&EncodingRecord {
                source: path.to_path_buf(),
                model_version: faces.first().and_then(|e| e.model_version.clone()),
                faces: faces.into_iter().map(|e| e.values).collect(),
                recorded_at: Utc::now(),
            })?;
        }

        let source_id = self.layout.source_key(path);
        self.claim_key(&source_id, path);
        let extension = face_extension(path);
        let faces = boxes.iter().enumerate().map(|(index, b)| DetectedFace {
            bounding_box: b.to_face_box(),
            source_id: source_id.clone(),
            index,
        });

        for face in faces {
            let output = self.layout.output_path(&face.source_id, face.index, &extension);
            if output.exists() && !self.config.force_overwrite {
                tracing::debug!(output = %output.display(), "face exists, skipping");
                outcome.skipped += 1;
                continue;
            }

            let Some(region) =
                pad_and_clamp(face.bounding_box, self.config.padding, image.width(), image.height())
            else {
                tracing::warn!(
                    path = %path.display(),
                    index = face.index,
                    bbox = ?face.bounding_box,
                    "face box lies outside the image"
                );
                continue;
            };

            let crop = image::imageops::crop_imm(
                &image,
                region.left,
                region.top,
                region.width(),
                region.height(),
            )
            .to_image();
            write_crop(crop, &output, &extension)?;
            outcome.written += 1;
        }

        Ok(outcome)
    }
}

impl FaceStage {
    /// Warn when two sources map to one key: the later one's crops land on
    /// names the earlier one already holds.
    fn claim_key(&mut self, key: &str, path: &Path) {
        match self.claimed_keys.get(key) {
            Some(first) if first != path => tracing::warn!(
                key,
                path = %path.display(),
                first = %first.display(),
                "face key already used by another image; overlapping crops are skipped"
            ),
            Some(_) => {}
            None => {
                self.claimed_keys.insert(key.to_string(), path.to_path_buf());
            }
        }
    }
}

fn write_crop(crop: RgbImage, output: &Path, extension: &str) -> Result<(), StageError> {
    let format = ImageFormat::from_extension(extension).unwrap_or(ImageFormat::Jpeg);
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(crop)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(|source| StageError::EncodeCrop {
            path: output.display().to_string(),
            source,
        })?;

    write_atomic(output, &bytes).map_err(|source| StageError::Io {
        path: output.display().to_string(),
        source,
    })
}
