//! harvest-faces: the face extraction stage.
//!
//! Detects faces in downloaded case images with SCRFD, writes one padded
//! crop per detection, and optionally records ArcFace encodings per image.
//! Both models run via ONNX Runtime on the CPU; the stage itself only sees
//! the [`FaceDetector`] and [`FaceEncoder`] traits.

mod alignment;
pub mod detector;
pub mod discover;
pub mod geometry;
pub mod identity;
pub mod recognizer;
pub mod stage;
pub mod store;
pub mod types;

pub use detector::{DetectorError, FaceDetector, ScrfdDetector};
pub use discover::{case_type_images, collect_images};
pub use geometry::{pad_and_clamp, CropRegion};
pub use identity::{extract_identifier, face_extension, FaceLayout};
pub use recognizer::{ArcFaceEncoder, FaceEncoder, RecognizerError, ARCFACE_MODEL_FILE};
pub use stage::{FaceStage, StageConfig, StageError};
pub use store::{read_records, EncodingRecord, EncodingStore, StoreError};
pub use types::{BoundingBox, DetectedFace, DetectionModel, Embedding, FaceBox};

/// File name of the per-run encoding store.
pub const ENCODINGS_FILE: &str = "FaceEncodings.jsonl";
