//! harvest-core: catalog schema and deterministic storage layout.
//!
//! Turns parsed case records into download work items whose destination
//! paths are stable across runs, so that "the file already exists" can be
//! used as the completion marker for every later stage.

pub mod case_types;
pub mod catalog;
pub mod fsutil;
pub mod paths;
pub mod stats;

pub use case_types::{CaseType, CaseTypeError, CaseTypes};
pub use catalog::{catalog_path, load_catalog, AttachmentMetadata, CaseRecord, CatalogError};
pub use fsutil::{is_hidden, write_atomic};
pub use paths::{
    build_work_items, download_url, resolve_extension, resolve_path, ExtensionResolution,
    ExtensionSource, WorkItem,
};
pub use stats::{DownloadStats, FaceStats, FailedDownload, FailedImage};

/// Log a progress line every this many completed items.
pub const FEEDBACK_INTERVAL: usize = 50;
