//! Run-statistics accumulators.
//!
//! Each stage returns one of these per batch; callers sum them with `+=`
//! rather than sharing counters.

use serde::Serialize;
use std::fmt;
use std::ops::AddAssign;
use std::path::PathBuf;

/// A download that did not produce a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDownload {
    pub url: String,
    pub destination: PathBuf,
    pub case_id: String,
    pub reason: String,
}

/// Counters for one or more Download Scheduler batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadStats {
    /// Work items considered (after any limit).
    pub total: usize,
    /// Destination already present; no request made.
    pub skipped_existing: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub failures: Vec<FailedDownload>,
}

impl DownloadStats {
    pub fn record_failure(&mut self, failure: FailedDownload) {
        self.failed += 1;
        self.failures.push(failure);
    }

    /// Requests actually issued.
    pub fn attempted(&self) -> usize {
        self.downloaded + self.failed
    }
}

impl AddAssign for DownloadStats {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.skipped_existing += other.skipped_existing;
        self.downloaded += other.downloaded;
        self.failed += other.failed;
        self.failures.extend(other.failures);
    }
}

impl fmt::Display for DownloadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} skipped (existing), {} downloaded, {} failed",
            self.total, self.skipped_existing, self.downloaded, self.failed
        )
    }
}

/// A source image that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedImage {
    pub path: PathBuf,
    pub reason: String,
}

/// Counters for one or more Face Extraction Stage batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FaceStats {
    /// Source images attempted, including failed ones.
    pub processed: usize,
    pub faces_detected: usize,
    pub faces_written: usize,
    /// Face outputs already on disk and left untouched.
    pub skipped_duplicate: usize,
    pub errors: usize,
    pub failures: Vec<FailedImage>,
}

impl FaceStats {
    pub fn record_failure(&mut self, failure: FailedImage) {
        self.errors += 1;
        self.failures.push(failure);
    }
}

impl AddAssign for FaceStats {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.faces_detected += other.faces_detected;
        self.faces_written += other.faces_written;
        self.skipped_duplicate += other.skipped_duplicate;
        self.errors += other.errors;
        self.failures.extend(other.failures);
    }
}

impl fmt::Display for FaceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} images: {} faces detected, {} written, {} skipped (existing), {} errors",
            self.processed,
            self.faces_detected,
            self.faces_written,
            self.skipped_duplicate,
            self.errors
        )
    }
}
