//! Source identity and face output naming.
//!
//! Every face written for one source image shares a key derived from that
//! image's path, so outputs group by source and re-runs land on the same
//! filenames.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Identifier used when a path carries no usable token.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// Crop extensions the stage writes; anything else becomes [`DEFAULT_FACE_EXTENSION`].
pub const FACE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
pub const DEFAULT_FACE_EXTENSION: &str = "jpg";

static NUMERIC_TOKEN_RE: OnceLock<Regex> = OnceLock::new();
static CASE_PREFIX_RE: OnceLock<Regex> = OnceLock::new();

fn numeric_token_re() -> &'static Regex {
    NUMERIC_TOKEN_RE.get_or_init(|| Regex::new(r"\d+").expect("static numeric pattern"))
}

fn case_prefix_re() -> &'static Regex {
    CASE_PREFIX_RE.get_or_init(|| Regex::new(r"^([^-]+)-").expect("static case prefix pattern"))
}

/// Derive an external identifier from an image path.
///
/// Looks for the first run of digits in the directory segments, nearest
/// parent first, then in the file name. Falls back to
/// [`UNKNOWN_IDENTIFIER`]. Pass a path relative to the scan root so that
/// digits in the root itself are not picked up.
///
/// This is a heuristic: a path with several numeric tokens resolves to
/// whichever is found first in that order.
pub fn extract_identifier(path: &Path) -> String {
    let first_number = |segment: &std::ffi::OsStr| {
        segment
            .to_str()
            .and_then(|s| numeric_token_re().find(s))
            .map(|m| m.as_str().to_string())
    };

    let from_dirs = path
        .parent()
        .into_iter()
        .flat_map(|p| p.iter().rev())
        .find_map(first_number);

    from_dirs
        .or_else(|| path.file_name().and_then(first_number))
        .unwrap_or_else(|| {
            tracing::warn!(path = %path.display(), "no identifier in path, using fallback");
            UNKNOWN_IDENTIFIER.to_string()
        })
}

/// Lowercased source suffix if it is an allowed crop format, else the default.
pub fn face_extension(source: &Path) -> String {
    source
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| FACE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or_else(|| DEFAULT_FACE_EXTENSION.to_string())
}

/// Where face crops go and how their names are keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceLayout {
    /// `{output_dir}/{identifier}-face{i}.{ext}`, identifier taken from the
    /// image path relative to `input_root`.
    Flat {
        input_root: PathBuf,
        output_dir: PathBuf,
    },
    /// `{faces_dir}/{caseId}-{category}-face{i}.{ext}` for images stored as
    /// `.../{category}/{caseId}-{storageKey}.{ext}`.
    PerCaseType { faces_dir: PathBuf },
}

impl FaceLayout {
    pub fn output_dir(&self) -> &Path {
        match self {
            Self::Flat { output_dir, .. } => output_dir,
            Self::PerCaseType { faces_dir } => faces_dir,
        }
    }

    /// Key shared by every face output of `image`.
    pub fn source_key(&self, image: &Path) -> String {
        match self {
            Self::Flat { input_root, .. } => {
                extract_identifier(image.strip_prefix(input_root).unwrap_or(image))
            }
            Self::PerCaseType { .. } => {
                let case_id = image
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| case_prefix_re().captures(n))
                    .and_then(|c| c.get(1))
                    .map_or(UNKNOWN_IDENTIFIER, |m| m.as_str());
                let category = image
                    .parent()
                    .and_then(|p| p.file_name())
                    .and_then(|n| n.to_str())
                    .unwrap_or(UNKNOWN_IDENTIFIER);
                format!("{case_id}-{category}")
            }
        }
    }

    pub fn output_path(&self, key: &str, index: usize, extension: &str) -> PathBuf {
        self.output_dir().join(format!("{key}-face{index}.{extension}"))
    }
}
