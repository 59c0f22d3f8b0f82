//! Storage path and extension resolution.
//!
//! Every function here is pure: the same metadata always yields the same
//! destination, which is what makes existence-based skipping safe across runs.

use crate::case_types::CaseType;
use crate::catalog::{AttachmentMetadata, CaseRecord};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Extension used when nothing better can be derived.
pub const UNKNOWN_EXTENSION: &str = "unknown";

/// Declared mimetypes that generic guessing gets wrong or does not know.
const KNOWN_EXTENSIONS: [(&str, &str); 5] = [
    ("image/jpg", "jpg"),
    ("image/jpeg", "jpg"),
    ("image/pjpeg", "jpg"),
    ("image/x-png", "png"),
    ("text/plain", "txt"),
];

static FILE_EXTENSION_RE: OnceLock<Regex> = OnceLock::new();

fn file_extension_re() -> &'static Regex {
    FILE_EXTENSION_RE.get_or_init(|| {
        Regex::new(r"^.+\.([a-zA-Z0-9]{2,4})$").expect("static extension pattern")
    })
}

/// Which tier of the fallback chain produced an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionSource {
    /// Suffix of the uploader's filename.
    FileName,
    /// Override table keyed by declared mimetype.
    KnownMimeType,
    /// Generic mimetype guesser.
    GuessedMimeType,
    /// Nothing matched; [`UNKNOWN_EXTENSION`].
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionResolution {
    /// Extension without the leading dot.
    pub extension: String,
    pub source: ExtensionSource,
}

/// Resolve a file extension from an optional filename and a declared mimetype.
///
/// Never fails. Falling back below the filename tier logs a warning.
pub fn resolve_extension(file_name: Option<&str>, mime_type: &str) -> ExtensionResolution {
    if let Some(ext) = file_name
        .and_then(|name| file_extension_re().captures(name))
        .and_then(|caps| caps.get(1))
    {
        return ExtensionResolution {
            extension: ext.as_str().to_string(),
            source: ExtensionSource::FileName,
        };
    }

    let mime = mime_type.trim().to_ascii_lowercase();

    let resolution = if let Some((_, ext)) = KNOWN_EXTENSIONS.iter().find(|(m, _)| *m == mime) {
        ExtensionResolution {
            extension: ext.to_string(),
            source: ExtensionSource::KnownMimeType,
        }
    } else if let Some(ext) = guess_extension(&mime) {
        ExtensionResolution {
            extension: ext.to_string(),
            source: ExtensionSource::GuessedMimeType,
        }
    } else {
        ExtensionResolution {
            extension: UNKNOWN_EXTENSION.to_string(),
            source: ExtensionSource::Unknown,
        }
    };

    tracing::warn!(
        file_name = file_name.unwrap_or(""),
        mime_type,
        extension = %resolution.extension,
        source = ?resolution.source,
        "extension not taken from filename"
    );

    resolution
}

fn guess_extension(mime: &str) -> Option<&'static str> {
    mime_guess::get_mime_extensions_str(mime)
        .and_then(|exts| exts.first())
        .copied()
}

/// Replace characters that would let a remote value escape its directory.
fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Destination for one attachment:
/// `{output_root}/{case_type}/files/{category}/{case_id}-{storage_key}.{extension}`.
///
/// Keyed by storage key, never by the uploader's filename.
pub fn resolve_path(
    output_root: &Path,
    case_type: &str,
    case_id: &str,
    attachment: &AttachmentMetadata,
) -> PathBuf {
    let extension = resolve_extension(attachment.file_name.as_deref(), &attachment.mime_type);
    output_root
        .join(case_type)
        .join("files")
        .join(sanitize_component(&attachment.category))
        .join(format!(
            "{}-{}.{}",
            sanitize_component(case_id),
            sanitize_component(&attachment.storage_key),
            extension.extension
        ))
}

/// Download URL: the endpoint with the attachment's href appended.
pub fn download_url(base_endpoint: &str, href: &str) -> String {
    if base_endpoint.ends_with('/') && href.starts_with('/') {
        format!("{}{}", base_endpoint.trim_end_matches('/'), href)
    } else {
        format!("{base_endpoint}{href}")
    }
}

/// One file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub url: String,
    pub destination: PathBuf,
    pub mime_type: String,
    pub case_id: String,
    pub category: String,
}

/// Build the work set for one case type.
///
/// Attachments whose destination matches an exclusion pattern are dropped,
/// and a destination already claimed by an earlier attachment is not
/// scheduled twice.
pub fn build_work_items(
    base_endpoint: &str,
    output_root: &Path,
    case_type: &CaseType,
    cases: &[CaseRecord],
) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for case in cases {
        for attachment in case.attachments() {
            let destination = resolve_path(output_root, &case_type.name, &case.id, attachment);

            if case_type.is_excluded(&destination.to_string_lossy()) {
                tracing::debug!(path = %destination.display(), "excluded by case type");
                continue;
            }
            if !seen.insert(destination.clone()) {
                tracing::debug!(path = %destination.display(), "duplicate attachment in catalog");
                continue;
            }

            items.push(WorkItem {
                url: download_url(base_endpoint, &attachment.download_href),
                destination,
                mime_type: attachment.mime_type.clone(),
                case_id: case.id.clone(),
                category: attachment.category.clone(),
            });
        }
    }

    items
}
