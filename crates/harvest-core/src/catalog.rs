//! Catalog schema and load-time validation.
//!
//! The remote catalog is loosely shaped JSON: attachments carry their file
//! description either under `files.original` or under a flat `file` key, and
//! `fileName` may be absent. Both shapes are decoded into one explicit
//! [`AttachmentMetadata`] when the catalog is loaded.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed catalog {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("case {case_id}: attachment {position} has neither `files.original` nor `file`")]
    MissingFile { case_id: String, position: usize },
    #[error("case {case_id}: attachment {position} has an empty storage key")]
    EmptyStorageKey { case_id: String, position: usize },
}

/// One remote file attached to a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMetadata {
    /// Grouping label (e.g. `Clothing`, `OfficeLogo`).
    pub category: String,
    /// Stable identifier of the remote object.
    pub storage_key: String,
    pub mime_type: String,
    /// Uploader-supplied filename, if any.
    pub file_name: Option<String>,
    /// Path fragment appended to the download endpoint.
    pub download_href: String,
}

/// A case and its attachments, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    pub id: String,
    pub images: Vec<AttachmentMetadata>,
    pub documents: Vec<AttachmentMetadata>,
}

impl CaseRecord {
    /// Images followed by documents.
    pub fn attachments(&self) -> impl Iterator<Item = &AttachmentMetadata> {
        self.images.iter().chain(self.documents.iter())
    }
}

/// Case ids arrive as JSON numbers in some catalogs and strings in others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCaseId {
    Number(u64),
    Text(String),
}

impl RawCaseId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCase {
    id: RawCaseId,
    #[serde(default)]
    images: Vec<RawAttachment>,
    #[serde(default)]
    documents: Vec<RawAttachment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttachment {
    category: RawCategory,
    files: Option<RawFiles>,
    file: Option<RawFile>,
    href_download: String,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawFiles {
    original: RawFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFile {
    mime_type: String,
    file_name: Option<String>,
    storage_key: String,
}

impl RawCase {
    fn validate(self) -> Result<CaseRecord, CatalogError> {
        let id = self.id.into_string();
        let images = validate_attachments(&id, self.images, 0)?;
        let documents = validate_attachments(&id, self.documents, images.len())?;
        Ok(CaseRecord {
            id,
            images,
            documents,
        })
    }
}

fn validate_attachments(
    case_id: &str,
    raw: Vec<RawAttachment>,
    offset: usize,
) -> Result<Vec<AttachmentMetadata>, CatalogError> {
    raw.into_iter()
        .enumerate()
        .map(|(i, attachment)| {
            let position = offset + i;
            // `files.original` wins when both shapes are present.
            let file = attachment
                .files
                .map(|f| f.original)
                .or(attachment.file)
                .ok_or_else(|| CatalogError::MissingFile {
                    case_id: case_id.to_string(),
                    position,
                })?;

            if file.storage_key.trim().is_empty() {
                return Err(CatalogError::EmptyStorageKey {
                    case_id: case_id.to_string(),
                    position,
                });
            }

            Ok(AttachmentMetadata {
                category: attachment.category.name,
                storage_key: file.storage_key,
                mime_type: file.mime_type,
                file_name: file.file_name.filter(|n| !n.is_empty()),
                download_href: attachment.href_download,
            })
        })
        .collect()
}

/// Parse a catalog from a JSON array of case records.
pub fn parse_catalog(json: &str, origin: &str) -> Result<Vec<CaseRecord>, CatalogError> {
    let raw: Vec<RawCase> = serde_json::from_str(json).map_err(|source| CatalogError::Parse {
        path: origin.to_string(),
        source,
    })?;
    raw.into_iter().map(RawCase::validate).collect()
}

/// Read and validate the catalog file at `path`.
pub fn load_catalog(path: &Path) -> Result<Vec<CaseRecord>, CatalogError> {
    let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let cases = parse_catalog(&json, &path.display().to_string())?;
    tracing::debug!(path = %path.display(), cases = cases.len(), "catalog loaded");
    Ok(cases)
}

/// Catalog location for a case type: `{output_root}/{case_type}/{case_type}.json`.
pub fn catalog_path(output_root: &Path, case_type: &str) -> std::path::PathBuf {
    output_root
        .join(case_type)
        .join(format!("{case_type}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {
            "id": 42,
            "images": [
                {
                    "category": { "name": "Photo" },
                    "files": { "original": { "mimeType": "image/jpg", "storageKey": "abc" } },
                    "hrefDownload": "/dl/abc"
                }
            ],
            "documents": [
                {
                    "category": { "name": "Report" },
                    "file": { "mimeType": "application/pdf", "fileName": "report.pdf", "storageKey": "def" },
                    "hrefDownload": "/dl/def"
                }
            ]
        }
    ]"#;

    #[test]
    fn test_parse_both_attachment_shapes() {
        let cases = parse_catalog(CATALOG, "test").unwrap();
        assert_eq!(cases.len(), 1);
        let case = &cases[0];
        assert_eq!(case.id, "42");

        let image = &case.images[0];
        assert_eq!(image.category, "Photo");
        assert_eq!(image.storage_key, "abc");
        assert_eq!(image.mime_type, "image/jpg");
        assert_eq!(image.file_name, None);
        assert_eq!(image.download_href, "/dl/abc");

        let doc = &case.documents[0];
        assert_eq!(doc.file_name.as_deref(), Some("report.pdf"));
        assert_eq!(doc.storage_key, "def");
    }

    #[test]
    fn test_attachments_images_first() {
        let cases = parse_catalog(CATALOG, "test").unwrap();
        let keys: Vec<&str> = cases[0]
            .attachments()
            .map(|a| a.storage_key.as_str())
            .collect();
        assert_eq!(keys, vec!["abc", "def"]);
    }

    #[test]
    fn test_string_case_id() {
        let cases = parse_catalog(r#"[{ "id": "MP-7" }]"#, "test").unwrap();
        assert_eq!(cases[0].id, "MP-7");
        assert!(cases[0].images.is_empty());
        assert!(cases[0].documents.is_empty());
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let json = r#"[{ "id": 1, "images": [
            { "category": { "name": "Photo" }, "hrefDownload": "/dl/x" }
        ]}]"#;
        let err = parse_catalog(json, "test").unwrap_err();
        assert!(
            matches!(err, CatalogError::MissingFile { ref case_id, position: 0 } if case_id == "1"),
            "got {err:?}"
        );
    }

    #[test]
    fn test_empty_storage_key_is_rejected() {
        let json = r#"[{ "id": 1, "documents": [
            { "category": { "name": "Doc" },
              "file": { "mimeType": "application/pdf", "storageKey": " " },
              "hrefDownload": "/dl/x" }
        ]}]"#;
        let err = parse_catalog(json, "test").unwrap_err();
        assert!(matches!(err, CatalogError::EmptyStorageKey { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_catalog("{ not json", "broken.json").unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_load_catalog_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_catalog(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
    }

    #[test]
    fn test_load_catalog_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = catalog_path(dir.path(), "MissingPersons");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, CATALOG).unwrap();

        let cases = load_catalog(&path).unwrap();
        assert_eq!(cases[0].images.len(), 1);
        assert!(path.ends_with("MissingPersons/MissingPersons.json"));
    }
}
