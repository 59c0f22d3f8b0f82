//! Case-type table.
//!
//! Each case type names one catalog and the path fragments excluded from its
//! work set. The default table is embedded at compile time from
//! `contrib/case-types.toml`; a replacement table can be loaded from disk.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const BUILTIN_CASE_TYPES: &str = include_str!("../../../contrib/case-types.toml");

#[derive(Error, Debug)]
pub enum CaseTypeError {
    #[error("failed to read case types from {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("bad case-type TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown case type: {0}")]
    Unknown(String),
}

/// One catalog of cases (e.g. `MissingPersons`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CaseType {
    pub name: String,
    /// Path fragments; a path containing any of them is excluded.
    #[serde(default)]
    pub excluded: Vec<String>,
}

impl CaseType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            excluded: Vec::new(),
        }
    }

    /// True if `path` matches one of this case type's exclusion patterns.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded.iter().any(|pattern| path.contains(pattern.as_str()))
    }
}

/// Top-level file structure: a list of `[[case_type]]` tables.
#[derive(Debug, Deserialize)]
struct CaseTypeFile {
    case_type: Vec<CaseType>,
}

/// Ordered set of case types processed by a run.
#[derive(Debug, Clone)]
pub struct CaseTypes {
    types: Vec<CaseType>,
}

impl CaseTypes {
    /// The embedded default table.
    pub fn builtin() -> Result<Self, CaseTypeError> {
        Self::from_toml_str(BUILTIN_CASE_TYPES)
    }

    pub fn from_toml_str(src: &str) -> Result<Self, CaseTypeError> {
        let file: CaseTypeFile = toml::from_str(src)?;
        Ok(Self {
            types: file.case_type,
        })
    }

    pub fn load(path: &Path) -> Result<Self, CaseTypeError> {
        let src = std::fs::read_to_string(path).map_err(|source| CaseTypeError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Restrict to the named case types, preserving table order.
    ///
    /// An empty selection keeps every case type.
    pub fn select(self, names: &[String]) -> Result<Self, CaseTypeError> {
        if names.is_empty() {
            return Ok(self);
        }
        if let Some(missing) = names
            .iter()
            .find(|n| !self.types.iter().any(|t| t.name == **n))
        {
            return Err(CaseTypeError::Unknown(missing.clone()));
        }
        let types = self
            .types
            .into_iter()
            .filter(|t| names.contains(&t.name))
            .collect();
        Ok(Self { types })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CaseType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
