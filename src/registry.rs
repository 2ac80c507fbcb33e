//! Document registry: the fixed mapping from filename to display title.
//!
//! The registry is built once at startup (either the built-in set or a
//! registry file passed on the command line) and is never mutated afterwards.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Documents known to the viewer when no registry file is given.
const BUILTIN_DOCUMENTS: &[(&str, &str)] = &[
    ("fault-tolert.md", "Multi-Region AWS Infrastructure"),
    (
        "Velocity.md",
        "Project Velocity: Application and Infrastructure Modernization on EKS",
    ),
    ("DMS.md", "DMS Platform Infrastructure Automation"),
    ("CaptionCraft.md", "CaptionCraft - AI Caption Generator"),
];

/// A single registry row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryEntry {
    /// Relative filename, also the URL fragment used to deep-link the document.
    pub file: String,
    /// Human-readable title shown in the viewer header.
    pub title: String,
}

/// Failure while reading a registry file.
#[derive(Debug)]
pub enum RegistryError {
    Io(String),
    Parse(String),
    UnsupportedFormat(String),
    EmptyFile,
    DuplicateFile(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Io(msg) => write!(f, "cannot read registry: {msg}"),
            RegistryError::Parse(msg) => write!(f, "invalid registry: {msg}"),
            RegistryError::UnsupportedFormat(ext) => write!(
                f,
                "unsupported registry format '{ext}' (expected .json, .yml or .yaml)"
            ),
            RegistryError::EmptyFile => write!(f, "registry entry has an empty 'file'"),
            RegistryError::DuplicateFile(file) => {
                write!(f, "registry lists '{file}' more than once")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Ordered, read-only filename → title mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            entries: BUILTIN_DOCUMENTS
                .iter()
                .map(|(file, title)| RegistryEntry {
                    file: (*file).to_owned(),
                    title: (*title).to_owned(),
                })
                .collect(),
        }
    }
}

impl Registry {
    /// Build a registry from entries, rejecting empty or repeated filenames.
    pub fn from_entries(entries: Vec<RegistryEntry>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.file.is_empty() {
                return Err(RegistryError::EmptyFile);
            }
            if !seen.insert(entry.file.as_str()) {
                return Err(RegistryError::DuplicateFile(entry.file.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Load a registry file. The format is chosen by extension: `.json` or
    /// `.yml`/`.yaml`. Both hold a list of `{ file, title }` objects.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = fs::read_to_string(path)
            .map_err(|e| RegistryError::Io(format!("{}: {e}", path.display())))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let entries: Vec<RegistryEntry> = match ext.as_str() {
            "json" => serde_json::from_str(&text).map_err(|e| RegistryError::Parse(e.to_string()))?,
            "yml" | "yaml" => {
                serde_yml::from_str(&text).map_err(|e| RegistryError::Parse(e.to_string()))?
            }
            other => return Err(RegistryError::UnsupportedFormat(other.to_owned())),
        };
        let registry = Self::from_entries(entries)?;
        eprintln!(
            "[registry] path={} documents={}",
            path.display(),
            registry.len()
        );
        Ok(registry)
    }

    /// Exact title lookup.
    pub fn title(&self, file: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.file == file)
            .map(|e| e.title.as_str())
    }

    /// Title for `file`, or `file` itself when it is not registered.
    pub fn title_or_file<'a>(&'a self, file: &'a str) -> &'a str {
        self.title(file).unwrap_or(file)
    }

    /// True when `file` is a non-empty registered key.
    pub fn contains(&self, file: &str) -> bool {
        !file.is_empty() && self.title(file).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
