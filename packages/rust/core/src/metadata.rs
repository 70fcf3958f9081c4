//! Per-package metadata overrides (`index.toml`).
//!
//! A package may ship an `index.toml` next to its fragments to supply the
//! package description and hand-written titles and descriptions for some of
//! its files:
//!
//! ```toml
//! description = "Async runtime guides"
//!
//! [[files]]
//! path = "getting-started.md"
//! title = "Getting Started"
//! description = "First steps with the runtime."
//! ```
//!
//! Loading never fails: a missing or broken file just means "no override".

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Sidecar file name inside a package's context directory.
pub const METADATA_FILE: &str = "index.toml";

/// Parsed contents of `index.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Package description; `None` falls back to the default line.
    #[serde(default)]
    pub description: Option<String>,

    /// Per-file overrides, in declaration order.
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// Override for one fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the package's context directory, `/`-separated.
    pub path: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl PackageMetadata {
    /// The override entry for `relative_path`, if any.
    pub fn entry_for(&self, relative_path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|entry| entry.path == relative_path)
    }
}

/// Outcome of looking for a package's `index.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataLoad {
    Loaded(PackageMetadata),
    /// No sidecar file.
    Missing,
    /// The sidecar exists but could not be read or parsed.
    Invalid(String),
}

impl MetadataLoad {
    /// The loaded metadata, if there was a usable sidecar.
    pub fn into_metadata(self) -> Option<PackageMetadata> {
        match self {
            Self::Loaded(metadata) => Some(metadata),
            Self::Missing | Self::Invalid(_) => None,
        }
    }
}

/// Load `index.toml` from a package's context directory.
pub fn load_metadata(package_dir: &Path) -> MetadataLoad {
    let path = package_dir.join(METADATA_FILE);

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return MetadataLoad::Missing,
        Err(e) => return MetadataLoad::Invalid(format!("{}: {e}", path.display())),
    };

    match toml::from_str::<PackageMetadata>(&content) {
        Ok(metadata) => MetadataLoad::Loaded(metadata),
        Err(e) => MetadataLoad::Invalid(format!("{}: {e}", path.display())),
    }
}
