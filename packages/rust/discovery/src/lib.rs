//! Discovery of installed packages that ship agent context.
//!
//! A package "has context" when its root contains a `context/` directory
//! (the name is configurable). [`ContextDiscovery`] wraps any
//! [`PackageSource`] and answers the lookup questions the rest of the tool
//! asks: which packages have context, which files they ship, and what a
//! given file contains.

mod source;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use agent_context_shared::{AgentContextError, PackageInfo, Result};

pub use source::{
    DirectorySource, PackageSource, PackageSpec, UNKNOWN_VERSION, cargo_registry_roots,
    compare_versions, split_name_version,
};

/// Default name of the per-package context directory.
pub const DEFAULT_CONTEXT_DIR: &str = "context";

/// Extensions tried, in order, when a fragment is requested without one.
const SHOW_EXTENSIONS: [&str; 2] = ["mdc", "md"];

// ---------------------------------------------------------------------------
// ContextDiscovery
// ---------------------------------------------------------------------------

/// Looks up package context through a [`PackageSource`].
#[derive(Debug, Clone)]
pub struct ContextDiscovery<S> {
    source: S,
    context_dir_name: String,
}

impl<S: PackageSource> ContextDiscovery<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            context_dir_name: DEFAULT_CONTEXT_DIR.to_string(),
        }
    }

    /// Use a different per-package context directory name.
    pub fn with_context_dir_name(mut self, name: impl Into<String>) -> Self {
        self.context_dir_name = name.into();
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// All packages exposing a context directory, in discovery order.
    ///
    /// When a package is installed in several versions, only the highest
    /// version is reported, at the position the name was first seen.
    #[instrument(skip_all)]
    pub fn find_packages_with_context(&self) -> Result<Vec<PackageInfo>> {
        let mut found: Vec<PackageInfo> = Vec::new();
        let mut index_by_name: HashMap<String, usize> = HashMap::new();

        for spec in self.source.packages()? {
            let Some(info) = self.context_for(&spec) else {
                continue;
            };
            match index_by_name.get(&info.name) {
                Some(&i) => {
                    if compare_versions(&info.version, &found[i].version).is_gt() {
                        debug!(name = %info.name, old = %found[i].version, new = %info.version, "newer version found");
                        found[i] = info;
                    }
                }
                None => {
                    index_by_name.insert(info.name.clone(), found.len());
                    found.push(info);
                }
            }
        }

        debug!(count = found.len(), "packages with context");
        Ok(found)
    }

    /// The package named `name`, if it is installed and has context.
    pub fn find_package_with_context(&self, name: &str) -> Result<Option<PackageInfo>> {
        Ok(self
            .find_packages_with_context()?
            .into_iter()
            .find(|info| info.name == name))
    }

    /// Every file under the package's context directory, sorted by path.
    pub fn list_context_files(&self, name: &str) -> Result<Option<Vec<PathBuf>>> {
        let Some(info) = self.find_package_with_context(name)? else {
            return Ok(None);
        };
        Ok(Some(list_files(&info.path)))
    }

    /// Contents of one context file, found by exact name or with a `.mdc` or
    /// `.md` extension appended.
    pub fn show_context_file(&self, name: &str, file_name: &str) -> Result<Option<String>> {
        let Some(info) = self.find_package_with_context(name)? else {
            return Ok(None);
        };

        if escapes_root(Path::new(file_name)) {
            warn!(package = name, file = file_name, "refusing path outside context directory");
            return Ok(None);
        }

        let candidates = std::iter::once(info.path.join(file_name)).chain(
            SHOW_EXTENSIONS
                .iter()
                .map(|ext| info.path.join(format!("{file_name}.{ext}"))),
        );

        for candidate in candidates {
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .map_err(|e| AgentContextError::io(&candidate, e))?;
                return Ok(Some(content));
            }
        }

        Ok(None)
    }

    fn context_for(&self, spec: &PackageSpec) -> Option<PackageInfo> {
        let path = spec.root.join(&self.context_dir_name);
        path.is_dir().then(|| PackageInfo {
            name: spec.name.clone(),
            version: spec.version.clone(),
            path,
        })
    }
}

/// All regular files below `dir`, sorted.
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

fn escapes_root(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
