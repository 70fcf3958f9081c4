//! Package sources: where installed packages come from.
//!
//! A [`PackageSource`] yields `{name, version, root}` for every installed
//! package it knows about, whether or not the package ships context. The
//! default [`DirectorySource`] scans directories laid out like Cargo's
//! registry cache, where each child is named `<name>-<version>`.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use agent_context_shared::Result;

/// Version reported for package directories without a version suffix.
pub const UNKNOWN_VERSION: &str = "0.0.0";

/// `<name>-<major>.<minor>[.<patch>...][-pre][+build]`
static NAME_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.+?)-(?P<version>\d+(?:\.\d+)+(?:[-+][0-9A-Za-z.+-]*)?)$")
        .expect("name-version regex")
});

/// An installed package, before checking for a context directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
    /// Package root directory.
    pub root: PathBuf,
}

/// Anything that can enumerate installed packages.
pub trait PackageSource {
    /// All installed packages, in discovery order.
    fn packages(&self) -> Result<Vec<PackageSpec>>;
}

impl PackageSource for Vec<PackageSpec> {
    fn packages(&self) -> Result<Vec<PackageSpec>> {
        Ok(self.clone())
    }
}

// ---------------------------------------------------------------------------
// DirectorySource
// ---------------------------------------------------------------------------

/// Scans package root directories whose children are package directories.
#[derive(Debug, Clone, Default)]
pub struct DirectorySource {
    roots: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    /// Append the Cargo registry source directories to the scanned roots.
    pub fn with_cargo_registry(mut self) -> Self {
        self.roots.extend(cargo_registry_roots());
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl PackageSource for DirectorySource {
    fn packages(&self) -> Result<Vec<PackageSpec>> {
        let mut specs = Vec::new();

        for root in &self.roots {
            let entries = match std::fs::read_dir(root) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(root = %root.display(), error = %e, "skipping unreadable package root");
                    continue;
                }
            };

            let mut dirs: Vec<PathBuf> = entries
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry.path()),
                    Err(e) => {
                        warn!(root = %root.display(), error = %e, "failed to read directory entry");
                        None
                    }
                })
                .filter(|path| path.is_dir())
                .collect();
            dirs.sort();

            for dir in dirs {
                let Some(dir_name) = dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let (name, version) = split_name_version(dir_name);
                specs.push(PackageSpec {
                    name,
                    version,
                    root: dir.clone(),
                });
            }
        }

        debug!(count = specs.len(), "enumerated packages");
        Ok(specs)
    }
}

/// `$CARGO_HOME/registry/src/*`, falling back to `~/.cargo`.
pub fn cargo_registry_roots() -> Vec<PathBuf> {
    let cargo_home = std::env::var_os("CARGO_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".cargo")));

    let Some(cargo_home) = cargo_home else {
        return Vec::new();
    };

    let src = cargo_home.join("registry").join("src");
    let mut roots: Vec<PathBuf> = match std::fs::read_dir(&src) {
        Ok(entries) => entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect(),
        Err(_) => Vec::new(),
    };
    roots.sort();
    roots
}

/// Split `tokio-1.41.0` into `("tokio", "1.41.0")`.
pub fn split_name_version(dir_name: &str) -> (String, String) {
    match NAME_VERSION_RE.captures(dir_name) {
        Some(caps) => (caps["name"].to_string(), caps["version"].to_string()),
        None => (dir_name.to_string(), UNKNOWN_VERSION.to_string()),
    }
}

/// Order two version strings by their dot-separated release components; a
/// pre-release sorts below the matching release and build metadata is
/// ignored. Missing components count as `0`, so `1.0` equals `1.0.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a_release, a_pre) = split_pre_release(a);
    let (b_release, b_pre) = split_pre_release(b);

    compare_dotted(a_release, b_release).then_with(|| match (a_pre, b_pre) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a_pre), Some(b_pre)) => compare_dotted(a_pre, b_pre),
    })
}

fn split_pre_release(version: &str) -> (&str, Option<&str>) {
    let version = version.split('+').next().unwrap_or(version);
    match version.split_once('-') {
        Some((release, pre)) => (release, Some(pre)),
        None => (version, None),
    }
}

fn compare_dotted(a: &str, b: &str) -> Ordering {
    let mut a_parts = a.split('.');
    let mut b_parts = b.split('.');
    loop {
        let (a_part, b_part) = match (a_parts.next(), b_parts.next()) {
            (None, None) => return Ordering::Equal,
            (a_part, b_part) => (a_part.unwrap_or("0"), b_part.unwrap_or("0")),
        };
        let ordering = compare_component(a_part, b_part);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

/// Leading digits compare numerically (any length), the rest lexically.
fn compare_component(a: &str, b: &str) -> Ordering {
    fn split(part: &str) -> (&str, &str) {
        let digits = part.bytes().take_while(u8::is_ascii_digit).count();
        let (number, rest) = part.split_at(digits);
        (number.trim_start_matches('0'), rest)
    }

    let (a_number, a_rest) = split(a);
    let (b_number, b_rest) = split(b);
    a_number
        .len()
        .cmp(&b_number.len())
        .then_with(|| a_number.cmp(b_number))
        .then_with(|| a_rest.cmp(b_rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_common_names() {
        assert_eq!(split_name_version("tokio-1.41.0"), ("tokio".into(), "1.41.0".into()));
        assert_eq!(
            split_name_version("tree-sitter-md-0.5.0"),
            ("tree-sitter-md".into(), "0.5.0".into())
        );
        assert_eq!(split_name_version("x11-dl-2.21.0"), ("x11-dl".into(), "2.21.0".into()));
        assert_eq!(
            split_name_version("foo-1.0.0-alpha.1"),
            ("foo".into(), "1.0.0-alpha.1".into())
        );
        assert_eq!(split_name_version("async-2.1"), ("async".into(), "2.1".into()));
    }

    #[test]
    fn split_without_version() {
        assert_eq!(split_name_version("my_tool"), ("my_tool".into(), "0.0.0".into()));
        assert_eq!(split_name_version("foo-2d"), ("foo-2d".into(), "0.0.0".into()));
    }

    #[test]
    fn version_ordering() {
        assert_eq!(compare_versions("1.10.0", "1.9.3"), Ordering::Greater);
        assert_eq!(compare_versions("0.5.0", "0.5.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.0-rc.1", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("2.0", "1.99.99"), Ordering::Greater);
    }

    #[test]
    fn short_versions_are_zero_padded() {
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1", "1.0.1"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0+build.5", "1.0"), Ordering::Equal);
    }

    #[test]
    fn non_numeric_components_are_not_zero() {
        assert_eq!(compare_versions("1.2.x", "1.2.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.2b", "1.2a"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0-beta", "1.0.0-alpha.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0-rc.10", "1.0.0-rc.9"), Ordering::Greater);
        assert_eq!(compare_versions("18446744073709551616.0", "1.0"), Ordering::Greater);
    }

    #[test]
    fn directory_source_lists_children_sorted() {
        let root = tempfile::tempdir().unwrap();
        for dir in ["zeta-0.1.0", "alpha-2.0.0", "plain"] {
            std::fs::create_dir(root.path().join(dir)).unwrap();
        }
        std::fs::write(root.path().join("stray-file-1.0.0"), "").unwrap();

        let source = DirectorySource::new([root.path().to_path_buf()]);
        let specs = source.packages().unwrap();
        let names: Vec<(&str, &str)> = specs
            .iter()
            .map(|s| (s.name.as_str(), s.version.as_str()))
            .collect();
        assert_eq!(names, vec![("alpha", "2.0.0"), ("plain", "0.0.0"), ("zeta", "0.1.0")]);
    }

    #[test]
    fn missing_root_is_skipped() {
        let source = DirectorySource::new([PathBuf::from("/definitely/not/here")]);
        assert!(source.packages().unwrap().is_empty());
    }
}
