//! Installation of package context into the local context root.
//!
//! Each package's context directory is copied to `<root>/<package>/`. A
//! re-install replaces the previous copy so removed upstream files go away.

use std::path::Path;

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use agent_context_discovery::{ContextDiscovery, PackageSource};
use agent_context_shared::{AgentContextError, Result};

/// Install one package's context. Returns `false` when the package is not
/// installed or ships no context.
#[instrument(skip(discovery, root), fields(root = %root.display()))]
pub fn install_package_context<S: PackageSource>(
    discovery: &ContextDiscovery<S>,
    name: &str,
    root: &Path,
) -> Result<bool> {
    let Some(info) = discovery.find_package_with_context(name)? else {
        debug!("package has no context");
        return Ok(false);
    };

    let target = root.join(&info.name);
    if target.exists() {
        std::fs::remove_dir_all(&target).map_err(|e| AgentContextError::io(&target, e))?;
    }
    let copied = copy_tree(&info.path, &target)?;

    info!(package = %info.name, version = %info.version, files = copied, "installed context");
    Ok(true)
}

/// Install every package with context. Returns the installed names in
/// discovery order; packages that fail to copy are skipped.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn install_all_context<S: PackageSource>(
    discovery: &ContextDiscovery<S>,
    root: &Path,
) -> Result<Vec<String>> {
    let mut installed = Vec::new();

    for info in discovery.find_packages_with_context()? {
        match install_package_context(discovery, &info.name, root) {
            Ok(true) => installed.push(info.name),
            Ok(false) => {}
            Err(e) => warn!(package = %info.name, error = %e, "failed to install context"),
        }
    }

    Ok(installed)
}

/// Recursively copy `src` into `dst`. Returns the number of files copied.
fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    std::fs::create_dir_all(dst).map_err(|e| AgentContextError::io(dst, e))?;
    let mut copied = 0;

    for entry in WalkDir::new(src).follow_links(true).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            AgentContextError::io(path, e.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| AgentContextError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| AgentContextError::io(&target, e))?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_context_discovery::DirectorySource;
    use tempfile::TempDir;

    fn fake_packages() -> TempDir {
        let packages = tempfile::tempdir().unwrap();
        let context = packages.path().join("fake-gem-1.0.0/context");
        std::fs::create_dir_all(context.join("guides")).unwrap();
        std::fs::write(context.join("getting-started.md"), "# Getting Started\n\nThis is a test.").unwrap();
        std::fs::write(context.join("configuration.md"), "# Configuration\n\nConfigure your gem.").unwrap();
        std::fs::write(context.join("guides/advanced.md"), "# Advanced").unwrap();
        std::fs::create_dir_all(packages.path().join("no-context-gem-1.0.0/lib")).unwrap();
        packages
    }

    fn discovery(packages: &TempDir) -> ContextDiscovery<DirectorySource> {
        ContextDiscovery::new(DirectorySource::new([packages.path().to_path_buf()]))
    }

    #[test]
    fn installs_package_context() {
        let packages = fake_packages();
        let root = tempfile::tempdir().unwrap();

        assert!(install_package_context(&discovery(&packages), "fake-gem", root.path()).unwrap());

        let installed = root.path().join("fake-gem");
        assert_eq!(
            std::fs::read_to_string(installed.join("getting-started.md")).unwrap(),
            "# Getting Started\n\nThis is a test."
        );
        assert!(installed.join("configuration.md").is_file());
        assert!(installed.join("guides/advanced.md").is_file());
    }

    #[test]
    fn unknown_package_is_false() {
        let packages = fake_packages();
        let root = tempfile::tempdir().unwrap();
        let d = discovery(&packages);

        assert!(!install_package_context(&d, "non-existent-gem", root.path()).unwrap());
        assert!(!install_package_context(&d, "no-context-gem", root.path()).unwrap());
        assert!(!root.path().join("non-existent-gem").exists());
    }

    #[test]
    fn install_all_returns_names() {
        let packages = fake_packages();
        let root = tempfile::tempdir().unwrap();

        let installed = install_all_context(&discovery(&packages), root.path()).unwrap();
        assert_eq!(installed, vec!["fake-gem".to_string()]);
    }

    #[test]
    fn reinstall_drops_stale_files() {
        let packages = fake_packages();
        let root = tempfile::tempdir().unwrap();
        let stale = root.path().join("fake-gem/removed-upstream.md");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "old").unwrap();

        install_package_context(&discovery(&packages), "fake-gem", root.path()).unwrap();
        assert!(!stale.exists());
        assert!(root.path().join("fake-gem/getting-started.md").is_file());
    }
}
