//! Document update flow.
//!
//! Aggregates the installed context, merges the generated block into the
//! target document's context section, and writes the result back with a
//! single atomic replace. An unchanged document is not rewritten.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use agent_context_markdown::merge;
use agent_context_shared::{AgentContextError, Result, SectionSpec};

use crate::aggregate::{PackageSummary, collect_groups, render, summarize_group};

// ---------------------------------------------------------------------------
// Update config & result
// ---------------------------------------------------------------------------

/// Configuration for [`update_document`].
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Document to update; created when absent.
    pub target: PathBuf,
    /// Installation root holding `<package>/` directories.
    pub context_path: PathBuf,
    /// Where the generated block goes.
    pub spec: SectionSpec,
    /// Fragment file extensions.
    pub extensions: Vec<String>,
}

/// Outcome of [`update_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub target: PathBuf,
    /// The target did not exist before this run.
    pub created: bool,
    /// The target's bytes changed (and were written).
    pub changed: bool,
    /// Packages rendered into the block.
    pub packages: usize,
    /// Fragments rendered into the block.
    pub fragments: usize,
}

// ---------------------------------------------------------------------------
// Update pipeline
// ---------------------------------------------------------------------------

/// Run the update.
///
/// 1. Read the target document (absent is fine)
/// 2. Collect and summarize installed context
/// 3. Merge the generated block into the context section
/// 4. Write atomically if anything changed
///
/// A parse or validation failure aborts before any write.
#[instrument(skip_all, fields(target = %config.target.display()))]
pub fn update_document(config: &UpdateConfig) -> Result<UpdateResult> {
    let existing = read_existing(&config.target)?;

    let groups = collect_groups(&config.context_path, &config.extensions);
    let summaries: Vec<PackageSummary> = groups
        .iter()
        .map(|group| summarize_group(group, &config.context_path))
        .collect();
    let block = render(&summaries, package_heading_level(&config.spec));

    let merged = merge(existing.as_deref(), &config.spec, &block)?;

    let changed = existing.as_deref() != Some(merged.as_bytes());
    if changed {
        write_atomic(&config.target, merged.as_bytes())?;
    } else {
        debug!("document already up to date");
    }

    let rendered: Vec<&PackageSummary> = summaries
        .iter()
        .filter(|s| !s.fragments.is_empty())
        .collect();
    let result = UpdateResult {
        target: config.target.clone(),
        created: existing.is_none(),
        changed,
        packages: rendered.len(),
        fragments: rendered.iter().map(|s| s.fragments.len()).sum(),
    };

    info!(
        created = result.created,
        changed = result.changed,
        packages = result.packages,
        fragments = result.fragments,
        "document update complete"
    );

    Ok(result)
}

/// Package headings sit one level below the context section.
fn package_heading_level(spec: &SectionSpec) -> u8 {
    spec.section_level.saturating_add(1)
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AgentContextError::io(path, e)),
    }
}

/// Replace `path` with `content` via a temp file in the same directory.
///
/// On failure the temp file is removed and `path` is left as it was.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| AgentContextError::io(&dir, e))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AgentContextError::validation(format!("invalid target path {path:?}")))?;
    let temp = dir.join(format!(".{file_name}.tmp"));

    let written = std::fs::write(&temp, content)
        .map_err(|e| AgentContextError::io(&temp, e))
        .and_then(|()| std::fs::rename(&temp, path).map_err(|e| AgentContextError::io(path, e)));

    if written.is_err() && temp.is_file() {
        let _ = std::fs::remove_file(&temp);
    }
    written?;

    debug!(path = %path.display(), size = content.len(), "wrote document");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
