//! Aggregation of installed context into the generated markdown block.
//!
//! Installed context lives under the installation root as one directory per
//! package (`.context/<package>/...`). Each package becomes a heading followed
//! by a bullet per fragment with its title and short description.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use agent_context_discovery::list_files;
use agent_context_markdown::summarize;
use agent_context_shared::FragmentSummary;

use crate::metadata::{MetadataLoad, PackageMetadata, load_metadata};

/// Line rendered when nothing is installed.
pub const NO_CONTEXT_MESSAGE: &str =
    "No context files found. Run `agent-context install` to install context from packages.";

/// Deepest heading markdown supports.
const MAX_HEADING_LEVEL: u8 = 6;

/// One installed package and its fragment files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextGroup {
    pub package: String,
    /// Installed package directory (`<root>/<package>`).
    pub dir: PathBuf,
    /// Fragment files, sorted by path.
    pub files: Vec<PathBuf>,
}

/// Summaries for one package, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub package: String,
    /// Rendered below the heading when non-empty.
    pub description: String,
    pub fragments: Vec<FragmentSummary>,
}

/// Rendering options for [`aggregate`].
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Installation root; bullet links are relative to it.
    pub root: PathBuf,
    /// Heading level for package names.
    pub heading_level: u8,
}

/// Collect the installed packages under `root`, in directory-name order.
///
/// Only files whose extension is in `extensions` (case-insensitive) count as
/// fragments; packages without fragments are left out.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn collect_groups(root: &Path, extensions: &[String]) -> Vec<ContextGroup> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(error = %e, "installation root not readable, nothing installed");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let groups: Vec<ContextGroup> = dirs
        .into_iter()
        .filter_map(|dir| {
            let package = dir.file_name()?.to_str()?.to_string();
            let files: Vec<PathBuf> = list_files(&dir)
                .into_iter()
                .filter(|file| has_extension(file, extensions))
                .collect();
            (!files.is_empty()).then_some(ContextGroup { package, dir, files })
        })
        .collect();

    debug!(packages = groups.len(), "collected context groups");
    groups
}

/// Summarize every fragment of one package.
///
/// Override entries from `index.toml` win over heuristic summaries.
/// Unreadable fragments are skipped.
pub fn summarize_group(group: &ContextGroup, root: &Path) -> PackageSummary {
    let metadata = match load_metadata(&group.dir) {
        MetadataLoad::Loaded(metadata) => Some(metadata),
        MetadataLoad::Missing => None,
        MetadataLoad::Invalid(reason) => {
            warn!(package = %group.package, %reason, "ignoring malformed package metadata");
            None
        }
    };

    let description = metadata
        .as_ref()
        .and_then(|m| m.description.clone())
        .unwrap_or_else(|| default_description(&group.package));

    let fragments = group
        .files
        .iter()
        .filter_map(|file| summarize_fragment(file, group, root, metadata.as_ref()))
        .collect();

    PackageSummary {
        package: group.package.clone(),
        description,
        fragments,
    }
}

fn summarize_fragment(
    file: &Path,
    group: &ContextGroup,
    root: &Path,
    metadata: Option<&PackageMetadata>,
) -> Option<FragmentSummary> {
    let source_path = relative_slash_path(file, root);
    let package_path = relative_slash_path(file, &group.dir);

    if let Some(entry) = metadata.and_then(|m| m.entry_for(&package_path)) {
        return Some(FragmentSummary {
            title: entry.title.clone(),
            description: entry.description.clone(),
            source_path,
        });
    }

    match std::fs::read_to_string(file) {
        Ok(raw) => {
            let (title, description) = summarize(&raw);
            Some(FragmentSummary {
                title,
                description,
                source_path,
            })
        }
        Err(e) => {
            warn!(file = %file.display(), error = %e, "skipping unreadable fragment");
            None
        }
    }
}

/// Build the generated block for `groups`.
#[instrument(skip_all, fields(packages = groups.len()))]
pub fn aggregate(groups: &[ContextGroup], options: &AggregateOptions) -> String {
    let summaries: Vec<PackageSummary> = groups
        .iter()
        .map(|group| summarize_group(group, &options.root))
        .collect();
    render(&summaries, options.heading_level)
}

/// Render package summaries as markdown.
pub fn render(packages: &[PackageSummary], heading_level: u8) -> String {
    let packages: Vec<&PackageSummary> = packages
        .iter()
        .filter(|p| !p.fragments.is_empty())
        .collect();

    if packages.is_empty() {
        return format!("{NO_CONTEXT_MESSAGE}\n");
    }

    let mut sections: Vec<String> = Vec::new();
    for package in packages {
        sections.push(package_heading(&package.package, heading_level));
        sections.push(String::new());

        let description = inline_text(&package.description);
        if !description.is_empty() {
            sections.push(description);
            sections.push(String::new());
        }

        for fragment in &package.fragments {
            sections.push(format!(
                "- **[{}]({})**",
                link_text(&fragment.title),
                link_destination(&fragment.source_path)
            ));
            let description = inline_text(&fragment.description);
            if !description.is_empty() {
                sections.push(format!("  {description}"));
            }
        }
        sections.push(String::new());
    }

    let mut block = sections.join("\n");
    block.truncate(block.trim_end().len());
    block.push('\n');
    block
}

/// `Context files for <package>`
pub fn default_description(package: &str) -> String {
    format!("Context files for {package}")
}

fn package_heading(name: &str, level: u8) -> String {
    if (1..=MAX_HEADING_LEVEL).contains(&level) {
        format!("{} {name}", "#".repeat(usize::from(level)))
    } else {
        format!("**{name}**")
    }
}

/// Flatten free text to one line that cannot open a block of its own
/// (heading, list, quote, fence, HTML, thematic break or setext underline).
fn inline_text(text: &str) -> String {
    let text = collapse_whitespace(text);
    if text.starts_with(['#', '>', '-', '*', '+', '_', '=', '`', '~', '<']) {
        return format!("\\{text}");
    }

    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if (1..=9).contains(&digits) && matches!(text.as_bytes().get(digits).copied(), Some(b'.' | b')')) {
        let (number, rest) = text.split_at(digits);
        return format!("{number}\\{rest}");
    }
    text
}

/// One-line link text with brackets escaped.
fn link_text(title: &str) -> String {
    let mut escaped = String::new();
    for c in collapse_whitespace(title).chars() {
        if matches!(c, '\\' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Paths with spaces or parentheses go in `<...>`.
fn link_destination(path: &str) -> String {
    if path.contains(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>')) {
        format!("<{}>", path.replace('<', "\\<").replace('>', "\\>"))
    } else {
        path.to_string()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// `path` relative to `base`, joined with `/` on every platform.
fn relative_slash_path(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
