//! Standalone context index (`.context/agent.md`).
//!
//! A self-contained summary of everything installed under the context root,
//! independent of any human-maintained document.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, instrument};

use agent_context_shared::{AgentContextError, Result};

use crate::aggregate::{AggregateOptions, NO_CONTEXT_MESSAGE, aggregate, collect_groups};

/// File name written inside the context root by default.
pub const INDEX_FILE_NAME: &str = "agent.md";

const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package heading level inside `## Available Context Files`.
const PACKAGE_HEADING_LEVEL: u8 = 3;

const USAGE: &str = "\
## Usage

These context files provide information about:
- Package functionality and APIs
- Usage examples and patterns
- Configuration and setup instructions
- Best practices and conventions

AI agents can reference these files to understand how to work with the installed packages.
";

/// Generates the standalone index for one context root.
#[derive(Debug, Clone)]
pub struct ContextIndex {
    context_path: PathBuf,
    extensions: Vec<String>,
}

impl ContextIndex {
    pub fn new(context_path: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            context_path: context_path.into(),
            extensions,
        }
    }

    pub fn context_path(&self) -> &Path {
        &self.context_path
    }

    /// Render the index, stamped with the current local time.
    pub fn generate(&self) -> String {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.generate_at(&timestamp)
    }

    /// Render the index with a fixed generation timestamp.
    pub fn generate_at(&self, timestamp: &str) -> String {
        let mut out = String::new();
        out.push_str("# Agent Context\n\n");
        out.push_str(
            "This file provides context from installed packages that offer AI agent documentation.\n",
        );
        out.push_str(&format!(
            "Generated on {timestamp} by agent-context {TOOL_VERSION}.\n\n"
        ));

        let groups = collect_groups(&self.context_path, &self.extensions);
        if groups.is_empty() {
            out.push_str("## Installation\n\n");
            out.push_str(NO_CONTEXT_MESSAGE);
            out.push('\n');
            return out;
        }

        let options = AggregateOptions {
            root: self.context_path.clone(),
            heading_level: PACKAGE_HEADING_LEVEL,
        };
        out.push_str("## Available Context Files\n\n");
        out.push_str("The following packages provide context documentation for AI agents:\n\n");
        out.push_str(&aggregate(&groups, &options));
        out.push('\n');
        out.push_str(USAGE);
        out
    }

    /// Write the index to `output`, or to `<context_path>/agent.md`.
    ///
    /// Parent directories are created as needed. Returns the written path.
    #[instrument(skip_all, fields(context_path = %self.context_path.display()))]
    pub fn write_to_file(&self, output: Option<&Path>) -> Result<PathBuf> {
        let path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.context_path.join(INDEX_FILE_NAME));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AgentContextError::io(parent, e))?;
        }

        let content = self.generate();
        std::fs::write(&path, &content).map_err(|e| AgentContextError::io(&path, e))?;

        info!(path = %path.display(), bytes = content.len(), "generated context index");
        Ok(path)
    }
}
