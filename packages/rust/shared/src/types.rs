//! Core domain types for agent-context.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default anchor heading text.
pub const DEFAULT_ANCHOR: &str = "Agent";

/// Default managed section heading text.
pub const DEFAULT_SECTION: &str = "Context";

// ---------------------------------------------------------------------------
// PackageInfo
// ---------------------------------------------------------------------------

/// An installed package that exposes a context directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name (e.g. `tokio`).
    pub name: String,
    /// Package version string (e.g. `1.41.0`).
    pub version: String,
    /// Absolute path to the package's context directory.
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// SectionSpec
// ---------------------------------------------------------------------------

/// Identifies the managed section of a target document.
///
/// The section lives under an anchor heading: with the defaults this is
/// `## Context` somewhere below `# Agent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
    /// Text of the anchor heading.
    pub anchor_heading: String,
    /// Level of the anchor heading (1 = `#`).
    pub anchor_level: u8,
    /// Text of the managed section heading.
    pub section_heading: String,
    /// Level of the managed section heading.
    pub section_level: u8,
}

impl SectionSpec {
    pub fn new(
        anchor_heading: impl Into<String>,
        anchor_level: u8,
        section_heading: impl Into<String>,
        section_level: u8,
    ) -> Self {
        Self {
            anchor_heading: anchor_heading.into(),
            anchor_level,
            section_heading: section_heading.into(),
            section_level,
        }
    }

    /// Whether the section heading is strictly deeper than the anchor.
    pub fn is_nested(&self) -> bool {
        self.section_level > self.anchor_level
    }
}

impl Default for SectionSpec {
    fn default() -> Self {
        Self::new(DEFAULT_ANCHOR, 1, DEFAULT_SECTION, 2)
    }
}

// ---------------------------------------------------------------------------
// FragmentSummary
// ---------------------------------------------------------------------------

/// Display title and short description for one documentation fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentSummary {
    pub title: String,
    /// At most 200 characters, may be empty.
    pub description: String,
    /// Path of the fragment relative to the installation root.
    pub source_path: String,
}
