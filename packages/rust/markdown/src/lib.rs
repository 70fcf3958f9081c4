//! Markdown document model, section merging, and fragment summaries.
//!
//! - [`Document`] parses markdown into a flat list of block nodes and writes
//!   it back without disturbing untouched blocks.
//! - [`merge`] replaces (or creates) one heading-scoped section.
//! - [`summarize`] pulls a title and short description out of a fragment.

mod document;
mod merge;
mod summary;

pub use document::{Document, DocumentNode, NodeKind, normalize_heading_text, section_span};
pub use merge::{merge, merge_document};
pub use summary::{DEFAULT_TITLE, extract_description, extract_title, summarize};
