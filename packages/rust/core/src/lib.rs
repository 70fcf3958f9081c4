//! Core workflows for agent-context.
//!
//! This crate ties together discovery, installation, fragment aggregation,
//! and the section merger into end-to-end operations (`update_document`,
//! `install_all_context`, `ContextIndex::write_to_file`).

pub mod aggregate;
pub mod index;
pub mod install;
pub mod metadata;
pub mod update;

pub use aggregate::{
    AggregateOptions, ContextGroup, NO_CONTEXT_MESSAGE, PackageSummary, aggregate, collect_groups,
    default_description, render, summarize_group,
};
pub use index::{ContextIndex, INDEX_FILE_NAME};
pub use install::{install_all_context, install_package_context};
pub use metadata::{FileEntry, METADATA_FILE, MetadataLoad, PackageMetadata, load_metadata};
pub use update::{UpdateConfig, UpdateResult, update_document, write_atomic};
