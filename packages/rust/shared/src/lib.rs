//! Shared types, error model, and configuration for agent-context.
//!
//! This crate is the foundation depended on by all other agent-context crates.
//! It provides:
//! - [`AgentContextError`]: the unified error type
//! - Domain types ([`PackageInfo`], [`SectionSpec`], [`FragmentSummary`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, DiscoveryConfig, SectionConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, LOCAL_CONFIG_FILE_NAME,
};
pub use error::{AgentContextError, Result};
pub use types::{FragmentSummary, PackageInfo, SectionSpec};
