//! Application configuration for agent-context.
//!
//! Config is read from `./agent-context.toml` if present, otherwise from
//! `~/.agent-context/agent-context.toml`. CLI flags override config file
//! values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AgentContextError, Result};
use crate::types::{DEFAULT_ANCHOR, DEFAULT_SECTION, SectionSpec};

/// Configuration file name, both project-local and in the config directory.
pub const LOCAL_CONFIG_FILE_NAME: &str = "agent-context.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".agent-context";

// ---------------------------------------------------------------------------
// Config structs (matching agent-context.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Managed section of the target document.
    #[serde(default)]
    pub section: SectionConfig,

    /// Package discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Local installation root for package context.
    #[serde(default = "default_context_path")]
    pub context_path: String,

    /// Document the generated block is merged into.
    #[serde(default = "default_target")]
    pub target: String,

    /// Name of the directory inside each package that holds its context.
    #[serde(default = "default_context_dir_name")]
    pub context_dir_name: String,

    /// File extensions treated as documentation fragments.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            context_path: default_context_path(),
            target: default_target(),
            context_dir_name: default_context_dir_name(),
            extensions: default_extensions(),
        }
    }
}

fn default_context_path() -> String {
    ".context".into()
}
fn default_target() -> String {
    "AGENT.md".into()
}
fn default_context_dir_name() -> String {
    "context".into()
}
fn default_extensions() -> Vec<String> {
    vec!["md".into(), "mdc".into()]
}

/// `[section]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionConfig {
    /// Anchor heading text.
    #[serde(default = "default_anchor")]
    pub anchor: String,

    /// Anchor heading level.
    #[serde(default = "default_anchor_level")]
    pub anchor_level: u8,

    /// Managed section heading text.
    #[serde(default = "default_heading")]
    pub heading: String,

    /// Managed section heading level.
    #[serde(default = "default_level")]
    pub level: u8,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            anchor: default_anchor(),
            anchor_level: default_anchor_level(),
            heading: default_heading(),
            level: default_level(),
        }
    }
}

impl From<&SectionConfig> for SectionSpec {
    fn from(config: &SectionConfig) -> Self {
        SectionSpec::new(
            config.anchor.clone(),
            config.anchor_level,
            config.heading.clone(),
            config.level,
        )
    }
}

fn default_anchor() -> String {
    DEFAULT_ANCHOR.into()
}
fn default_anchor_level() -> u8 {
    1
}
fn default_heading() -> String {
    DEFAULT_SECTION.into()
}
fn default_level() -> u8 {
    2
}

/// `[discovery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Extra directories whose children are `<name>-<version>` packages.
    #[serde(default)]
    pub package_roots: Vec<String>,

    /// Whether to scan the Cargo registry source directories.
    #[serde(default = "default_true")]
    pub include_cargo_registry: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            package_roots: Vec::new(),
            include_cargo_registry: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// The section spec described by `[section]`.
    pub fn section_spec(&self) -> SectionSpec {
        SectionSpec::from(&self.section)
    }

    /// Reject heading levels markdown cannot express.
    pub fn validate(&self) -> Result<()> {
        for (name, level) in [
            ("section.anchor_level", self.section.anchor_level),
            ("section.level", self.section.level),
        ] {
            if !(1..=6).contains(&level) {
                return Err(AgentContextError::config(format!(
                    "{name} must be between 1 and 6, got {level}"
                )));
            }
        }
        if self.defaults.extensions.is_empty() {
            return Err(AgentContextError::config(
                "defaults.extensions must name at least one extension",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.agent-context/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AgentContextError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.agent-context/agent-context.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(LOCAL_CONFIG_FILE_NAME))
}

/// Load the application config. A project-local `agent-context.toml` takes
/// precedence over the user config; returns defaults if neither exists.
pub fn load_config() -> Result<AppConfig> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if local.is_file() {
        return load_config_from(&local);
    }

    let path = config_file_path()?;
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AgentContextError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        AgentContextError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;

    tracing::debug!(?path, "loaded config");
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AgentContextError::io(&dir, e))?;

    let path = dir.join(LOCAL_CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AgentContextError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AgentContextError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("context_path"));
        assert!(toml_str.contains("AGENT.md"));
        assert!(toml_str.contains("anchor = \"Agent\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.context_path, ".context");
        assert_eq!(parsed.section.level, 2);
        assert!(parsed.discovery.include_cargo_registry);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[section]
heading = "Installed Context"

[discovery]
package_roots = ["/opt/packages"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let spec = config.section_spec();
        assert_eq!(spec.anchor_heading, "Agent");
        assert_eq!(spec.section_heading, "Installed Context");
        assert_eq!(spec.section_level, 2);
        assert_eq!(config.discovery.package_roots, vec!["/opt/packages"]);
        assert_eq!(config.defaults.extensions, vec!["md", "mdc"]);
    }

    #[test]
    fn load_rejects_out_of_range_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCAL_CONFIG_FILE_NAME);
        std::fs::write(&path, "[section]\nlevel = 7\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("section.level"));
    }

    #[test]
    fn load_reports_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCAL_CONFIG_FILE_NAME);
        std::fs::write(&path, "[section\nlevel = ").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, AgentContextError::Config { .. }));
    }
}
