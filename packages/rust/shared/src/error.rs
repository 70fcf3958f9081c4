//! Error types for agent-context.
//!
//! Library crates use [`AgentContextError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all agent-context operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentContextError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A document could not be parsed into the node model.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (bad section spec, escaping headings, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AgentContextError>;

impl AgentContextError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is a parse failure (the merge-aborting kind).
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = AgentContextError::config("unknown key `anchor_lvl`");
        assert_eq!(err.to_string(), "config error: unknown key `anchor_lvl`");

        let err = AgentContextError::parse("invalid UTF-8 at byte 12");
        assert!(err.to_string().contains("byte 12"));
        assert!(err.is_parse());

        let err = AgentContextError::validation("heading escapes section");
        assert!(!err.is_parse());
    }

    #[test]
    fn io_error_includes_path() {
        let err = AgentContextError::io(
            "/tmp/AGENT.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("AGENT.md"));
        assert!(msg.contains("denied"));
    }
}
