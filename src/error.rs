//! Error types for configuration resolution.
//!
//! Fatal conditions abort the whole resolution cycle; the originating file
//! path is always carried in the message so operators can find the bad
//! source without a stack trace.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised during a resolution cycle.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required or explicitly specified source could not be read.
    #[error("{}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed content in a configuration file. Also covers a config
    /// script that exits non-zero or prints output that is not JSON.
    #[error("{}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Include expansion exceeded the nesting depth bound.
    #[error("{}: too much nesting in configuration file", path.display())]
    ExcessiveNesting { path: PathBuf },

    /// An include directive pointed at a missing or unreadable target while
    /// strict include handling was requested.
    #[error("{}: include target not found: {}", path.display(), target.display())]
    UnresolvedInclude { path: PathBuf, target: PathBuf },
}

impl ConfigError {
    /// Parse failure with the originating file path prefixed.
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ConfigError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for resolution operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
