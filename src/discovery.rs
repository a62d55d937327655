//! Source discovery and environment selection.
//!
//! A configuration directory holds files named `default.<ext>` and
//! `<environment>.<ext>`; everything else is ignored. The active environment
//! label comes from `STRATA_ENV` (sanitized, defaulting to `development`)
//! and the directory itself can be redirected with `STRATA_CONFIG_DIR`.

use crate::format::Format;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable selecting the active environment label.
pub const ENV_VAR_ENVIRONMENT: &str = "STRATA_ENV";

/// Environment variable redirecting the configuration directory.
pub const ENV_VAR_CONFIG_DIR: &str = "STRATA_CONFIG_DIR";

/// Label used when no environment is selected.
pub const DEFAULT_ENVIRONMENT: &str = "development";

const DEFAULT_STEM: &str = "default";

/// One discovered configuration file, ordered for merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Whether this is the `default.<ext>` source (always sorts first).
    pub is_default: bool,
}

/// Sanitize an environment label to lowercase alphanumerics, hyphen, and
/// underscore. An empty result falls back to the default label.
pub fn sanitize_label(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        DEFAULT_ENVIRONMENT.to_string()
    } else {
        cleaned
    }
}

/// The active environment label from `STRATA_ENV`.
pub fn environment_label() -> String {
    match std::env::var(ENV_VAR_ENVIRONMENT) {
        Ok(raw) => sanitize_label(&raw),
        Err(_) => DEFAULT_ENVIRONMENT.to_string(),
    }
}

/// The configuration directory: `STRATA_CONFIG_DIR`, or the `config`
/// subdirectory of the working directory.
pub fn config_dir() -> PathBuf {
    std::env::var_os(ENV_VAR_CONFIG_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config"))
}

/// List candidate configuration files in `dir` for `environment`.
///
/// Keeps entries with a recognized extension whose case-insensitive stem is
/// `default` or the environment label. The default source sorts first; the
/// rest sort by ascending lexical path order. A missing directory yields an
/// empty list, not an error. File contents are never read here.
pub fn discover_sources(dir: &Path, environment: &str) -> Vec<SourceFile> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "configuration directory not listable");
            return Vec::new();
        }
    };

    let mut sources = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if Format::from_extension(ext).is_none() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let stem = stem.to_lowercase();
        if stem != DEFAULT_STEM && stem != environment {
            continue;
        }
        sources.push(SourceFile {
            is_default: stem == DEFAULT_STEM,
            path,
        });
    }

    sources.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.path.cmp(&b.path))
    });
    sources
}
