//! Per-extension parser dispatch.
//!
//! Each recognized extension maps to a parsing capability that turns raw
//! file content into a tree. Text formats get their include directives
//! rewritten before structural parsing; every parsed tree is then walked for
//! reserved include markers.

use crate::error::{ConfigError, Result};
use crate::include::{self, IncludeStrictness};
use crate::script;
use serde_json::Value;
use std::path::Path;

/// Supported configuration formats, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
    Yaml,
    /// Executable script producing a JSON tree on stdout.
    Script,
}

impl Format {
    /// Look up a format by file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Format::Toml),
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "sh" => Some(Format::Script),
            _ => None,
        }
    }

    /// Detect the format of a path from its extension.
    pub fn detect(path: &Path) -> Option<Format> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

/// Parse one configuration file into a tree, resolving include directives.
///
/// Read and parse failures are fatal and carry the originating path.
/// `depth` is the include nesting level already consumed by the caller
/// (0 for a top-level source).
pub fn parse_file(path: &Path, strictness: IncludeStrictness, depth: usize) -> Result<Value> {
    let format = Format::detect(path)
        .ok_or_else(|| ConfigError::parse(path, "unrecognized file extension"))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tree = match format {
        Format::Script => script::run(path, base_dir)?,
        Format::Toml | Format::Json | Format::Yaml => {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Source {
                path: path.to_path_buf(),
                source,
            })?;
            match format {
                Format::Toml => {
                    // directive recognition happens on raw text, before parsing
                    let rewritten =
                        include::rewrite_directives(path, base_dir, &contents, strictness)?;
                    toml::from_str(&rewritten).map_err(|err| ConfigError::parse(path, err))?
                }
                Format::Json => {
                    serde_json::from_str(&contents).map_err(|err| ConfigError::parse(path, err))?
                }
                Format::Yaml => {
                    serde_yaml::from_str(&contents).map_err(|err| ConfigError::parse(path, err))?
                }
                Format::Script => unreachable!("handled above"),
            }
        }
    };

    include::resolve(&mut tree, path, base_dir, strictness, depth)?;
    Ok(tree)
}
