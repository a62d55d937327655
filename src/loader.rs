//! One full resolution cycle.
//!
//! discovery -> parse each source -> include resolution -> deep merge ->
//! command-line overrides -> immutable snapshot. Everything here is
//! synchronous and blocking; the reload layer decides when cycles run.

use crate::cli::CliOptions;
use crate::discovery;
use crate::error::Result;
use crate::format;
use crate::include::IncludeStrictness;
use crate::merge::deep_merge_all;
use crate::overrides::apply_overrides;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Inputs for a resolution cycle.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Directory scanned for `default.<ext>` / `<environment>.<ext>` files.
    pub config_dir: PathBuf,
    /// Active environment label (already sanitized).
    pub environment: String,
    /// Explicit highest-precedence file (`--config`); missing is fatal.
    pub explicit_file: Option<PathBuf>,
    /// Dotted-path overrides applied after the merge.
    pub overrides: BTreeMap<String, String>,
    /// Handling of unresolvable include directives.
    pub include_strictness: IncludeStrictness,
}

impl LoadOptions {
    /// Options for an explicit directory and environment label.
    pub fn new(config_dir: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            config_dir: config_dir.into(),
            environment: discovery::sanitize_label(&environment.into()),
            explicit_file: None,
            overrides: BTreeMap::new(),
            include_strictness: IncludeStrictness::default(),
        }
    }

    /// Options derived from the `STRATA_*` environment variables and the
    /// process command line.
    pub fn from_env() -> Self {
        let cli = CliOptions::from_env();
        let mut options = Self::new(discovery::config_dir(), discovery::environment_label());
        options.explicit_file = cli.config_file;
        options.overrides = cli.overrides;
        options
    }

    pub fn with_explicit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_include_strictness(mut self, strictness: IncludeStrictness) -> Self {
        self.include_strictness = strictness;
        self
    }
}

/// The published, immutable snapshot of one resolution cycle.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    tree: Value,
    version: u64,
    sources: Vec<PathBuf>,
}

impl ResolvedConfig {
    /// The resolved configuration tree.
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// Monotonic snapshot version, starting at 1 for the startup resolution.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Paths of the sources that produced this snapshot, in merge order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Dotted-path lookup into the resolved tree.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut node = &self.tree;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            node = node.get(segment)?;
        }
        Some(node)
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}

/// Run one resolution cycle.
///
/// Discovered files that fail to read or parse are fatal, as is a missing
/// explicit file; a configuration directory that does not exist simply
/// contributes no sources.
pub fn load(options: &LoadOptions) -> Result<ResolvedConfig> {
    let discovered = discovery::discover_sources(&options.config_dir, &options.environment);

    let mut trees: Vec<Value> = Vec::with_capacity(discovered.len() + 1);
    let mut sources: Vec<PathBuf> = Vec::with_capacity(discovered.len() + 1);

    for source in &discovered {
        debug!(
            path = %source.path.display(),
            default = source.is_default,
            "loading configuration source"
        );
        trees.push(format::parse_file(
            &source.path,
            options.include_strictness,
            0,
        )?);
        sources.push(source.path.clone());
    }

    if let Some(ref explicit) = options.explicit_file {
        debug!(path = %explicit.display(), "loading explicitly specified file");
        trees.push(format::parse_file(explicit, options.include_strictness, 0)?);
        sources.push(explicit.clone());
    }

    let mut merged = deep_merge_all(trees);
    apply_overrides(&mut merged, &options.overrides);

    info!(
        environment = %options.environment,
        sources = sources.len(),
        overrides = options.overrides.len(),
        "configuration resolved"
    );

    Ok(ResolvedConfig {
        tree: merged,
        version: 0,
        sources,
    })
}
