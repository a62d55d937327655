//! Layered configuration resolution.
//!
//! Discovers environment-scoped configuration files, resolves `@include`
//! directives, deep-merges everything under a deterministic precedence order
//! (default file < environment files < explicit `--config` file <
//! command-line overrides), and republishes the resolved tree on demand.
//!
//! ```no_run
//! use strata_config::loader::LoadOptions;
//!
//! # fn main() -> anyhow::Result<()> {
//! let resolved = strata_config::loader::load(&LoadOptions::from_env())?;
//! if let Some(port) = resolved.get("server.port") {
//!     println!("listening on {port}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod discovery;
pub mod error;
pub mod format;
pub mod include;
pub mod loader;
pub mod merge;
pub mod overrides;
pub mod reload;
pub mod script;

pub use cli::CliOptions;
pub use error::ConfigError;
pub use include::{IncludeStrictness, MAX_INCLUDE_DEPTH};
pub use loader::{LoadOptions, ResolvedConfig, load};
pub use reload::{ConfigHandle, ReloadTrigger, start};
