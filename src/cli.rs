//! Command-line surface.
//!
//! The loader understands `--config <path>` / `-c <path>` for an explicit
//! highest-precedence file. Every *other* flag is configuration data: a
//! dotted key path with a raw value (`--server.port=2525`, `--server.port
//! 2525`, or a bare `--server.debug` which reads as `true`). Positional
//! arguments are ignored.
//!
//! Because unknown flags are data here, arguments are scanned directly
//! instead of going through a declarative parser that would reject them.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Flag names consumed by the loader itself; never turned into overrides.
pub const RESERVED_FLAGS: &[&str] = &["config", "c"];

/// Parsed command-line surface for one resolution cycle.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    /// Explicit configuration file from `--config` / `-c`.
    pub config_file: Option<PathBuf>,
    /// Dotted-path override pairs from all remaining flags.
    pub overrides: BTreeMap<String, String>,
}

impl CliOptions {
    /// Parse from the process arguments, skipping `argv[0]`.
    pub fn from_env() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    /// Parse an argument list into the explicit config path and overrides.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut options = CliOptions::default();
        let mut args = args.into_iter().map(Into::into).peekable();

        while let Some(arg) = args.next() {
            let Some(flag) = arg
                .strip_prefix("--")
                .or_else(|| arg.strip_prefix('-'))
                .filter(|f| !f.is_empty())
            else {
                // positional argument, ignored
                continue;
            };

            let (name, value) = match flag.split_once('=') {
                Some((name, value)) => (name.to_string(), value.to_string()),
                None => {
                    // a following token that is not itself a flag is the value;
                    // a bare flag reads as "true". Negative numbers are
                    // values, not flags.
                    let value = match args.peek() {
                        Some(next) if !next.starts_with('-') || looks_numeric(next) => {
                            args.next().unwrap_or_default()
                        }
                        _ => "true".to_string(),
                    };
                    (flag.to_string(), value)
                }
            };

            if RESERVED_FLAGS.contains(&name.as_str()) {
                options.config_file = Some(PathBuf::from(value));
            } else {
                options.overrides.insert(name, value);
            }
        }

        options
    }
}

fn looks_numeric(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}
