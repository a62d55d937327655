//! Resolve the layered configuration and print it.
//!
//! `strata-config [--config <path>] [--key.subkey=value ...]` runs one
//! resolution cycle and prints the resolved tree as pretty JSON. With
//! `--watch` the process stays alive and reprints each newly published
//! snapshot, reloading on SIGHUP.

use anyhow::Result;
use strata_config::cli::CliOptions;
use strata_config::discovery;
use strata_config::loader::LoadOptions;
use strata_config::reload;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Binary-specific reserved flag; never treated as an override.
const WATCH_FLAG: &str = "watch";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut cli = CliOptions::from_env();
    let watch = cli.overrides.remove(WATCH_FLAG).is_some();

    let mut options = LoadOptions::new(discovery::config_dir(), discovery::environment_label());
    options.explicit_file = cli.config_file;
    options.overrides = cli.overrides;

    let (handle, trigger) = match reload::start(options) {
        Ok(started) => started,
        Err(err) => {
            error!(error = %err, "fatal configuration error");
            std::process::exit(1);
        }
    };

    println!("{}", serde_json::to_string_pretty(handle.current().tree())?);

    if watch {
        #[cfg(unix)]
        reload::install_sighup_trigger(trigger.clone())?;
        info!("watching for reload requests");

        let mut changes = handle.subscribe();
        while changes.changed().await.is_ok() {
            let snapshot = handle.current();
            info!(version = snapshot.version(), "configuration reloaded");
            println!("{}", serde_json::to_string_pretty(snapshot.tree())?);
        }
    }

    drop(trigger);
    Ok(())
}
