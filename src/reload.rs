//! Reload orchestration and snapshot publication.
//!
//! The published snapshot sits behind an atomic pointer swap, so readers
//! always observe a complete tree; change notifications ride a watch channel
//! carrying the snapshot version. At most one resolution cycle is ever in
//! flight: reload requests queue on a channel and are coalesced by draining
//! the queue before each run. A fatal error during a reload terminates the
//! process after logging, matching the startup contract; there is no
//! fallback to the previous snapshot.

use crate::error::Result;
use crate::loader::{self, LoadOptions, ResolvedConfig};
use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

/// Read handle over the currently published configuration.
///
/// Cheap to clone; all clones observe the same snapshot stream.
#[derive(Clone)]
pub struct ConfigHandle {
    current: Arc<ArcSwap<ResolvedConfig>>,
    changes: watch::Receiver<u64>,
}

impl ConfigHandle {
    /// The currently published snapshot.
    pub fn current(&self) -> Arc<ResolvedConfig> {
        self.current.load_full()
    }

    /// A receiver observing the version of each newly published snapshot.
    ///
    /// The startup snapshot seeds the channel, so `changed()` resolves only
    /// for republications, never for the initial resolution.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.clone()
    }
}

/// Sends reload requests into the controller's queue.
#[derive(Clone)]
pub struct ReloadTrigger {
    queue: mpsc::UnboundedSender<()>,
}

impl ReloadTrigger {
    /// Request an asynchronous reload. A request arriving while a cycle is
    /// already running is deferred until that cycle completes; bursts
    /// coalesce into a single cycle.
    pub fn trigger(&self) {
        let _ = self.queue.send(());
    }
}

struct ReloadController {
    options: LoadOptions,
    current: Arc<ArcSwap<ResolvedConfig>>,
    changes: watch::Sender<u64>,
    queue: mpsc::UnboundedReceiver<()>,
    version: u64,
}

impl ReloadController {
    async fn run(mut self) {
        while self.queue.recv().await.is_some() {
            // coalesce triggers that piled up while we were idle or loading
            while self.queue.try_recv().is_ok() {}

            let options = self.options.clone();
            let outcome = tokio::task::spawn_blocking(move || loader::load(&options)).await;

            let snapshot = match outcome {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(err)) => {
                    error!(error = %err, "configuration reload failed");
                    std::process::exit(1);
                }
                Err(err) => {
                    error!(error = %err, "configuration reload task panicked");
                    std::process::exit(1);
                }
            };

            self.version += 1;
            let snapshot = Arc::new(snapshot.with_version(self.version));
            self.current.store(Arc::clone(&snapshot));
            let _ = self.changes.send(self.version);
            info!(version = self.version, "configuration republished");
        }
    }
}

/// Run the startup resolution and start the reload controller.
///
/// Must be called within a tokio runtime. The startup load is synchronous
/// and its failure is returned to the caller; reload failures after that
/// terminate the process.
pub fn start(options: LoadOptions) -> Result<(ConfigHandle, ReloadTrigger)> {
    let initial = loader::load(&options)?.with_version(1);
    let current = Arc::new(ArcSwap::from_pointee(initial));

    let (changes_tx, changes_rx) = watch::channel(1u64);
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();

    let controller = ReloadController {
        options,
        current: Arc::clone(&current),
        changes: changes_tx,
        queue: queue_rx,
        version: 1,
    };
    tokio::spawn(controller.run());

    Ok((
        ConfigHandle {
            current,
            changes: changes_rx,
        },
        ReloadTrigger { queue: queue_tx },
    ))
}

/// Re-run the resolution cycle whenever the process receives SIGHUP.
#[cfg(unix)]
pub fn install_sighup_trigger(trigger: ReloadTrigger) -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            info!("SIGHUP received, scheduling configuration reload");
            trigger.trigger();
        }
    });
    Ok(())
}
