//! Background worker refreshing the published tree.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::Poller;
use super::tree::MibTree;

/// Granularity of the interruptible sleep between polls.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Why the updater stopped on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum UpdaterExit {
    /// Too many consecutive poll errors; carries the last one.
    Failed(String),
}

pub(super) struct UpdaterSettings {
    pub interval: Duration,
    pub max_errors: u32,
}

/// Spawns the updater. It polls immediately, then every `interval`, until
/// `stop` is set or it gives up. Dropping `exit_tx` without a message (for
/// example on a panic in the poller) is how the server notices a crash.
pub(super) fn spawn<P: Poller>(
    mut poller: P,
    tree: Arc<RwLock<MibTree>>,
    settings: UpdaterSettings,
    stop: Arc<AtomicBool>,
    exit_tx: Sender<UpdaterExit>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("passpersist-updater".to_string())
        .spawn(move || {
            let max_errors = settings.max_errors.max(1);
            let mut consecutive_errors = 0u32;

            while !stop.load(Ordering::SeqCst) {
                let mut staging = MibTree::new();
                match poller.poll(&mut staging) {
                    Ok(()) => {
                        consecutive_errors = 0;
                        let entries = staging.len();
                        *tree.write().unwrap_or_else(PoisonError::into_inner) = staging;
                        debug!(entries, "snapshot published");
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        warn!(
                            error = %e,
                            consecutive_errors,
                            max_errors,
                            "poll failed"
                        );
                        if consecutive_errors >= max_errors {
                            let _ = exit_tx.send(UpdaterExit::Failed(e.to_string()));
                            return;
                        }
                    }
                }

                let mut remaining = settings.interval;
                while remaining > Duration::ZERO && !stop.load(Ordering::SeqCst) {
                    let slice = remaining.min(SLEEP_SLICE);
                    thread::sleep(slice);
                    remaining = remaining.saturating_sub(slice);
                }
            }
        })
}
