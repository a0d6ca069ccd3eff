//! net-snmp `pass_persist` transport.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  lines   ┌──────────────────────────────┐  stdout
//! │ RequestReader├─────────►│ PassPersist::run (serving)   ├────────► snmpd
//! │ (stdin pump) │          │  - RequestParser / respond() │
//! └──────────────┘          │  - checks updater + interrupt│
//!                           └──────┬──────────────▲────────┘
//!                          read    │              │ UpdaterExit
//!                           ┌──────▼──────┐  ┌────┴─────────┐
//!                           │ MibTree     │◄─┤ updater      │
//!                           │ (RwLock)    │  │ Poller::poll │
//!                           └─────────────┘  └──────────────┘
//! ```
//!
//! One `PassPersist` is one session: `run` returns when the peer goes away,
//! the process is interrupted, the updater gives up, or I/O fails. The
//! caller decides whether to build a new session.

mod protocol;
mod reader;
mod tree;
mod updater;

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::config::DEFAULT_MAX_UPDATE_ERRORS;
use crate::snmp::Oid;

pub use protocol::{Request, RequestParser, Response, respond};
pub use reader::RequestReader;
pub use tree::MibTree;

use updater::{UpdaterExit, UpdaterSettings};

/// How long the serving loop waits for a request before re-checking the
/// updater and the interrupt flag.
const REQUEST_POLL_TICK: Duration = Duration::from_millis(100);

/// Fills a staging tree on every tick.
pub trait Poller: Send + 'static {
    type Error: fmt::Display;

    fn poll(&mut self, tree: &mut MibTree) -> Result<(), Self::Error>;
}

/// Why a transport session ended.
#[derive(Debug)]
pub enum TransportError {
    /// snmpd closed the pipe (EOF, empty line, or broken pipe on write).
    PeerClosed,
    /// The process was asked to stop.
    Interrupted,
    /// The updater gave up or crashed.
    UpdaterDied(String),
    /// Any other I/O failure.
    Io(io::Error),
}

impl TransportError {
    /// Clean shutdowns end the daemon successfully and are never retried.
    pub fn is_clean_shutdown(&self) -> bool {
        matches!(self, TransportError::PeerClosed | TransportError::Interrupted)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::PeerClosed => write!(f, "snmpd closed the pipe"),
            TransportError::Interrupted => write!(f, "interrupted"),
            TransportError::UpdaterDied(msg) => write!(f, "updater thread has died: {}", msg),
            TransportError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::BrokenPipe {
            TransportError::PeerClosed
        } else {
            TransportError::Io(e)
        }
    }
}

/// One pass_persist session.
pub struct PassPersist {
    base: Oid,
    interval: Duration,
    max_update_errors: u32,
    running: Option<Arc<AtomicBool>>,
    tree: Arc<RwLock<MibTree>>,
}

impl PassPersist {
    /// Creates a session publishing under `base`, refreshed every `interval`.
    pub fn new(base: Oid, interval: Duration) -> Self {
        Self {
            base,
            interval,
            max_update_errors: DEFAULT_MAX_UPDATE_ERRORS,
            running: None,
            tree: Arc::new(RwLock::new(MibTree::new())),
        }
    }

    /// Consecutive poll errors absorbed before the updater gives up.
    pub fn with_max_update_errors(mut self, max_update_errors: u32) -> Self {
        self.max_update_errors = max_update_errors;
        self
    }

    /// Stops serving with [`TransportError::Interrupted`] once `running`
    /// turns false.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    pub fn base(&self) -> &Oid {
        &self.base
    }

    /// Copy of the currently published tree.
    pub fn snapshot(&self) -> MibTree {
        self.tree.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Starts the updater and serves requests until the session ends.
    ///
    /// Never returns `Ok` while healthy; `Ok(())` only means the caller's
    /// request source ended in a way that is not a peer close.
    pub fn run<P: Poller, W: Write>(
        &mut self,
        poller: P,
        requests: &mut RequestReader,
        out: &mut W,
    ) -> Result<(), TransportError> {
        let stop = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = mpsc::channel();

        let settings = UpdaterSettings {
            interval: self.interval,
            max_errors: self.max_update_errors,
        };
        // Detached on return: a poll stuck in a query must not block us.
        let _updater = updater::spawn(poller, self.tree.clone(), settings, stop.clone(), exit_tx)?;

        info!(
            base = %self.base.to_absolute_string(),
            interval_secs = self.interval.as_secs(),
            "pass_persist session started"
        );

        let result = self.serve(requests, &exit_rx, out);
        stop.store(true, Ordering::SeqCst);
        debug!("pass_persist session ended");
        result
    }

    fn serve<W: Write>(
        &self,
        requests: &mut RequestReader,
        updater: &Receiver<UpdaterExit>,
        out: &mut W,
    ) -> Result<(), TransportError> {
        loop {
            if let Some(running) = &self.running
                && !running.load(Ordering::SeqCst)
            {
                return Err(TransportError::Interrupted);
            }

            match updater.try_recv() {
                Ok(UpdaterExit::Failed(msg)) => return Err(TransportError::UpdaterDied(msg)),
                Err(TryRecvError::Disconnected) => {
                    return Err(TransportError::UpdaterDied(
                        "updater thread panicked".to_string(),
                    ));
                }
                Err(TryRecvError::Empty) => {}
            }

            let line = match requests.recv_timeout(REQUEST_POLL_TICK) {
                Ok(Ok(line)) => line,
                Ok(Err(e)) => return Err(e.into()),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::PeerClosed),
            };

            if line.trim().is_empty() {
                return Err(TransportError::PeerClosed);
            }

            trace!(line = %line, "request line");
            if let Some(request) = requests.feed(&line) {
                let response = {
                    let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
                    respond(&request, &self.base, &tree)
                };
                response.write_to(out)?;
                out.flush()?;
            }
        }
    }
}
