//! Per-tick orchestration: collect, encode, expose.

use std::fmt;

use tracing::debug;

use crate::collector::{PgCollectError, PgStatSource};
use crate::passpersist::{MibTree, Poller};
use crate::snmp::{EncodeError, SnapshotEncoder};

/// Error from one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    Collect(PgCollectError),
    Encode(EncodeError),
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::Collect(e) => write!(f, "{}", e),
            PollError::Encode(e) => write!(f, "malformed row: {}", e),
        }
    }
}

impl std::error::Error for PollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::Collect(e) => Some(e),
            PollError::Encode(e) => Some(e),
        }
    }
}

impl From<PgCollectError> for PollError {
    fn from(e: PgCollectError) -> Self {
        PollError::Collect(e)
    }
}

impl From<EncodeError> for PollError {
    fn from(e: EncodeError) -> Self {
        PollError::Encode(e)
    }
}

/// Publishes pg_stat_database into the pass_persist tree on every tick.
pub struct DatabaseStatsPoller {
    source: PgStatSource,
}

impl DatabaseStatsPoller {
    pub fn new(source: PgStatSource) -> Self {
        Self { source }
    }
}

impl Poller for DatabaseStatsPoller {
    type Error = PollError;

    fn poll(&mut self, tree: &mut MibTree) -> Result<(), PollError> {
        // The connection lives and dies inside collect().
        let stats = self.source.collect()?;
        let encoder = SnapshotEncoder::new(stats.columns);
        let entries = encoder.encode(&stats.rows)?;

        debug!(
            databases = stats.rows.len(),
            entries = entries.len(),
            "pg_stat_database encoded"
        );

        tree.extend(entries);
        Ok(())
    }
}
