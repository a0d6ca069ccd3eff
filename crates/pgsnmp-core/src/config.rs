//! Daemon configuration.
//!
//! Built once by the binary from command-line arguments and handed down
//! explicitly; nothing here is global.

use std::time::Duration;

use crate::snmp::{ColumnPolicy, Oid};

/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
/// Default pause before restarting a dead transport, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 15;
/// Default number of failures within one window before giving up.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 10;
/// Default failure window in seconds.
pub const DEFAULT_FAILURE_WINDOW_SECS: u64 = 3600;
/// Default consecutive poll errors the updater absorbs before dying.
pub const DEFAULT_MAX_UPDATE_ERRORS: u32 = 3;
/// Enterprise subtree the statistics are published under.
pub const DEFAULT_OID_BASE: &str = ".1.3.6.1.4.1.42916";

/// PostgreSQL connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
        }
    }
}

impl SourceConfig {
    /// Builds a libpq key/value connection string.
    ///
    /// Values are quoted so passwords with spaces or quotes survive.
    pub fn connection_string(&self) -> String {
        let mut parts = vec![
            format!("host={}", quote_conninfo(&self.host)),
            format!("port={}", self.port),
            format!("user={}", quote_conninfo(&self.user)),
        ];
        if !self.password.is_empty() {
            parts.push(format!("password={}", quote_conninfo(&self.password)));
        }
        parts.push(format!("dbname={}", quote_conninfo(&self.database)));
        parts.join(" ")
    }

    /// `user@host:port/database`, for logs. Never includes the password.
    pub fn describe(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

/// Quotes a conninfo value when it contains characters libpq would split on.
fn quote_conninfo(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Retry supervisor tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed pause between a failure and the restart.
    pub retry_delay: Duration,
    /// Failures within one window that abort the daemon.
    pub max_consecutive_failures: u32,
    /// Span after which the failure count starts over.
    pub failure_window: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            failure_window: Duration::from_secs(DEFAULT_FAILURE_WINDOW_SECS),
        }
    }
}

/// Everything the daemon needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub source: SourceConfig,
    pub oid_base: Oid,
    pub poll_interval: Duration,
    pub max_update_errors: u32,
    pub columns: ColumnPolicy,
    pub retry: RetryPolicy,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            oid_base: default_oid_base(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_update_errors: DEFAULT_MAX_UPDATE_ERRORS,
            columns: ColumnPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_oid_base() -> Oid {
    Oid::from_components(vec![1, 3, 6, 1, 4, 1, 42916])
}
