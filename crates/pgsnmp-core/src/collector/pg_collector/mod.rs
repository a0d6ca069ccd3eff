//! PostgreSQL statistics source.
//!
//! Collects `pg_stat_database` on demand. Every collection opens its own
//! connection and drops it before returning, on success and on every error
//! path, so a poll never leaks a backend into the next tick.
//!
//! Optional columns are resolved per collection: with the `auto` policy the
//! server version is read once per connection via `SHOW server_version_num`.

mod database;
mod queries;

use postgres::{Client, NoTls};
use tracing::debug;

use crate::config::SourceConfig;
use crate::model::MetricRow;
use crate::snmp::{ColumnPolicy, ColumnSet};

use queries::SERVER_VERSION_QUERY;

/// Error type for PostgreSQL collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgCollectError {
    /// Connection failed.
    ConnectionError(String),
    /// Query execution failed.
    QueryError(String),
}

impl std::fmt::Display for PgCollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PgCollectError::ConnectionError(msg) => write!(f, "PostgreSQL: {}", msg),
            PgCollectError::QueryError(msg) => write!(f, "PostgreSQL query error: {}", msg),
        }
    }
}

impl std::error::Error for PgCollectError {}

/// One collection from pg_stat_database.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStats {
    /// `server_version_num`, when it was read.
    pub server_version_num: Option<i32>,
    /// Column set the rows were queried with.
    pub columns: ColumnSet,
    pub rows: Vec<MetricRow>,
}

/// pg_stat_database source with per-call connections.
pub struct PgStatSource {
    connection_string: String,
    policy: ColumnPolicy,
}

impl PgStatSource {
    pub fn new(config: &SourceConfig, policy: ColumnPolicy) -> Self {
        Self {
            connection_string: config.connection_string(),
            policy,
        }
    }

    /// Creates a source with an explicit connection string.
    pub fn with_connection_string(connection_string: String, policy: ColumnPolicy) -> Self {
        Self {
            connection_string,
            policy,
        }
    }

    pub fn policy(&self) -> ColumnPolicy {
        self.policy
    }

    /// Connects, queries pg_stat_database and disconnects.
    pub fn collect(&self) -> Result<DatabaseStats, PgCollectError> {
        let mut client = Client::connect(&self.connection_string, NoTls)
            .map_err(|e| PgCollectError::ConnectionError(format_postgres_error(&e)))?;

        let server_version_num = if self.policy.needs_server_version() {
            query_server_version(&mut client)
        } else {
            None
        };
        let columns = self.policy.resolve(server_version_num);

        let rows = Self::collect_database(&mut client, &columns)?;

        // Errors above drop the client, which closes the connection too.
        if let Err(e) = client.close() {
            debug!(error = %format_postgres_error(&e), "closing PostgreSQL connection failed");
        }

        Ok(DatabaseStats {
            server_version_num,
            columns,
            rows,
        })
    }
}

fn query_server_version(client: &mut Client) -> Option<i32> {
    let version = client
        .query_one(SERVER_VERSION_QUERY, &[])
        .ok()
        .and_then(|row| row.try_get::<_, String>(0).ok())
        .and_then(|v| v.parse::<i32>().ok());
    debug!(server_version_num = ?version, "detected PostgreSQL version");
    version
}

/// One-line reason for a failed poll. Server errors keep their severity;
/// client-side failures are reduced to the part an operator acts on.
pub(crate) fn format_postgres_error(e: &postgres::Error) -> String {
    match e.as_db_error() {
        Some(db_error) => format!("{}: {}", db_error.severity(), db_error.message()),
        None => summarize_client_error(&e.to_string()),
    }
}

fn summarize_client_error(msg: &str) -> String {
    if msg.contains("Connection refused") {
        "connection refused".to_string()
    } else if msg.contains("password authentication failed") {
        "password authentication failed".to_string()
    } else if msg.contains("timed out") {
        "connection timed out".to_string()
    } else {
        msg.to_string()
    }
}
