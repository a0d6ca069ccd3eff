//! Rows sampled from PostgreSQL statistics views.

/// Database-level statistics from pg_stat_database.
///
/// Source: `SELECT ... FROM pg_stat_database`
///
/// One row per database. Every field is nullable as decoded: a missing
/// column is reported by the encoder instead of panicking in the decoder.
/// All numeric fields except `numbackends` are cumulative since the last
/// statistics reset.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MetricRow {
    /// Database OID, the row identifier of the exported table.
    /// Source: `pg_stat_database.datid`
    pub datid: Option<u32>,

    /// Source: `pg_stat_database.datname`
    pub datname: Option<String>,

    /// Backends currently connected. The only non-cumulative column.
    /// Source: `pg_stat_database.numbackends`
    pub numbackends: Option<i64>,

    /// Source: `pg_stat_database.xact_commit`
    pub xact_commit: Option<i64>,

    /// Source: `pg_stat_database.xact_rollback`
    pub xact_rollback: Option<i64>,

    /// Source: `pg_stat_database.blks_read`
    pub blks_read: Option<i64>,

    /// Source: `pg_stat_database.blks_hit`
    pub blks_hit: Option<i64>,

    /// Source: `pg_stat_database.tup_returned`
    pub tup_returned: Option<i64>,

    /// Source: `pg_stat_database.tup_fetched`
    pub tup_fetched: Option<i64>,

    /// Source: `pg_stat_database.tup_inserted`
    pub tup_inserted: Option<i64>,

    /// Source: `pg_stat_database.tup_updated`
    pub tup_updated: Option<i64>,

    /// Source: `pg_stat_database.tup_deleted`
    pub tup_deleted: Option<i64>,

    /// Queries canceled due to conflicts with recovery (standby only).
    /// Source: `pg_stat_database.conflicts`
    pub conflicts: Option<i64>,

    /// PostgreSQL 9.2+.
    /// Source: `pg_stat_database.temp_files`
    pub temp_files: Option<i64>,

    /// PostgreSQL 9.2+.
    /// Source: `pg_stat_database.temp_bytes`
    pub temp_bytes: Option<i64>,

    /// PostgreSQL 9.2+.
    /// Source: `pg_stat_database.deadlocks`
    pub deadlocks: Option<i64>,

    /// Milliseconds spent reading data file blocks. PostgreSQL 9.2+.
    /// Source: `pg_stat_database.blk_read_time`
    pub blk_read_time: Option<f64>,

    /// Milliseconds spent writing data file blocks. PostgreSQL 9.2+.
    /// Source: `pg_stat_database.blk_write_time`
    pub blk_write_time: Option<f64>,

    /// Milliseconds elapsed since the statistics were last reset.
    /// Source: `now() - pg_stat_database.stats_reset`
    pub stats_reset: Option<f64>,
}
