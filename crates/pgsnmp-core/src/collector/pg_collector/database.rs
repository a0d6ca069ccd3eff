//! pg_stat_database collection.

use postgres::Client;
use postgres::types::FromSql;

use crate::model::MetricRow;
use crate::snmp::ColumnSet;

use super::queries::build_stat_database_query;
use super::{PgCollectError, PgStatSource};

impl PgStatSource {
    /// Runs the pg_stat_database query on an open connection.
    ///
    /// No caching - pg_stat_database is small and changes frequently.
    pub(super) fn collect_database(
        client: &mut Client,
        columns: &ColumnSet,
    ) -> Result<Vec<MetricRow>, PgCollectError> {
        let query = build_stat_database_query(columns);
        let rows = client
            .query(&query, &[])
            .map_err(|e| PgCollectError::QueryError(super::format_postgres_error(&e)))?;

        Ok(rows.iter().map(decode_row).collect())
    }
}

/// Decodes one row. Absent, NULL or mistyped columns become `None`; the
/// encoder decides whether that makes the row malformed.
fn decode_row(row: &postgres::Row) -> MetricRow {
    MetricRow {
        datid: get(row, "datid"),
        datname: get(row, "datname"),
        numbackends: get::<i32>(row, "numbackends").map(i64::from),
        xact_commit: get(row, "xact_commit"),
        xact_rollback: get(row, "xact_rollback"),
        blks_read: get(row, "blks_read"),
        blks_hit: get(row, "blks_hit"),
        tup_returned: get(row, "tup_returned"),
        tup_fetched: get(row, "tup_fetched"),
        tup_inserted: get(row, "tup_inserted"),
        tup_updated: get(row, "tup_updated"),
        tup_deleted: get(row, "tup_deleted"),
        conflicts: get(row, "conflicts"),
        temp_files: get(row, "temp_files"),
        temp_bytes: get(row, "temp_bytes"),
        deadlocks: get(row, "deadlocks"),
        blk_read_time: get(row, "blk_read_time"),
        blk_write_time: get(row, "blk_write_time"),
        stats_reset: get(row, "stats_reset"),
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a postgres::Row, column: &str) -> Option<T> {
    row.try_get::<_, Option<T>>(column).ok().flatten()
}
