//! SQL query builders for PostgreSQL statistics views.

use crate::snmp::{Column, ColumnSet};

/// Builds the pg_stat_database query for the enabled column set.
///
/// Optional columns (PostgreSQL 9.2+) are only selected when enabled, so the
/// conservative set runs on any server. Counters are not coalesced: a NULL
/// counter is a malformed row and must fail the poll. The shared-objects row
/// (NULL datname, PostgreSQL 12+) is filtered out.
pub(super) fn build_stat_database_query(columns: &ColumnSet) -> String {
    let selected: Vec<String> = columns.columns().map(select_expr).collect();

    format!(
        r#"
            SELECT
                {}
            FROM pg_stat_database
            WHERE datname IS NOT NULL
            ORDER BY datid
        "#,
        selected.join(",\n                ")
    )
}

fn select_expr(column: Column) -> String {
    match column {
        Column::BlkReadTime | Column::BlkWriteTime => {
            format!("{0}::double precision as {0}", column.name())
        }
        // Total milliseconds since reset; 0 when never reset.
        Column::StatsReset => "COALESCE(EXTRACT(EPOCH FROM now() - stats_reset) * 1000, 0)\
             ::double precision as stats_reset"
            .to_string(),
        _ => column.name().to_string(),
    }
}

/// Server version as an integer, e.g. `160002`.
pub(super) const SERVER_VERSION_QUERY: &str = "SHOW server_version_num";
