//! Snapshot encoder: database statistics rows to typed namespace entries.
//!
//! Pure transformation. Each row yields its enabled columns in MIB order
//! under `1.1.<datid>.<column>`. A row missing a column the deployment
//! exports fails the whole encode, so a broken source shows up as a failed
//! poll instead of a silently thinner tree.

use std::fmt;

use crate::model::MetricRow;

use super::mib::{Column, ColumnKind, ColumnSet};
use super::oid::{DATABASE_STATS_TABLE, Oid};
use super::value::TypedValue;

/// Error produced for a malformed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A required (or enabled optional) column was NULL or absent.
    MissingColumn { datid: Option<u32>, column: Column },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::MissingColumn {
                datid: Some(datid),
                column,
            } => write!(f, "database {}: missing column {}", datid, column),
            EncodeError::MissingColumn {
                datid: None,
                column,
            } => write!(f, "row without identifier: missing column {}", column),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Encodes `pg_stat_database` rows into exported entries.
#[derive(Debug, Clone, Default)]
pub struct SnapshotEncoder {
    columns: ColumnSet,
}

impl SnapshotEncoder {
    pub fn new(columns: ColumnSet) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Encodes all rows, failing on the first malformed one.
    pub fn encode(&self, rows: &[MetricRow]) -> Result<Vec<(Oid, TypedValue)>, EncodeError> {
        let per_row = self.columns.columns().count();
        let mut out = Vec::with_capacity(rows.len() * per_row);
        for row in rows {
            self.encode_row_into(row, &mut out)?;
        }
        Ok(out)
    }

    /// Encodes a single row.
    pub fn encode_row(&self, row: &MetricRow) -> Result<Vec<(Oid, TypedValue)>, EncodeError> {
        let mut out = Vec::new();
        self.encode_row_into(row, &mut out)?;
        Ok(out)
    }

    fn encode_row_into(
        &self,
        row: &MetricRow,
        out: &mut Vec<(Oid, TypedValue)>,
    ) -> Result<(), EncodeError> {
        let datid = row.datid.ok_or(EncodeError::MissingColumn {
            datid: None,
            column: Column::Datid,
        })?;

        let start = out.len();
        for column in self.columns.columns() {
            match cell_value(row, column) {
                Some(value) => {
                    let key = Oid::cell(DATABASE_STATS_TABLE, datid, column.index());
                    out.push((key, value));
                }
                // Elapsed time since reset is optional on the source side.
                None if column == Column::StatsReset => {}
                None => {
                    out.truncate(start);
                    return Err(EncodeError::MissingColumn {
                        datid: Some(datid),
                        column,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Extracts one typed cell from a row.
fn cell_value(row: &MetricRow, column: Column) -> Option<TypedValue> {
    match column.kind() {
        ColumnKind::String => match column {
            Column::Datid => row.datid.map(|id| TypedValue::String(id.to_string())),
            _ => row.datname.clone().map(TypedValue::String),
        },
        ColumnKind::Gauge => row.numbackends.map(TypedValue::gauge),
        ColumnKind::Counter => counter_field(row, column).map(TypedValue::counter),
        ColumnKind::TimeTicks => {
            let millis = match column {
                Column::BlkReadTime => row.blk_read_time,
                Column::BlkWriteTime => row.blk_write_time,
                _ => row.stats_reset,
            };
            millis.map(TypedValue::timeticks_from_millis)
        }
    }
}

fn counter_field(row: &MetricRow, column: Column) -> Option<i64> {
    match column {
        Column::XactCommit => row.xact_commit,
        Column::XactRollback => row.xact_rollback,
        Column::BlksRead => row.blks_read,
        Column::BlksHit => row.blks_hit,
        Column::TupReturned => row.tup_returned,
        Column::TupFetched => row.tup_fetched,
        Column::TupInserted => row.tup_inserted,
        Column::TupUpdated => row.tup_updated,
        Column::TupDeleted => row.tup_deleted,
        Column::Conflicts => row.conflicts,
        Column::TempFiles => row.temp_files,
        Column::TempBytes => row.temp_bytes,
        Column::Deadlocks => row.deadlocks,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_row(datid: u32) -> MetricRow {
        MetricRow {
            datid: Some(datid),
            datname: Some("postgres".to_string()),
            numbackends: Some(3),
            xact_commit: Some(1_000_000_000_000),
            xact_rollback: Some(12),
            blks_read: Some(100),
            blks_hit: Some(10_000),
            tup_returned: Some(5),
            tup_fetched: Some(6),
            tup_inserted: Some(7),
            tup_updated: Some(8),
            tup_deleted: Some(9),
            conflicts: Some(0),
            temp_files: Some(1),
            temp_bytes: Some(8192),
            deadlocks: Some(0),
            blk_read_time: Some(1.5),
            blk_write_time: Some(0.0),
            stats_reset: Some(123_456.7),
        }
    }

    fn lookup<'a>(entries: &'a [(Oid, TypedValue)], key: &str) -> Option<&'a TypedValue> {
        let key: Oid = key.parse().unwrap();
        entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    #[test]
    fn encodes_reference_example() {
        let encoder = SnapshotEncoder::default();
        let entries = encoder.encode(&[sample_row(16401)]).unwrap();

        assert_eq!(
            lookup(&entries, "1.1.16401.1"),
            Some(&TypedValue::String("16401".to_string()))
        );
        assert_eq!(
            lookup(&entries, "1.1.16401.2"),
            Some(&TypedValue::String("postgres".to_string()))
        );
        assert_eq!(lookup(&entries, "1.1.16401.3"), Some(&TypedValue::Gauge(3)));
        assert_eq!(
            lookup(&entries, "1.1.16401.4"),
            Some(&TypedValue::Counter32(3_567_587_328))
        );
        assert_eq!(
            lookup(&entries, "1.1.16401.19"),
            Some(&TypedValue::TimeTicks(1_234_567))
        );
    }

    #[test]
    fn conservative_default_omits_optional_columns() {
        let entries = SnapshotEncoder::default()
            .encode(&[sample_row(1)])
            .unwrap();
        let columns: Vec<u32> = entries
            .iter()
            .map(|(k, _)| *k.components().last().unwrap())
            .collect();
        assert_eq!(columns, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 19]);
    }

    #[test]
    fn full_set_emits_every_column_in_order() {
        let entries = SnapshotEncoder::new(ColumnSet::full())
            .encode(&[sample_row(1)])
            .unwrap();
        let columns: Vec<u32> = entries
            .iter()
            .map(|(k, _)| *k.components().last().unwrap())
            .collect();
        assert_eq!(columns, (1..=19).collect::<Vec<_>>());
        assert_eq!(lookup(&entries, "1.1.1.17"), Some(&TypedValue::TimeTicks(15)));
        assert_eq!(lookup(&entries, "1.1.1.15"), Some(&TypedValue::Counter32(8192)));
    }

    #[test]
    fn rows_are_encoded_in_input_order() {
        let entries = SnapshotEncoder::default()
            .encode(&[sample_row(20), sample_row(10)])
            .unwrap();
        assert_eq!(entries.len(), 28);
        assert_eq!(entries[0].0.components()[2], 20);
        assert_eq!(entries[14].0.components()[2], 10);
    }

    #[test]
    fn missing_required_column_fails_fast() {
        let mut row = sample_row(42);
        row.tup_deleted = None;
        let err = SnapshotEncoder::default()
            .encode(&[sample_row(1), row])
            .unwrap_err();
        assert_eq!(
            err,
            EncodeError::MissingColumn {
                datid: Some(42),
                column: Column::TupDeleted
            }
        );
        assert_eq!(err.to_string(), "database 42: missing column tup_deleted");
    }

    #[test]
    fn missing_identifier_fails() {
        let mut row = sample_row(1);
        row.datid = None;
        let err = SnapshotEncoder::default().encode_row(&row).unwrap_err();
        assert_eq!(
            err,
            EncodeError::MissingColumn {
                datid: None,
                column: Column::Datid
            }
        );
    }

    #[test]
    fn enabled_optional_column_must_be_present() {
        let mut row = sample_row(7);
        row.deadlocks = None;
        assert!(SnapshotEncoder::default().encode_row(&row).is_ok());
        let err = SnapshotEncoder::new(ColumnSet::full())
            .encode_row(&row)
            .unwrap_err();
        assert_eq!(
            err,
            EncodeError::MissingColumn {
                datid: Some(7),
                column: Column::Deadlocks
            }
        );
    }

    #[test]
    fn absent_stats_reset_is_omitted() {
        let mut row = sample_row(7);
        row.stats_reset = None;
        let entries = SnapshotEncoder::default().encode_row(&row).unwrap();
        assert_eq!(entries.len(), 13);
        assert!(lookup(&entries, "1.1.7.19").is_none());
    }

    #[test]
    fn strings_pass_through_verbatim() {
        let mut row = sample_row(7);
        row.datname = Some("weird\nname ü".to_string());
        let entries = SnapshotEncoder::default().encode_row(&row).unwrap();
        assert_eq!(
            lookup(&entries, "1.1.7.2"),
            Some(&TypedValue::String("weird\nname ü".to_string()))
        );
    }

    proptest! {
        #[test]
        fn prop_keys_stable_across_invocations(datid in any::<u32>(), commit in 0i64..i64::MAX) {
            let encoder = SnapshotEncoder::new(ColumnSet::full());
            let mut a = sample_row(datid);
            a.xact_commit = Some(commit);
            let mut b = sample_row(datid);
            b.xact_commit = Some(commit / 2);

            let keys_a: Vec<Oid> = encoder.encode_row(&a).unwrap().into_iter().map(|(k, _)| k).collect();
            let keys_b: Vec<Oid> = encoder.encode_row(&b).unwrap().into_iter().map(|(k, _)| k).collect();
            prop_assert_eq!(keys_a, keys_b);
        }

        #[test]
        fn prop_encoded_counter_wraps(commit in 0i64..(i64::MAX / 2)) {
            let encoder = SnapshotEncoder::default();
            let mut row = sample_row(1);
            row.xact_commit = Some(commit);
            let first = encoder.encode_row(&row).unwrap();
            row.xact_commit = Some(commit + (1i64 << 32));
            let second = encoder.encode_row(&row).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
