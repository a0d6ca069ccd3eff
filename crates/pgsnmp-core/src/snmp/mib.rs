//! Column layout of the exported database statistics table.
//!
//! ```text
//! +--psql_cluster(1)
//!    +--psql_cluster_statistics(1)
//!       +--<datid>
//!          +-- datid(1)           string
//!          +-- datname(2)         string
//!          +-- numbackends(3)     gauge
//!          +-- xact_commit(4)     counter
//!          +-- ...
//!          +-- conflicts(13)      counter
//!          +-- temp_files(14)     counter    9.2+
//!          +-- temp_bytes(15)     counter    9.2+
//!          +-- deadlocks(16)      counter    9.2+
//!          +-- blk_read_time(17)  timeticks  9.2+
//!          +-- blk_write_time(18) timeticks  9.2+
//!          +-- stats_reset(19)    timeticks
//! ```
//!
//! Column indices are part of the published MIB and must never be reused.

use std::fmt;
use std::str::FromStr;

/// `server_version_num` from which the optional columns exist.
pub const OPTIONAL_COLUMNS_MIN_VERSION: i32 = 90200;

/// Kind of value a column exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    String,
    Gauge,
    Counter,
    TimeTicks,
}

/// One column of the database statistics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Datid,
    Datname,
    Numbackends,
    XactCommit,
    XactRollback,
    BlksRead,
    BlksHit,
    TupReturned,
    TupFetched,
    TupInserted,
    TupUpdated,
    TupDeleted,
    Conflicts,
    TempFiles,
    TempBytes,
    Deadlocks,
    BlkReadTime,
    BlkWriteTime,
    StatsReset,
}

impl Column {
    /// All columns in export order.
    pub const ALL: [Column; 19] = [
        Column::Datid,
        Column::Datname,
        Column::Numbackends,
        Column::XactCommit,
        Column::XactRollback,
        Column::BlksRead,
        Column::BlksHit,
        Column::TupReturned,
        Column::TupFetched,
        Column::TupInserted,
        Column::TupUpdated,
        Column::TupDeleted,
        Column::Conflicts,
        Column::TempFiles,
        Column::TempBytes,
        Column::Deadlocks,
        Column::BlkReadTime,
        Column::BlkWriteTime,
        Column::StatsReset,
    ];

    /// Columns that only exist on newer servers.
    pub const OPTIONAL: [Column; 5] = [
        Column::TempFiles,
        Column::TempBytes,
        Column::Deadlocks,
        Column::BlkReadTime,
        Column::BlkWriteTime,
    ];

    /// MIB column index (last component of the key).
    pub fn index(self) -> u32 {
        match self {
            Column::Datid => 1,
            Column::Datname => 2,
            Column::Numbackends => 3,
            Column::XactCommit => 4,
            Column::XactRollback => 5,
            Column::BlksRead => 6,
            Column::BlksHit => 7,
            Column::TupReturned => 8,
            Column::TupFetched => 9,
            Column::TupInserted => 10,
            Column::TupUpdated => 11,
            Column::TupDeleted => 12,
            Column::Conflicts => 13,
            Column::TempFiles => 14,
            Column::TempBytes => 15,
            Column::Deadlocks => 16,
            Column::BlkReadTime => 17,
            Column::BlkWriteTime => 18,
            Column::StatsReset => 19,
        }
    }

    /// Source column name in `pg_stat_database`.
    pub fn name(self) -> &'static str {
        match self {
            Column::Datid => "datid",
            Column::Datname => "datname",
            Column::Numbackends => "numbackends",
            Column::XactCommit => "xact_commit",
            Column::XactRollback => "xact_rollback",
            Column::BlksRead => "blks_read",
            Column::BlksHit => "blks_hit",
            Column::TupReturned => "tup_returned",
            Column::TupFetched => "tup_fetched",
            Column::TupInserted => "tup_inserted",
            Column::TupUpdated => "tup_updated",
            Column::TupDeleted => "tup_deleted",
            Column::Conflicts => "conflicts",
            Column::TempFiles => "temp_files",
            Column::TempBytes => "temp_bytes",
            Column::Deadlocks => "deadlocks",
            Column::BlkReadTime => "blk_read_time",
            Column::BlkWriteTime => "blk_write_time",
            Column::StatsReset => "stats_reset",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::Datid | Column::Datname => ColumnKind::String,
            Column::Numbackends => ColumnKind::Gauge,
            Column::BlkReadTime | Column::BlkWriteTime | Column::StatsReset => {
                ColumnKind::TimeTicks
            }
            _ => ColumnKind::Counter,
        }
    }

    pub fn is_optional(self) -> bool {
        Column::OPTIONAL.contains(&self)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of optional columns a deployment exports.
///
/// Required columns and `stats_reset` are always part of the set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnSet {
    optional: Vec<Column>,
}

impl ColumnSet {
    /// No optional columns. Safe on every supported server.
    pub fn conservative() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self {
            optional: Column::OPTIONAL.to_vec(),
        }
    }

    /// Picks the optional columns the given server provides.
    ///
    /// Unknown versions fall back to the conservative set.
    pub fn for_server_version(server_version_num: Option<i32>) -> Self {
        match server_version_num {
            Some(v) if v >= OPTIONAL_COLUMNS_MIN_VERSION => Self::full(),
            _ => Self::conservative(),
        }
    }

    pub fn contains(&self, column: Column) -> bool {
        !column.is_optional() || self.optional.contains(&column)
    }

    /// Enabled columns in export order.
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        Column::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

/// How the optional column set is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnPolicy {
    /// Detect from `server_version_num` on each poll.
    Auto,
    #[default]
    Conservative,
    Full,
}

impl ColumnPolicy {
    /// Resolves the policy against a (possibly unknown) server version.
    pub fn resolve(self, server_version_num: Option<i32>) -> ColumnSet {
        match self {
            ColumnPolicy::Auto => ColumnSet::for_server_version(server_version_num),
            ColumnPolicy::Conservative => ColumnSet::conservative(),
            ColumnPolicy::Full => ColumnSet::full(),
        }
    }

    /// Whether resolving needs the server version.
    pub fn needs_server_version(self) -> bool {
        self == ColumnPolicy::Auto
    }
}

impl FromStr for ColumnPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ColumnPolicy::Auto),
            "conservative" => Ok(ColumnPolicy::Conservative),
            "full" => Ok(ColumnPolicy::Full),
            other => Err(format!(
                "unknown column policy '{}' (expected auto, conservative or full)",
                other
            )),
        }
    }
}

impl fmt::Display for ColumnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnPolicy::Auto => "auto",
            ColumnPolicy::Conservative => "conservative",
            ColumnPolicy::Full => "full",
        })
    }
}
