//! Numeric namespace keys (SNMP object identifiers).
//!
//! Keys are stored as integer components, never as formatted strings, so the
//! exported tree is ordered the way SNMP walks it: component-wise, with a
//! prefix sorting before its descendants.

use std::fmt;
use std::str::FromStr;

/// Table holding per-database statistics: `psql_cluster(1).statistics(1)`.
pub const DATABASE_STATS_TABLE: &[u32] = &[1, 1];

/// Error returned when parsing a dotted OID string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OidError {
    /// Input had no components.
    Empty,
    /// A component was not an unsigned 32-bit integer.
    InvalidComponent(String),
}

impl fmt::Display for OidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OidError::Empty => write!(f, "empty OID"),
            OidError::InvalidComponent(c) => write!(f, "invalid OID component '{}'", c),
        }
    }
}

impl std::error::Error for OidError {}

/// A dotted sequence of integers identifying one exported value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Oid(Vec<u32>);

impl Oid {
    /// Builds the key of one table cell: `<table>.<row>.<column>`.
    ///
    /// `column` is the MIB column index; row identifiers come straight from
    /// the source (the database OID for the statistics table).
    pub fn cell(table: &[u32], row: u32, column: u32) -> Self {
        let mut parts = Vec::with_capacity(table.len() + 2);
        parts.extend_from_slice(table);
        parts.push(row);
        parts.push(column);
        Self(parts)
    }

    pub fn from_components(parts: impl Into<Vec<u32>>) -> Self {
        Self(parts.into())
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `self` equals `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Strips `prefix`, returning the remaining relative key.
    pub fn strip_prefix(&self, prefix: &Oid) -> Option<Oid> {
        self.0.strip_prefix(prefix.0.as_slice()).map(|rest| Oid(rest.to_vec()))
    }

    /// Appends a relative key to this one.
    pub fn join(&self, relative: &Oid) -> Oid {
        let mut parts = self.0.clone();
        parts.extend_from_slice(&relative.0);
        Oid(parts)
    }

    /// Formats with the leading dot net-snmp uses on the wire.
    pub fn to_absolute_string(&self) -> String {
        format!(".{}", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = OidError;

    /// Parses `1.3.6.1` or `.1.3.6.1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix('.').unwrap_or(s);
        if s.is_empty() {
            return Err(OidError::Empty);
        }

        s.split('.')
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| OidError::InvalidComponent(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Oid)
    }
}
