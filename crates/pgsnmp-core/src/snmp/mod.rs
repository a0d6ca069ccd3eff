//! SNMP side of the exporter: keys, typed values, the column layout and the
//! row encoder.

pub mod encoder;
pub mod mib;
pub mod oid;
pub mod value;

pub use encoder::{EncodeError, SnapshotEncoder};
pub use mib::{Column, ColumnKind, ColumnPolicy, ColumnSet};
pub use oid::{DATABASE_STATS_TABLE, Oid, OidError};
pub use value::{COUNTER_MODULUS, TypedValue};
