//! Metrics sources.
//!
//! Only PostgreSQL's `pg_stat_database` is sampled. The collector is
//! stateless between polls: each call opens and closes its own connection.

mod pg_collector;

pub use pg_collector::{DatabaseStats, PgCollectError, PgStatSource};
