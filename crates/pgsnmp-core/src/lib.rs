//! pgsnmp-core - PostgreSQL statistics exporter for net-snmp `pass_persist`.
//!
//! Provides:
//! - `snmp` - namespace keys, typed values, column layout, row encoder
//! - `collector` - pg_stat_database source (one connection per poll)
//! - `poller` - per-tick orchestration feeding the transport
//! - `passpersist` - the pass_persist transport (tree, protocol, updater)
//! - `supervisor` - retry/backoff lifecycle
//! - `config` - daemon configuration and defaults
//! - `model` - rows as sampled from PostgreSQL

pub mod collector;
pub mod config;
pub mod model;
pub mod passpersist;
pub mod poller;
pub mod snmp;
pub mod supervisor;
