//! pgsnmpd - PostgreSQL performance counters for net-snmp.
//!
//! Samples pg_stat_database every few seconds and answers snmpd's
//! `pass_persist` requests on stdin/stdout. Register it in snmpd.conf:
//!
//! ```text
//! pass_persist .1.3.6.1.4.1.42916 /usr/local/bin/pgsnmpd -U monitor -W secret
//! ```
//!
//! stdout belongs to the protocol; all logging goes to stderr.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use pgsnmp_core::collector::PgStatSource;
use pgsnmp_core::config::{DEFAULT_OID_BASE, DaemonConfig, RetryPolicy, SourceConfig};
use pgsnmp_core::passpersist::{PassPersist, RequestReader};
use pgsnmp_core::poller::DatabaseStatsPoller;
use pgsnmp_core::snmp::{ColumnPolicy, Oid};
use pgsnmp_core::supervisor::Supervisor;

/// SNMP PostgreSQL performance monitoring.
///
/// Connection flags follow psql, so `-h` is the host and help is `--help`.
#[derive(Parser, Debug)]
#[command(
    name = "pgsnmpd",
    about = "SNMP PostgreSQL performance monitoring (net-snmp pass_persist)",
    version,
    disable_help_flag = true
)]
struct Args {
    /// Print help.
    #[allow(dead_code)]
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,

    /// DB username.
    #[arg(short = 'U', long, env = "PGUSER")]
    user: String,

    /// DB password.
    #[arg(short = 'W', long, env = "PGPASSWORD", hide_env_values = true)]
    password: String,

    /// DB host.
    #[arg(short = 'h', long, env = "PGHOST", default_value = "localhost")]
    host: String,

    /// DB database.
    #[arg(short = 'd', long, env = "PGDATABASE", default_value = "postgres")]
    database: String,

    /// DB port.
    #[arg(short = 'p', long, env = "PGPORT", default_value_t = 5432)]
    port: u16,

    /// Base OID the statistics are published under.
    #[arg(long, default_value = DEFAULT_OID_BASE)]
    oid_base: Oid,

    /// Poll interval in seconds.
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Pause before restarting after a failure, in seconds.
    #[arg(long, default_value_t = 15)]
    retry_delay: u64,

    /// Failures within one failure window before giving up.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: u32,

    /// Failure window in seconds. Failures older than this no longer count.
    #[arg(long, default_value_t = 3600)]
    failure_window: u64,

    /// Consecutive failed polls tolerated before the session is restarted.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    max_update_errors: u32,

    /// Optional columns (PostgreSQL 9.2+): auto, conservative or full.
    #[arg(long, default_value = "conservative")]
    columns: ColumnPolicy,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn into_config(self) -> DaemonConfig {
        DaemonConfig {
            source: SourceConfig {
                host: self.host,
                port: self.port,
                database: self.database,
                user: self.user,
                password: self.password,
            },
            oid_base: self.oid_base,
            poll_interval: Duration::from_secs(self.interval),
            max_update_errors: self.max_update_errors,
            columns: self.columns,
            retry: RetryPolicy {
                retry_delay: Duration::from_secs(self.retry_delay),
                max_consecutive_failures: self.max_retries,
                failure_window: Duration::from_secs(self.failure_window),
            },
        }
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["pgsnmpd", "pgsnmp_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = args.into_config();

    info!("pgsnmpd {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: source={}, base={}, interval={}s, columns={}",
        config.source.describe(),
        config.oid_base.to_absolute_string(),
        config.poll_interval.as_secs(),
        config.columns
    );
    info!(
        "Retry policy: delay={}s, max_failures={}, window={}s, max_update_errors={}",
        config.retry.retry_delay.as_secs(),
        config.retry.max_consecutive_failures,
        config.retry.failure_window.as_secs(),
        config.max_update_errors
    );

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set SIGINT/SIGTERM handler: {}", e);
    }

    // One stdin reader for the whole process; sessions come and go.
    let mut requests = RequestReader::stdin();
    let stdout = io::stdout();

    let mut supervisor = Supervisor::new(config.retry.clone(), running.clone());
    let shutdown = supervisor.run(|| {
        let source = PgStatSource::new(&config.source, config.columns);
        let poller = DatabaseStatsPoller::new(source);
        let mut session = PassPersist::new(config.oid_base.clone(), config.poll_interval)
            .with_max_update_errors(config.max_update_errors)
            .with_running_flag(running.clone());
        let mut out = stdout.lock();
        session.run(poller, &mut requests, &mut out)
    });

    info!(exit_code = shutdown.exit_code(), "Shutdown complete");
    std::process::exit(shutdown.exit_code());
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::Parser;
    use clap::error::ErrorKind;
    use pgsnmp_core::snmp::ColumnPolicy;
    use std::time::Duration;

    #[test]
    fn psql_style_flags() {
        let args = Args::try_parse_from([
            "pgsnmpd", "-U", "monitor", "-W", "secret", "-h", "db1", "-p", "6432", "-d", "app",
        ])
        .unwrap();
        let config = args.into_config();
        assert_eq!(config.source.user, "monitor");
        assert_eq!(config.source.password, "secret");
        assert_eq!(config.source.host, "db1");
        assert_eq!(config.source.port, 6432);
        assert_eq!(config.source.database, "app");
    }

    #[test]
    fn defaults_follow_published_constants() {
        let args = Args::try_parse_from(["pgsnmpd", "-U", "u", "-W", "p"]).unwrap();
        let config = args.into_config();
        assert_eq!(config.oid_base.to_absolute_string(), ".1.3.6.1.4.1.42916");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.retry.retry_delay, Duration::from_secs(15));
        assert_eq!(config.retry.max_consecutive_failures, 10);
        assert_eq!(config.retry.failure_window, Duration::from_secs(3600));
        assert_eq!(config.max_update_errors, 3);
        assert_eq!(config.columns, ColumnPolicy::Conservative);
    }

    #[test]
    fn tuning_flags() {
        let args = Args::try_parse_from([
            "pgsnmpd",
            "-U",
            "u",
            "-W",
            "p",
            "--oid-base",
            ".1.3.6.1.4.1.99999",
            "--interval",
            "30",
            "--retry-delay",
            "5",
            "--max-retries",
            "3",
            "--failure-window",
            "600",
            "--columns",
            "auto",
        ])
        .unwrap();
        let config = args.into_config();
        assert_eq!(config.oid_base.to_absolute_string(), ".1.3.6.1.4.1.99999");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.retry.retry_delay, Duration::from_secs(5));
        assert_eq!(config.retry.max_consecutive_failures, 3);
        assert_eq!(config.retry.failure_window, Duration::from_secs(600));
        assert_eq!(config.columns, ColumnPolicy::Auto);
    }

    #[test]
    fn rejects_bad_values() {
        for argv in [
            vec!["pgsnmpd", "-U", "u", "-W", "p", "--columns", "some"],
            vec!["pgsnmpd", "-U", "u", "-W", "p", "--oid-base", "1.x"],
            vec!["pgsnmpd", "-U", "u", "-W", "p", "--interval", "0"],
            vec!["pgsnmpd", "-U", "u", "-W", "p", "--max-retries", "0"],
        ] {
            assert!(Args::try_parse_from(argv.clone()).is_err(), "{:?}", argv);
        }
    }

    #[test]
    fn long_help_only() {
        let err = Args::try_parse_from(["pgsnmpd", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }
}
