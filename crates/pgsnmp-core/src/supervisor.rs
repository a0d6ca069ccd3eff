//! Retry supervisor: keeps the exporter alive across transient failures
//! without crash-looping.
//!
//! ```text
//!            session ends (retryable)
//!   Active ───────────────────────────► AwaitingRetry
//!     ▲                                   │ sleep retry_delay
//!     │        budget left                │ record failure
//!     └───────────────────────────────────┤
//!                                         │ budget spent
//!                                         ▼
//!                                      Aborted  (exit 1)
//! ```
//!
//! Peer close and interrupts leave from any state with exit status 0.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::RetryPolicy;
use crate::passpersist::TransportError;

/// Granularity of the interruptible retry sleep.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Time source, replaceable in tests.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How the daemon ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shutdown {
    /// Interrupt signal.
    Interrupted,
    /// snmpd went away.
    PeerClosed,
    /// Too many failures within one window.
    RetriesExhausted { failures: u32, last_error: String },
}

impl Shutdown {
    /// Process exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Shutdown::Interrupted | Shutdown::PeerClosed => 0,
            Shutdown::RetriesExhausted { .. } => 1,
        }
    }
}

/// Failure accounting across restarts.
///
/// The window opens at process start. A failure more than one window after
/// the window start restores the full budget and opens a new window there
/// without being counted; a burst inside one window spends one budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    consecutive_failures: u32,
    window_start: Instant,
}

impl RetryState {
    /// Full budget with the window opened at `now`.
    pub fn starting_at(now: Instant) -> Self {
        Self {
            consecutive_failures: 0,
            window_start: now,
        }
    }

    /// Records a failure at `now` and returns the failures in the window.
    pub fn record_failure(&mut self, now: Instant, window: Duration) -> u32 {
        if now.saturating_duration_since(self.window_start) > window {
            self.window_start = now;
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
        }
        self.consecutive_failures
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Restarts left before `max` failures are reached.
    pub fn remaining(&self, max: u32) -> u32 {
        max.saturating_sub(self.consecutive_failures)
    }
}

enum State {
    Active,
    AwaitingRetry { last_error: String },
    Aborted { last_error: String },
}

/// Owns the daemon lifecycle.
pub struct Supervisor<C: Clock = SystemClock> {
    policy: RetryPolicy,
    running: Arc<AtomicBool>,
    clock: C,
    state: RetryState,
}

impl Supervisor<SystemClock> {
    /// `running` is cleared by the interrupt handler.
    pub fn new(policy: RetryPolicy, running: Arc<AtomicBool>) -> Self {
        Self::with_clock(policy, running, SystemClock)
    }
}

impl<C: Clock> Supervisor<C> {
    pub fn with_clock(policy: RetryPolicy, running: Arc<AtomicBool>, clock: C) -> Self {
        let state = RetryState::starting_at(clock.now());
        Self {
            policy,
            running,
            clock,
            state,
        }
    }

    pub fn retry_state(&self) -> &RetryState {
        &self.state
    }

    /// Runs sessions until a clean shutdown or the budget is spent.
    ///
    /// `session` must build a fresh transport on every call and block until
    /// it stops.
    pub fn run<F>(&mut self, mut session: F) -> Shutdown
    where
        F: FnMut() -> Result<(), TransportError>,
    {
        let mut state = State::Active;

        loop {
            state = match state {
                State::Active => {
                    info!("Starting PostgreSQL performance gathering");
                    let last_error = match session() {
                        Err(TransportError::PeerClosed) => {
                            info!("snmpd closed the pipe, exiting");
                            return Shutdown::PeerClosed;
                        }
                        Err(TransportError::Interrupted) => {
                            info!("Exiting on user request");
                            return Shutdown::Interrupted;
                        }
                        Err(e) => e.to_string(),
                        Ok(()) => "transport stopped unexpectedly".to_string(),
                    };
                    warn!(error = %last_error, "Monitoring stopped");
                    State::AwaitingRetry { last_error }
                }
                State::AwaitingRetry { last_error } => {
                    warn!(
                        "Restarting monitoring in {} sec...",
                        self.policy.retry_delay.as_secs()
                    );
                    if !self.sleep_while_running(self.policy.retry_delay) {
                        info!("Exiting on user request");
                        return Shutdown::Interrupted;
                    }

                    let max = self.policy.max_consecutive_failures;
                    let failures = self
                        .state
                        .record_failure(self.clock.now(), self.policy.failure_window);
                    if failures >= max {
                        State::Aborted { last_error }
                    } else {
                        debug!(
                            failures,
                            remaining = self.state.remaining(max),
                            "failure recorded"
                        );
                        State::Active
                    }
                }
                State::Aborted { last_error } => {
                    let failures = self.state.consecutive_failures();
                    error!(
                        failures,
                        last_error = %last_error,
                        "Too many retries, aborting. Please check that PostgreSQL is running and that the permissions are OK"
                    );
                    return Shutdown::RetriesExhausted {
                        failures,
                        last_error,
                    };
                }
            };
        }
    }

    /// Sleeps in slices; returns `false` as soon as `running` is cleared.
    fn sleep_while_running(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        while remaining > Duration::ZERO {
            if !self.running.load(Ordering::SeqCst) {
                return false;
            }
            let slice = remaining.min(SLEEP_SLICE);
            self.clock.sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Clock that only moves when slept on or advanced by hand.
    #[derive(Clone)]
    struct ManualClock {
        origin: Instant,
        offset: Rc<Cell<Duration>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Rc::new(Cell::new(Duration::ZERO)),
            }
        }

        fn advance(&self, by: Duration) {
            self.offset.set(self.offset.get() + by);
        }

        fn elapsed(&self) -> Duration {
            self.offset.get()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + self.offset.get()
        }

        fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }

    const W: Duration = Duration::from_secs(3600);

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    fn running() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    fn died() -> Result<(), TransportError> {
        Err(TransportError::UpdaterDied("connection refused".to_string()))
    }

    #[test]
    fn window_resets_to_full_budget_after_more_than_window() {
        let t0 = Instant::now();
        let mut state = RetryState::starting_at(t0);
        assert_eq!(state.record_failure(t0, W), 1);
        assert_eq!(
            state.record_failure(t0 + W + Duration::from_secs(1), W),
            0
        );
        assert_eq!(state.remaining(10), 10);
        assert_eq!(state.window_start(), t0 + W + Duration::from_secs(1));
    }

    #[test]
    fn window_holds_just_inside() {
        let t0 = Instant::now();
        let mut state = RetryState::starting_at(t0);
        state.record_failure(t0, W);
        assert_eq!(state.record_failure(t0 + W - Duration::from_secs(1), W), 2);
        assert_eq!(state.remaining(10), 8);
        assert_eq!(state.window_start(), t0);
    }

    #[test]
    fn window_compares_against_window_start_not_previous_failure() {
        let t0 = Instant::now();
        let mut state = RetryState::starting_at(t0);
        state.record_failure(t0 + Duration::from_secs(3000), W);
        // 3601s after the window opened but only 601s after the last failure.
        assert_eq!(state.record_failure(t0 + Duration::from_secs(3601), W), 0);
        assert_eq!(state.window_start(), t0 + Duration::from_secs(3601));
    }

    #[test]
    fn window_opens_at_construction() {
        let clock = ManualClock::new();
        let supervisor = Supervisor::with_clock(policy(), running(), clock.clone());
        assert_eq!(supervisor.retry_state().window_start(), clock.now());
        assert_eq!(supervisor.retry_state().consecutive_failures(), 0);
    }

    #[test]
    fn aborts_after_exactly_max_failures() {
        let clock = ManualClock::new();
        let mut supervisor = Supervisor::with_clock(policy(), running(), clock.clone());
        let mut sessions = 0;

        let shutdown = supervisor.run(|| {
            sessions += 1;
            died()
        });

        assert_eq!(sessions, 10);
        assert_eq!(
            shutdown,
            Shutdown::RetriesExhausted {
                failures: 10,
                last_error: "updater thread has died: connection refused".to_string()
            }
        );
        assert_eq!(shutdown.exit_code(), 1);
        // Ten fixed 15s pauses, no exponential growth.
        assert_eq!(clock.elapsed(), Duration::from_secs(150));
    }

    #[test]
    fn spaced_failures_never_abort() {
        let clock = ManualClock::new();
        let session_clock = clock.clone();
        let mut supervisor = Supervisor::with_clock(policy(), running(), clock);
        let mut sessions = 0;

        let shutdown = supervisor.run(|| {
            sessions += 1;
            if sessions > 25 {
                return Err(TransportError::PeerClosed);
            }
            // Each session runs healthy for longer than the window.
            session_clock.advance(W + Duration::from_secs(1));
            died()
        });

        assert_eq!(sessions, 26);
        assert_eq!(shutdown, Shutdown::PeerClosed);
        assert_eq!(supervisor.retry_state().consecutive_failures(), 0);
    }

    #[test]
    fn burst_after_a_healthy_hour_gets_the_full_budget() {
        let clock = ManualClock::new();
        let session_clock = clock.clone();
        let mut supervisor = Supervisor::with_clock(policy(), running(), clock);
        let mut sessions = 0;

        let shutdown = supervisor.run(|| {
            sessions += 1;
            if sessions == 1 {
                session_clock.advance(W + Duration::from_secs(10));
            }
            died()
        });

        // The first failure only reopens the window; ten more spend the budget.
        assert_eq!(sessions, 11);
        assert!(matches!(
            shutdown,
            Shutdown::RetriesExhausted { failures: 10, .. }
        ));
    }

    #[test]
    fn peer_close_exits_cleanly_regardless_of_budget() {
        let clock = ManualClock::new();
        let mut supervisor = Supervisor::with_clock(policy(), running(), clock.clone());
        let mut sessions = 0;

        let shutdown = supervisor.run(|| {
            sessions += 1;
            if sessions == 10 {
                Err(TransportError::PeerClosed)
            } else {
                died()
            }
        });

        assert_eq!(shutdown, Shutdown::PeerClosed);
        assert_eq!(shutdown.exit_code(), 0);
        assert_eq!(supervisor.retry_state().consecutive_failures(), 9);
    }

    #[test]
    fn broken_pipe_io_error_exits_cleanly() {
        let clock = ManualClock::new();
        let mut supervisor = Supervisor::with_clock(policy(), running(), clock.clone());

        let shutdown = supervisor.run(|| {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "EPIPE").into())
        });

        assert_eq!(shutdown, Shutdown::PeerClosed);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn interrupt_exits_without_sleeping() {
        let clock = ManualClock::new();
        let mut supervisor = Supervisor::with_clock(policy(), running(), clock.clone());

        let shutdown = supervisor.run(|| Err(TransportError::Interrupted));

        assert_eq!(shutdown, Shutdown::Interrupted);
        assert_eq!(shutdown.exit_code(), 0);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn interrupt_during_retry_sleep_exits_cleanly() {
        let clock = ManualClock::new();
        let flag = running();
        let session_flag = flag.clone();
        let mut supervisor = Supervisor::with_clock(policy(), flag, clock);
        let mut sessions = 0;

        let shutdown = supervisor.run(|| {
            sessions += 1;
            session_flag.store(false, Ordering::SeqCst);
            died()
        });

        assert_eq!(sessions, 1);
        assert_eq!(shutdown, Shutdown::Interrupted);
        assert_eq!(supervisor.retry_state().consecutive_failures(), 0);
    }

    #[test]
    fn session_returning_ok_counts_as_failure() {
        let clock = ManualClock::new();
        let retry = RetryPolicy {
            max_consecutive_failures: 2,
            ..policy()
        };
        let mut supervisor = Supervisor::with_clock(retry, running(), clock);

        let shutdown = supervisor.run(|| Ok(()));

        assert_eq!(
            shutdown,
            Shutdown::RetriesExhausted {
                failures: 2,
                last_error: "transport stopped unexpectedly".to_string()
            }
        );
    }
}
