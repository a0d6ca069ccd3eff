//! Typed exported values.

use std::fmt;

/// Modulus of SNMP `Counter32` and `TimeTicks` (2^32).
pub const COUNTER_MODULUS: u64 = 1 << 32;

/// Multiplier turning source milliseconds into exported ticks.
const MILLIS_TO_TICKS: f64 = 10.0;

/// One exported value with its SNMP kind.
///
/// Counter and tick variants hold `u32`, so a constructed value is always
/// already reduced modulo [`COUNTER_MODULUS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    String(String),
    /// Current value, no wraparound.
    Gauge(u32),
    /// Monotonic accumulator, wraps at 2^32.
    Counter32(u32),
    /// Hundredths of a second, wraps at 2^32.
    TimeTicks(u32),
}

impl TypedValue {
    /// Wraps an accumulator, reducing it modulo 2^32.
    pub fn counter(value: i64) -> Self {
        TypedValue::Counter32(wrap_counter(value))
    }

    /// Clamps a current value into the gauge range.
    pub fn gauge(value: i64) -> Self {
        TypedValue::Gauge(value.clamp(0, u32::MAX as i64) as u32)
    }

    /// Converts a source duration in milliseconds into wrapped ticks.
    pub fn timeticks_from_millis(millis: f64) -> Self {
        TypedValue::TimeTicks(millis_to_ticks(millis))
    }

    /// Type keyword used by the pass_persist protocol.
    pub fn wire_type(&self) -> &'static str {
        match self {
            TypedValue::String(_) => "string",
            TypedValue::Gauge(_) => "gauge",
            TypedValue::Counter32(_) => "counter",
            TypedValue::TimeTicks(_) => "timeticks",
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) => f.write_str(s),
            TypedValue::Gauge(v) | TypedValue::Counter32(v) | TypedValue::TimeTicks(v) => {
                write!(f, "{}", v)
            }
        }
    }
}

/// Reduces an accumulator modulo 2^32.
///
/// Euclidean remainder keeps negative inputs (never produced by a healthy
/// source) inside the counter range instead of panicking.
pub fn wrap_counter(value: i64) -> u32 {
    value.rem_euclid(COUNTER_MODULUS as i64) as u32
}

/// `trunc(millis * 10) mod 2^32`; non-finite or negative input maps to 0.
pub fn millis_to_ticks(millis: f64) -> u32 {
    if !millis.is_finite() || millis <= 0.0 {
        return 0;
    }
    // `as` saturates for values beyond u64::MAX.
    let ticks = (millis * MILLIS_TO_TICKS).trunc() as u64;
    (ticks % COUNTER_MODULUS) as u32
}
