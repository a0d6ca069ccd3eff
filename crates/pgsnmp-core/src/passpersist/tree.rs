//! Ordered tree of exported values, relative to the transport's base OID.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::snmp::value::{COUNTER_MODULUS, wrap_counter};
use crate::snmp::{Oid, TypedValue};

/// Snapshot of every exported value, in SNMP walk order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MibTree {
    entries: BTreeMap<Oid, TypedValue>,
}

impl MibTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, oid: Oid, value: TypedValue) {
        self.entries.insert(oid, value);
    }

    pub fn set_string(&mut self, oid: Oid, value: impl Into<String>) {
        self.set(oid, TypedValue::String(value.into()));
    }

    pub fn set_gauge(&mut self, oid: Oid, value: i64) {
        self.set(oid, TypedValue::gauge(value));
    }

    /// Stores a counter, reduced modulo 2^32.
    pub fn set_counter32(&mut self, oid: Oid, value: i64) {
        self.set(oid, TypedValue::Counter32(wrap_counter(value)));
    }

    /// Stores hundredths of a second, reduced modulo 2^32.
    pub fn set_timeticks(&mut self, oid: Oid, ticks: u64) {
        self.set(oid, TypedValue::TimeTicks((ticks % COUNTER_MODULUS) as u32));
    }

    pub fn get(&self, oid: &Oid) -> Option<&TypedValue> {
        self.entries.get(oid)
    }

    /// First entry strictly after `oid`.
    pub fn get_next(&self, oid: &Oid) -> Option<(&Oid, &TypedValue)> {
        self.entries
            .range((Bound::Excluded(oid), Bound::Unbounded))
            .next()
    }

    pub fn first(&self) -> Option<(&Oid, &TypedValue)> {
        self.entries.iter().next()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Oid, &TypedValue)> {
        self.entries.iter()
    }
}

impl Extend<(Oid, TypedValue)> for MibTree {
    fn extend<I: IntoIterator<Item = (Oid, TypedValue)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}
