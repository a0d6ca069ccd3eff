//! net-snmp `pass_persist` request parsing and responses.
//!
//! snmpd writes one command per line, followed by its arguments on the next
//! lines:
//!
//! ```text
//! PING                  -> PONG
//! get     <oid>         -> <oid> <type> <value> | NONE
//! getnext <oid>         -> <oid> <type> <value> | NONE
//! set     <oid> <value> -> not-writable
//! ```
//!
//! Each response item is written on its own line.

use std::io::{self, Write};

use tracing::warn;

use crate::snmp::{Oid, TypedValue};

use super::tree::MibTree;

/// A complete request from snmpd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Ping,
    Get(String),
    GetNext(String),
    Set { oid: String, value: String },
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Get,
    GetNext,
    SetOid,
    SetValue(String),
}

/// Assembles multi-line requests.
#[derive(Debug, Default)]
pub struct RequestParser {
    pending: Option<Pending>,
}

impl RequestParser {
    /// Feeds one line (without terminator). Returns a request once complete.
    pub fn feed(&mut self, line: &str) -> Option<Request> {
        let line = line.trim();
        match self.pending.take() {
            Some(Pending::Get) => Some(Request::Get(line.to_string())),
            Some(Pending::GetNext) => Some(Request::GetNext(line.to_string())),
            Some(Pending::SetOid) => {
                self.pending = Some(Pending::SetValue(line.to_string()));
                None
            }
            Some(Pending::SetValue(oid)) => Some(Request::Set {
                oid,
                value: line.to_string(),
            }),
            None => {
                let command = line.to_ascii_lowercase();
                match command.as_str() {
                    "ping" => Some(Request::Ping),
                    "get" => {
                        self.pending = Some(Pending::Get);
                        None
                    }
                    "getnext" => {
                        self.pending = Some(Pending::GetNext);
                        None
                    }
                    "set" => {
                        self.pending = Some(Pending::SetOid);
                        None
                    }
                    _ => Some(Request::Unknown(line.to_string())),
                }
            }
        }
    }
}

/// Answer to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Pong,
    /// Full (absolute) OID with its value.
    Value(Oid, TypedValue),
    None,
    NotWritable,
}

impl Response {
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Response::Pong => writeln!(out, "PONG"),
            Response::None => writeln!(out, "NONE"),
            Response::NotWritable => writeln!(out, "not-writable"),
            Response::Value(oid, value) => {
                writeln!(out, "{}", oid.to_absolute_string())?;
                writeln!(out, "{}", value.wire_type())?;
                match value {
                    TypedValue::String(s) => writeln!(out, "{}", wire_safe(s)),
                    other => writeln!(out, "{}", other),
                }
            }
        }
    }
}

/// Keeps a string value on a single protocol line.
fn wire_safe(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Answers `request` from `tree`, whose keys are relative to `base`.
pub fn respond(request: &Request, base: &Oid, tree: &MibTree) -> Response {
    match request {
        Request::Ping => Response::Pong,
        Request::Get(raw) => {
            let Ok(oid) = raw.parse::<Oid>() else {
                return Response::None;
            };
            oid.strip_prefix(base)
                .and_then(|rel| tree.get(&rel).map(|v| (rel, v)))
                .map(|(rel, v)| Response::Value(base.join(&rel), v.clone()))
                .unwrap_or(Response::None)
        }
        Request::GetNext(raw) => {
            let Ok(oid) = raw.parse::<Oid>() else {
                return Response::None;
            };
            let next = match oid.strip_prefix(base) {
                Some(rel) => tree.get_next(&rel),
                // Anything sorting before our subtree walks into it.
                None if oid < *base => tree.first(),
                None => None,
            };
            next.map(|(rel, v)| Response::Value(base.join(rel), v.clone()))
                .unwrap_or(Response::None)
        }
        Request::Set { .. } => Response::NotWritable,
        Request::Unknown(command) => {
            warn!(command = %command, "unknown pass_persist command");
            Response::None
        }
    }
}
