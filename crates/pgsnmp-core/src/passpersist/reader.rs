//! Request line pump.
//!
//! Reads request lines on a separate thread so the serving loop can wait
//! with a timeout and notice a dead updater or an interrupt between
//! requests. Spawned once per process: transport restarts reuse it, along
//! with the parser state, so a `get` split across a restart still pairs
//! with its OID line.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::protocol::{Request, RequestParser};

/// Lines read from snmpd.
///
/// The channel disconnects on EOF; a read error is forwarded once, then the
/// channel disconnects.
pub struct RequestReader {
    rx: Receiver<io::Result<String>>,
    parser: RequestParser,
}

impl RequestReader {
    /// Starts reading lines from `reader` in a background thread.
    pub fn spawn<R: BufRead + Send + 'static>(mut reader: R) -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
                        if tx.send(Ok(trimmed)).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        });

        Self::from_receiver(rx)
    }

    /// Reads requests from the process's stdin.
    pub fn stdin() -> Self {
        Self::spawn(io::BufReader::new(io::stdin()))
    }

    /// Wraps an existing line channel.
    pub fn from_receiver(rx: Receiver<io::Result<String>>) -> Self {
        Self {
            rx,
            parser: RequestParser::default(),
        }
    }

    /// Waits up to `timeout` for the next line.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<io::Result<String>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Feeds one line to the request parser; see [`RequestParser::feed`].
    pub fn feed(&mut self, line: &str) -> Option<Request> {
        self.parser.feed(line)
    }
}
