//! Protocol Data Types
//!
//! The wire protocol is newline-delimited UTF-8 text. Every client line is one
//! [`Command`]; every server reply is exactly one line, built from a [`Reply`].
//!
//! ## Replies
//!
//! ```text
//! AUTH_REQUIRED\n        sent once, right after accept
//! OK\n                   successful AUTH / SET / DELETE / EXPIRE / RESET_MEMORY
//! PONG\n                 PING
//! nil\n                  GET on a missing key
//! <text>\n               GET value, KEYS listing
//! <integer>\n            TTL
//! ERROR <message>\n      any command-local failure
//! ```

use std::fmt;

/// Line terminator for every reply.
pub const NEWLINE: u8 = b'\n';

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `AUTH <password>`
    Auth { password: String },
    /// `PING`
    Ping,
    /// `SET <key> <value...>`
    Set { key: String, value: String },
    /// `GET <key>`
    Get { key: String },
    /// `DELETE <key>` (or `DEL <key>`)
    Delete { key: String },
    /// `TTL <key>`
    Ttl { key: String },
    /// `EXPIRE <key> <seconds>`
    Expire { key: String, seconds: i64 },
    /// `KEYS <pattern>`
    Keys { pattern: String },
    /// `RESET_MEMORY`
    ResetMemory,
}

impl Command {
    /// Upper-case verb, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Auth { .. } => "AUTH",
            Command::Ping => "PING",
            Command::Set { .. } => "SET",
            Command::Get { .. } => "GET",
            Command::Delete { .. } => "DELETE",
            Command::Ttl { .. } => "TTL",
            Command::Expire { .. } => "EXPIRE",
            Command::Keys { .. } => "KEYS",
            Command::ResetMemory => "RESET_MEMORY",
        }
    }
}

/// A single-line server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Greeting sent on connect
    AuthRequired,
    /// `OK`
    Ok,
    /// `PONG`
    Pong,
    /// `nil` (key not found on GET)
    Nil,
    /// Raw text such as a stored value
    Text(String),
    /// An integer, used for TTL
    Integer(i64),
    /// `ERROR <message>`
    Error(String),
}

impl Reply {
    /// Common response for successful operations
    pub fn ok() -> Self {
        Reply::Ok
    }

    /// Common response for PING
    pub fn pong() -> Self {
        Reply::Pong
    }

    pub fn nil() -> Self {
        Reply::Nil
    }

    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    pub fn integer(n: i64) -> Self {
        Reply::Integer(n)
    }

    /// Creates an error reply.
    ///
    /// # Example
    /// ```
    /// use jsonkv::protocol::Reply;
    /// let err = Reply::error("unknown command: FOO");
    /// assert_eq!(err.serialize(), b"ERROR unknown command: FOO\n");
    /// ```
    pub fn error(msg: impl fmt::Display) -> Self {
        Reply::Error(msg.to_string())
    }

    /// Returns true for `ERROR` replies.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Serializes the reply for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    ///
    /// Line breaks inside a payload are replaced with spaces so the reply
    /// always occupies exactly one line.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::AuthRequired => buf.extend_from_slice(b"AUTH_REQUIRED"),
            Reply::Ok => buf.extend_from_slice(b"OK"),
            Reply::Pong => buf.extend_from_slice(b"PONG"),
            Reply::Nil => buf.extend_from_slice(b"nil"),
            Reply::Text(s) => push_single_line(buf, s),
            Reply::Integer(n) => buf.extend_from_slice(n.to_string().as_bytes()),
            Reply::Error(msg) => {
                buf.extend_from_slice(b"ERROR ");
                push_single_line(buf, msg);
            }
        }
        buf.push(NEWLINE);
    }
}

fn push_single_line(buf: &mut Vec<u8>, s: &str) {
    buf.extend(
        s.bytes()
            .map(|b| if b == b'\n' || b == b'\r' { b' ' } else { b }),
    );
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.serialize();
        let line = String::from_utf8_lossy(&bytes[..bytes.len() - 1]);
        f.write_str(&line)
    }
}
