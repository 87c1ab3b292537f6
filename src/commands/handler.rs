//! Command Handler
//!
//! Executes an authenticated [`Command`] against the storage engine and turns
//! the outcome into a single [`Reply`].
//!
//! ## Replies per Command
//!
//! | Command                | Success                | Failure                  |
//! |------------------------|------------------------|--------------------------|
//! | `PING`                 | `PONG`                 |                          |
//! | `SET key value...`     | `OK`                   | `ERROR <encode/crypto>`  |
//! | `GET key`              | stored text            | `nil` when not found     |
//! | `DELETE key`           | `OK`                   | `ERROR key not found`    |
//! | `TTL key`              | seconds, `-1` or `-2`  |                          |
//! | `EXPIRE key seconds`   | `OK`                   | `ERROR ...`              |
//! | `KEYS pattern`         | JSON array of matches  | `ERROR ...`              |
//! | `RESET_MEMORY`         | `OK`                   |                          |
//!
//! `GET` returns the stored JSON text, except that a stored JSON string is
//! returned unquoted, so `SET k value123` followed by `GET k` yields `value123`.

use crate::error::StoreError;
use crate::protocol::{Command, Reply};
use crate::storage::{Engine, StoredValue};
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Executes commands against a shared engine.
#[derive(Clone)]
pub struct CommandHandler {
    /// The storage engine
    engine: Arc<Engine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given engine.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// The engine commands run against.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Executes a command and returns the reply.
    pub fn execute(&self, command: Command) -> Reply {
        debug!(command = command.name(), "Executing command");

        match command {
            Command::Auth { .. } => Reply::error("already authenticated"),
            Command::Ping => Reply::pong(),
            Command::Set { key, value } => self.cmd_set(&key, value),
            Command::Get { key } => self.cmd_get(&key),
            Command::Delete { key } => self.cmd_delete(&key),
            Command::Ttl { key } => Reply::integer(self.engine.ttl(&key).as_secs()),
            Command::Expire { key, seconds } => self.cmd_expire(&key, seconds),
            Command::Keys { pattern } => self.cmd_keys(&pattern),
            Command::ResetMemory => {
                self.engine.reset_memory();
                Reply::ok()
            }
        }
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    /// SET key value...
    fn cmd_set(&self, key: &str, value: String) -> Reply {
        match self.engine.set(key, StoredValue::from_text(value)) {
            Ok(()) => Reply::ok(),
            Err(e) => Reply::error(e),
        }
    }

    /// GET key
    fn cmd_get(&self, key: &str) -> Reply {
        match self.engine.get(key) {
            Ok(value) => Reply::text(render_value(&value)),
            Err(StoreError::NotFound) => Reply::nil(),
            Err(e) => Reply::error(e),
        }
    }

    /// DELETE key
    fn cmd_delete(&self, key: &str) -> Reply {
        match self.engine.delete(key) {
            Ok(()) => Reply::ok(),
            Err(e) => Reply::error(e),
        }
    }

    /// EXPIRE key seconds
    fn cmd_expire(&self, key: &str, seconds: i64) -> Reply {
        if seconds <= 0 {
            return Reply::error(StoreError::validation("TTL must be positive"));
        }

        match self.engine.expire(key, Duration::from_secs(seconds as u64)) {
            Ok(()) => Reply::ok(),
            Err(e) => Reply::error(e),
        }
    }

    /// KEYS pattern
    ///
    /// Replies with a JSON array of `{"Key": ..., "Value": ...}` objects,
    /// sorted by key.
    fn cmd_keys(&self, pattern: &str) -> Reply {
        let mut matches = match self.engine.get_by_pattern(pattern) {
            Ok(matches) => matches,
            Err(e) => return Reply::error(e),
        };
        matches.sort_by(|a, b| a.key.cmp(&b.key));

        let listing: Vec<serde_json::Value> = matches
            .into_iter()
            .map(|m| json!({ "Key": m.key, "Value": String::from_utf8_lossy(&m.value) }))
            .collect();

        Reply::text(serde_json::Value::Array(listing).to_string())
    }
}

/// Renders stored bytes for a GET reply.
///
/// A JSON string is unquoted unless it contains a line break; anything else
/// is returned as raw text.
fn render_value(value: &Bytes) -> String {
    if value.first() == Some(&b'"') {
        if let Ok(text) = serde_json::from_slice::<String>(value) {
            if !text.contains(['\n', '\r']) {
                return text;
            }
        }
    }
    String::from_utf8_lossy(value).into_owned()
}
