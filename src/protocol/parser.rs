//! Command Line Parser
//!
//! Turns one protocol line into a [`Command`].
//!
//! ## Rules
//!
//! 1. The line is tokenized on whitespace.
//! 2. The first token selects the verb, case-insensitively.
//! 3. Every verb has a fixed arity, except `SET`, whose value is the rest of
//!    the line joined by single spaces, with one leading and one trailing
//!    double quote stripped.
//!
//! Parse errors are command-local: the caller replies with an `ERROR` line
//! and keeps reading.

use crate::protocol::types::Command;
use thiserror::Error;

/// Errors that can occur while parsing a command line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line holds no tokens
    #[error("empty command")]
    Empty,

    /// The verb is not recognized
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The verb was given the wrong number of arguments
    #[error("{0}")]
    WrongArity(&'static str),

    /// A numeric argument did not parse
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parses a single command line (without its trailing newline).
///
/// # Example
///
/// ```
/// use jsonkv::protocol::{parse_command, Command};
///
/// let cmd = parse_command(r#"SET user:1 {"name": "Ariz"}"#).unwrap();
/// assert_eq!(
///     cmd,
///     Command::Set { key: "user:1".into(), value: r#"{"name": "Ariz"}"#.into() }
/// );
/// ```
pub fn parse_command(line: &str) -> ParseResult<Command> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (verb, args) = match tokens.split_first() {
        Some((verb, args)) => (verb.to_uppercase(), args),
        None => return Err(ParseError::Empty),
    };

    match verb.as_str() {
        "AUTH" => match args {
            [password] => Ok(Command::Auth {
                password: password.to_string(),
            }),
            _ => Err(ParseError::WrongArity("AUTH command requires password")),
        },

        "PING" => match args {
            [] => Ok(Command::Ping),
            _ => Err(ParseError::WrongArity("PING command takes no arguments")),
        },

        "SET" => match args {
            [key, rest @ ..] if !rest.is_empty() => Ok(Command::Set {
                key: key.to_string(),
                value: strip_quotes(&rest.join(" ")).to_string(),
            }),
            _ => Err(ParseError::WrongArity("SET command requires key and value")),
        },

        "GET" => single_key(args, "GET command requires key").map(|key| Command::Get { key }),

        "DELETE" | "DEL" => {
            single_key(args, "DELETE command requires key").map(|key| Command::Delete { key })
        }

        "TTL" => single_key(args, "TTL command requires key").map(|key| Command::Ttl { key }),

        "EXPIRE" => match args {
            [key, seconds] => {
                let seconds = seconds
                    .parse::<i64>()
                    .map_err(|_| ParseError::InvalidInteger(seconds.to_string()))?;
                Ok(Command::Expire {
                    key: key.to_string(),
                    seconds,
                })
            }
            _ => Err(ParseError::WrongArity(
                "EXPIRE command requires key and seconds",
            )),
        },

        "KEYS" => single_key(args, "KEYS command requires pattern")
            .map(|pattern| Command::Keys { pattern }),

        "RESET_MEMORY" => match args {
            [] => Ok(Command::ResetMemory),
            _ => Err(ParseError::WrongArity(
                "RESET_MEMORY command takes no arguments",
            )),
        },

        _ => Err(ParseError::UnknownCommand(verb)),
    }
}

fn single_key(args: &[&str], usage: &'static str) -> ParseResult<String> {
    match args {
        [key] => Ok(key.to_string()),
        _ => Err(ParseError::WrongArity(usage)),
    }
}

/// Strips one leading and one trailing double quote, independently.
fn strip_quotes(value: &str) -> &str {
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}
