//! Line Protocol Implementation
//!
//! A minimal, newline-delimited text protocol.
//!
//! ## Overview
//!
//! ```text
//! server: AUTH_REQUIRED
//! client: AUTH <password>
//! server: OK
//! client: SET user:1 {"name": "Ariz"}
//! server: OK
//! client: GET user:1
//! server: {"name": "Ariz"}
//! ```
//!
//! ## Modules
//!
//! - `types`: Defines the `Command` and `Reply` enums and reply serialization
//! - `parser`: Turns one line into a `Command`

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_command, ParseError, ParseResult};
pub use types::{Command, Reply};
