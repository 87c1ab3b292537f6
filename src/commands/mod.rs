//! Command Handler Module
//!
//! This module implements the command processing layer for jsonkv.
//! It receives parsed commands, executes them against the storage engine,
//! and returns the reply line.
//!
//! ## Architecture
//!
//! ```text
//! Client Line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Engine      │  (storage module)
//! └─────────────────┘
//! ```
//!
//! Authentication is not handled here; the connection handler only forwards
//! commands once the session is authenticated.

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
