//! Connection Handling
//!
//! Every accepted client is served by its own async task that owns the
//! socket, a read buffer and the client's authentication [`Session`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (server.rs)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Split lines │───>│ Session     │     │
//! │  └─────────────┘    └─────────────┘    │ AUTH gate   │     │
//! │                                        └──────┬──────┘     │
//! │                                               ▼             │
//! │                     ┌─────────────┐    ┌─────────────┐     │
//! │                     │ Send reply  │<───│ Execute cmd │     │
//! │                     └─────────────┘    └─────────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Several lines arriving in one TCP packet are answered in order.

pub mod handler;
pub mod session;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, MAX_LINE_LENGTH,
};
pub use session::{Session, SessionState};
