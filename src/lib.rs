//! # jsonkv - An In-Memory Sharded JSON Key-Value Store
//!
//! jsonkv keeps JSON documents in memory behind a minimal, password-protected
//! line protocol over TCP. Values can be encrypted at rest with AES-256-CTR and
//! the whole store can be dumped to, and restored from, a JSON snapshot file.
//!
//! ## Features
//!
//! - **Sharded storage**: keys are spread over independent `RwLock` shards
//! - **Lazy TTL**: expired keys disappear the next time they are read
//! - **Pattern scans**: `*`/`?` globs over the whole key space
//! - **Snapshots**: crash-safe write-then-rename dumps, optionally periodic
//! - **Async I/O**: one Tokio task per client connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              jsonkv                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │ + Session   │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   Line      │    │                 Engine                       │   │
//! │  │   Parser    │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │             │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     │           (optional AES-256-CTR Codec)       │   │
//! │                     └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                                               │                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           SnapshotScheduler                     │ │
//! │                     │      (Background Tokio Task, memory.dump)       │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use jsonkv::server::Server;
//! use jsonkv::storage::Engine;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let engine = Arc::new(Engine::new());
//!     let server = Server::bind("127.0.0.1:5555", engine, "password").await?;
//!
//!     server.run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `AUTH password`
//! - `PING`
//! - `SET key value...`
//! - `GET key`
//! - `DELETE key` / `DEL key`
//! - `TTL key`
//! - `EXPIRE key seconds`
//! - `KEYS pattern`
//! - `RESET_MEMORY`
//!
//! ## Module Overview
//!
//! - [`storage`]: Sharded engine, glob matching and snapshots
//! - [`crypto`]: Value encryption
//! - [`protocol`]: Line parser and reply types
//! - [`commands`]: Command execution
//! - [`connection`]: Per-client read loop and authentication
//! - [`server`]: Accept loop
//! - [`config`]: CLI and environment configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionStats};
pub use error::{StoreError, StoreResult};
pub use protocol::{parse_command, Command, ParseError, Reply};
pub use server::Server;
pub use storage::{Engine, EngineOptions, SnapshotConfig, SnapshotScheduler};

pub use config::DEFAULT_PORT;

/// The default host jsonkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of jsonkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
