//! Storage Engine Module
//!
//! This module provides the core storage functionality for jsonkv.
//! It includes a thread-safe, sharded key-value store with lazy TTL expiry,
//! glob pattern scans and snapshot dump/restore driven by a background timer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...N     │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! │                  Codec (optional AES-256-CTR)               │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ dump_to_disk()
//!              ┌─────────────┴─────────────┐
//!              │   SnapshotScheduler       │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use jsonkv::storage::Engine;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let engine = Engine::new();
//!
//! engine.set("user:1", json!({"name": "Ariz"})).unwrap();
//! let value = engine.get("user:1").unwrap();
//! assert_eq!(&value[..], br#"{"name":"Ariz"}"#);
//!
//! engine.set_with_ttl("session", "token123", Duration::from_secs(3600)).unwrap();
//! assert_eq!(engine.get_by_pattern("user:*").unwrap().len(), 1);
//! ```

pub mod engine;
pub mod glob;
pub mod snapshot;

// Re-export commonly used types
pub use engine::{
    default_shard_count, Engine, EngineOptions, KeyRecord, Match, StoredValue, Ttl,
    DEFAULT_DUMP_DIR,
};
pub use glob::GlobPattern;
pub use snapshot::{
    Snapshot, SnapshotConfig, SnapshotScheduler, DUMP_FILE_NAME, MIN_DUMP_INTERVAL,
    SNAPSHOT_VERSION,
};
