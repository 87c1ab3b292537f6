//! Sharded Storage Engine with Lazy Expiry
//!
//! This module implements the core storage engine for jsonkv. Values enter the
//! engine as JSON, are optionally encrypted, and live in one of a fixed number
//! of independently locked shards.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, the key space is split across
//!    shards. Single-key operations only contend on their own shard.
//! 2. **Lazy Expiry**: Expired keys are removed when `get`/`ttl` touches them.
//!    There is no background sweep, so expired-but-unread keys stay resident
//!    until touched, reset or dropped by a restore.
//! 3. **Per-shard scans**: `get_by_pattern`, `reset_memory` and snapshot dumps
//!    lock one shard at a time. They are not atomic with respect to concurrent
//!    writers and may observe a state that never existed as a whole.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! `shard_index = hash(key) % shard_count`. The shard count is chosen at
//! construction (default: twice the available parallelism) and never changes.

use crate::crypto::Codec;
use crate::error::{StoreError, StoreResult};
use crate::storage::glob::GlobPattern;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Directory snapshots are written to when none is configured.
pub const DEFAULT_DUMP_DIR: &str = "data/dump";

/// Returns the default shard count: twice the available parallelism.
pub fn default_shard_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

/// A stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Encoded (and possibly encrypted) value bytes
    pub value: Bytes,
    /// When this record expires (None = never expires)
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// Creates a record without expiry.
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    /// Creates a record that expires at the given instant.
    pub fn with_expiry(value: impl Into<Bytes>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(expires_at),
        }
    }

    /// Checks if this record has expired as of `now`.
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Checks if this record has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// A value entering the engine through [`Engine::set`].
///
/// Resolved once at the boundary into canonical JSON bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    /// Encoded as `null`
    Null,
    /// Plain text, encoded as a JSON string
    Text(String),
    /// Text that already looks like a JSON object or array; stored verbatim
    Json(String),
    /// Any other structured value (number, boolean, object, array)
    Structured(serde_json::Value),
}

impl StoredValue {
    /// Classifies a piece of text.
    ///
    /// Text that starts and ends with matching braces or brackets is treated
    /// as already-encoded JSON; anything else is plain text.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let bytes = text.as_bytes();
        let is_json = bytes.len() >= 2
            && matches!(
                (bytes[0], bytes[bytes.len() - 1]),
                (b'{', b'}') | (b'[', b']')
            );

        if is_json {
            StoredValue::Json(text)
        } else {
            StoredValue::Text(text)
        }
    }

    /// Encodes the value as canonical JSON bytes.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        match self {
            StoredValue::Null => Ok(b"null".to_vec()),
            StoredValue::Text(s) => Ok(serde_json::to_vec(s)?),
            StoredValue::Json(s) => Ok(s.as_bytes().to_vec()),
            StoredValue::Structured(v) => Ok(serde_json::to_vec(v)?),
        }
    }
}

impl From<serde_json::Value> for StoredValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => StoredValue::Null,
            serde_json::Value::String(s) => StoredValue::from_text(s),
            other => StoredValue::Structured(other),
        }
    }
}

impl From<&str> for StoredValue {
    fn from(text: &str) -> Self {
        StoredValue::from_text(text)
    }
}

impl From<String> for StoredValue {
    fn from(text: String) -> Self {
        StoredValue::from_text(text)
    }
}

/// Result of [`Engine::ttl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key is absent (or just expired and was removed)
    Missing,
    /// Key exists without an expiry
    Persistent,
    /// Time left before the key expires
    Remaining(Duration),
}

impl Ttl {
    /// Whole seconds as reported over the wire: `-2`, `-1` or the rounded
    /// remaining time.
    pub fn as_secs(&self) -> i64 {
        match self {
            Ttl::Missing => -2,
            Ttl::Persistent => -1,
            Ttl::Remaining(d) => d.as_secs_f64().round() as i64,
        }
    }
}

/// A key/value pair returned by [`Engine::get_by_pattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub key: String,
    pub value: Bytes,
}

/// A single shard containing a portion of the key space.
#[derive(Debug, Default)]
pub(crate) struct Shard {
    pub(crate) entries: RwLock<HashMap<String, KeyRecord>>,
}

/// Construction options for an [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Number of shards (fixed for the engine's lifetime)
    pub shard_count: usize,
    /// 32-byte secret; `Some` enables encryption of every stored value
    pub encryption_key: Option<Vec<u8>>,
    /// Directory holding the snapshot file
    pub dump_dir: PathBuf,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            shard_count: default_shard_count(),
            encryption_key: None,
            dump_dir: PathBuf::from(DEFAULT_DUMP_DIR),
        }
    }
}

impl EngineOptions {
    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    pub fn with_encryption_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = dir.into();
        self
    }
}

/// The main storage engine.
///
/// Designed to be wrapped in an `Arc` and shared by every connection task
/// and the snapshot scheduler. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use jsonkv::storage::{Engine, Ttl};
/// use std::time::Duration;
///
/// let engine = Engine::new();
///
/// engine.set("name", "Ariz").unwrap();
/// assert_eq!(&engine.get("name").unwrap()[..], b"\"Ariz\"");
///
/// engine.set_with_ttl("session", "abc123", Duration::from_secs(60)).unwrap();
/// assert!(matches!(engine.ttl("session"), Ttl::Remaining(_)));
/// ```
pub struct Engine {
    shards: Vec<Shard>,
    codec: Option<Codec>,
    dump_dir: PathBuf,
    /// Serializes writers of the snapshot temp file
    pub(crate) dump_lock: Mutex<()>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("shards", &self.shards.len())
            .field("encrypted", &self.codec.is_some())
            .field("dump_dir", &self.dump_dir)
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an unencrypted engine with default settings.
    pub fn new() -> Self {
        let options = EngineOptions::default();
        Self::from_parts(options.shard_count, None, options.dump_dir)
    }

    /// Creates an engine from explicit options.
    ///
    /// Fails with `Crypto` if an encryption key is given that is not 32 bytes,
    /// or `Validation` if the shard count is zero.
    pub fn with_options(options: EngineOptions) -> StoreResult<Self> {
        if options.shard_count == 0 {
            return Err(StoreError::validation("shard count must be positive"));
        }

        let codec = options
            .encryption_key
            .as_deref()
            .map(Codec::new)
            .transpose()?;

        Ok(Self::from_parts(options.shard_count, codec, options.dump_dir))
    }

    fn from_parts(shard_count: usize, codec: Option<Codec>, dump_dir: PathBuf) -> Self {
        let shards = (0..shard_count).map(|_| Shard::default()).collect();
        debug!(
            shards = shard_count,
            encrypted = codec.is_some(),
            "Storage engine created"
        );

        Self {
            shards,
            codec,
            dump_dir,
            dump_lock: Mutex::new(()),
        }
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Whether stored values are encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.codec.is_some()
    }

    /// Directory the snapshot file lives in.
    pub fn dump_dir(&self) -> &Path {
        &self.dump_dir
    }

    /// Determines which shard a key belongs to.
    #[inline]
    pub(crate) fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    pub(crate) fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// Encrypts the encoded bytes if encryption is enabled.
    fn seal(&self, plain: Vec<u8>) -> StoreResult<Bytes> {
        match &self.codec {
            Some(codec) => Ok(Bytes::from(codec.encrypt(&plain)?)),
            None => Ok(Bytes::from(plain)),
        }
    }

    /// Decrypts stored bytes if encryption is enabled.
    fn open(&self, stored: Bytes) -> StoreResult<Bytes> {
        match &self.codec {
            Some(codec) => Ok(Bytes::from(codec.decrypt(&stored)?)),
            None => Ok(stored),
        }
    }

    /// Stores a value as JSON, clearing any existing expiry.
    pub fn set(&self, key: &str, value: impl Into<StoredValue>) -> StoreResult<()> {
        let value = value.into();
        debug!(key = %key, "SET");

        let stored = self.seal(value.encode()?)?;
        self.shard(key)
            .entries
            .write()
            .insert(key.to_string(), KeyRecord::new(stored));

        Ok(())
    }

    /// Stores raw bytes (no JSON encoding) that expire after `ttl`.
    pub fn set_with_ttl(&self, key: &str, raw: impl Into<Bytes>, ttl: Duration) -> StoreResult<()> {
        let expires_at = Self::expiry_from_now(ttl)?;
        debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "SET with TTL");

        let raw: Bytes = raw.into();
        let stored = self.seal(raw.to_vec())?;
        self.shard(key)
            .entries
            .write()
            .insert(key.to_string(), KeyRecord::with_expiry(stored, expires_at));

        Ok(())
    }

    fn expiry_from_now(ttl: Duration) -> StoreResult<DateTime<Utc>> {
        if ttl.is_zero() {
            return Err(StoreError::validation("TTL must be positive"));
        }

        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| StoreError::validation("TTL is out of range"))
    }

    /// Looks up a live record and applies `f` to it.
    ///
    /// This implements lazy expiry: an expired record is removed under the
    /// shard's write lock and reported as absent.
    fn with_live<T>(&self, key: &str, f: impl Fn(&KeyRecord, DateTime<Utc>) -> T) -> Option<T> {
        let shard = self.shard(key);
        let now = Utc::now();

        // Fast path: read lock for existing, non-expired keys
        {
            let entries = shard.entries.read();
            match entries.get(key) {
                None => return None,
                Some(record) if !record.is_expired_at(now) => return Some(f(record, now)),
                Some(_) => {}
            }
        }

        // Key exists but is expired - need write lock to remove it
        let mut entries = shard.entries.write();
        let expired = entries.get(key)?.is_expired_at(now);
        if expired {
            entries.remove(key);
            trace!(key = %key, "Lazily expired key");
            return None;
        }

        // Race: another writer replaced the key in between
        entries.get(key).map(|record| f(record, now))
    }

    /// Returns the stored (decrypted) bytes for a key.
    pub fn get(&self, key: &str) -> StoreResult<Bytes> {
        debug!(key = %key, "GET");
        let stored = self
            .with_live(key, |record, _| record.value.clone())
            .ok_or(StoreError::NotFound)?;

        self.open(stored)
    }

    /// Removes a key.
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        debug!(key = %key, "DELETE");
        match self.shard(key).entries.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    /// Returns the remaining time to live for a key.
    pub fn ttl(&self, key: &str) -> Ttl {
        self.with_live(key, |record, now| match record.expires_at {
            None => Ttl::Persistent,
            Some(exp) => Ttl::Remaining((exp - now).to_std().unwrap_or(Duration::ZERO)),
        })
        .unwrap_or(Ttl::Missing)
    }

    /// Sets an expiry on an existing, live key.
    pub fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = Self::expiry_from_now(ttl)?;
        debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "EXPIRE");

        let mut entries = self.shard(key).entries.write();
        let expired = match entries.get(key) {
            Some(record) => record.is_expired(),
            None => return Err(StoreError::NotFound),
        };
        if expired {
            entries.remove(key);
            return Err(StoreError::NotFound);
        }

        if let Some(record) = entries.get_mut(key) {
            record.expires_at = Some(expires_at);
        }
        Ok(())
    }

    /// Returns every live key matching a glob pattern, with its value.
    ///
    /// Shards are scanned in index order, each under its own read lock that
    /// is released before the next shard is visited. The result is unordered
    /// and not a point-in-time snapshot of the whole engine.
    pub fn get_by_pattern(&self, pattern: &str) -> StoreResult<Vec<Match>> {
        debug!(pattern = %pattern, "Scanning keys by pattern");
        let glob = GlobPattern::new(pattern);
        let now = Utc::now();

        let mut raw = Vec::new();
        for shard in &self.shards {
            let entries = shard.entries.read();
            raw.extend(
                entries
                    .iter()
                    .filter(|(key, record)| !record.is_expired_at(now) && glob.matches(key))
                    .map(|(key, record)| (key.clone(), record.value.clone())),
            );
        }

        // Decrypt after every lock has been released
        raw.into_iter()
            .map(|(key, value)| -> StoreResult<Match> {
                Ok(Match {
                    value: self.open(value)?,
                    key,
                })
            })
            .collect()
    }

    /// Clears every shard, one shard lock at a time.
    pub fn reset_memory(&self) {
        for shard in &self.shards {
            shard.entries.write().clear();
        }
        debug!("Memory reset");
    }

    /// Number of resident records, including expired ones not yet touched.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.entries.read().len()).sum()
    }

    /// Returns true if no records are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
