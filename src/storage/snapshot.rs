//! Snapshots and the Background Dump Scheduler
//!
//! The engine can serialize its full state to a single JSON file and read it
//! back on a later start.
//!
//! ## File Format
//!
//! ```text
//! {
//!   "version": 1,
//!   "timestamp": "2026-01-01T00:00:00Z",
//!   "shards": {
//!     "0": { "<key>": { "value": [..bytes..], "expires_at": null | "<rfc3339>" } },
//!     "1": { ... }
//!   }
//! }
//! ```
//!
//! Values are written exactly as they are resident, so an encrypted engine
//! produces an encrypted dump and must be restored with the same key.
//!
//! ## Crash Safety
//!
//! A dump is written to `memory.dump.tmp` in the dump directory, flushed and
//! synced, then renamed over `memory.dump`. A reader never observes a
//! partially written dump file.
//!
//! ## Scheduler
//!
//! [`SnapshotScheduler`] runs as a Tokio task and calls
//! [`Engine::dump_to_disk`] on every tick. A failed dump is logged and the
//! next tick tries again. The task stops when the handle is stopped or dropped.

use crate::error::{StoreError, StoreResult};
use crate::storage::engine::{Engine, KeyRecord};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Format version written by this build. Restores reject any other version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Name of the canonical dump file inside the dump directory.
pub const DUMP_FILE_NAME: &str = "memory.dump";

const TEMP_FILE_NAME: &str = "memory.dump.tmp";

/// Smallest interval the scheduler will tick at.
pub const MIN_DUMP_INTERVAL: Duration = Duration::from_secs(1);

/// Serialized engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub shards: BTreeMap<usize, HashMap<String, KeyRecord>>,
}

impl Snapshot {
    /// Copies every non-expired record out of the engine.
    ///
    /// Shards are visited in index order, each under its own read lock.
    pub fn capture(engine: &Engine) -> Self {
        let now = Utc::now();
        let mut shards = BTreeMap::new();

        for (index, shard) in engine.shards().iter().enumerate() {
            let entries = shard.entries.read();
            let copied: HashMap<String, KeyRecord> = entries
                .iter()
                .filter(|(_, record)| !record.is_expired_at(now))
                .map(|(key, record)| {
                    (
                        key.clone(),
                        KeyRecord {
                            value: Bytes::copy_from_slice(&record.value),
                            expires_at: record.expires_at,
                        },
                    )
                })
                .collect();
            shards.insert(index, copied);
        }

        Self {
            version: SNAPSHOT_VERSION,
            timestamp: now,
            shards,
        }
    }

    /// Total number of records in the snapshot.
    pub fn key_count(&self) -> usize {
        self.shards.values().map(HashMap::len).sum()
    }
}

impl Engine {
    /// Path of the canonical dump file.
    pub fn dump_file_path(&self) -> PathBuf {
        self.dump_dir().join(DUMP_FILE_NAME)
    }

    /// Writes every non-expired record to the dump file.
    ///
    /// Returns the number of records written.
    pub fn dump_to_disk(&self) -> StoreResult<usize> {
        let _guard = self.dump_lock.lock();

        let dir = self.dump_dir();
        fs::create_dir_all(dir)
            .map_err(|e| StoreError::io("failed to create dump directory", e))?;

        let snapshot = Snapshot::capture(self);
        let tmp_path = dir.join(TEMP_FILE_NAME);
        let final_path = dir.join(DUMP_FILE_NAME);

        let written = write_snapshot(&tmp_path, &snapshot).and_then(|()| {
            fs::rename(&tmp_path, &final_path)
                .map_err(|e| StoreError::io("failed to rename dump file", e))
        });
        if let Err(e) = written {
            // Leave no partial temp file behind
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        let keys = snapshot.key_count();
        debug!(path = %final_path.display(), keys = keys, "Dumped memory to disk");
        Ok(keys)
    }

    /// Replaces the engine's contents with the dump file.
    ///
    /// Records that have already expired are skipped. Records are re-routed
    /// by key hash, so a dump taken with a different shard count restores
    /// correctly. Each shard is replaced wholesale under its own write lock,
    /// in index order. Returns the number of records restored.
    pub fn restore_from_disk(&self) -> StoreResult<usize> {
        let path = self.dump_file_path();
        let file = File::open(&path).map_err(|e| StoreError::io("failed to open dump file", e))?;

        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StoreError::snapshot(format!("failed to decode dump: {}", e)))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        let now = Utc::now();
        let mut routed: Vec<HashMap<String, KeyRecord>> =
            (0..self.shard_count()).map(|_| HashMap::new()).collect();
        let mut skipped = 0usize;

        for (key, record) in snapshot.shards.into_values().flatten() {
            if record.is_expired_at(now) {
                skipped += 1;
                continue;
            }
            let index = self.shard_index(&key);
            routed[index].insert(key, record);
        }

        let mut restored = 0usize;
        for (shard, entries) in self.shards().iter().zip(routed) {
            restored += entries.len();
            *shard.entries.write() = entries;
        }

        info!(
            path = %path.display(),
            keys = restored,
            skipped_expired = skipped,
            dumped_at = %snapshot.timestamp,
            "Restored memory from disk"
        );
        Ok(restored)
    }
}

/// Writes, flushes and syncs a snapshot to `path`.
fn write_snapshot(path: &Path, snapshot: &Snapshot) -> StoreResult<()> {
    let file = File::create(path).map_err(|e| StoreError::io("failed to create dump file", e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, snapshot)
        .map_err(|e| StoreError::snapshot(format!("failed to encode dump: {}", e)))?;
    writer
        .flush()
        .map_err(|e| StoreError::io("failed to flush dump file", e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| StoreError::io("failed to sync dump file", e))
}

/// Configuration for the snapshot scheduler.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Interval between dumps (floored to [`MIN_DUMP_INTERVAL`])
    pub interval: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

impl SnapshotConfig {
    pub fn every_secs(secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(secs),
        }
    }

    /// The interval actually used by the scheduler.
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_DUMP_INTERVAL)
    }
}

/// A handle to the running snapshot scheduler.
///
/// When this handle is dropped, the scheduler task will be stopped.
#[derive(Debug)]
pub struct SnapshotScheduler {
    shutdown_tx: watch::Sender<bool>,
}

impl SnapshotScheduler {
    /// Starts the scheduler as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(engine: Arc<Engine>, config: SnapshotConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval = config.effective_interval();

        tokio::spawn(scheduler_loop(engine, interval, shutdown_rx));

        info!(interval_secs = interval.as_secs(), "Snapshot scheduler started");

        Self { shutdown_tx }
    }

    /// Stops the scheduler.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("Snapshot scheduler stopped");
        }
    }
}

impl Drop for SnapshotScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn scheduler_loop(
    engine: Arc<Engine>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Snapshot scheduler received shutdown signal");
                    return;
                }
                continue;
            }
        }

        let engine = Arc::clone(&engine);
        match tokio::task::spawn_blocking(move || engine.dump_to_disk()).await {
            Ok(Ok(keys)) => debug!(keys = keys, "Periodic dump complete"),
            Ok(Err(e)) => warn!(error = %e, "Failed to dump memory"),
            Err(e) => warn!(error = %e, "Dump task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EngineOptions;
    use serde_json::json;
    use tempfile::TempDir;

    fn engine_in(dir: &TempDir) -> Engine {
        Engine::with_options(EngineOptions::default().with_dump_dir(dir.path())).unwrap()
    }

    #[test]
    fn test_dump_and_restore() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        engine.set("user:1", json!({"name": "John"})).unwrap();
        engine.set("count", json!(42)).unwrap();
        engine
            .set_with_ttl("session", "token", Duration::from_secs(300))
            .unwrap();

        assert_eq!(engine.dump_to_disk().unwrap(), 3);
        assert!(engine.dump_file_path().exists());
        assert!(!dir.path().join(TEMP_FILE_NAME).exists());

        let fresh = engine_in(&dir);
        assert_eq!(fresh.restore_from_disk().unwrap(), 3);

        assert_eq!(fresh.get("user:1").unwrap(), engine.get("user:1").unwrap());
        assert_eq!(fresh.get("count").unwrap(), Bytes::from("42"));
        assert_eq!(fresh.get("session").unwrap(), Bytes::from("token"));
        let secs = fresh.ttl("session").as_secs();
        assert!((298..=300).contains(&secs));
    }

    #[test]
    fn test_expired_keys_not_dumped() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        engine.set("keep", "yes").unwrap();
        engine
            .set_with_ttl("gone", "no", Duration::from_millis(10))
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(engine.dump_to_disk().unwrap(), 1);

        let fresh = engine_in(&dir);
        fresh.restore_from_disk().unwrap();
        assert!(fresh.get("keep").is_ok());
        assert!(fresh.get("gone").unwrap_err().is_not_found());
    }

    #[test]
    fn test_restore_skips_records_expired_since_dump() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        engine.set("keep", "yes").unwrap();
        engine
            .set_with_ttl("short", "no", Duration::from_millis(50))
            .unwrap();
        assert_eq!(engine.dump_to_disk().unwrap(), 2);

        std::thread::sleep(Duration::from_millis(80));

        let fresh = engine_in(&dir);
        assert_eq!(fresh.restore_from_disk().unwrap(), 1);
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_restore_replaces_existing_contents() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        engine.set("a", "1").unwrap();
        engine.dump_to_disk().unwrap();

        let other = engine_in(&dir);
        other.set("b", "2").unwrap();
        other.restore_from_disk().unwrap();

        assert!(other.get("a").is_ok());
        assert!(other.get("b").unwrap_err().is_not_found());
    }

    #[test]
    fn test_restore_with_different_shard_count() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::with_options(
            EngineOptions::default()
                .with_shard_count(3)
                .with_dump_dir(dir.path()),
        )
        .unwrap();
        for i in 0..50 {
            engine.set(&format!("key:{}", i), json!(i)).unwrap();
        }
        engine.dump_to_disk().unwrap();

        let fresh = Engine::with_options(
            EngineOptions::default()
                .with_shard_count(16)
                .with_dump_dir(dir.path()),
        )
        .unwrap();
        assert_eq!(fresh.restore_from_disk().unwrap(), 50);
        for i in 0..50 {
            assert_eq!(
                fresh.get(&format!("key:{}", i)).unwrap(),
                Bytes::from(i.to_string())
            );
        }
    }

    #[test]
    fn test_encrypted_dump_restores_with_same_key() {
        let dir = TempDir::new().unwrap();
        let options = EngineOptions::default()
            .with_dump_dir(dir.path())
            .with_encryption_key(b"0123456789abcdef0123456789abcdef".to_vec());

        let engine = Engine::with_options(options.clone()).unwrap();
        engine.set("secret", json!({"pin": 1234})).unwrap();
        engine.dump_to_disk().unwrap();

        let raw = fs::read_to_string(engine.dump_file_path()).unwrap();
        assert!(!raw.contains("pin"));

        let fresh = Engine::with_options(options).unwrap();
        fresh.restore_from_disk().unwrap();
        assert_eq!(fresh.get("secret").unwrap(), Bytes::from(r#"{"pin":1234}"#));
    }

    #[test]
    fn test_restore_missing_file() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        assert!(matches!(
            engine.restore_from_disk(),
            Err(StoreError::Io { .. })
        ));
    }

    #[test]
    fn test_restore_malformed_file() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        fs::write(engine.dump_file_path(), b"{not json").unwrap();
        assert!(matches!(
            engine.restore_from_disk(),
            Err(StoreError::Snapshot(_))
        ));
    }

    #[test]
    fn test_restore_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        engine.set("a", "1").unwrap();

        let mut snapshot = Snapshot::capture(&engine);
        snapshot.version = SNAPSHOT_VERSION + 1;
        fs::write(
            engine.dump_file_path(),
            serde_json::to_vec(&snapshot).unwrap(),
        )
        .unwrap();

        let fresh = engine_in(&dir);
        fresh.set("untouched", "1").unwrap();
        assert!(matches!(
            fresh.restore_from_disk(),
            Err(StoreError::Snapshot(_))
        ));
        // Failed restore leaves the engine as it was
        assert!(fresh.get("untouched").is_ok());
        assert!(fresh.get("a").unwrap_err().is_not_found());
    }

    #[test]
    fn test_snapshot_json_layout() {
        let engine = Engine::with_options(EngineOptions::default().with_shard_count(2)).unwrap();
        engine.set("k", "v").unwrap();

        let value = serde_json::to_value(Snapshot::capture(&engine)).unwrap();
        assert_eq!(value["version"], json!(1));
        assert!(value["timestamp"].is_string());
        assert_eq!(value["shards"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_interval_floor() {
        assert_eq!(
            SnapshotConfig::every_secs(0).effective_interval(),
            MIN_DUMP_INTERVAL
        );
        assert_eq!(
            SnapshotConfig::every_secs(5).effective_interval(),
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn test_scheduler_dumps_periodically() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(engine_in(&dir));
        engine.set("periodic", "yes").unwrap();

        let scheduler = SnapshotScheduler::start(Arc::clone(&engine), SnapshotConfig::every_secs(0));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        scheduler.stop();

        assert!(engine.dump_file_path().exists());
        let fresh = engine_in(&dir);
        fresh.restore_from_disk().unwrap();
        assert!(fresh.get("periodic").is_ok());
    }

    #[test]
    fn test_failed_dump_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        engine.set("k", "v").unwrap();

        // A directory in place of the dump file makes the rename fail
        fs::create_dir(engine.dump_file_path()).unwrap();

        assert!(matches!(engine.dump_to_disk(), Err(StoreError::Io { .. })));
        assert!(!dir.path().join(TEMP_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_scheduler_retries_after_failed_dump() {
        let dir = TempDir::new().unwrap();
        let dump_dir = dir.path().join("dump");
        // A regular file where the dump directory should be
        fs::write(&dump_dir, b"blocker").unwrap();

        let engine = Arc::new(
            Engine::with_options(EngineOptions::default().with_dump_dir(&dump_dir)).unwrap(),
        );
        engine.set("k", "v").unwrap();

        let scheduler = SnapshotScheduler::start(Arc::clone(&engine), SnapshotConfig::every_secs(1));

        // First tick fails
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!engine.dump_file_path().exists());

        fs::remove_file(&dump_dir).unwrap();

        // A later tick succeeds
        tokio::time::sleep(Duration::from_millis(1700)).await;
        scheduler.stop();

        assert!(engine.dump_file_path().exists());
        let fresh = Engine::with_options(EngineOptions::default().with_dump_dir(&dump_dir)).unwrap();
        assert_eq!(fresh.restore_from_disk().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_drop() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(engine_in(&dir));

        {
            let _scheduler =
                SnapshotScheduler::start(Arc::clone(&engine), SnapshotConfig::every_secs(1));
            tokio::time::sleep(Duration::from_millis(50)).await;
            // Scheduler is dropped here, before its first tick
        }

        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert!(!engine.dump_file_path().exists());
    }
}
