//! Local durable key/value state, the process-local mirror that survives a
//! reload. Two well-known keys: `pending_events` (serialized event queue) and
//! `timer_local` (countdown mirror). Writes are best-effort: a failed write
//! is logged and swallowed, matching the storage semantics of the host
//! environment.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use vgk_schemas::{IntegrityEvent, LocalTimerState};

/// Serialized event queue awaiting remote delivery.
pub const KEY_PENDING_EVENTS: &str = "pending_events";
/// `{remaining_seconds, saved_at}` mirror written on every tick.
pub const KEY_TIMER_LOCAL: &str = "timer_local";

/// Durable key/value store, string values. Mutations are synchronous and
/// infallible from the caller's point of view.
pub trait LocalStateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

// ---------------------------------------------------------------------------
// FileStateStore
// ---------------------------------------------------------------------------

/// File-backed store: one file per key under a state directory.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Creates the store and ensures the state directory exists.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("create_dir_all {:?}", dir))?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl LocalStateStore for FileStateStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.key_path(key)).ok()
    }

    fn put(&self, key: &str, value: &str) {
        if let Err(err) = fs::write(self.key_path(key), value) {
            warn!(key, %err, "local state write failed");
        }
    }

    fn remove(&self, key: &str) {
        let path = self.key_path(key);
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                warn!(key, %err, "local state remove failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Typed helpers
// ---------------------------------------------------------------------------

/// Load the pending event queue. A malformed stored queue is discarded (with
/// a warning) rather than aborting startup.
pub fn load_pending_events(store: &dyn LocalStateStore) -> Vec<IntegrityEvent> {
    let Some(raw) = store.get(KEY_PENDING_EVENTS) else {
        return Vec::new();
    };
    match serde_json::from_str(&raw) {
        Ok(queue) => queue,
        Err(err) => {
            warn!(%err, "discarding malformed pending event queue");
            Vec::new()
        }
    }
}

pub fn save_pending_events(store: &dyn LocalStateStore, queue: &[IntegrityEvent]) {
    match serde_json::to_string(queue) {
        Ok(raw) => store.put(KEY_PENDING_EVENTS, &raw),
        Err(err) => warn!(%err, "pending event queue serialize failed"),
    }
}

pub fn save_timer_local(store: &dyn LocalStateStore, state: &LocalTimerState) {
    match serde_json::to_string(state) {
        Ok(raw) => store.put(KEY_TIMER_LOCAL, &raw),
        Err(err) => warn!(%err, "timer_local serialize failed"),
    }
}

/// Load the local countdown mirror, if present and well-formed.
pub fn load_timer_local(store: &dyn LocalStateStore) -> Option<LocalTimerState> {
    let raw = store.get(KEY_TIMER_LOCAL)?;
    match serde_json::from_str(&raw) {
        Ok(state) => Some(state),
        Err(err) => {
            warn!(%err, "discarding malformed timer_local state");
            None
        }
    }
}
