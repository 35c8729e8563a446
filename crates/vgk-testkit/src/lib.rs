//! Test doubles for the integrity core: an in-memory state store, a scripted
//! persistence gateway, and a fake platform adapter. Scenario tests that span
//! multiple crates live under this crate's `tests/`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vgk_gateway::{AttemptRegistry, GatewayError, PersistenceGateway};
use vgk_lockdown::{
    EnvSignal, FullscreenDenied, PlatformAdapter, SignalDisposition, SignalHandler,
};
use vgk_schemas::{EventType, IntegrityEvent, TimerRecord};
use vgk_store::LocalStateStore;

// ---------------------------------------------------------------------------
// MemoryStateStore
// ---------------------------------------------------------------------------

/// In-memory stand-in for the durable local key/value store.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}

impl LocalStateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

// ---------------------------------------------------------------------------
// FakeGateway
// ---------------------------------------------------------------------------

/// Scripted persistence gateway. Failures are toggled per operation family;
/// successful calls are recorded for assertions.
#[derive(Default)]
pub struct FakeGateway {
    timer: Mutex<Option<TimerRecord>>,
    batches: Mutex<Vec<Vec<IntegrityEvent>>>,
    timer_writes: Mutex<Vec<(Uuid, u32)>>,
    attempts_created: Mutex<Vec<Uuid>>,
    attempts_submitted: Mutex<Vec<Uuid>>,
    fail_reads: AtomicBool,
    fail_timer_writes: AtomicBool,
    fail_inserts: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load a remote timer record, as if a previous load synced it.
    pub fn seed_timer(&self, session_id: Uuid, remaining_seconds: u32) {
        *self.timer.lock().unwrap() = Some(TimerRecord {
            session_id,
            remaining_seconds,
            synced_at: Utc::now(),
        });
    }

    pub fn set_reads_failing(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }

    pub fn set_timer_writes_failing(&self, failing: bool) {
        self.fail_timer_writes.store(failing, Ordering::SeqCst);
    }

    pub fn set_inserts_failing(&self, failing: bool) {
        self.fail_inserts.store(failing, Ordering::SeqCst);
    }

    /// Every successfully delivered batch, in delivery order.
    pub fn delivered_batches(&self) -> Vec<Vec<IntegrityEvent>> {
        self.batches.lock().unwrap().clone()
    }

    /// Flattened event types across all delivered batches.
    pub fn delivered_types(&self) -> Vec<EventType> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|ev| ev.event_type)
            .collect()
    }

    pub fn timer_writes(&self) -> Vec<(Uuid, u32)> {
        self.timer_writes.lock().unwrap().clone()
    }

    pub fn attempts_created(&self) -> Vec<Uuid> {
        self.attempts_created.lock().unwrap().clone()
    }

    pub fn attempts_submitted(&self) -> Vec<Uuid> {
        self.attempts_submitted.lock().unwrap().clone()
    }
}

fn scripted_failure(flag: &AtomicBool, what: &str) -> Result<(), GatewayError> {
    if flag.load(Ordering::SeqCst) {
        Err(GatewayError::Transport(format!("{what} unavailable")))
    } else {
        Ok(())
    }
}

#[async_trait::async_trait]
impl PersistenceGateway for FakeGateway {
    async fn read_timer_state(&self, session_id: Uuid) -> Result<Option<TimerRecord>, GatewayError> {
        scripted_failure(&self.fail_reads, "timer read")?;
        Ok(self
            .timer
            .lock()
            .unwrap()
            .clone()
            .filter(|rec| rec.session_id == session_id))
    }

    async fn write_timer_state(
        &self,
        session_id: Uuid,
        remaining_seconds: u32,
        synced_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        scripted_failure(&self.fail_timer_writes, "timer write")?;
        self.timer_writes
            .lock()
            .unwrap()
            .push((session_id, remaining_seconds));
        *self.timer.lock().unwrap() = Some(TimerRecord {
            session_id,
            remaining_seconds,
            synced_at,
        });
        Ok(())
    }

    async fn insert_event_batch(
        &self,
        _session_id: Uuid,
        events: &[IntegrityEvent],
    ) -> Result<(), GatewayError> {
        scripted_failure(&self.fail_inserts, "event insert")?;
        self.batches.lock().unwrap().push(events.to_vec());
        Ok(())
    }
}

#[async_trait::async_trait]
impl AttemptRegistry for FakeGateway {
    async fn create_attempt(
        &self,
        session_id: Uuid,
        _started_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        self.attempts_created.lock().unwrap().push(session_id);
        Ok(())
    }

    async fn mark_attempt_submitted(
        &self,
        session_id: Uuid,
        _ended_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        self.attempts_submitted.lock().unwrap().push(session_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakePlatform
// ---------------------------------------------------------------------------

/// Fake platform adapter: counts hook installs/uninstalls and fullscreen
/// requests, and lets tests push environment signals at the handler.
#[derive(Default)]
pub struct FakePlatform {
    handler: Mutex<Option<Arc<dyn SignalHandler>>>,
    installs: AtomicUsize,
    uninstalls: AtomicUsize,
    fullscreen_requests: AtomicUsize,
    deny_fullscreen: AtomicBool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fullscreen_denied(&self, denied: bool) {
        self.deny_fullscreen.store(denied, Ordering::SeqCst);
    }

    /// Deliver a signal the way the real platform would, returning the
    /// core's disposition; `None` when no hooks are installed.
    pub fn emit(&self, signal: EnvSignal) -> Option<SignalDisposition> {
        let handler = self.handler.lock().unwrap().clone();
        handler.map(|h| h.on_signal(signal))
    }

    pub fn hooks_installed(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }

    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn uninstall_count(&self) -> usize {
        self.uninstalls.load(Ordering::SeqCst)
    }

    pub fn fullscreen_request_count(&self) -> usize {
        self.fullscreen_requests.load(Ordering::SeqCst)
    }
}

impl PlatformAdapter for FakePlatform {
    fn request_fullscreen(&self) -> Result<(), FullscreenDenied> {
        self.fullscreen_requests.fetch_add(1, Ordering::SeqCst);
        if self.deny_fullscreen.load(Ordering::SeqCst) {
            return Err(FullscreenDenied {
                reason: "permission denied by user agent".to_string(),
            });
        }
        Ok(())
    }

    fn install(&self, handler: Arc<dyn SignalHandler>) {
        self.installs.fetch_add(1, Ordering::SeqCst);
        *self.handler.lock().unwrap() = Some(handler);
    }

    fn uninstall(&self) {
        self.uninstalls.fetch_add(1, Ordering::SeqCst);
        *self.handler.lock().unwrap() = None;
    }
}
