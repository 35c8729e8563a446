//! Session countdown clock: authoritative per-session countdown, resilient
//! to reloads (remote resume record) and resistant to client clock
//! manipulation (fixed decrement per scheduled tick).
//!
//! Three concerns, three schedules:
//! - tick @1s      — decrement, warnings, expiry, local mirror
//! - sync @30s     — one-directional push of `remaining_seconds` upstream
//! - local mirror  — written on every tick, independent of remote sync

pub mod core;

pub use crate::core::{ClockState, ClockStatus, TickOutcome, EXPECTED_TICK_MS};

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;
use vgk_gateway::PersistenceGateway;
use vgk_schemas::{EventType, LocalTimerState};
use vgk_store::{save_timer_local, LocalStateStore};
use vgk_telemetry::EventPipeline;

#[derive(Debug, Clone)]
pub struct ClockConfig {
    pub tick_interval: Duration,
    pub sync_interval: Duration,
    /// Tolerated deviation from the expected 1000 ms tick gap before a drift
    /// diagnostic is logged.
    pub drift_tolerance_ms: i64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            sync_interval: Duration::from_secs(30),
            drift_tolerance_ms: 2000,
        }
    }
}

pub type TickListener = Box<dyn Fn(u32) + Send>;
pub type CompletionListener = Box<dyn Fn() + Send>;

struct ClockInner {
    cfg: ClockConfig,
    gateway: Arc<dyn PersistenceGateway>,
    store: Arc<dyn LocalStateStore>,
    pipeline: EventPipeline,
    state: Mutex<Option<ClockState>>,
    tick_listeners: Mutex<Vec<TickListener>>,
    completion_listeners: Mutex<Vec<CompletionListener>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ClockInner {
    fn lock_state(&self) -> MutexGuard<'_, Option<ClockState>> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Cloneable handle to one session's countdown.
#[derive(Clone)]
pub struct SessionClock {
    inner: Arc<ClockInner>,
}

impl SessionClock {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        store: Arc<dyn LocalStateStore>,
        pipeline: EventPipeline,
        cfg: ClockConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                cfg,
                gateway,
                store,
                pipeline,
                state: Mutex::new(None),
                tick_listeners: Mutex::new(Vec::new()),
                completion_listeners: Mutex::new(Vec::new()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start the countdown. If the backend already holds a timer record for
    /// this session the clock resumes from it; otherwise it seeds from
    /// `duration_seconds` and writes the initial record.
    pub async fn init(
        &self,
        session_id: Uuid,
        duration_seconds: u32,
        warning_thresholds: &[u32],
    ) -> Result<()> {
        if self.inner.lock_state().is_some() {
            bail!("session clock already initialized");
        }

        let resumed = match self.inner.gateway.read_timer_state(session_id).await {
            Ok(Some(rec)) => Some(rec.remaining_seconds),
            Ok(None) => None,
            Err(err) => {
                // Treated as record-absent: a transient read failure must not
                // keep the session from starting.
                warn!(%err, "timer record read failed; seeding from configured duration");
                None
            }
        };
        let remaining = resumed.unwrap_or(duration_seconds);

        if resumed.is_none() {
            if let Err(err) = self
                .inner
                .gateway
                .write_timer_state(session_id, remaining, Utc::now())
                .await
            {
                warn!(%err, "initial timer record write failed; next sync supersedes");
            }
        }

        {
            let mut guard = self.inner.lock_state();
            if guard.is_some() {
                bail!("session clock already initialized");
            }
            *guard = Some(ClockState::new(
                session_id,
                duration_seconds,
                remaining,
                warning_thresholds,
            ));
        }

        self.inner.pipeline.log(
            EventType::TimerStarted,
            Some(json!({
                "duration_seconds": duration_seconds,
                "remaining_seconds": remaining,
                "resumed": resumed.is_some(),
            })),
        );

        let tick_task = spawn_tick_loop(Arc::clone(&self.inner));
        let sync_task = spawn_sync_loop(Arc::clone(&self.inner));
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(|p| p.into_inner());
        tasks.push(tick_task);
        tasks.push(sync_task);
        Ok(())
    }

    /// Drive one scheduled tick with the given wall-clock reading. The
    /// periodic schedule calls this same path; tests call it directly.
    /// Returns false once the clock has stopped.
    pub fn tick_once(&self, now_ms: i64) -> bool {
        tick_once(&self.inner, now_ms)
    }

    /// Push the current remaining time upstream. The periodic schedule calls
    /// this same path; failures are logged and superseded by the next cycle.
    pub async fn sync_once(&self) -> bool {
        sync_once(&self.inner).await
    }

    /// Halt the countdown without expiry semantics (no completion
    /// callbacks). No-op when never started or already stopped.
    pub fn stop(&self) {
        let stopped_now = {
            let mut guard = self.inner.lock_state();
            match guard.as_mut() {
                Some(state) => core::stop(state),
                None => false,
            }
        };
        if !stopped_now {
            return;
        }
        abort_tasks(&self.inner);
    }

    /// Running -> Paused; emits `TIMER_PAUSED`.
    pub fn pause(&self) {
        let changed = {
            let mut guard = self.inner.lock_state();
            guard.as_mut().map(core::pause).unwrap_or(false)
        };
        if changed {
            self.inner.pipeline.log(EventType::TimerPaused, None);
        }
    }

    /// Paused -> Running; emits `TIMER_RESUMED`.
    pub fn resume(&self) {
        let changed = {
            let mut guard = self.inner.lock_state();
            guard.as_mut().map(core::resume).unwrap_or(false)
        };
        if changed {
            self.inner.pipeline.log(EventType::TimerResumed, None);
        }
    }

    pub fn remaining_seconds(&self) -> Option<u32> {
        self.inner.lock_state().as_ref().map(|s| s.remaining_seconds)
    }

    pub fn status(&self) -> Option<ClockStatus> {
        self.inner.lock_state().as_ref().map(|s| s.status)
    }

    /// Register a tick listener; invoked synchronously, in registration
    /// order, on the tick-driving task.
    pub fn on_tick(&self, listener: TickListener) {
        self.inner
            .tick_listeners
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(listener);
    }

    /// Register a completion listener; each fires exactly once, at expiry.
    pub fn on_complete(&self, listener: CompletionListener) {
        self.inner
            .completion_listeners
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(listener);
    }
}

fn abort_tasks(inner: &ClockInner) {
    let mut tasks = inner.tasks.lock().unwrap_or_else(|p| p.into_inner());
    for task in tasks.drain(..) {
        task.abort();
    }
}

fn spawn_tick_loop(inner: Arc<ClockInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(inner.cfg.tick_interval);
        // The first interval tick completes immediately; consume it so the
        // first decrement lands one full interval after init.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !tick_once(&inner, Utc::now().timestamp_millis()) {
                break;
            }
        }
    })
}

fn spawn_sync_loop(inner: Arc<ClockInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(inner.cfg.sync_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !sync_once(&inner).await {
                break;
            }
        }
    })
}

fn tick_once(inner: &Arc<ClockInner>, now_ms: i64) -> bool {
    let outcome = {
        let mut guard = inner.lock_state();
        let Some(state) = guard.as_mut() else {
            return false;
        };
        match core::tick(state, inner.cfg.drift_tolerance_ms, now_ms) {
            Some(outcome) => outcome,
            // Paused keeps the schedule alive; Stopped winds it down.
            None => return state.status != ClockStatus::Stopped,
        }
    };

    save_timer_local(
        &*inner.store,
        &LocalTimerState {
            remaining_seconds: outcome.remaining_seconds,
            saved_at: Utc::now(),
        },
    );

    if let Some(delta) = outcome.drift_ms {
        warn!(
            delta_ms = delta,
            "tick gap drifted beyond tolerance; countdown unaffected"
        );
    }

    notify_tick(inner, outcome.remaining_seconds);

    if let Some(at) = outcome.warning {
        inner.pipeline.log(
            EventType::TimerWarning,
            Some(json!({ "remaining_seconds": at })),
        );
    }

    if outcome.expired {
        inner.pipeline.log(EventType::TimerExpired, None);
        push_final_sync(inner);
        let listeners = std::mem::take(
            &mut *inner
                .completion_listeners
                .lock()
                .unwrap_or_else(|p| p.into_inner()),
        );
        for listener in &listeners {
            listener();
        }
        abort_tasks(inner);
        return false;
    }
    true
}

/// Invoke tick listeners outside their lock so a listener may register
/// further listeners without deadlocking.
fn notify_tick(inner: &ClockInner, remaining: u32) {
    let listeners = std::mem::take(
        &mut *inner
            .tick_listeners
            .lock()
            .unwrap_or_else(|p| p.into_inner()),
    );
    for listener in &listeners {
        listener(remaining);
    }
    let mut guard = inner
        .tick_listeners
        .lock()
        .unwrap_or_else(|p| p.into_inner());
    let mut restored = listeners;
    restored.append(&mut guard);
    *guard = restored;
}

/// One final push at expiry so the remote mirror reads zero.
fn push_final_sync(inner: &Arc<ClockInner>) {
    let session_id = {
        let guard = inner.lock_state();
        match guard.as_ref() {
            Some(state) => state.session_id,
            None => return,
        }
    };
    let gateway = Arc::clone(&inner.gateway);
    tokio::spawn(async move {
        if let Err(err) = gateway.write_timer_state(session_id, 0, Utc::now()).await {
            warn!(%err, "final timer sync at expiry failed");
        }
    });
}

async fn sync_once(inner: &Arc<ClockInner>) -> bool {
    let snapshot = {
        let guard = inner.lock_state();
        match guard.as_ref() {
            Some(state) if state.status != ClockStatus::Stopped => {
                Some((state.session_id, state.remaining_seconds))
            }
            _ => None,
        }
    };
    let Some((session_id, remaining)) = snapshot else {
        return false;
    };
    if let Err(err) = inner
        .gateway
        .write_timer_state(session_id, remaining, Utc::now())
        .await
    {
        warn!(%err, "timer sync failed; next cycle supersedes");
    }
    true
}
