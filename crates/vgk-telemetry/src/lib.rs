//! Event telemetry pipeline: durable, batched, at-least-once delivery of
//! integrity events.
//!
//! # Invariants
//!
//! - `log()` never drops an event while the pipeline is running; the queue is
//!   mirrored to the local store on every mutation.
//! - A flush snapshots the queue and optimistically clears it; on delivery
//!   failure the snapshot is **prepended** to whatever accumulated meanwhile,
//!   so emission order is never reordered by retries.
//! - Duplicates are possible on ambiguous retry outcomes; deduplication is
//!   the consumer's concern.
//! - At most one flush is in flight at a time; an overlapping trigger is a
//!   no-op and the next scheduled cycle supersedes it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;
use vgk_gateway::PersistenceGateway;
use vgk_schemas::{EventType, IntegrityEvent};
use vgk_store::{load_pending_events, save_pending_events, LocalStateStore};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Periodic flush cadence.
    pub flush_interval: Duration,
    /// Queue length that triggers an immediate flush.
    pub flush_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(5),
            flush_threshold: 20,
        }
    }
}

struct QueueState {
    queue: Vec<IntegrityEvent>,
    stopped: bool,
    terminal_logged: bool,
    flush_in_flight: bool,
}

struct PipelineInner {
    session_id: Uuid,
    cfg: PipelineConfig,
    gateway: Arc<dyn PersistenceGateway>,
    store: Arc<dyn LocalStateStore>,
    state: Mutex<QueueState>,
    kick: mpsc::Sender<()>,
}

impl PipelineInner {
    // A poisoned lock must not take the host application down; the queue
    // state is a plain Vec and stays structurally valid across a panic.
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Cloneable handle to the pipeline (all clones share one queue).
#[derive(Clone)]
pub struct EventPipeline {
    inner: Arc<PipelineInner>,
}

impl EventPipeline {
    /// Build the pipeline, restore any queue persisted by a previous load of
    /// the page, and start the periodic flush schedule.
    pub fn start(
        session_id: Uuid,
        gateway: Arc<dyn PersistenceGateway>,
        store: Arc<dyn LocalStateStore>,
        cfg: PipelineConfig,
    ) -> Self {
        let queue = load_pending_events(&*store);
        let (kick_tx, kick_rx) = mpsc::channel(1);

        let inner = Arc::new(PipelineInner {
            session_id,
            cfg,
            gateway,
            store,
            state: Mutex::new(QueueState {
                queue,
                stopped: false,
                terminal_logged: false,
                flush_in_flight: false,
            }),
            kick: kick_tx,
        });

        spawn_flush_loop(Arc::clone(&inner), kick_rx);
        Self { inner }
    }

    /// Append one event. Synchronous; the queue is persisted locally before
    /// this returns. No-op once stopped, except the terminal event type,
    /// which is accepted exactly once.
    pub fn log(&self, event_type: EventType, metadata: Option<Value>) {
        let kick = {
            let mut st = self.inner.lock_state();
            if st.stopped && !event_type.is_terminal() {
                return;
            }
            if event_type.is_terminal() {
                if st.terminal_logged {
                    return;
                }
                st.terminal_logged = true;
            }

            st.queue
                .push(IntegrityEvent::new(event_type, Utc::now(), metadata));
            save_pending_events(&*self.inner.store, &st.queue);

            !st.stopped && st.queue.len() >= self.inner.cfg.flush_threshold
        };

        if kick {
            let _ = self.inner.kick.try_send(());
        }
    }

    /// Force one flush cycle now. The periodic schedule runs this same path.
    pub async fn flush(&self) {
        flush_once(&self.inner).await;
    }

    /// Stop the pipeline: mark Stopped, wake the schedule so it can wind
    /// down, and make one final flush attempt. Idempotent.
    pub async fn stop(&self) {
        {
            let mut st = self.inner.lock_state();
            if st.stopped {
                return;
            }
            st.stopped = true;
        }
        let _ = self.inner.kick.try_send(());
        flush_once(&self.inner).await;
    }

    pub fn queue_len(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock_state().stopped
    }
}

fn spawn_flush_loop(inner: Arc<PipelineInner>, mut kick_rx: mpsc::Receiver<()>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(inner.cfg.flush_interval);
        // The first interval tick completes immediately; consume it so the
        // first flush happens one full interval after startup.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                kicked = kick_rx.recv() => {
                    if kicked.is_none() {
                        break;
                    }
                }
            }
            if inner.lock_state().stopped {
                break;
            }
            flush_once(&inner).await;
        }
    });
}

async fn flush_once(inner: &Arc<PipelineInner>) {
    let batch = {
        let mut st = inner.lock_state();
        if st.flush_in_flight || st.queue.is_empty() {
            return;
        }
        st.flush_in_flight = true;
        // Optimistically clear the live queue; new events accumulate behind
        // the in-flight batch.
        let batch = std::mem::take(&mut st.queue);
        save_pending_events(&*inner.store, &st.queue);
        batch
    };

    let result = inner
        .gateway
        .insert_event_batch(inner.session_id, &batch)
        .await;

    let mut st = inner.lock_state();
    st.flush_in_flight = false;
    match result {
        Ok(()) => {
            debug!(count = batch.len(), "event batch delivered");
        }
        Err(err) => {
            warn!(count = batch.len(), %err, "event batch delivery failed; requeueing");
            // Prepend: the failed batch predates everything logged since.
            let mut restored = batch;
            restored.append(&mut st.queue);
            st.queue = restored;
            save_pending_events(&*inner.store, &st.queue);
        }
    }
}
