//! Session orchestrator: wires the telemetry pipeline, session clock and
//! lockdown monitor for one assessment attempt, owns the attempt lifecycle
//! upstream, and guards the terminal submit sequence against duplicates.
//!
//! A session handle is single-use: `reset` tears the services down; a new
//! attempt gets a new handle.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;
use vgk_clock::{ClockConfig, SessionClock};
use vgk_config::ProctorConfig;
use vgk_gateway::{AttemptRegistry, PersistenceGateway};
use vgk_lockdown::{IntegrityMonitor, PlatformAdapter};
use vgk_schemas::EventType;
use vgk_store::{LocalStateStore, KEY_PENDING_EVENTS};
use vgk_telemetry::{EventPipeline, PipelineConfig};

/// Map the effective config onto the pipeline's knobs.
pub fn pipeline_config(cfg: &ProctorConfig) -> PipelineConfig {
    PipelineConfig {
        flush_interval: Duration::from_secs(cfg.telemetry.flush_interval_secs),
        flush_threshold: cfg.telemetry.flush_threshold,
    }
}

/// Map the effective config onto the clock's knobs.
pub fn clock_config(cfg: &ProctorConfig) -> ClockConfig {
    ClockConfig {
        tick_interval: Duration::from_millis(cfg.clock.tick_interval_ms),
        sync_interval: Duration::from_secs(cfg.clock.sync_interval_secs),
        drift_tolerance_ms: cfg.clock.drift_tolerance_ms,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    InProgress,
    Submitted,
}

pub struct AssessmentSession {
    session_id: Uuid,
    duration_seconds: u32,
    warning_thresholds: Vec<u32>,
    registry: Arc<dyn AttemptRegistry>,
    store: Arc<dyn LocalStateStore>,
    pipeline: EventPipeline,
    clock: SessionClock,
    monitor: IntegrityMonitor,
    phase: Mutex<SessionPhase>,
}

impl AssessmentSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: Uuid,
        duration_seconds: u32,
        warning_thresholds: Vec<u32>,
        gateway: Arc<dyn PersistenceGateway>,
        registry: Arc<dyn AttemptRegistry>,
        store: Arc<dyn LocalStateStore>,
        platform: Arc<dyn PlatformAdapter>,
        cfg: &ProctorConfig,
    ) -> Arc<Self> {
        let pipeline = EventPipeline::start(
            session_id,
            Arc::clone(&gateway),
            Arc::clone(&store),
            pipeline_config(cfg),
        );
        let clock = SessionClock::new(
            gateway,
            Arc::clone(&store),
            pipeline.clone(),
            clock_config(cfg),
        );
        let monitor = IntegrityMonitor::new(platform, pipeline.clone());

        let session = Arc::new(Self {
            session_id,
            duration_seconds,
            warning_thresholds,
            registry,
            store,
            pipeline,
            clock,
            monitor,
            phase: Mutex::new(SessionPhase::Idle),
        });

        // Expiry auto-submits. Weak handle: the clock must not keep a
        // dropped session alive.
        let weak: Weak<Self> = Arc::downgrade(&session);
        session.clock.on_complete(Box::new(move || {
            if let Some(session) = weak.upgrade() {
                tokio::spawn(async move {
                    session.auto_submit().await;
                });
            }
        }));

        session
    }

    fn lock_phase(&self) -> MutexGuard<'_, SessionPhase> {
        self.phase.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Begin the attempt: register it upstream, enter lockdown, start the
    /// countdown. The expiry auto-submit hook is armed at construction.
    pub async fn start(&self) -> Result<()> {
        {
            let mut phase = self.lock_phase();
            if *phase != SessionPhase::Idle {
                bail!("session already started");
            }
            *phase = SessionPhase::InProgress;
        }

        // Attempt registration failing must not keep the candidate out of
        // the assessment; the audit trail still carries the start event.
        if let Err(err) = self
            .registry
            .create_attempt(self.session_id, Utc::now())
            .await
        {
            warn!(%err, "attempt registration failed; continuing");
        }

        self.pipeline.log(
            EventType::AssessmentStarted,
            Some(json!({ "duration_seconds": self.duration_seconds })),
        );

        self.monitor.init();

        self.clock
            .init(
                self.session_id,
                self.duration_seconds,
                &self.warning_thresholds,
            )
            .await
            .context("session clock init failed")?;

        Ok(())
    }

    /// Expiry path: record the auto-submit, then run the normal terminal
    /// sequence (which no-ops if the candidate submitted first).
    async fn auto_submit(&self) {
        if *self.lock_phase() != SessionPhase::InProgress {
            return;
        }
        self.pipeline.log(EventType::AutoSubmit, None);
        self.submit().await;
    }

    /// Terminal stop sequence. Idempotent: the phase guard makes duplicate
    /// submissions no-ops before any teardown happens.
    pub async fn submit(&self) {
        {
            let mut phase = self.lock_phase();
            if *phase != SessionPhase::InProgress {
                return;
            }
            *phase = SessionPhase::Submitted;
        }

        self.clock.stop();
        self.monitor.cleanup();
        self.pipeline.log(EventType::AssessmentSubmitted, None);
        self.pipeline.stop().await;

        if let Err(err) = self
            .registry
            .mark_attempt_submitted(self.session_id, Utc::now())
            .await
        {
            warn!(%err, "attempt submit update failed");
        }
    }

    /// Deliberate teardown without submission: stop everything and clear the
    /// locally queued events.
    pub async fn reset(&self) {
        {
            let mut phase = self.lock_phase();
            if *phase == SessionPhase::Idle {
                return;
            }
            *phase = SessionPhase::Idle;
        }
        self.clock.stop();
        self.monitor.cleanup();
        self.pipeline.stop().await;
        self.store.remove(KEY_PENDING_EVENTS);
    }

    pub fn phase(&self) -> SessionPhase {
        *self.lock_phase()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn pipeline(&self) -> &EventPipeline {
        &self.pipeline
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn monitor(&self) -> &IntegrityMonitor {
        &self.monitor
    }
}

/// Tracing setup for host binaries: env-filtered fmt subscriber, `info` by
/// default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
