use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;
use vgk_telemetry::EventPipeline;

use crate::engine::apply_signal;
use crate::{
    EnvSignal, FullscreenDenied, LockdownState, PlatformAdapter, SignalDisposition, SignalHandler,
};

struct MonitorInner {
    platform: Arc<dyn PlatformAdapter>,
    pipeline: EventPipeline,
    state: Mutex<LockdownState>,
}

impl MonitorInner {
    fn lock_state(&self) -> MutexGuard<'_, LockdownState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl SignalHandler for MonitorInner {
    fn on_signal(&self, signal: EnvSignal) -> SignalDisposition {
        let outcome = {
            let mut state = self.lock_state();
            let outcome = apply_signal(*state, &signal);
            *state = outcome.next;
            outcome
        };
        if let Some((event_type, metadata)) = outcome.event {
            self.pipeline.log(event_type, metadata);
        }
        outcome.disposition
    }
}

/// Lockdown monitor service. Cloneable handle; all clones share one state.
#[derive(Clone)]
pub struct IntegrityMonitor {
    inner: Arc<MonitorInner>,
}

impl IntegrityMonitor {
    pub fn new(platform: Arc<dyn PlatformAdapter>, pipeline: EventPipeline) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                platform,
                pipeline,
                state: Mutex::new(LockdownState::Inactive),
            }),
        }
    }

    /// Enter lockdown: install every platform hook and request fullscreen.
    /// A denied fullscreen request is logged once and not auto-retried; the
    /// surrounding UI owns the manual retry affordance
    /// ([`IntegrityMonitor::request_fullscreen`]). Idempotent.
    pub fn init(&self) {
        {
            let mut state = self.inner.lock_state();
            if *state != LockdownState::Inactive {
                return;
            }
            *state = LockdownState::ActiveFullscreen;
        }

        self.inner
            .platform
            .install(Arc::clone(&self.inner) as Arc<dyn SignalHandler>);

        if let Err(err) = self.inner.platform.request_fullscreen() {
            warn!(%err, "fullscreen request denied; awaiting manual retry");
        }
    }

    /// Manual retry path for the UI after a denied fullscreen request.
    pub fn request_fullscreen(&self) -> Result<(), FullscreenDenied> {
        self.inner.platform.request_fullscreen()
    }

    /// Leave lockdown: uninstall every hook `init` installed. Idempotent.
    pub fn cleanup(&self) {
        {
            let mut state = self.inner.lock_state();
            if *state == LockdownState::Inactive {
                return;
            }
            *state = LockdownState::Inactive;
        }
        self.inner.platform.uninstall();
    }

    pub fn state(&self) -> LockdownState {
        *self.inner.lock_state()
    }
}
