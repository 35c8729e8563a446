//! Pure countdown core. No I/O, no wall clock of its own: the driver feeds
//! in `now_ms` and enforces the outcome (events, listeners, persistence).

use uuid::Uuid;

/// Expected gap between scheduled ticks.
pub const EXPECTED_TICK_MS: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockStatus {
    Running,
    Paused,
    Stopped,
}

/// Countdown state for one session.
#[derive(Debug, Clone)]
pub struct ClockState {
    pub session_id: Uuid,
    pub total_duration_seconds: u32,
    pub remaining_seconds: u32,
    pub status: ClockStatus,
    /// Thresholds still to fire: deduplicated, sorted descending, removed as
    /// they fire so each fires at most once.
    warning_thresholds: Vec<u32>,
    /// Wall-clock millis of the previous tick, for drift diagnostics only.
    last_tick_at_ms: Option<i64>,
}

impl ClockState {
    pub fn new(
        session_id: Uuid,
        total_duration_seconds: u32,
        remaining_seconds: u32,
        warning_thresholds: &[u32],
    ) -> Self {
        let mut thresholds = warning_thresholds.to_vec();
        thresholds.sort_unstable_by(|a, b| b.cmp(a));
        thresholds.dedup();
        Self {
            session_id,
            total_duration_seconds,
            remaining_seconds,
            status: ClockStatus::Running,
            warning_thresholds: thresholds,
            last_tick_at_ms: None,
        }
    }

    pub fn pending_warnings(&self) -> &[u32] {
        &self.warning_thresholds
    }
}

/// What one tick produced. The driver enforces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub remaining_seconds: u32,
    /// Threshold crossed on this tick, if any.
    pub warning: Option<u32>,
    pub expired: bool,
    /// Measured gap since the previous tick when it deviates from the
    /// expected 1000 ms by more than the configured tolerance. Diagnostic
    /// only; never feeds back into `remaining_seconds`.
    pub drift_ms: Option<i64>,
}

/// Advance the countdown by one scheduled tick.
///
/// The decrement is always exactly 1, never the measured wall-clock delta:
/// a manipulated system clock can skew the *diagnostics*, not the countdown.
/// Returns `None` when the clock is not Running (paused or stopped).
pub fn tick(state: &mut ClockState, drift_tolerance_ms: i64, now_ms: i64) -> Option<TickOutcome> {
    if state.status != ClockStatus::Running {
        return None;
    }

    let drift_ms = state.last_tick_at_ms.and_then(|prev| {
        let delta = now_ms - prev;
        ((delta - EXPECTED_TICK_MS).abs() > drift_tolerance_ms).then_some(delta)
    });
    state.last_tick_at_ms = Some(now_ms);

    if state.remaining_seconds > 0 {
        state.remaining_seconds -= 1;
    }

    let warning = state
        .warning_thresholds
        .iter()
        .position(|&t| t == state.remaining_seconds)
        .map(|idx| state.warning_thresholds.remove(idx));

    let expired = state.remaining_seconds == 0;
    if expired {
        state.status = ClockStatus::Stopped;
    }

    Some(TickOutcome {
        remaining_seconds: state.remaining_seconds,
        warning,
        expired,
        drift_ms,
    })
}

/// Running -> Paused. The drift baseline is reset so the pause gap is not
/// misread as drift on resume.
pub fn pause(state: &mut ClockState) -> bool {
    if state.status != ClockStatus::Running {
        return false;
    }
    state.status = ClockStatus::Paused;
    state.last_tick_at_ms = None;
    true
}

/// Paused -> Running.
pub fn resume(state: &mut ClockState) -> bool {
    if state.status != ClockStatus::Paused {
        return false;
    }
    state.status = ClockStatus::Running;
    state.last_tick_at_ms = None;
    true
}

/// Any non-Stopped state -> Stopped. Returns false (no-op) when already
/// stopped, e.g. after expiry.
pub fn stop(state: &mut ClockState) -> bool {
    if state.status == ClockStatus::Stopped {
        return false;
    }
    state.status = ClockStatus::Stopped;
    true
}
