//! Pure signal transitions. Decisions are deterministic and side-effect
//! free; the monitor enforces them (event emission, platform cancellation).

use crate::{EnvSignal, KeyCombo, LockdownState, SignalDisposition};
use serde_json::{json, Value};
use vgk_schemas::EventType;

/// Developer-tooling chords that are cancelled and logged.
pub const BLOCKED_SHORTCUTS: &[&str] = &["F12", "Ctrl+Shift+I", "Ctrl+Shift+J", "Ctrl+U"];

pub fn is_blocked_shortcut(combo: &KeyCombo) -> bool {
    if combo.key.eq_ignore_ascii_case("F12") {
        return true;
    }
    if combo.ctrl && combo.shift && (eq_key(combo, "i") || eq_key(combo, "j")) {
        return true;
    }
    combo.ctrl && eq_key(combo, "u")
}

fn eq_key(combo: &KeyCombo, key: &str) -> bool {
    combo.key.eq_ignore_ascii_case(key)
}

/// What one signal produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalOutcome {
    pub next: LockdownState,
    pub event: Option<(EventType, Option<Value>)>,
    pub disposition: SignalDisposition,
}

impl SignalOutcome {
    fn pass(next: LockdownState, event: Option<(EventType, Option<Value>)>) -> Self {
        Self {
            next,
            event,
            disposition: SignalDisposition::Allow,
        }
    }

    fn suppress(next: LockdownState, event: (EventType, Option<Value>)) -> Self {
        Self {
            next,
            event: Some(event),
            disposition: SignalDisposition::Suppress,
        }
    }
}

/// Apply one environment signal.
///
/// Fullscreen changes drive the violation/recovery transitions; visibility
/// and focus signals emit blur/focus events without touching the fullscreen
/// state; clipboard, context-menu and blocked-shortcut signals are
/// suppressed and logged as attempts. An inactive monitor emits nothing and
/// suppresses nothing.
pub fn apply_signal(state: LockdownState, signal: &EnvSignal) -> SignalOutcome {
    if state == LockdownState::Inactive {
        return SignalOutcome::pass(state, None);
    }

    match signal {
        EnvSignal::FullscreenChange { fullscreen: false } => SignalOutcome::pass(
            LockdownState::ActiveViolation,
            Some((EventType::FullscreenExit, None)),
        ),
        EnvSignal::FullscreenChange { fullscreen: true } => SignalOutcome::pass(
            LockdownState::ActiveFullscreen,
            Some((EventType::FullscreenEnter, None)),
        ),

        EnvSignal::VisibilityChange { hidden: true } | EnvSignal::WindowBlur => {
            SignalOutcome::pass(state, Some((EventType::TabBlur, None)))
        }
        EnvSignal::VisibilityChange { hidden: false } | EnvSignal::WindowFocus => {
            SignalOutcome::pass(state, Some((EventType::TabFocus, None)))
        }

        EnvSignal::Copy | EnvSignal::Cut => {
            SignalOutcome::suppress(state, (EventType::CopyAttempt, None))
        }
        EnvSignal::Paste => SignalOutcome::suppress(state, (EventType::PasteAttempt, None)),
        EnvSignal::ContextMenu => {
            SignalOutcome::suppress(state, (EventType::RightClickAttempt, None))
        }

        EnvSignal::KeyDown(combo) => {
            if is_blocked_shortcut(combo) {
                SignalOutcome::suppress(
                    state,
                    (
                        EventType::DevtoolsAttempt,
                        Some(json!({ "combo": combo.label() })),
                    ),
                )
            } else {
                SignalOutcome::pass(state, None)
            }
        }
    }
}
