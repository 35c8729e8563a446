//! Lockdown monitor: enforces exclusive fullscreen presentation and turns
//! raw environment signals into integrity events.
//!
//! Deterrence, not a security boundary: clipboard and shortcut suppression
//! cannot catch invocation paths outside page-level capture.

mod engine;
mod monitor;

pub use engine::{apply_signal, is_blocked_shortcut, SignalOutcome, BLOCKED_SHORTCUTS};
pub use monitor::IntegrityMonitor;

/// Lockdown presentation state. Transient; held only by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockdownState {
    Inactive,
    ActiveFullscreen,
    ActiveViolation,
}

/// A keyboard chord as reported by the platform layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyCombo {
    pub fn label(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.shift {
            parts.push("Shift");
        }
        if self.alt {
            parts.push("Alt");
        }
        parts.push(&self.key);
        parts.join("+")
    }
}

/// Raw environment signal delivered by the platform adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSignal {
    FullscreenChange { fullscreen: bool },
    VisibilityChange { hidden: bool },
    WindowBlur,
    WindowFocus,
    Copy,
    Cut,
    Paste,
    ContextMenu,
    KeyDown(KeyCombo),
}

/// Whether the platform layer should cancel the underlying event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDisposition {
    Allow,
    Suppress,
}

/// Receives environment signals and answers with a disposition. Implemented
/// by the monitor; consumed by the platform adapter.
pub trait SignalHandler: Send + Sync {
    fn on_signal(&self, signal: EnvSignal) -> SignalDisposition;
}

/// Fullscreen request denied by the platform. Recoverable by user action
/// only; the monitor never auto-retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullscreenDenied {
    pub reason: String,
}

impl std::fmt::Display for FullscreenDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fullscreen request denied: {}", self.reason)
    }
}

impl std::error::Error for FullscreenDenied {}

/// Capability seam to the host platform. Implementations live outside the
/// core, one per target platform.
///
/// # Contract
/// `install` registers every hook (fullscreen, visibility, focus, clipboard,
/// context menu, keydown) against the given handler; `uninstall` removes
/// every hook `install` registered, symmetrically.
pub trait PlatformAdapter: Send + Sync {
    fn request_fullscreen(&self) -> Result<(), FullscreenDenied>;
    fn install(&self, handler: std::sync::Arc<dyn SignalHandler>);
    fn uninstall(&self);
}
