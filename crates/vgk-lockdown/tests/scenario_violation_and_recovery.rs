use vgk_lockdown::{apply_signal, EnvSignal, LockdownState, SignalDisposition};
use vgk_schemas::EventType;

#[test]
fn scenario_fullscreen_exit_is_a_violation_and_reentry_recovers() {
    let st = LockdownState::ActiveFullscreen;

    let exit = apply_signal(st, &EnvSignal::FullscreenChange { fullscreen: false });
    assert_eq!(exit.next, LockdownState::ActiveViolation);
    assert_eq!(exit.event.as_ref().unwrap().0, EventType::FullscreenExit);

    let reenter = apply_signal(exit.next, &EnvSignal::FullscreenChange { fullscreen: true });
    assert_eq!(reenter.next, LockdownState::ActiveFullscreen);
    assert_eq!(reenter.event.as_ref().unwrap().0, EventType::FullscreenEnter);
}

#[test]
fn scenario_blur_and_focus_leave_fullscreen_state_alone() {
    let st = LockdownState::ActiveViolation;

    for (signal, expected) in [
        (EnvSignal::VisibilityChange { hidden: true }, EventType::TabBlur),
        (EnvSignal::WindowBlur, EventType::TabBlur),
        (EnvSignal::VisibilityChange { hidden: false }, EventType::TabFocus),
        (EnvSignal::WindowFocus, EventType::TabFocus),
    ] {
        let o = apply_signal(st, &signal);
        assert_eq!(o.next, st, "{signal:?} must not change lockdown state");
        assert_eq!(o.event.as_ref().unwrap().0, expected);
        assert_eq!(o.disposition, SignalDisposition::Allow);
    }
}

#[test]
fn scenario_interaction_signals_are_suppressed_and_logged() {
    let st = LockdownState::ActiveFullscreen;

    for (signal, expected) in [
        (EnvSignal::Copy, EventType::CopyAttempt),
        (EnvSignal::Cut, EventType::CopyAttempt),
        (EnvSignal::Paste, EventType::PasteAttempt),
        (EnvSignal::ContextMenu, EventType::RightClickAttempt),
    ] {
        let o = apply_signal(st, &signal);
        assert_eq!(o.disposition, SignalDisposition::Suppress, "{signal:?}");
        assert_eq!(o.event.as_ref().unwrap().0, expected);
        assert_eq!(o.next, st);
    }
}

#[test]
fn scenario_inactive_monitor_neither_logs_nor_suppresses() {
    for signal in [
        EnvSignal::FullscreenChange { fullscreen: false },
        EnvSignal::Copy,
        EnvSignal::ContextMenu,
        EnvSignal::WindowBlur,
    ] {
        let o = apply_signal(LockdownState::Inactive, &signal);
        assert_eq!(o.next, LockdownState::Inactive);
        assert!(o.event.is_none());
        assert_eq!(o.disposition, SignalDisposition::Allow);
    }
}
