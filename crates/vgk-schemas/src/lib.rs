use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Integrity event taxonomy. Wire tags are SCREAMING_SNAKE_CASE to match the
/// `event_logs.event_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    TimerStarted,
    TimerWarning,
    TimerPaused,
    TimerResumed,
    TimerExpired,
    AutoSubmit,
    FullscreenExit,
    FullscreenEnter,
    TabBlur,
    TabFocus,
    CopyAttempt,
    PasteAttempt,
    RightClickAttempt,
    DevtoolsAttempt,
    AssessmentStarted,
    AssessmentSubmitted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TimerStarted => "TIMER_STARTED",
            EventType::TimerWarning => "TIMER_WARNING",
            EventType::TimerPaused => "TIMER_PAUSED",
            EventType::TimerResumed => "TIMER_RESUMED",
            EventType::TimerExpired => "TIMER_EXPIRED",
            EventType::AutoSubmit => "AUTO_SUBMIT",
            EventType::FullscreenExit => "FULLSCREEN_EXIT",
            EventType::FullscreenEnter => "FULLSCREEN_ENTER",
            EventType::TabBlur => "TAB_BLUR",
            EventType::TabFocus => "TAB_FOCUS",
            EventType::CopyAttempt => "COPY_ATTEMPT",
            EventType::PasteAttempt => "PASTE_ATTEMPT",
            EventType::RightClickAttempt => "RIGHT_CLICK_ATTEMPT",
            EventType::DevtoolsAttempt => "DEVTOOLS_ATTEMPT",
            EventType::AssessmentStarted => "ASSESSMENT_STARTED",
            EventType::AssessmentSubmitted => "ASSESSMENT_SUBMITTED",
        }
    }

    /// The single terminal type: still accepted (once) after the pipeline
    /// has been stopped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::AssessmentSubmitted)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One integrity event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityEvent {
    pub event_type: EventType,
    pub client_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl IntegrityEvent {
    pub fn new(event_type: EventType, client_timestamp: DateTime<Utc>, metadata: Option<Value>) -> Self {
        Self {
            event_type,
            client_timestamp,
            metadata,
        }
    }
}

/// Remote mirror of a session countdown. Written one-directionally by the
/// clock; read once at init for resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub session_id: Uuid,
    pub remaining_seconds: u32,
    pub synced_at: DateTime<Utc>,
}

/// Local mirror under the `timer_local` key for same-device resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalTimerState {
    pub remaining_seconds: u32,
    pub saved_at: DateTime<Utc>,
}

/// Attempt lifecycle status as stored by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "IN_PROGRESS",
            AttemptStatus::Submitted => "SUBMITTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_wire_tags_match_as_str() {
        for et in [
            EventType::TimerStarted,
            EventType::TimerWarning,
            EventType::TimerExpired,
            EventType::AutoSubmit,
            EventType::FullscreenExit,
            EventType::TabBlur,
            EventType::CopyAttempt,
            EventType::RightClickAttempt,
            EventType::AssessmentSubmitted,
        ] {
            let wire = serde_json::to_string(&et).unwrap();
            assert_eq!(wire, format!("\"{}\"", et.as_str()));
        }
    }

    #[test]
    fn metadata_is_omitted_when_absent() {
        let ev = IntegrityEvent::new(EventType::TabBlur, Utc::now(), None);
        let v = serde_json::to_value(&ev).unwrap();
        assert!(v.get("metadata").is_none());
        assert_eq!(v["event_type"], "TAB_BLUR");
    }

    #[test]
    fn only_assessment_submitted_is_terminal() {
        assert!(EventType::AssessmentSubmitted.is_terminal());
        assert!(!EventType::TimerExpired.is_terminal());
        assert!(!EventType::AssessmentStarted.is_terminal());
    }
}
