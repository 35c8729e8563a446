use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use vgk_config::{ClockSection, ProctorConfig, TelemetrySection};
use vgk_gateway::{AttemptRegistry, PersistenceGateway};
use vgk_lockdown::PlatformAdapter;
use vgk_schemas::EventType;
use vgk_session::{AssessmentSession, SessionPhase};
use vgk_store::LocalStateStore;
use vgk_testkit::{FakeGateway, FakePlatform, MemoryStateStore};

fn quiet_config() -> ProctorConfig {
    ProctorConfig {
        telemetry: TelemetrySection {
            flush_interval_secs: 3600,
            flush_threshold: 1000,
        },
        clock: ClockSection {
            tick_interval_ms: 3_600_000,
            sync_interval_secs: 3600,
            drift_tolerance_ms: 2000,
        },
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn scenario_expiry_drives_auto_submit_exactly_once() {
    let gateway = Arc::new(FakeGateway::new());
    let store = Arc::new(MemoryStateStore::new());
    let platform = Arc::new(FakePlatform::new());
    let session_id = Uuid::new_v4();

    let session = AssessmentSession::new(
        session_id,
        2,
        vec![],
        Arc::clone(&gateway) as Arc<dyn PersistenceGateway>,
        Arc::clone(&gateway) as Arc<dyn AttemptRegistry>,
        store as Arc<dyn LocalStateStore>,
        platform as Arc<dyn PlatformAdapter>,
        &quiet_config(),
    );

    session.start().await.unwrap();

    session.clock().tick_once(1_000);
    session.clock().tick_once(2_000);

    // Expiry schedules the auto-submit off the tick path.
    wait_until(|| session.phase() == SessionPhase::Submitted).await;
    wait_until(|| gateway.attempts_submitted().len() == 1).await;

    // Everything reached the audit trail, in emission order: the expiry,
    // then the auto-submit marker, then the terminal event.
    let types = gateway.delivered_types();
    let expired = types
        .iter()
        .position(|t| *t == EventType::TimerExpired)
        .unwrap();
    let auto = types.iter().position(|t| *t == EventType::AutoSubmit).unwrap();
    let submitted = types
        .iter()
        .position(|t| *t == EventType::AssessmentSubmitted)
        .unwrap();
    assert!(expired < auto && auto < submitted, "order was {types:?}");

    assert_eq!(
        types
            .iter()
            .filter(|t| **t == EventType::AssessmentSubmitted)
            .count(),
        1
    );
}
