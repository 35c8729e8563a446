use std::sync::Arc;

use uuid::Uuid;
use vgk_config::{ClockSection, ProctorConfig, TelemetrySection};
use vgk_gateway::{AttemptRegistry, PersistenceGateway};
use vgk_lockdown::PlatformAdapter;
use vgk_session::{AssessmentSession, SessionPhase};
use vgk_store::{LocalStateStore, KEY_PENDING_EVENTS};
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

#[tokio::test]
async fn scenario_reset_tears_down_and_clears_the_local_queue() {
    let gateway = Arc::new(FakeGateway::new());
    let store = Arc::new(MemoryStateStore::new());
    let platform = Arc::new(FakePlatform::new());
    let session_id = Uuid::new_v4();

    // Backend down: everything logged stays queued locally.
    gateway.set_inserts_failing(true);

    let session = AssessmentSession::new(
        session_id,
        600,
        vec![],
        Arc::clone(&gateway) as Arc<dyn PersistenceGateway>,
        Arc::clone(&gateway) as Arc<dyn AttemptRegistry>,
        Arc::clone(&store) as Arc<dyn LocalStateStore>,
        Arc::clone(&platform) as Arc<dyn PlatformAdapter>,
        &quiet_config(),
    );

    session.start().await.unwrap();
    assert!(store.contains(KEY_PENDING_EVENTS));
    assert!(session.pipeline().queue_len() > 0);

    // Deliberate teardown: the queue is cleared without delivery.
    session.reset().await;
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert!(!store.contains(KEY_PENDING_EVENTS));
    assert_eq!(platform.uninstall_count(), 1);
    assert!(session.pipeline().is_stopped());
    assert!(gateway.delivered_batches().is_empty());
}
