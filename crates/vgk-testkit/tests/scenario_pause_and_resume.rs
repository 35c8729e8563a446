use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use vgk_clock::{ClockConfig, ClockStatus, SessionClock};
use vgk_gateway::PersistenceGateway;
use vgk_schemas::EventType;
use vgk_store::LocalStateStore;
use vgk_telemetry::{EventPipeline, PipelineConfig};
use vgk_testkit::{FakeGateway, MemoryStateStore};

#[tokio::test]
async fn scenario_paused_countdown_holds_until_resumed() {
    let gateway = Arc::new(FakeGateway::new());
    let store = Arc::new(MemoryStateStore::new());
    let session_id = Uuid::new_v4();

    let pipeline = EventPipeline::start(
        session_id,
        Arc::clone(&gateway) as Arc<dyn PersistenceGateway>,
        Arc::clone(&store) as Arc<dyn LocalStateStore>,
        PipelineConfig {
            flush_interval: Duration::from_secs(3600),
            flush_threshold: 1000,
        },
    );
    let clock = SessionClock::new(
        Arc::clone(&gateway) as Arc<dyn PersistenceGateway>,
        store as Arc<dyn LocalStateStore>,
        pipeline.clone(),
        ClockConfig {
            tick_interval: Duration::from_secs(3600),
            sync_interval: Duration::from_secs(3600),
            drift_tolerance_ms: 2000,
        },
    );

    clock.init(session_id, 600, &[]).await.unwrap();
    clock.tick_once(1_000);
    assert_eq!(clock.remaining_seconds(), Some(599));

    clock.pause();
    assert_eq!(clock.status(), Some(ClockStatus::Paused));

    // Ticks while paused neither decrement nor stop the schedule.
    assert!(clock.tick_once(2_000));
    assert!(clock.tick_once(3_000));
    assert_eq!(clock.remaining_seconds(), Some(599));

    // Pausing twice emits one pause event.
    clock.pause();

    clock.resume();
    assert_eq!(clock.status(), Some(ClockStatus::Running));
    clock.tick_once(60_000);
    assert_eq!(clock.remaining_seconds(), Some(598));

    pipeline.flush().await;
    let types = gateway.delivered_types();
    assert_eq!(
        types.iter().filter(|t| **t == EventType::TimerPaused).count(),
        1
    );
    assert_eq!(
        types.iter().filter(|t| **t == EventType::TimerResumed).count(),
        1
    );
}
