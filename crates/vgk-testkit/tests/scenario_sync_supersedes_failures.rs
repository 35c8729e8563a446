use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use vgk_clock::{ClockConfig, SessionClock};
use vgk_gateway::PersistenceGateway;
use vgk_store::LocalStateStore;
use vgk_telemetry::{EventPipeline, PipelineConfig};
use vgk_testkit::{FakeGateway, MemoryStateStore};

#[tokio::test]
async fn scenario_failed_sync_is_superseded_by_the_next_cycle() {
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
        pipeline,
        ClockConfig {
            tick_interval: Duration::from_secs(3600),
            sync_interval: Duration::from_secs(3600),
            drift_tolerance_ms: 2000,
        },
    );

    clock.init(session_id, 600, &[]).await.unwrap();
    assert_eq!(gateway.timer_writes(), vec![(session_id, 600)]);

    clock.tick_once(1_000);
    clock.tick_once(2_000);
    clock.tick_once(3_000);

    // The sync cycle hits a network failure: logged, not retried mid-cycle.
    gateway.set_timer_writes_failing(true);
    assert!(clock.sync_once().await);
    assert_eq!(gateway.timer_writes().len(), 1);

    // The next scheduled cycle carries the current value; nothing was lost.
    gateway.set_timer_writes_failing(false);
    assert!(clock.sync_once().await);
    assert_eq!(gateway.timer_writes().last(), Some(&(session_id, 597)));

    // One-directional: the remote mirror never feeds back into the clock.
    assert_eq!(clock.remaining_seconds(), Some(597));

    // After stop, the sync schedule winds down.
    clock.stop();
    assert!(!clock.sync_once().await);
}
