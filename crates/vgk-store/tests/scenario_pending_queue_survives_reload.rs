use chrono::Utc;
use vgk_schemas::{EventType, IntegrityEvent};
use vgk_store::{
    load_pending_events, load_timer_local, save_pending_events, save_timer_local, FileStateStore,
    LocalStateStore, KEY_PENDING_EVENTS,
};

#[test]
fn scenario_pending_queue_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let queue = vec![
        IntegrityEvent::new(EventType::AssessmentStarted, Utc::now(), None),
        IntegrityEvent::new(
            EventType::TabBlur,
            Utc::now(),
            Some(serde_json::json!({"reason": "window blur"})),
        ),
    ];

    {
        let store = FileStateStore::new(dir.path()).unwrap();
        save_pending_events(&store, &queue);
    }

    // Fresh store over the same directory simulates a reload.
    let store = FileStateStore::new(dir.path()).unwrap();
    let restored = load_pending_events(&store);
    assert_eq!(restored, queue);
}

#[test]
fn scenario_malformed_queue_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path()).unwrap();
    store.put(KEY_PENDING_EVENTS, "{not json");

    let restored = load_pending_events(&store);
    assert!(restored.is_empty());
}

#[test]
fn scenario_timer_local_roundtrip_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path()).unwrap();

    assert!(load_timer_local(&store).is_none());

    let state = vgk_schemas::LocalTimerState {
        remaining_seconds: 120,
        saved_at: Utc::now(),
    };
    save_timer_local(&store, &state);
    assert_eq!(load_timer_local(&store), Some(state));

    store.remove(vgk_store::KEY_TIMER_LOCAL);
    assert!(load_timer_local(&store).is_none());
}
