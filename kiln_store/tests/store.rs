use kiln_core::{Outcome, SessionRecorder, StateSnapshot};
use kiln_store::{KilnStore, MAX_SAMPLE_PAGE, StoreError};
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn store() -> KilnStore {
    KilnStore::open_in_memory().expect("open in-memory store")
}

#[rstest]
fn sessions_are_listed_newest_first(store: KilnStore) {
    let a = store
        .create_session(Some("cone6"), Some(100), Some(100), Outcome::Running)
        .unwrap();
    let b = store
        .create_session(Some("bisque"), Some(300), None, Outcome::Running)
        .unwrap();
    let c = store
        .create_session(None, Some(200), None, Outcome::Running)
        .unwrap();

    let ids: Vec<_> = store
        .list_sessions(10, 0)
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![b.clone(), c.clone(), a.clone()]);

    let page: Vec<_> = store
        .list_sessions(1, 1)
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(page, vec![c]);
}

#[rstest]
fn created_session_round_trips(store: KilnStore) {
    let id = store
        .create_session(Some("cone6"), Some(100), Some(101), Outcome::Running)
        .unwrap();
    assert_eq!(id.len(), 36, "uuid string: {id}");

    let s = store.get_session(&id).unwrap().expect("session exists");
    assert_eq!(s.created_at, 100);
    assert_eq!(s.started_at, Some(101));
    assert_eq!(s.ended_at, None);
    assert_eq!(s.profile_name.as_deref(), Some("cone6"));
    assert_eq!(s.outcome().unwrap(), Some(Outcome::Running));
    assert!(!s.is_ended());
}

#[rstest]
fn missing_session_is_none(store: KilnStore) {
    assert!(store.get_session("nope").unwrap().is_none());
    assert!(!store.stop_session("nope", Some(1), Outcome::Aborted).unwrap());
    assert!(!store.update_notes("nope", Some("x")).unwrap());
}

#[rstest]
fn session_stops_only_once(store: KilnStore) {
    let id = store
        .create_session(Some("p"), Some(10), Some(10), Outcome::Running)
        .unwrap();
    assert!(store.stop_session(&id, Some(50), Outcome::Completed).unwrap());
    assert!(!store.stop_session(&id, Some(90), Outcome::Aborted).unwrap());

    let s = store.get_session(&id).unwrap().unwrap();
    assert_eq!(s.ended_at, Some(50));
    assert_eq!(s.outcome().unwrap(), Some(Outcome::Completed));
}

#[rstest]
fn samples_filter_order_and_limit(store: KilnStore) {
    let id = store
        .create_session(Some("p"), Some(0), Some(0), Outcome::Running)
        .unwrap();
    for t in [5, 1, 3, 2, 4] {
        store
            .add_session_sample(&id, &json!({ "temperature": t * 10 }), Some(t))
            .unwrap();
    }

    let all = store.list_session_samples(&id, None, None, None).unwrap();
    let ts: Vec<_> = all.iter().map(|s| s.t).collect();
    assert_eq!(ts, vec![1, 2, 3, 4, 5]);
    assert_eq!(all[2].state["temperature"], 30);

    let mid = store
        .list_session_samples(&id, Some(2), Some(4), None)
        .unwrap();
    assert_eq!(mid.iter().map(|s| s.t).collect::<Vec<_>>(), vec![2, 3, 4]);

    let limited = store
        .list_session_samples(&id, Some(2), None, Some(2))
        .unwrap();
    assert_eq!(limited.iter().map(|s| s.t).collect::<Vec<_>>(), vec![2, 3]);

    assert!(
        store
            .list_session_samples("other", None, None, None)
            .unwrap()
            .is_empty()
    );
}

#[rstest]
fn oversized_sample_page_is_capped(store: KilnStore) {
    let id = store
        .create_session(None, Some(0), None, Outcome::Running)
        .unwrap();
    store.add_session_sample(&id, &json!({}), Some(1)).unwrap();
    let rows = store
        .list_session_samples(&id, None, None, Some(MAX_SAMPLE_PAGE * 10))
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[rstest]
fn same_second_sample_replaces_previous(store: KilnStore) {
    let id = store
        .create_session(None, Some(0), None, Outcome::Running)
        .unwrap();
    store
        .add_session_sample(&id, &json!({ "temperature": 1 }), Some(7))
        .unwrap();
    store
        .add_session_sample(&id, &json!({ "temperature": 2 }), Some(7))
        .unwrap();
    let rows = store.list_session_samples(&id, None, None, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].state["temperature"], 2);
}

#[rstest]
fn notes_can_be_set_after_the_session_ends(store: KilnStore) {
    let id = store
        .create_session(None, Some(0), None, Outcome::Running)
        .unwrap();
    store.stop_session(&id, Some(5), Outcome::Aborted).unwrap();
    assert!(store.update_notes(&id, Some("lid cracked")).unwrap());
    assert_eq!(
        store.get_session(&id).unwrap().unwrap().notes.as_deref(),
        Some("lid cracked")
    );
    assert!(store.update_notes(&id, None).unwrap());
    assert!(store.get_session(&id).unwrap().unwrap().notes.is_none());
}

#[rstest]
fn settings_upsert(store: KilnStore) {
    assert_eq!(store.get_setting::<f64>("kwh_rate").unwrap(), None);
    store.put_setting("kwh_rate", &0.1319).unwrap();
    store.put_setting("kwh_rate", &0.2).unwrap();
    assert_eq!(store.get_setting::<f64>("kwh_rate").unwrap(), Some(0.2));

    store
        .put_setting("ui", &json!({ "scale": "f", "dark": true }))
        .unwrap();
    let ui: serde_json::Value = store.get_setting("ui").unwrap().unwrap();
    assert_eq!(ui["dark"], true);
}

#[rstest]
fn mistyped_setting_is_a_json_error(store: KilnStore) {
    store.put_setting("name", "kiln").unwrap();
    assert!(matches!(
        store.get_setting::<u32>("name"),
        Err(StoreError::Json(_))
    ));
}

#[test]
fn reopening_keeps_data_and_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("kiln.sqlite3");

    let id = {
        let store = KilnStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        store
            .create_session(Some("p"), Some(1), Some(1), Outcome::Running)
            .unwrap()
    };

    let store = KilnStore::open(&path).unwrap();
    assert_eq!(
        store.schema_version().unwrap(),
        kiln_store::migrations::CURRENT_SCHEMA_VERSION
    );
    assert!(store.get_session(&id).unwrap().is_some());
}

#[test]
fn deleting_a_session_cascades_to_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiln.sqlite3");
    let store = KilnStore::open(&path).unwrap();
    let id = store
        .create_session(None, Some(0), None, Outcome::Running)
        .unwrap();
    store.add_session_sample(&id, &json!({}), Some(1)).unwrap();
    drop(store);

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    conn.execute("DELETE FROM sessions WHERE id = ?1", [&id])
        .unwrap();
    let left: i64 = conn
        .query_row("SELECT COUNT(*) FROM session_samples", [], |r| r.get(0))
        .unwrap();
    assert_eq!(left, 0);
}

#[rstest]
fn works_as_a_session_recorder(store: KilnStore) {
    let rec: &dyn SessionRecorder = &store;
    let id = rec
        .create_session(Some("cone6"), Some(10), Some(10), Outcome::Running)
        .unwrap();
    let snap = StateSnapshot {
        temperature: 123.0,
        ..StateSnapshot::default()
    };
    rec.add_session_sample(&id, &snap, Some(11)).unwrap();
    assert!(rec.stop_session(&id, Some(12), Outcome::Completed).unwrap());

    let rows = store.list_session_samples(&id, None, None, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].state["temperature"], 123.0);
}
