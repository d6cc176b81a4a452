//! InstrumentedPersistentState over a real SqliteState

use std::sync::Arc;

use sysdebug_core::error::StateError;
use sysdebug_core::logging::{Level, Value};
use sysdebug_core::port::logger::mocks::MemoryLogger;
use sysdebug_core::port::PersistentState;
use sysdebug_core::InstrumentedPersistentState;
use sysdebug_infra_sqlite::SqliteState;

async fn setup() -> (Arc<MemoryLogger>, InstrumentedPersistentState) {
    let logger = Arc::new(MemoryLogger::new());
    let state = SqliteState::open("sqlite::memory:").await.unwrap();
    let state = InstrumentedPersistentState::new(Arc::new(state), logger.clone());
    (logger, state)
}

/// for_each over A, B, C whose callback fails at B
#[tokio::test]
async fn test_for_each_stops_at_failing_element() {
    let (logger, state) = setup().await;
    for key in ["A", "B", "C"] {
        state.set(b"bucket", key.as_bytes(), b"v").await.unwrap();
    }
    logger.clear();

    let result = state
        .for_each(b"bucket", &mut |key: &[u8], _: &[u8]| {
            if key == b"B" {
                return Err(StateError::Callback("bad entry".to_string()));
            }
            Ok(())
        })
        .await;

    assert_eq!(result, Err(StateError::Callback("bad entry".to_string())));

    let records = logger.records();
    assert_eq!(records.len(), 3, "A, B and the summary; C is never visited");
    assert_eq!(records[0].get("key"), Some(&Value::Bytes(b"A".to_vec())));
    assert_eq!(records[0].level, Level::Info);
    assert_eq!(records[1].get("key"), Some(&Value::Bytes(b"B".to_vec())));
    assert_eq!(records[1].level, Level::Error);
    assert_eq!(records[2].keys(), vec!["bucket", "err"]);

    println!("✅ for_each stopped at B and propagated the callback error");
}

/// Values survive reopening a file-backed database
#[tokio::test]
async fn test_persistence_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("state.db").display());

    {
        let state = SqliteState::open(&url).await.unwrap();
        state
            .set(b"scriptState", b"hash", b"{\"name\":\"run_once.sh\"}")
            .await
            .unwrap();
        state.close().await.unwrap();
    }

    let logger = Arc::new(MemoryLogger::new());
    let state = InstrumentedPersistentState::new(
        Arc::new(SqliteState::open(&url).await.unwrap()),
        logger.clone(),
    );
    let value = state.get(b"scriptState", b"hash").await.unwrap();
    assert_eq!(value.as_deref(), Some(&b"{\"name\":\"run_once.sh\"}"[..]));

    let record = logger.last().unwrap();
    assert_eq!(record.message, "Get");
    assert_eq!(record.keys(), vec!["bucket", "key", "value"]);
}

/// copy_to between two databases, then data() on the destination
#[tokio::test]
async fn test_copy_to_and_data() {
    let (logger, source) = setup().await;
    source.set(b"entryState", b"/a", b"1").await.unwrap();
    source.set(b"entryState", b"/b", b"2").await.unwrap();
    source.set(b"configState", b"configState", b"{}").await.unwrap();

    let dest = SqliteState::open("sqlite::memory:").await.unwrap();
    source.copy_to(&dest).await.unwrap();

    assert_eq!(
        dest.data().await.unwrap(),
        serde_json::json!({
            "configState": {"configState": "{}"},
            "entryState": {"/a": "1", "/b": "2"},
        })
    );
    assert_eq!(logger.last().unwrap().to_string(), "CopyTo");

    let data = source.data().await.unwrap();
    assert_eq!(logger.last().unwrap().get("data"), Some(&Value::Json(data)));
}

/// Errors from a closed database pass through and are logged at error level
#[tokio::test]
async fn test_closed_database_errors_pass_through() {
    let (logger, state) = setup().await;
    state.close().await.unwrap();

    let err = state.set(b"b", b"k", b"v").await.unwrap_err();
    assert!(matches!(err, StateError::Database(_)));

    let record = logger.last().unwrap();
    assert_eq!(record.message, "Set");
    assert_eq!(record.level, Level::Error);
    assert_eq!(record.get("err"), Some(&Value::Str(err.to_string())));
}
