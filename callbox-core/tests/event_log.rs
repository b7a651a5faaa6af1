//! Gate-unlock event log tests

use callbox_core::EventLog;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

fn setup_log() -> (EventLog, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let log = EventLog::new(temp_dir.path().join("events.json"));
    (log, temp_dir)
}

#[tokio::test]
async fn test_absent_log_is_created_empty() {
    let (log, _temp_dir) = setup_log();

    assert!(log.load_all().await.is_empty());
    assert_eq!(std::fs::read_to_string(log.path()).unwrap().trim(), "[]");
}

#[tokio::test]
async fn test_append_keeps_chronological_order() {
    let (log, _temp_dir) = setup_log();
    let first = Utc.with_ymd_and_hms(2026, 3, 1, 18, 30, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2026, 3, 2, 19, 5, 12).unwrap();

    log.append(first).await;
    log.append(second).await;

    let events = log.load_all().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].timestamp, first);
    assert_eq!(events[1].timestamp, second);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(log.path()).unwrap()).unwrap();
    assert_eq!(raw[0]["timestamp"], "2026-03-01T18:30:00Z");
}

#[tokio::test]
async fn test_wrong_shape_reads_as_empty() {
    let (log, _temp_dir) = setup_log();
    std::fs::write(log.path(), r#"{"timestamp": "2026-03-01T18:30:00Z"}"#).unwrap();

    assert!(log.load_all().await.is_empty());

    // The next append starts a fresh list and keeps the old content aside.
    log.append(Utc::now()).await;
    assert_eq!(log.load_all().await.len(), 1);
    assert_eq!(corrupt_copies(&log).len(), 1);
}

fn corrupt_copies(log: &EventLog) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(log.path().parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.to_string_lossy().contains("events.json.corrupt-"))
        .collect()
}

#[tokio::test]
async fn test_append_to_truncated_log_keeps_old_bytes() {
    let (log, _temp_dir) = setup_log();
    let truncated = r#"[{"timestamp": "2026-03-01T18:30:00Z"}, {"timesta"#;
    std::fs::write(log.path(), truncated).unwrap();

    log.append(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()).await;

    let copies = corrupt_copies(&log);
    assert_eq!(copies.len(), 1);
    assert_eq!(std::fs::read_to_string(&copies[0]).unwrap(), truncated);
    let events = log.load_all().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].timestamp, Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap());
}

#[tokio::test]
async fn test_unparseable_log_reads_as_empty() {
    let (log, _temp_dir) = setup_log();
    std::fs::write(log.path(), "not json at all").unwrap();

    assert!(log.load_all().await.is_empty());
}
