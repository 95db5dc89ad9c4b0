//! # History Sink Tests

mod common;

use askdb::{HistorySink, JsonlHistorySink, QueryAttempt, QueryStatus};
use common::setup_tracing;
use tempfile::tempdir;

#[tokio::test]
async fn test_jsonl_sink_appends_one_line_per_attempt() {
    setup_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("history.jsonl");
    let sink = JsonlHistorySink::new(&path);

    let success = QueryAttempt::succeeded(
        "user-1",
        "conn-1",
        "How many orders?",
        "SELECT COUNT(*) FROM orders".to_string(),
        12,
        1,
    );
    let failure = QueryAttempt::failed(
        "user-1",
        "conn-1",
        "Drop everything",
        Some("SELECT 1; DROP TABLE orders".to_string()),
        "Unsafe query generated: forbidden keyword DROP".to_string(),
    );
    sink.record(&success).await.unwrap();
    sink.record(&failure).await.unwrap();

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: QueryAttempt = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first, success);
    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["status"], "error");
    assert_eq!(second["generated_sql"], "SELECT 1; DROP TABLE orders");
    assert!(second["row_count"].is_null());
    assert_eq!(first.status, QueryStatus::Success);
}

#[tokio::test]
async fn test_unwritable_path_is_a_history_error() {
    setup_tracing();
    let dir = tempdir().unwrap();
    // A directory cannot be opened for appending.
    let sink = JsonlHistorySink::new(dir.path());
    let attempt = QueryAttempt::failed("u", "c", "q", None, "boom".to_string());

    let err = sink.record(&attempt).await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to record query history"));
}
