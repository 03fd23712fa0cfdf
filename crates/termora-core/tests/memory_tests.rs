use jiff::{SignedDuration, Timestamp};
use termora_core::{
    Database, MemoryStore, Store,
    models::{NewCommandRecord, Outcome, RecordFilter, StepKind},
};

mod common;
use common::create_test_store;

fn record(intent: &str, payload: &str, project: Option<&str>) -> NewCommandRecord {
    NewCommandRecord {
        intent: intent.to_string(),
        plan_id: None,
        step_id: None,
        step_kind: StepKind::ShellCommand,
        payload: payload.to_string(),
        directory: "/work".to_string(),
        project: project.map(str::to_string),
        tags: Vec::new(),
        outcome: Outcome::Success,
        exit_code: Some(0),
        output: String::new(),
        duration_ms: Some(5),
    }
}

async fn seed(store: &Store, count: usize) {
    for i in 0..count {
        store
            .append(record(&format!("intent {i}"), &format!("echo {i}"), None))
            .await
            .expect("Failed to append record");
    }
}

#[tokio::test]
async fn test_append_assigns_ids_and_timestamps() {
    let (_temp_dir, store, _work) = create_test_store().await;
    let before = Timestamp::now();

    let first = store
        .append(record("list files", "ls -la", Some("widgets")))
        .await
        .expect("Failed to append record");
    let second = store
        .append(record("show disk usage", "df -h", None))
        .await
        .expect("Failed to append record");

    assert!(second.id > first.id);
    assert!(first.recorded_at >= before - SignedDuration::from_secs(1));
    assert_eq!(first.project.as_deref(), Some("widgets"));

    let history = store
        .query(RecordFilter::recent(10))
        .await
        .expect("Failed to query history");
    let payloads: Vec<_> = history.iter().map(|r| r.payload.as_str()).collect();
    assert_eq!(payloads, vec!["df -h", "ls -la"]);
}

#[tokio::test]
async fn test_cursor_pages_lazily_and_restarts() {
    let (_temp_dir, store, _work) = create_test_store().await;
    seed(&store, 7).await;

    let db = Database::new(store.db_path()).expect("Failed to open database");
    let mut cursor = db.history(&RecordFilter::default()).with_page_size(3);

    let first_pass: Vec<u64> = cursor
        .by_ref()
        .map(|record| record.expect("Failed to read record").id)
        .collect();
    assert_eq!(first_pass.len(), 7);
    assert!(first_pass.windows(2).all(|pair| pair[0] > pair[1]));
    assert!(cursor.next().is_none());

    cursor.restart();
    let again: Vec<u64> = cursor
        .take(2)
        .map(|record| record.expect("Failed to read record").id)
        .collect();
    assert_eq!(again, first_pass[..2].to_vec());
}

#[tokio::test]
async fn test_cursor_ignores_records_appended_while_iterating() {
    let (_temp_dir, store, _work) = create_test_store().await;
    seed(&store, 4).await;

    let db = Database::new(store.db_path()).expect("Failed to open database");
    let mut cursor = db.history(&RecordFilter::default()).with_page_size(2);
    let newest = cursor
        .next()
        .expect("History should not be empty")
        .expect("Failed to read record");

    store
        .append(record("late", "echo late", None))
        .await
        .expect("Failed to append record");

    let rest: Vec<_> = cursor
        .map(|record| record.expect("Failed to read record"))
        .collect();
    assert_eq!(rest.len(), 3);
    assert!(rest.iter().all(|r| r.id < newest.id));
}

#[tokio::test]
async fn test_limit_and_project_filters() {
    let (_temp_dir, store, _work) = create_test_store().await;
    seed(&store, 5).await;
    store
        .append(record("build widgets", "cargo build", Some("widgets")))
        .await
        .expect("Failed to append record");
    store
        .append(record("test gadgets", "cargo test", Some("gadgets")))
        .await
        .expect("Failed to append record");

    let limited = store
        .query(RecordFilter::recent(3))
        .await
        .expect("Failed to query history");
    assert_eq!(limited.len(), 3);

    let widgets = store
        .query(RecordFilter::default().in_project(Some("widgets".to_string())))
        .await
        .expect("Failed to query history");
    assert_eq!(widgets.len(), 1);
    assert_eq!(widgets[0].payload, "cargo build");
}

#[tokio::test]
async fn test_time_window_filters() {
    let (_temp_dir, store, _work) = create_test_store().await;
    seed(&store, 2).await;

    let future = RecordFilter {
        since: Some(Timestamp::now() + SignedDuration::from_hours(1)),
        ..Default::default()
    };
    assert!(store.query(future).await.expect("Failed to query").is_empty());

    let past = RecordFilter {
        until: Some(Timestamp::now() - SignedDuration::from_hours(1)),
        ..Default::default()
    };
    assert!(store.query(past).await.expect("Failed to query").is_empty());

    let window = RecordFilter {
        since: Some(Timestamp::now() - SignedDuration::from_hours(1)),
        until: Some(Timestamp::now() + SignedDuration::from_hours(1)),
        ..Default::default()
    };
    assert_eq!(store.query(window).await.expect("Failed to query").len(), 2);
}

#[tokio::test]
async fn test_similarity_query_ranks_related_commands() {
    let (_temp_dir, store, _work) = create_test_store().await;
    for (intent, payload) in [
        ("compress the log files", "tar czf logs.tar.gz logs/"),
        ("show disk usage", "du -sh ."),
        ("delete old log files", "find logs -mtime +30 -delete"),
        ("list docker containers", "docker ps"),
    ] {
        store
            .append(record(intent, payload, None))
            .await
            .expect("Failed to append record");
    }

    let similar = store
        .query(RecordFilter::similar_to("compress log files", 5))
        .await
        .expect("Failed to query history");
    assert_eq!(similar.len(), 2);
    assert_eq!(similar[0].payload, "tar czf logs.tar.gz logs/");
    assert_eq!(similar[1].payload, "find logs -mtime +30 -delete");

    let none = store
        .query(RecordFilter::similar_to("kubernetes", 5))
        .await
        .expect("Failed to query history");
    assert!(none.is_empty());
}
