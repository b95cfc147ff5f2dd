//! Database-backed checks: metrics backlog, stalled downloads and dynamic lists.

mod common;

use carta_monitor::alerts::AlertKind;
use carta_monitor::checks::dynamic_lists::check_dynamic_lists;
use carta_monitor::checks::file_download::check_file_downloads;
use carta_monitor::checks::metrics_processing::check_metrics_processing;
use carta_monitor::entity::{event, file_download, lm_list};
use common::{AlertCall, RecordingSink, setup_db};
use sea_orm::{ActiveValue::NotSet, DatabaseConnection, EntityTrait, Set};
use time::macros::{datetime, offset};
use time::{Duration, OffsetDateTime, UtcOffset};

async fn insert_events(db: &DatabaseConnection, count: usize, at: OffsetDateTime) {
    let rows = (0..count).map(|i| event::ActiveModel {
        id: NotSet,
        event_type: Set(format!("open-{i}")),
        created_time: Set(at),
    });
    event::Entity::insert_many(rows)
        .exec_without_returning(db)
        .await
        .expect("insert events");
}

async fn insert_download(
    db: &DatabaseConnection,
    list_name: &str,
    user_name: &str,
    status: &str,
    created_time: OffsetDateTime,
) {
    file_download::Entity::insert(file_download::ActiveModel {
        id: NotSet,
        list_name: Set(list_name.to_string()),
        user_name: Set(user_name.to_string()),
        status: Set(status.to_string()),
        created_time: Set(created_time),
    })
    .exec_without_returning(db)
    .await
    .expect("insert download");
}

struct ListRow {
    name: &'static str,
    list_type: &'static str,
    autorun_time: Option<&'static str>,
    message: Option<&'static str>,
    updated_time: OffsetDateTime,
}

impl ListRow {
    fn dynamic(name: &'static str, updated_time: OffsetDateTime) -> Self {
        Self {
            name,
            list_type: lm_list::LIST_TYPE_DYNAMIC,
            autorun_time: None,
            message: None,
            updated_time,
        }
    }
}

async fn insert_lists(db: &DatabaseConnection, rows: Vec<ListRow>) {
    let models = rows.into_iter().map(|row| lm_list::ActiveModel {
        id: NotSet,
        name: Set(row.name.to_string()),
        list_type: Set(row.list_type.to_string()),
        enabled: Set(true),
        autorun: Set(true),
        autorun_time: Set(row.autorun_time.map(str::to_string)),
        message: Set(row.message.map(str::to_string)),
        updated_time: Set(row.updated_time),
    });
    lm_list::Entity::insert_many(models)
        .exec_without_returning(db)
        .await
        .expect("insert lists");
}

#[tokio::test]
async fn test_metrics_backlog_at_threshold_raises_alert() {
    let db = setup_db().await;
    insert_events(&db, 3, datetime!(2024-06-01 11:00 UTC)).await;

    let sink = RecordingSink::new();
    let backlog = check_metrics_processing(&db, &sink, 3)
        .await
        .expect("check succeeds");

    assert_eq!(backlog.events, 3);
    assert!(backlog.above_threshold);
    assert_eq!(
        sink.calls(),
        vec![AlertCall::Create {
            kind: AlertKind::MetricsProcessingAboveThreshold,
            detail: Some("3 pending events (threshold 3)".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_metrics_backlog_below_threshold_closes_alert() {
    let db = setup_db().await;
    insert_events(&db, 2, datetime!(2024-06-01 11:00 UTC)).await;

    let sink = RecordingSink::with_open(&[AlertKind::MetricsProcessingAboveThreshold]);
    let backlog = check_metrics_processing(&db, &sink, 3)
        .await
        .expect("check succeeds");

    assert!(!backlog.above_threshold);
    assert_eq!(
        sink.calls(),
        vec![AlertCall::Close(AlertKind::MetricsProcessingAboveThreshold)]
    );
    assert!(!sink.is_open(AlertKind::MetricsProcessingAboveThreshold));
}

#[tokio::test]
async fn test_only_old_submitted_downloads_are_stalled() {
    let db = setup_db().await;
    let now = datetime!(2024-06-01 12:00 UTC);
    insert_download(&db, "donors", "alice", "submitted", now - Duration::minutes(20)).await;
    insert_download(&db, "fresh", "bob", "submitted", now - Duration::minutes(5)).await;
    insert_download(&db, "finished", "carol", "complete", now - Duration::minutes(30)).await;

    let sink = RecordingSink::new();
    let stalled = check_file_downloads(&db, &sink, Duration::minutes(15), now)
        .await
        .expect("check succeeds");

    assert_eq!(stalled.stalled, vec!["list: donors user: alice".to_string()]);
    assert_eq!(
        sink.calls(),
        vec![AlertCall::Create {
            kind: AlertKind::FileDownloadProcessingDelay,
            detail: Some("1 file(s) currently processing: list: donors user: alice".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_no_stalled_downloads_closes_alert() {
    let db = setup_db().await;
    let now = datetime!(2024-06-01 12:00 UTC);
    insert_download(&db, "fresh", "bob", "submitted", now - Duration::minutes(5)).await;

    let sink = RecordingSink::with_open(&[AlertKind::FileDownloadProcessingDelay]);
    let stalled = check_file_downloads(&db, &sink, Duration::minutes(15), now)
        .await
        .expect("check succeeds");

    assert!(stalled.stalled.is_empty());
    assert_eq!(
        sink.calls(),
        vec![AlertCall::Close(AlertKind::FileDownloadProcessingDelay)]
    );
}

#[tokio::test]
async fn test_tardy_dynamic_lists_are_split_by_schedule() {
    let db = setup_db().await;
    // Window is 2024-05-01 10:15..10:30 UTC.
    let now = datetime!(2024-05-02 12:07 UTC);
    let in_window = datetime!(2024-05-01 10:20 UTC);
    insert_lists(
        &db,
        vec![
            ListRow::dynamic("auto-missed", in_window),
            ListRow {
                autorun_time: Some(""),
                ..ListRow::dynamic("auto-empty-time", in_window)
            },
            ListRow {
                autorun_time: Some("1020"),
                ..ListRow::dynamic("sched-missed", in_window)
            },
            ListRow {
                autorun_time: Some("1800"),
                ..ListRow::dynamic("sched-later", in_window)
            },
            ListRow {
                message: Some("Elasticsearch exception: index closed"),
                ..ListRow::dynamic("search-failure", in_window)
            },
            ListRow {
                list_type: "STATIC",
                ..ListRow::dynamic("static", in_window)
            },
            ListRow::dynamic("ran-today", datetime!(2024-05-02 10:20 UTC)),
        ],
    )
    .await;

    let sink = RecordingSink::new();
    let report = check_dynamic_lists(&db, &sink, UtcOffset::UTC, now)
        .await
        .expect("check succeeds");

    assert_eq!(report.automatic, vec!["auto-empty-time", "auto-missed"]);
    assert_eq!(report.scheduled, vec!["sched-missed"]);
    assert_eq!(
        sink.calls(),
        vec![
            AlertCall::Create {
                kind: AlertKind::AutomaticDynamicList,
                detail: Some(
                    "Auto-running dynamic list(s) failed to run: auto-empty-time,auto-missed"
                        .to_string()
                ),
            },
            AlertCall::Create {
                kind: AlertKind::ScheduledDynamicList,
                detail: Some("Scheduled dynamic list(s) failed to run: sched-missed".to_string()),
            },
        ]
    );
}

#[tokio::test]
async fn test_dynamic_lists_window_follows_scheduler_offset() {
    let db = setup_db().await;
    // 16:07 UTC is 12:07 at -04:00, so the window is 10:15..10:30 local.
    let now = datetime!(2024-05-02 16:07 UTC);
    insert_lists(
        &db,
        vec![ListRow {
            autorun_time: Some("1015"),
            ..ListRow::dynamic("sched-local", datetime!(2024-05-01 14:15 UTC))
        }],
    )
    .await;

    let sink = RecordingSink::new();
    let report = check_dynamic_lists(&db, &sink, offset!(-4), now)
        .await
        .expect("check succeeds");

    assert!(report.automatic.is_empty());
    assert_eq!(report.scheduled, vec!["sched-local"]);
    assert_eq!(
        sink.calls()[0],
        AlertCall::Close(AlertKind::AutomaticDynamicList)
    );
}

#[tokio::test]
async fn test_no_tardy_lists_closes_both_alerts() {
    let db = setup_db().await;
    let sink = RecordingSink::with_open(&[
        AlertKind::AutomaticDynamicList,
        AlertKind::ScheduledDynamicList,
    ]);

    let report = check_dynamic_lists(&db, &sink, UtcOffset::UTC, datetime!(2024-05-02 12:07 UTC))
        .await
        .expect("check succeeds");

    assert!(report.automatic.is_empty() && report.scheduled.is_empty());
    assert!(!sink.is_open(AlertKind::AutomaticDynamicList));
    assert!(!sink.is_open(AlertKind::ScheduledDynamicList));
}
