//! Send-delay detection per category.

mod common;

use carta_monitor::alerts::{AlertKind, Priority};
use carta_monitor::checks::send_delay::{
    DelayThresholds, DelayVerdict, check_send_delays, find_most_recent_send,
};
use carta_monitor::entity::nl_send::{self, SendCategory};
use common::{AlertCall, RecordingSink, SendRow, insert_sends, setup_db};
use time::Duration;
use time::macros::datetime;

fn thresholds() -> DelayThresholds {
    DelayThresholds {
        p2: Duration::minutes(15),
        p1: Duration::minutes(30),
    }
}

fn personalized(id: &'static str, done: time::OffsetDateTime) -> SendRow {
    SendRow::new(id, done - Duration::minutes(5))
        .category(nl_send::QUEUE_TAG_NEWSLETTER, Some(true))
        .done_at(done)
}

#[tokio::test]
async fn test_sixteen_minutes_creates_without_escalating() {
    let db = setup_db().await;
    let now = datetime!(2024-06-01 12:00 UTC);
    insert_sends(&db, vec![personalized("p1", now - Duration::minutes(16))]).await;

    let sink = RecordingSink::new();
    let results = check_send_delays(&db, &sink, &thresholds(), now)
        .await
        .expect("check succeeds");

    let personalized_result = results
        .iter()
        .find(|r| r.category == SendCategory::Personalized)
        .expect("personalized result");
    assert_eq!(personalized_result.verdict, Some(DelayVerdict::Delayed));
    assert_eq!(personalized_result.minutes_since_last_send, Some(16));

    let calls = sink.calls_for(AlertKind::PersonalizedSendDelay);
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], AlertCall::Create { .. }));
}

#[tokio::test]
async fn test_thirty_one_minutes_creates_and_escalates_to_p1() {
    let db = setup_db().await;
    let now = datetime!(2024-06-01 12:00 UTC);
    insert_sends(&db, vec![personalized("p1", now - Duration::minutes(31))]).await;

    let sink = RecordingSink::new();
    check_send_delays(&db, &sink, &thresholds(), now)
        .await
        .expect("check succeeds");

    let calls = sink.calls_for(AlertKind::PersonalizedSendDelay);
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], AlertCall::Create { .. }));
    assert_eq!(
        calls[1],
        AlertCall::Escalate(AlertKind::PersonalizedSendDelay, Priority::P1)
    );
}

#[tokio::test]
async fn test_recent_send_closes_open_alert() {
    let db = setup_db().await;
    let now = datetime!(2024-06-01 12:00 UTC);
    insert_sends(
        &db,
        vec![
            SendRow::new("tx", now - Duration::minutes(10))
                .category(nl_send::QUEUE_TAG_TRANSACTIONAL, None)
                .done_at(now - Duration::minutes(3)),
        ],
    )
    .await;

    let sink = RecordingSink::with_open(&[AlertKind::TransactionalSendDelay]);
    check_send_delays(&db, &sink, &thresholds(), now)
        .await
        .expect("check succeeds");

    assert_eq!(
        sink.calls_for(AlertKind::TransactionalSendDelay),
        vec![AlertCall::Close(AlertKind::TransactionalSendDelay)]
    );
    assert!(!sink.is_open(AlertKind::TransactionalSendDelay));
}

#[tokio::test]
async fn test_category_without_completed_send_is_skipped() {
    let db = setup_db().await;
    let now = datetime!(2024-06-01 12:00 UTC);
    // Not yet completed: no status_done_timestamp.
    insert_sends(
        &db,
        vec![SendRow::new("pending", now - Duration::hours(3)).category(nl_send::QUEUE_TAG_ALERT, None)],
    )
    .await;

    let sink = RecordingSink::new();
    let results = check_send_delays(&db, &sink, &thresholds(), now)
        .await
        .expect("check succeeds");

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.verdict.is_none()));
    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn test_most_recent_send_respects_personalize_flag() {
    let db = setup_db().await;
    let now = datetime!(2024-06-01 12:00 UTC);
    insert_sends(
        &db,
        vec![
            personalized("pers-old", now - Duration::minutes(40)),
            personalized("pers-new", now - Duration::minutes(20)),
            SendRow::new("nonpers", now - Duration::minutes(5))
                .category(nl_send::QUEUE_TAG_NEWSLETTER, Some(false))
                .done_at(now - Duration::minutes(1)),
        ],
    )
    .await;

    let latest = find_most_recent_send(&db, SendCategory::Personalized)
        .await
        .expect("query")
        .expect("a personalized send");
    assert_eq!(latest.id, "pers-new");

    let latest = find_most_recent_send(&db, SendCategory::Nonpersonalized)
        .await
        .expect("query")
        .expect("a nonpersonalized send");
    assert_eq!(latest.id, "nonpers");

    assert!(
        find_most_recent_send(&db, SendCategory::Alert)
            .await
            .expect("query")
            .is_none()
    );
}
