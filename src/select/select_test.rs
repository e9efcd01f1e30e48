use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing_test::traced_test;

use super::*;
use crate::test_utils::appl_db;
use crate::test_utils::fv;
use crate::test_utils::ready_now;
use crate::test_utils::READY_WAIT;
use crate::ConsumerStateTable;
use crate::ConsumerTable;
use crate::Error;
use crate::NotificationConsumer;
use crate::NotificationProducer;
use crate::ProducerStateTable;
use crate::ProducerTable;
use crate::SelectConfig;
use crate::SelectError;
use crate::StoreError;
use crate::SubscriberStateTable;
use crate::Table;

fn mock_selectable(
    id: SelectableId,
    pending: bool,
    priority: i32,
) -> Arc<MockSelectable> {
    let mut mock = MockSelectable::new();
    mock.expect_selectable_id().return_const(id);
    mock.expect_has_pending().returning(move || Ok(pending));
    mock.expect_priority().return_const(priority);
    let notifier = Arc::new(Notify::new());
    mock.expect_notifier().returning(move || notifier.clone());
    Arc::new(mock)
}

#[tokio::test]
async fn test_empty_select_without_timeout_is_an_error() {
    let select = Select::new();
    let outcome = select.select(None).await;
    assert_eq!(outcome.state(), SelectState::Error);
    assert!(matches!(outcome, SelectOutcome::Error(Error::Select(SelectError::NothingRegistered))));
}

#[tokio::test(start_paused = true)]
async fn test_empty_select_with_timeout_times_out() {
    let select = Select::new();
    let started = Instant::now();
    let outcome = select.select(Some(Duration::from_millis(200))).await;
    assert_eq!(outcome.state(), SelectState::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_empty_select_with_unbounded_timeout_is_an_error() {
    let select = Select::new();
    let outcome = select.select(Some(Duration::MAX)).await;
    assert!(matches!(outcome, SelectOutcome::Error(Error::Select(SelectError::NothingRegistered))));
}

#[tokio::test]
async fn test_unbounded_timeout_reports_backlog() {
    let (_instance, db) = appl_db();
    let consumer = Arc::new(ConsumerTable::new(&db, "tbl").unwrap());
    ProducerTable::new(&db, "tbl").set("k", &fv(&[("f", "v")])).unwrap();

    let mut select = Select::new();
    select.add_selectable(consumer.clone());

    let outcome = select.select(Some(Duration::MAX)).await;
    assert_eq!(outcome.ready(), &[consumer.selectable_id()]);
}

#[tokio::test]
async fn test_unbounded_timeout_waits_for_event() {
    let event = Arc::new(SelectableEvent::new());
    let mut select = Select::new();
    select.add_selectable(event.clone());

    let signaller = event.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        signaller.notify();
    });

    let outcome = tokio::time::timeout(READY_WAIT, select.select(Some(Duration::MAX)))
        .await
        .expect("woken by the event");
    assert_eq!(outcome.ready(), &[event.selectable_id()]);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_idle_objects_time_out() {
    let mut select = Select::new();
    select.add_selectable(mock_selectable(1, false, 0));

    let outcome = select.select(Some(Duration::from_millis(50))).await;
    assert_eq!(outcome.state(), SelectState::Timeout);
    assert!(outcome.ready().is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_duplicate_registration_is_ignored() {
    let mut select = Select::new();
    let selectable = mock_selectable(7, false, 0);

    assert!(select.add_selectable(selectable.clone()));
    assert!(!select.add_selectable(selectable.clone()));
    assert_eq!(select.len(), 1);
    assert!(logs_contain("already registered"));

    assert!(select.remove_selectable(&*selectable));
    assert!(!select.remove_selectable(&*selectable));
    assert!(select.is_empty());
}

#[tokio::test]
async fn test_ready_ids_ordered_by_priority_then_registration() {
    let mut select = Select::new();
    select.add_selectables(vec![
        mock_selectable(1, true, 0) as Arc<dyn Selectable>,
        mock_selectable(2, false, 9) as Arc<dyn Selectable>,
        mock_selectable(3, true, 5) as Arc<dyn Selectable>,
        mock_selectable(4, true, 0) as Arc<dyn Selectable>,
    ]);

    let outcome = select.select(Some(Duration::ZERO)).await;
    assert_eq!(outcome.state(), SelectState::Object);
    assert_eq!(outcome.ready(), &[3, 1, 4]);
    assert!(outcome.is_ready(4));
    assert!(!outcome.is_ready(2));
}

#[tokio::test]
#[traced_test]
async fn test_readiness_failure_is_reported_as_error_outcome() {
    let mut failing = MockSelectable::new();
    failing.expect_selectable_id().return_const(1u64);
    failing.expect_priority().return_const(0i32);
    failing
        .expect_has_pending()
        .returning(|| Err(StoreError::Connection("gone".to_string()).into()));

    let mut select = Select::new();
    select.add_selectable(Arc::new(failing));

    let outcome = select.select(None).await;
    match outcome {
        SelectOutcome::Error(e) => assert!(e.is_connection_error()),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_event_wakes_blocked_select() {
    let event = Arc::new(SelectableEvent::new());
    let mut select = Select::new();
    select.add_selectable(event.clone());

    let signaller = event.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        signaller.notify();
        signaller.notify();
    });

    let outcome = select.select(Some(READY_WAIT)).await;
    assert_eq!(outcome.ready(), &[event.selectable_id()]);
    handle.await.unwrap();

    assert_eq!(event.take(), 2);
    assert_eq!(event.signals(), 0);
    assert_eq!(select.select(Some(Duration::ZERO)).await.state(), SelectState::Timeout);
}

#[tokio::test]
async fn test_from_config_uses_default_timeout() {
    let select = Select::from_config(&SelectConfig { default_timeout_ms: 10 });
    assert_eq!(select.select_default().await.state(), SelectState::Timeout);
}

#[tokio::test]
#[traced_test]
async fn test_mixed_objects_in_one_select() {
    let (_instance, db) = appl_db();

    let fifo = Arc::new(ConsumerTable::new(&db, "fifo").unwrap());
    let coalesced = Arc::new(ConsumerStateTable::new(&db, "state").unwrap());
    let notifications = Arc::new(NotificationConsumer::new(&db, "chan").unwrap());
    let watcher = Arc::new(SubscriberStateTable::new(&db, "watched").unwrap());

    let mut select = Select::new();
    select.add_selectable(fifo.clone());
    select.add_selectable(coalesced.clone());
    select.add_selectable(notifications.clone());
    select.add_selectable(watcher.clone());

    ProducerTable::new(&db, "fifo").set("a", &fv(&[("f", "1")])).unwrap();
    assert_eq!(ready_now(&select).await, vec![fifo.selectable_id()]);
    assert_eq!(fifo.pop().unwrap().unwrap().key, "a");

    ProducerStateTable::new(&db, "state").set("b", &fv(&[("f", "1")])).unwrap();
    NotificationProducer::new(&db, "chan").send("op", "data", &[]).unwrap();
    Table::new(&db, "watched").hset("c", "f", "1").unwrap();

    let ready = ready_now(&select).await;
    assert_eq!(
        ready,
        vec![coalesced.selectable_id(), notifications.selectable_id(), watcher.selectable_id()]
    );

    assert_eq!(coalesced.pop().unwrap().unwrap().key, "b");
    assert_eq!(notifications.pop().unwrap().unwrap().op, "op");
    assert_eq!(watcher.pop().unwrap().unwrap().key, "c");
    assert_eq!(select.select(Some(Duration::ZERO)).await.state(), SelectState::Timeout);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocked_select_wakes_on_producer_write() {
    let (_instance, db) = appl_db();
    let consumer = Arc::new(ConsumerStateTable::new(&db, "tbl").unwrap());
    let mut select = Select::new();
    select.add_selectable(consumer.clone());

    let producer_db = db.new_connector().unwrap();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        ProducerStateTable::new(&producer_db, "tbl").set("k", &fv(&[("f", "v")])).unwrap();
    });

    let outcome = select.select(None).await;
    assert_eq!(outcome.ready(), &[consumer.selectable_id()]);
    handle.await.unwrap();
    assert_eq!(consumer.pop().unwrap().unwrap().key, "k");
}

#[tokio::test]
async fn test_removed_object_is_no_longer_reported() {
    let (_instance, db) = appl_db();
    let consumer = Arc::new(ConsumerTable::new(&db, "tbl").unwrap());
    let mut select = Select::new();
    select.add_selectable(consumer.clone());
    assert!(select.contains(consumer.selectable_id()));

    ProducerTable::new(&db, "tbl").set("k", &fv(&[("f", "v")])).unwrap();
    select.remove_selectable(&*consumer);

    assert_eq!(select.select(Some(Duration::ZERO)).await.state(), SelectState::Timeout);
    assert!(consumer.pop().unwrap().is_some());
}
