use std::sync::Arc;
use std::time::Duration;

use d_statebus::ConsumerStateTable;
use d_statebus::ConsumerTable;
use d_statebus::DbConnector;
use d_statebus::NotificationConsumer;
use d_statebus::NotificationProducer;
use d_statebus::ProducerStateTable;
use d_statebus::ProducerTable;
use d_statebus::Select;
use d_statebus::SelectOutcome;
use d_statebus::SelectState;
use d_statebus::Selectable;
use d_statebus::SelectableEvent;
use d_statebus::SubscriberStateTable;
use d_statebus::Table;

use crate::common::fv;
use crate::common::TestStore;
use crate::common::TEST_DEADLINE;

#[derive(Debug, Default, PartialEq, Eq)]
struct Dispatched {
    fifo: Vec<String>,
    coalesced: Vec<String>,
    notifications: Vec<String>,
    watched: Vec<String>,
}

/// One control loop serving every kind of consumer until told to stop
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_loop_dispatches_heterogeneous_sources() {
    let store = TestStore::new();
    let db = store.connect("APPL_DB");

    let fifo = Arc::new(ConsumerTable::new(&db, "FIFO").unwrap());
    let coalesced = Arc::new(ConsumerStateTable::new(&db, "STATE").unwrap());
    let notifications = Arc::new(NotificationConsumer::new(&db, "NOTIFY").unwrap());
    let watched = Arc::new(SubscriberStateTable::new(&db, "WATCHED").unwrap());
    let stop = Arc::new(SelectableEvent::with_priority(100));

    let mut select = Select::from_config(&store.config.select);
    select.add_selectable(fifo.clone());
    select.add_selectable(coalesced.clone());
    select.add_selectable(notifications.clone());
    select.add_selectable(watched.clone());
    select.add_selectable(stop.clone());

    let producer_db = store.connect("APPL_DB");
    let stopper = stop.clone();
    let producers = tokio::spawn(async move {
        ProducerTable::new(&producer_db, "FIFO").set("f1", &fv(&[("a", "1")])).unwrap();
        ProducerStateTable::new(&producer_db, "STATE").set("s1", &fv(&[("a", "1")])).unwrap();
        NotificationProducer::new(&producer_db, "NOTIFY").send("op", "n1", &[]).unwrap();
        Table::new(&producer_db, "WATCHED").hset("w1", "a", "1").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.notify();
    });

    let mut dispatched = Dispatched::default();
    let mut stopping = false;
    while !stopping {
        let outcome = tokio::time::timeout(TEST_DEADLINE, select.select_default())
            .await
            .expect("dispatch loop stalled");
        let ready = match outcome {
            SelectOutcome::Object(ready) => ready,
            other => panic!("unexpected outcome {other:?}"),
        };

        for id in ready {
            if id == stop.selectable_id() {
                stop.take();
                stopping = true;
            } else if id == fifo.selectable_id() {
                dispatched.fifo.extend(fifo.pops().unwrap().into_iter().map(|e| e.key));
            } else if id == coalesced.selectable_id() {
                dispatched.coalesced.extend(coalesced.pops().unwrap().into_iter().map(|e| e.key));
            } else if id == notifications.selectable_id() {
                dispatched.notifications.extend(notifications.pops().unwrap().into_iter().map(|m| m.data));
            } else if id == watched.selectable_id() {
                dispatched.watched.extend(watched.pops().unwrap().into_iter().map(|e| e.key));
            }
        }
    }
    producers.await.unwrap();

    // Anything that raced with the stop signal
    dispatched.fifo.extend(fifo.pops().unwrap().into_iter().map(|e| e.key));
    dispatched.coalesced.extend(coalesced.pops().unwrap().into_iter().map(|e| e.key));
    dispatched.notifications.extend(notifications.pops().unwrap().into_iter().map(|m| m.data));
    dispatched.watched.extend(watched.pops().unwrap().into_iter().map(|e| e.key));

    // Early exit: deregister everything
    assert!(select.remove_selectable(&*fifo));
    assert!(select.remove_selectable(&*coalesced));
    assert!(select.remove_selectable(&*notifications));
    assert!(select.remove_selectable(&*watched));
    assert!(select.remove_selectable(&*stop));
    assert!(select.is_empty());

    assert_eq!(
        dispatched,
        Dispatched {
            fifo: vec!["f1".to_string()],
            coalesced: vec!["s1".to_string()],
            notifications: vec!["n1".to_string()],
            watched: vec!["w1".to_string()],
        }
    );
}

#[tokio::test]
async fn test_select_errors_when_store_goes_away() {
    let store = TestStore::new();
    let db = store.connect("APPL_DB");
    let consumer = Arc::new(ConsumerStateTable::new(&db, "STATE").unwrap());

    let mut select = Select::new();
    select.add_selectable(consumer.clone());
    assert_eq!(select.select(Some(Duration::ZERO)).await.state(), SelectState::Timeout);

    store.instance.close();
    match select.select(Some(Duration::ZERO)).await {
        SelectOutcome::Error(e) => assert!(e.is_connection_error()),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn test_client_names_are_per_connection() {
    let store = TestStore::new();
    let db = store.connect("APPL_DB");
    assert_eq!(db.client_name().unwrap(), "");

    db.set_client_name("orchagent").unwrap();
    assert_eq!(db.client_name().unwrap(), "orchagent");

    let other = DbConnector::new(&*store.instance, "APPL_DB", store.catalog()).unwrap();
    assert_eq!(other.client_name().unwrap(), "");
    assert_eq!(db.new_connector().unwrap().client_name().unwrap(), "");
}
