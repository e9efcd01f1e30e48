use std::sync::Arc;

use d_statebus::NotificationConsumer;
use d_statebus::NotificationMessage;
use d_statebus::NotificationProducer;
use d_statebus::Select;
use d_statebus::SelectOutcome;

use crate::common::fv;
use crate::common::TestStore;
use crate::common::TEST_DEADLINE;

#[test]
fn test_single_subscriber_round_trip() {
    let store = TestStore::new();
    let consumer_db = store.connect("APPL_DB");
    let consumer = NotificationConsumer::new(&consumer_db, "UT_REDIS_CHANNEL").unwrap();

    let producer_db = store.connect("APPL_DB");
    let producer = NotificationProducer::new(&producer_db, "UT_REDIS_CHANNEL");
    producer.send("aaa", "bbb", &fv(&[("a", "b")])).unwrap();

    assert_eq!(
        consumer.pop().unwrap(),
        Some(NotificationMessage::new("aaa", "bbb", fv(&[("a", "b")])))
    );
}

/// Each subscriber task receives the full stream in publish order
#[tokio::test(flavor = "multi_thread", worker_threads = 3)]
async fn test_fanout_to_independent_subscribers() {
    let store = TestStore::new();
    let messages = 100;

    let mut subscribers = Vec::new();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let db = store.connect("APPL_DB");
        subscribers.push(Arc::new(NotificationConsumer::new(&db, "EVENTS").unwrap()));
    }
    for consumer in subscribers {
        handles.push(tokio::spawn(async move {
            let mut select = Select::new();
            select.add_selectable(consumer.clone());
            let mut seen = Vec::new();
            while seen.len() < messages {
                match select.select(Some(TEST_DEADLINE)).await {
                    SelectOutcome::Object(_) => {
                        seen.extend(consumer.pops().unwrap().into_iter().map(|m| m.data));
                    }
                    other => panic!("subscriber starved: {other:?}"),
                }
            }
            seen
        }));
    }

    let producer_db = store.connect("APPL_DB");
    let producer = NotificationProducer::new(&producer_db, "EVENTS");
    for i in 0..messages {
        assert_eq!(producer.send("tick", &i.to_string(), &[]).unwrap(), 3);
    }

    let expected: Vec<String> = (0..messages).map(|i| i.to_string()).collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), expected);
    }
}
