use std::collections::HashMap;
use std::sync::Arc;

use d_statebus::ConsumerTable;
use d_statebus::Operation;
use d_statebus::ProducerTable;
use d_statebus::Select;
use d_statebus::SelectOutcome;
use d_statebus::Selectable;

use crate::common::fv;
use crate::common::TestStore;
use crate::common::TEST_DEADLINE;

const PRODUCERS: usize = 4;
const WRITES_PER_PRODUCER: usize = 250;

/// Several producer "processes" write concurrently; one consumer sees every
/// write exactly once and each producer's writes in the order they were made.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_keep_per_producer_order() {
    let store = TestStore::new();
    let consumer_db = store.connect("APPL_DB");
    let consumer = Arc::new(ConsumerTable::new(&consumer_db, "ORDERS").unwrap());

    let mut select = Select::new();
    select.add_selectable(consumer.clone());

    let mut handles = Vec::new();
    for p in 0..PRODUCERS {
        let db = store.connect("APPL_DB");
        handles.push(tokio::spawn(async move {
            let producer = ProducerTable::new(&db, "ORDERS");
            for seq in 0..WRITES_PER_PRODUCER {
                producer
                    .set(&format!("p{p}"), &fv(&[("seq", seq.to_string().as_str())]))
                    .unwrap();
                if seq % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            producer.del(&format!("p{p}")).unwrap();
        }));
    }

    let mut next_seq: HashMap<String, usize> = HashMap::new();
    let mut deletes = 0;
    let mut received = 0;
    while received < PRODUCERS * (WRITES_PER_PRODUCER + 1) {
        match select.select(Some(TEST_DEADLINE)).await {
            SelectOutcome::Object(ids) => assert_eq!(ids, vec![consumer.selectable_id()]),
            other => panic!("consumer starved: {other:?}"),
        }
        for entry in consumer.pops().unwrap() {
            received += 1;
            let expected = next_seq.entry(entry.key.clone()).or_insert(0);
            match entry.op {
                Operation::Set => {
                    assert_eq!(entry.fields, fv(&[("seq", expected.to_string().as_str())]));
                    *expected += 1;
                }
                Operation::Del => {
                    assert_eq!(*expected, WRITES_PER_PRODUCER, "DEL for {} arrived early", entry.key);
                    deletes += 1;
                }
            }
        }
    }

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(deletes, PRODUCERS);
    assert_eq!(consumer.pending().unwrap(), 0);
}

/// Two competing consumers split the queue without duplicates or loss
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_competing_consumers_split_entries() {
    let store = TestStore::new();
    let producer_db = store.connect("APPL_DB");
    let producer = ProducerTable::new(&producer_db, "JOBS");

    let total = 500;
    for i in 0..total {
        producer.set(&format!("job{i}"), &fv(&[("n", "1")])).unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..2 {
        let db = store.connect("APPL_DB");
        handles.push(tokio::spawn(async move {
            let consumer = ConsumerTable::new(&db, "JOBS").unwrap();
            let mut keys = Vec::new();
            while let Some(entry) = consumer.pop().unwrap() {
                keys.push(entry.key);
                tokio::task::yield_now().await;
            }
            keys
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    all.sort();
    all.dedup();
    assert_eq!(all.len(), total);
}
