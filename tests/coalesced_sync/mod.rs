use std::collections::HashMap;
use std::sync::Arc;

use d_statebus::ConsumerStateTable;
use d_statebus::FieldValues;
use d_statebus::Operation;
use d_statebus::ProducerStateTable;
use d_statebus::Select;
use d_statebus::SelectOutcome;
use d_statebus::Selectable;
use d_statebus::SelectableEvent;
use d_statebus::Table;

use crate::common::fv;
use crate::common::TestStore;
use crate::common::TEST_DEADLINE;

const KEYS: usize = 8;
const ROUNDS: usize = 300;

/// A write storm on few keys: the consumer always converges to the final row
/// state and never receives more pops than there were writes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_storm_converges_to_final_state() {
    let store = TestStore::new();
    let consumer_db = store.connect("APPL_DB");
    let consumer = Arc::new(ConsumerStateTable::new(&consumer_db, "ROUTE_TABLE").unwrap());
    let done = Arc::new(SelectableEvent::new());

    let mut select = Select::new();
    select.add_selectable(consumer.clone());
    select.add_selectable(done.clone());

    let producer_db = store.connect("APPL_DB");
    let signal = done.clone();
    let writer = tokio::spawn(async move {
        let producer = ProducerStateTable::new(&producer_db, "ROUTE_TABLE");
        for round in 0..ROUNDS {
            for k in 0..KEYS {
                producer
                    .set(&format!("10.{k}.0.0/16"), &fv(&[("metric", round.to_string().as_str())]))
                    .unwrap();
            }
            if round % 25 == 0 {
                tokio::task::yield_now().await;
            }
        }
        producer.del("10.0.0.0/16").unwrap();
        signal.notify();
    });

    let mut latest: HashMap<String, (Operation, FieldValues)> = HashMap::new();
    let mut pops = 0;
    let mut writer_done = false;
    loop {
        match select.select(Some(TEST_DEADLINE)).await {
            SelectOutcome::Object(ready) => {
                if ready.contains(&done.selectable_id()) {
                    done.take();
                    writer_done = true;
                }
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        for entry in consumer.pops().unwrap() {
            pops += 1;
            latest.insert(entry.key.clone(), (entry.op, entry.fields));
        }
        if writer_done && consumer.pending().unwrap() == 0 {
            break;
        }
    }
    writer.await.unwrap();

    assert!(pops <= KEYS * ROUNDS + 1);
    assert_eq!(latest.len(), KEYS);
    assert_eq!(latest["10.0.0.0/16"], (Operation::Del, Vec::new()));
    let final_metric = (ROUNDS - 1).to_string();
    for k in 1..KEYS {
        assert_eq!(
            latest[&format!("10.{k}.0.0/16")],
            (Operation::Set, fv(&[("metric", final_metric.as_str())]))
        );
    }
}

/// Rows written through the transport stay readable through a plain table
/// on another connection, with the database's separator.
#[test]
fn test_rows_visible_to_other_connections() {
    let store = TestStore::new();
    let writer = store.connect("STATE_DB");
    let reader = store.connect("STATE_DB");

    let producer = ProducerStateTable::new(&writer, "PORT_TABLE");
    producer.set("Ethernet0", &fv(&[("oper_status", "up")])).unwrap();

    let table = Table::new(&reader, "PORT_TABLE");
    assert_eq!(table.separator(), "|");
    assert_eq!(table.get_keys().unwrap(), vec!["Ethernet0"]);
    assert_eq!(table.hget("Ethernet0", "oper_status").unwrap().as_deref(), Some("up"));

    let consumer = ConsumerStateTable::new(&reader, "PORT_TABLE").unwrap();
    assert_eq!(consumer.pop().unwrap().unwrap().fields, fv(&[("oper_status", "up")]));
}
