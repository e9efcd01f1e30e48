use std::sync::Arc;
use std::time::Duration;

use crate::field_values;
use crate::DatabaseCatalog;
use crate::DbConnector;
use crate::FieldValues;
use crate::MemoryInstance;
use crate::Select;
use crate::SelectOutcome;
use crate::SelectableId;

/// Wait used by tests that expect readiness to come from a concurrent task
pub(crate) const READY_WAIT: Duration = Duration::from_secs(2);

/// Fresh in-memory instance plus a connector to `APPL_DB`
pub(crate) fn appl_db() -> (Arc<MemoryInstance>, DbConnector) {
    let instance = Arc::new(MemoryInstance::default());
    let db = DbConnector::new(&*instance, "APPL_DB", &DatabaseCatalog::default())
        .expect("APPL_DB is in the default catalogue");
    (instance, db)
}

pub(crate) fn fv(pairs: &[(&str, &str)]) -> FieldValues {
    field_values(pairs.iter().copied())
}

/// Polls once and returns the ready ids, panicking on any other outcome
pub(crate) async fn ready_now(select: &Select) -> Vec<SelectableId> {
    match select.select(Some(Duration::ZERO)).await {
        SelectOutcome::Object(ids) => ids,
        other => panic!("expected ready objects, got {other:?}"),
    }
}

/// Asserts a zero-timeout poll reports nothing ready
pub(crate) async fn assert_idle(select: &Select) {
    let outcome = select.select(Some(Duration::ZERO)).await;
    assert!(matches!(outcome, SelectOutcome::Timeout), "expected timeout, got {outcome:?}");
}
