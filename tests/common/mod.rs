use std::sync::Arc;
use std::time::Duration;

use d_statebus::field_values;
use d_statebus::DatabaseCatalog;
use d_statebus::DbConnector;
use d_statebus::FieldValues;
use d_statebus::MemoryInstance;
use d_statebus::StateBusConfig;

/// Upper bound for any wait that depends on another task making progress
pub const TEST_DEADLINE: Duration = Duration::from_secs(10);

/// Shared "store server" every simulated process connects to
pub struct TestStore {
    pub config: StateBusConfig,
    pub instance: Arc<MemoryInstance>,
}

impl TestStore {
    pub fn new() -> Self {
        let config = StateBusConfig::default().validate().expect("default config is valid");
        let instance = Arc::new(MemoryInstance::new(config.store.clone()));
        Self { config, instance }
    }

    /// A fresh client connection, as an independent process would open
    pub fn connect(
        &self,
        db_name: &str,
    ) -> DbConnector {
        DbConnector::new(&*self.instance, db_name, &self.config.databases).expect("known database")
    }

    pub fn catalog(&self) -> &DatabaseCatalog {
        &self.config.databases
    }
}

pub fn fv(pairs: &[(&str, &str)]) -> FieldValues {
    field_values(pairs.iter().copied())
}
