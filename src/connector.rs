//! Client connection bound to one logical database.

use std::sync::Arc;

use tracing::debug;

use crate::ClientId;
use crate::DatabaseCatalog;
use crate::Result;
use crate::RowStore;
use crate::StoreInstance;

/// One client connection to one logical database of a store instance
///
/// Tables and transports borrow the connector only while they are built and
/// then talk to the store directly, so the connector can be dropped early.
/// Dropping it disconnects the client.
pub struct DbConnector {
    store: Arc<dyn RowStore>,
    client: ClientId,
    db_name: Option<String>,
    separator: String,
}

impl std::fmt::Debug for DbConnector {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DbConnector")
            .field("db_id", &self.store.db_id())
            .field("db_name", &self.db_name)
            .field("client", &self.client)
            .field("separator", &self.separator)
            .finish()
    }
}

impl DbConnector {
    /// Opens the database registered as `db_name` in `catalog`.
    ///
    /// # Errors
    /// - `Error::Config` when the catalogue has no such database
    /// - `Error::Store` when the store cannot be reached
    pub fn new(
        instance: &dyn StoreInstance,
        db_name: &str,
        catalog: &DatabaseCatalog,
    ) -> Result<Self> {
        let info = catalog.info(db_name)?;
        let store = instance.database(info.id)?;
        Self::connect(store, Some(db_name.to_string()), info.separator.clone())
    }

    /// Opens an already resolved database directly
    pub fn with_store(
        store: Arc<dyn RowStore>,
        separator: &str,
    ) -> Result<Self> {
        Self::connect(store, None, separator.to_string())
    }

    fn connect(
        store: Arc<dyn RowStore>,
        db_name: Option<String>,
        separator: String,
    ) -> Result<Self> {
        let client = store.connect()?;
        debug!(db_id = store.db_id(), ?db_name, client, "Connector opened");
        Ok(Self {
            store,
            client,
            db_name,
            separator,
        })
    }

    pub fn db_id(&self) -> u32 {
        self.store.db_id()
    }

    /// Catalogue name, `None` when opened with [`DbConnector::with_store`]
    pub fn db_name(&self) -> Option<&str> {
        self.db_name.as_deref()
    }

    /// Separator between table name and key in row keys
    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn store(&self) -> Arc<dyn RowStore> {
        self.store.clone()
    }

    pub fn client_id(&self) -> ClientId {
        self.client
    }

    /// Sets the observational display name of this connection
    pub fn set_client_name(
        &self,
        name: &str,
    ) -> Result<()> {
        self.store.set_client_name(self.client, name)
    }

    /// Display name of this connection, empty when never set
    pub fn client_name(&self) -> Result<String> {
        self.store.client_name(self.client)
    }

    /// Opens a fresh connection to the same database. The client name is
    /// not carried over.
    pub fn new_connector(&self) -> Result<Self> {
        Self::connect(self.store.clone(), self.db_name.clone(), self.separator.clone())
    }
}

impl Drop for DbConnector {
    fn drop(&mut self) {
        self.store.disconnect(self.client);
        debug!(db_id = self.store.db_id(), client = self.client, "Connector closed");
    }
}
