use std::sync::Arc;

use tracing::trace;

use crate::utils::glob_escape;
use crate::DbConnector;
use crate::FieldValues;
use crate::Result;
use crate::RowStore;

/// Table name plus the separator joining it to row keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableLocation {
    name: String,
    separator: String,
}

impl TableLocation {
    pub(crate) fn new(
        name: &str,
        separator: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            separator: separator.to_string(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn separator(&self) -> &str {
        &self.separator
    }

    /// `{table}{separator}{key}`
    pub(crate) fn row_key(
        &self,
        key: &str,
    ) -> String {
        format!("{}{}{}", self.name, self.separator, key)
    }

    /// Inverse of [`TableLocation::row_key`]
    pub(crate) fn strip<'a>(
        &self,
        row_key: &'a str,
    ) -> Option<&'a str> {
        row_key.strip_prefix(self.name.as_str())?.strip_prefix(self.separator.as_str())
    }

    /// Glob matching every row key of the table
    pub(crate) fn row_pattern(&self) -> String {
        format!("{}{}*", glob_escape(&self.name), glob_escape(&self.separator))
    }
}

/// Direct row access to one table
///
/// Writes through a `Table` reach the store without touching any transport
/// queue, so only key-space watchers observe them.
pub struct Table {
    store: Arc<dyn RowStore>,
    location: TableLocation,
}

impl std::fmt::Debug for Table {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Table").field("location", &self.location).finish()
    }
}

impl Table {
    pub fn new(
        db: &DbConnector,
        table_name: &str,
    ) -> Self {
        Self {
            store: db.store(),
            location: TableLocation::new(table_name, db.separator()),
        }
    }

    pub fn table_name(&self) -> &str {
        self.location.name()
    }

    pub fn separator(&self) -> &str {
        self.location.separator()
    }

    /// Upsert-merges `fields` into the row
    pub fn set(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<()> {
        trace!(table = self.table_name(), key, "Table set");
        self.store.hset(&self.location.row_key(key), fields)
    }

    /// Whole row, `None` when absent
    pub fn get(
        &self,
        key: &str,
    ) -> Result<Option<FieldValues>> {
        let row = self.store.hgetall(&self.location.row_key(key))?;
        Ok(if row.is_empty() { None } else { Some(row) })
    }

    pub fn hget(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<String>> {
        self.store.hget(&self.location.row_key(key), field)
    }

    pub fn hset(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<()> {
        self.store.hset(&self.location.row_key(key), &[(field.to_string(), value.to_string())])
    }

    /// Removes the row. Absent rows are not an error.
    pub fn del(
        &self,
        key: &str,
    ) -> Result<()> {
        trace!(table = self.table_name(), key, "Table del");
        self.store.del(&self.location.row_key(key))?;
        Ok(())
    }

    pub fn hdel(
        &self,
        key: &str,
        field: &str,
    ) -> Result<()> {
        self.store.hdel(&self.location.row_key(key), &[field.to_string()])?;
        Ok(())
    }

    /// Keys of every row in the table, sorted, without the table prefix
    pub fn get_keys(&self) -> Result<Vec<String>> {
        let row_keys = self.store.keys(&self.location.row_pattern())?;
        Ok(row_keys
            .iter()
            .filter_map(|row_key| self.location.strip(row_key))
            .map(str::to_string)
            .collect())
    }
}
