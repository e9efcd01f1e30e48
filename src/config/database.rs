//! Logical database catalogue.
//!
//! Maps a database name such as `APPL_DB` to the numeric id the store uses
//! and to the separator placed between a table name and a row key.
//! Names are matched case-insensitively because layered config sources
//! normalise map keys.

use std::collections::HashMap;
use std::collections::HashSet;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_TABLE_SEPARATOR;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// Numeric database id inside the store instance
    pub id: u32,
    /// Separator between table name and row key
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    DEFAULT_TABLE_SEPARATOR.to_string()
}

impl DatabaseInfo {
    pub fn new(
        id: u32,
        separator: &str,
    ) -> Self {
        Self {
            id,
            separator: separator.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct DatabaseCatalog {
    databases: HashMap<String, DatabaseInfo>,
}

impl Default for DatabaseCatalog {
    fn default() -> Self {
        let databases = [
            ("APPL_DB", 0, ":"),
            ("ASIC_DB", 1, ":"),
            ("COUNTERS_DB", 2, ":"),
            ("LOGLEVEL_DB", 3, ":"),
            ("CONFIG_DB", 4, "|"),
            ("FLEX_COUNTER_DB", 5, ":"),
            ("STATE_DB", 6, "|"),
        ]
        .into_iter()
        .map(|(name, id, sep)| (name.to_string(), DatabaseInfo::new(id, sep)))
        .collect();

        Self { databases }
    }
}

impl DatabaseCatalog {
    pub fn empty() -> Self {
        Self {
            databases: HashMap::new(),
        }
    }

    /// Registers or replaces a database definition
    pub fn insert(
        &mut self,
        name: &str,
        info: DatabaseInfo,
    ) {
        self.databases.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.databases.insert(name.to_ascii_uppercase(), info);
    }

    /// Looks a database up by name
    pub fn info(
        &self,
        name: &str,
    ) -> Result<&DatabaseInfo> {
        self.databases
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
            .ok_or_else(|| {
                Error::Config(ConfigError::Message(format!(
                    "Failed to find {name} database in catalogue"
                )))
            })
    }

    pub fn db_id(
        &self,
        name: &str,
    ) -> Result<u32> {
        Ok(self.info(name)?.id)
    }

    pub fn separator(
        &self,
        name: &str,
    ) -> Result<&str> {
        Ok(self.info(name)?.separator.as_str())
    }

    /// Separator configured for a numeric id, used when a connector was
    /// opened by id only.
    pub fn separator_by_id(
        &self,
        id: u32,
    ) -> Option<&str> {
        self.databases.values().find(|info| info.id == id).map(|info| info.separator.as_str())
    }

    /// Database names in upper case, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.databases.keys().map(|name| name.to_ascii_uppercase()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (name, info) in &self.databases {
            if info.separator.is_empty() {
                return Err(Error::Config(ConfigError::Message(format!(
                    "databases.{name}.separator cannot be empty"
                ))));
            }
            if !seen.insert(info.id) {
                return Err(Error::Config(ConfigError::Message(format!(
                    "databases.{name}.id {} is used by more than one database",
                    info.id
                ))));
            }
        }
        Ok(())
    }
}
