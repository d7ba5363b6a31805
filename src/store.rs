use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::MapperError;
use crate::table::{MappingTable, TableCounts};
use crate::types::{RoleMapping, UserMapping};

/// Shared, swappable holder of the current mapping generation.
///
/// Readers see either the previous or the next generation in full, never a
/// mix: the watcher builds a new [`MappingTable`] outside the lock and swaps
/// it in under the write guard. Cloning the store shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MapStore {
    inner: Arc<RwLock<MappingTable>>,
}

impl MapStore {
    pub fn new(table: MappingTable) -> Self {
        MapStore {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    /// Replace all tables with `table` in one step.
    pub fn replace(&self, table: MappingTable) -> Result<TableCounts, MapperError> {
        let counts = table.counts();
        *self.inner.write()? = table;
        debug!(event = "Store", phase = "Replaced", counts = ?counts);
        Ok(counts)
    }

    /// Run `f` against one consistent generation.
    pub fn read<T>(&self, f: impl FnOnce(&MappingTable) -> T) -> Result<T, MapperError> {
        let guard = self.inner.read()?;
        Ok(f(&guard))
    }

    pub fn role_mapping(&self, arn: &str) -> Result<RoleMapping, MapperError> {
        self.read(|table| table.role_mapping(arn).cloned())?
    }

    pub fn user_mapping(&self, arn: &str) -> Result<UserMapping, MapperError> {
        self.read(|table| table.user_mapping(arn).cloned())?
    }

    pub fn role_arn_like_mapping(&self, arn: &str) -> Result<RoleMapping, MapperError> {
        self.read(|table| table.role_arn_like_mapping(arn).cloned())?
    }

    pub fn user_arn_like_mapping(&self, arn: &str) -> Result<UserMapping, MapperError> {
        self.read(|table| table.user_arn_like_mapping(arn).cloned())?
    }

    /// Poisoned state reads as "not allowed".
    pub fn aws_account(&self, id: &str) -> bool {
        self.read(|table| table.aws_account(id)).unwrap_or(false)
    }

    pub fn counts(&self) -> Result<TableCounts, MapperError> {
        self.read(MappingTable::counts)
    }
}
