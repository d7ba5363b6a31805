use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::arn::canonicalize;
use crate::config::{Config, MapperMode};
use crate::error::MapperError;
use crate::table::MappingTable;
use crate::types::IdentityMapping;

use super::Mapper;

/// Serves mappings from the static configuration. Built once, never
/// changes, so lookups take no lock.
#[derive(Debug, Clone)]
pub struct FileMapper {
    table: MappingTable,
}

impl FileMapper {
    /// Validate every configured entry; the first invalid one fails the
    /// whole construction.
    pub fn new(config: &Config) -> Result<Self, MapperError> {
        let table = MappingTable::from_config(config)?;
        info!(event = "Mapper", phase = "Loaded", backend = %MapperMode::MountedFile, counts = ?table.counts());
        Ok(FileMapper { table })
    }
}

impl Mapper for FileMapper {
    fn name(&self) -> &str {
        let name: &'static str = MapperMode::MountedFile.into();
        name
    }

    fn start(&self, _stop: CancellationToken) -> Result<(), MapperError> {
        Ok(())
    }

    fn map(&self, arn: &str) -> Result<IdentityMapping, MapperError> {
        let canonical = canonicalize(arn)?;
        self.table.resolve(&canonical)
    }

    fn is_account_allowed(&self, account_id: &str) -> bool {
        self.table.aws_account(account_id)
    }
}
