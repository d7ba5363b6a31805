use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::arn::canonicalize;
use crate::config::{MapperMode, WatchConfig};
use crate::error::MapperError;
use crate::metrics::MetricsSink;
use crate::source::DocumentStore;
use crate::store::MapStore;
use crate::types::IdentityMapping;
use crate::watcher::Watcher;

use super::Mapper;

/// Serves mappings from the live mapping document.
///
/// The tables start empty and are filled by a background watcher once
/// [`Mapper::start`] is called.
pub struct ConfigMapMapper {
    source: Arc<dyn DocumentStore>,
    metrics: Arc<dyn MetricsSink>,
    config: WatchConfig,
    store: MapStore,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigMapMapper {
    pub fn new(
        source: Arc<dyn DocumentStore>,
        metrics: Arc<dyn MetricsSink>,
        config: WatchConfig,
    ) -> Self {
        ConfigMapMapper {
            source,
            metrics,
            config,
            store: MapStore::default(),
            watcher: Mutex::new(None),
        }
    }

    /// The tables this backend resolves against.
    pub fn store(&self) -> &MapStore {
        &self.store
    }
}

impl Mapper for ConfigMapMapper {
    fn name(&self) -> &str {
        let name: &'static str = MapperMode::EksConfigMap.into();
        name
    }

    /// Spawn the watcher on the current tokio runtime. Calling it again
    /// while a watcher is running does nothing.
    fn start(&self, stop: CancellationToken) -> Result<(), MapperError> {
        let mut watcher = self.watcher.lock()?;
        if watcher.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|e| MapperError::Runtime(e.to_string()))?;
        let task = Watcher::new(
            self.source.clone(),
            self.store.clone(),
            self.metrics.clone(),
            self.config.clone(),
            stop,
        );
        *watcher = Some(runtime.spawn(task.run()));
        info!(event = "Mapper", phase = "Started", backend = self.name(), document = self.config.document_name);
        Ok(())
    }

    /// Canonicalize `arn` and resolve it against one generation of tables.
    fn map(&self, arn: &str) -> Result<IdentityMapping, MapperError> {
        let canonical = canonicalize(arn)?;
        self.store.read(|table| table.resolve(&canonical))?
    }

    fn is_account_allowed(&self, account_id: &str) -> bool {
        self.store.aws_account(account_id)
    }
}
