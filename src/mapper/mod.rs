//! The resolution front end.
//!
//! A [`Mapper`] turns an authenticated ARN into a cluster identity and says
//! whether an account is trusted wholesale. Two backends exist:
//! [`FileMapper`] serves the static configuration and [`ConfigMapMapper`]
//! follows the live mapping document. [`build`] assembles the backends a
//! configuration names into a [`MapperChain`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{Config, MapperMode};
use crate::error::MapperError;
use crate::metrics::MetricsSink;
use crate::source::DocumentStore;
use crate::types::IdentityMapping;

pub mod file;
pub mod live;

pub use file::FileMapper;
pub use live::ConfigMapMapper;

pub trait Mapper: Send + Sync {
    /// Backend name, as written in `backendMode`.
    fn name(&self) -> &str;

    /// Begin any background work. Work stops when `stop` is cancelled.
    fn start(&self, stop: CancellationToken) -> Result<(), MapperError>;

    /// Resolve `arn`. A miss is [`MapperError::NotMapped`].
    fn map(&self, arn: &str) -> Result<IdentityMapping, MapperError>;

    fn is_account_allowed(&self, account_id: &str) -> bool;
}

/// Backends consulted in configuration order.
pub struct MapperChain {
    backends: Vec<Box<dyn Mapper>>,
}

impl MapperChain {
    pub fn new(backends: Vec<Box<dyn Mapper>>) -> Self {
        MapperChain { backends }
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }
}

impl Mapper for MapperChain {
    fn name(&self) -> &str {
        "MapperChain"
    }

    fn start(&self, stop: CancellationToken) -> Result<(), MapperError> {
        for backend in &self.backends {
            backend.start(stop.clone())?;
        }
        Ok(())
    }

    /// First hit wins; only [`MapperError::NotMapped`] moves on to the next
    /// backend.
    fn map(&self, arn: &str) -> Result<IdentityMapping, MapperError> {
        for backend in &self.backends {
            match backend.map(arn) {
                Err(MapperError::NotMapped) => {
                    debug!(event = "Map", phase = "Miss", backend = backend.name(), arn = arn);
                }
                result => return result,
            }
        }
        Err(MapperError::NotMapped)
    }

    fn is_account_allowed(&self, account_id: &str) -> bool {
        self.backends
            .iter()
            .any(|backend| backend.is_account_allowed(account_id))
    }
}

/// Build the backends named in `config.backend_mode`, in order.
///
/// `source` is required when the live backend is selected.
pub fn build(
    config: &Config,
    source: Option<Arc<dyn DocumentStore>>,
    metrics: Arc<dyn MetricsSink>,
) -> Result<MapperChain, MapperError> {
    if config.backend_mode.is_empty() {
        return Err(MapperError::Configuration(
            "backendMode must name at least one backend".into(),
        ));
    }

    let mut backends: Vec<Box<dyn Mapper>> = Vec::with_capacity(config.backend_mode.len());
    for mode in &config.backend_mode {
        match mode {
            MapperMode::MountedFile => backends.push(Box::new(FileMapper::new(config)?)),
            MapperMode::EksConfigMap => {
                let source = source.clone().ok_or_else(|| {
                    MapperError::Configuration(format!(
                        "backend {mode} needs a document source"
                    ))
                })?;
                backends.push(Box::new(ConfigMapMapper::new(
                    source,
                    metrics.clone(),
                    config.watch.clone(),
                )));
            }
        }
    }
    Ok(MapperChain::new(backends))
}
