// src/lib.rs
pub use client::UpdateClient;
pub use config::{Config, MapperMode, UpdateConfig, WatchConfig};
pub use error::{MapperError, ParseErrors, SourceError, UpdateError, ValidationError};
pub use mapper::{ConfigMapMapper, FileMapper, Mapper, MapperChain};
pub use source::{Document, DocumentStore, MemoryDocumentStore, WatchEvent};
pub use store::MapStore;
pub use types::{IdentityMapping, RoleMapping, UserMapping};

pub mod arn;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod mapper;
pub mod metrics;
pub mod source;
pub mod store;
pub mod table;
pub mod traits;
pub mod types;
pub mod watcher;

#[cfg(test)]
mod tests;
