//! Configuration for the mapping backends.
//!
//! ```yaml
//! backendMode: [MountedFile, EKSConfigMap]
//! mapRoles:
//!   - rolearn: arn:aws:iam::000000000000:role/KubernetesAdmin
//!     username: kubernetes-admin
//!     groups:
//!       - system:masters
//! mapUsers: []
//! mapAccounts: ["000000000000"]
//! watch:
//!   documentName: aws-auth
//!   retryIntervalMillis: 5000
//! update:
//!   maxAttempts: 5
//!   retryIntervalMillis: 10
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::error::MapperError;
use crate::types::scalar;
use crate::types::{RoleMapping, UserMapping};

/// Name of the live mapping document.
pub const DEFAULT_DOCUMENT_NAME: &str = "aws-auth";

/// Fixed pause between failed watch connection attempts.
pub const DEFAULT_WATCH_RETRY_INTERVAL: Duration = Duration::from_secs(5);

pub const DEFAULT_UPDATE_ATTEMPTS: u32 = 5;

pub const DEFAULT_UPDATE_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Selects a mapping backend. The string form is what `Mapper::name` reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
    IntoStaticStr,
)]
pub enum MapperMode {
    /// Mappings read once from the static configuration.
    #[strum(serialize = "MountedFile")]
    #[serde(rename = "MountedFile")]
    MountedFile,
    /// Mappings watched live from the external mapping document.
    #[strum(serialize = "EKSConfigMap")]
    #[serde(rename = "EKSConfigMap")]
    EksConfigMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Backends to consult, in order.
    #[serde(default = "default_backend_mode")]
    pub backend_mode: Vec<MapperMode>,
    #[serde(rename = "mapRoles", default)]
    pub role_mappings: Vec<RoleMapping>,
    #[serde(rename = "mapUsers", default)]
    pub user_mappings: Vec<UserMapping>,
    /// Accounts trusted without a per-ARN mapping.
    #[serde(rename = "mapAccounts", default, deserialize_with = "scalar::strings")]
    pub auto_mapped_aws_accounts: Vec<String>,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub update: UpdateConfig,
}

fn default_backend_mode() -> Vec<MapperMode> {
    vec![MapperMode::MountedFile]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend_mode: default_backend_mode(),
            role_mappings: Vec::new(),
            user_mappings: Vec::new(),
            auto_mapped_aws_accounts: Vec::new(),
            watch: WatchConfig::default(),
            update: UpdateConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(text: &str) -> Result<Self, MapperError> {
        serde_yaml::from_str(text).map_err(|e| MapperError::Configuration(e.to_string()))
    }
}

/// Settings for the live document watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchConfig {
    pub document_name: String,
    #[serde(rename = "retryIntervalMillis", with = "millis")]
    pub retry_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            document_name: DEFAULT_DOCUMENT_NAME.to_string(),
            retry_interval: DEFAULT_WATCH_RETRY_INTERVAL,
        }
    }
}

/// Settings for optimistic read-modify-write updates of the mapping document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateConfig {
    /// Total attempts, including the first, before a conflict is surfaced.
    pub max_attempts: u32,
    #[serde(rename = "retryIntervalMillis", with = "millis")]
    pub retry_interval: Duration,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        UpdateConfig {
            max_attempts: DEFAULT_UPDATE_ATTEMPTS,
            retry_interval: DEFAULT_UPDATE_RETRY_INTERVAL,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
