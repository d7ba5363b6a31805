//! One generation of mapping tables.
//!
//! A table holds exact role and user maps keyed by lower-cased ARN, the
//! ARN-like role and user entries keyed by their pattern, and the set of
//! auto-mapped accounts. Tables are built whole and never edited; a newer
//! generation replaces an older one as a unit.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::arn::canonicalize;
use crate::codec::ParsedDocument;
use crate::config::Config;
use crate::error::{MapperError, ValidationError};
use crate::traits::PrincipalMapping;
use crate::types::{IdentityMapping, PatternEntry, RoleMapping, UserMapping};

#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    roles: HashMap<String, RoleMapping>,
    role_patterns: HashMap<String, PatternEntry<RoleMapping>>,
    users: HashMap<String, UserMapping>,
    user_patterns: HashMap<String, PatternEntry<UserMapping>>,
    accounts: HashSet<String>,
}

/// Entry counts of a table, for logs and metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub roles: usize,
    pub role_patterns: usize,
    pub users: usize,
    pub user_patterns: usize,
    pub accounts: usize,
}

impl MappingTable {
    /// Build a table from static configuration.
    ///
    /// Every record is validated and every exact ARN canonicalized; the first
    /// failure aborts the whole build.
    pub fn from_config(config: &Config) -> Result<Self, ValidationError> {
        let mut table = MappingTable::default();

        for role in &config.role_mappings {
            match PatternEntry::compile(role.clone())? {
                Some(entry) => {
                    table.role_patterns.insert(entry.pattern.to_string(), entry);
                }
                None => {
                    table.roles.insert(canonicalize(role.key())?, role.clone());
                }
            }
        }

        for user in &config.user_mappings {
            match PatternEntry::compile(user.clone())? {
                Some(entry) => {
                    table.user_patterns.insert(entry.pattern.to_string(), entry);
                }
                None => {
                    table.users.insert(canonicalize(user.key())?, user.clone());
                }
            }
        }

        table.accounts = config.auto_mapped_aws_accounts.iter().cloned().collect();
        Ok(table)
    }

    /// Build a table from the records of a parsed document.
    ///
    /// The records were validated by the codec; exact keys are lower-cased
    /// as written, not canonicalized.
    pub fn from_parsed(parsed: ParsedDocument) -> Self {
        let ParsedDocument {
            users,
            user_patterns,
            roles,
            role_patterns,
            accounts,
            ..
        } = parsed;

        MappingTable {
            roles: roles
                .into_iter()
                .map(|r| (exact_key(r.key()), r))
                .collect(),
            role_patterns: role_patterns
                .into_iter()
                .map(|e| (e.pattern.to_string(), e))
                .collect(),
            users: users
                .into_iter()
                .map(|u| (exact_key(u.key()), u))
                .collect(),
            user_patterns: user_patterns
                .into_iter()
                .map(|e| (e.pattern.to_string(), e))
                .collect(),
            accounts: accounts.into_iter().collect(),
        }
    }

    pub fn counts(&self) -> TableCounts {
        TableCounts {
            roles: self.roles.len(),
            role_patterns: self.role_patterns.len(),
            users: self.users.len(),
            user_patterns: self.user_patterns.len(),
            accounts: self.accounts.len(),
        }
    }

    pub fn role_mapping(&self, arn: &str) -> Result<&RoleMapping, MapperError> {
        self.roles.get(arn).ok_or(MapperError::RoleNotFound)
    }

    pub fn user_mapping(&self, arn: &str) -> Result<&UserMapping, MapperError> {
        self.users.get(arn).ok_or(MapperError::UserNotFound)
    }

    /// First ARN-like role entry matching `arn`. Entries are scanned in no
    /// particular order.
    pub fn role_arn_like_mapping(&self, arn: &str) -> Result<&RoleMapping, MapperError> {
        scan(&self.role_patterns, arn).and_then(|m| m.ok_or(MapperError::RoleArnLikeNotMatched))
    }

    /// First ARN-like user entry matching `arn`. Entries are scanned in no
    /// particular order.
    pub fn user_arn_like_mapping(&self, arn: &str) -> Result<&UserMapping, MapperError> {
        scan(&self.user_patterns, arn).and_then(|m| m.ok_or(MapperError::UserArnLikeNotMatched))
    }

    pub fn aws_account(&self, id: &str) -> bool {
        self.accounts.contains(id)
    }

    /// Resolve a canonical ARN: exact role, exact user, role pattern, user
    /// pattern. Exact entries always win over patterns.
    pub fn resolve(&self, arn: &str) -> Result<IdentityMapping, MapperError> {
        if let Some(found) = hit(self.role_mapping(arn))? {
            debug!(event = "Map", phase = "RoleExact", arn = arn);
            return Ok(found.to_identity(arn));
        }
        if let Some(found) = hit(self.user_mapping(arn))? {
            debug!(event = "Map", phase = "UserExact", arn = arn);
            return Ok(found.to_identity(arn));
        }
        if let Some(found) = hit(self.role_arn_like_mapping(arn))? {
            debug!(event = "Map", phase = "RolePattern", arn = arn, pattern = found.key());
            return Ok(found.to_identity(arn));
        }
        if let Some(found) = hit(self.user_arn_like_mapping(arn))? {
            debug!(event = "Map", phase = "UserPattern", arn = arn, pattern = found.key());
            return Ok(found.to_identity(arn));
        }
        Err(MapperError::NotMapped)
    }
}

/// Key an exact ARN from a live document is stored under.
pub(crate) fn exact_key(arn: &str) -> String {
    arn.to_lowercase()
}

fn scan<'a, M: PrincipalMapping>(
    patterns: &'a HashMap<String, PatternEntry<M>>,
    arn: &str,
) -> Result<Option<&'a M>, MapperError> {
    for entry in patterns.values() {
        if entry.matches(arn)? {
            return Ok(Some(&entry.mapping));
        }
    }
    Ok(None)
}

/// Turn a typed miss into `None`, keeping hits and real errors.
fn hit<T>(result: Result<T, MapperError>) -> Result<Option<T>, MapperError> {
    match result {
        Ok(found) => Ok(Some(found)),
        Err(e) if e.is_miss() => Ok(None),
        Err(e) => Err(e),
    }
}
