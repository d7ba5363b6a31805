//! Decoding and encoding of the mapping document's fields.
//!
//! The document carries three optional text fields: `mapRoles`, `mapUsers`
//! and `mapAccounts`. Role and user lists are accepted either as a JSON
//! array (the strict form, decoded with `serde_json`, where every value must
//! already be a string) or as YAML with untyped scalars (the loose form, where
//! numbers and booleans are read as strings). Both land in the same record
//! types.
//!
//! Parsing never stops at the first bad record: every cause is collected into
//! [`ParseErrors`] and returned next to the records that did validate.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{EncodeError, ParseErrors};
use crate::traits::PrincipalMapping;
use crate::types::{PatternEntry, RoleMapping, UserMapping, scalar};

pub const ROLES_FIELD: &str = "mapRoles";
pub const USERS_FIELD: &str = "mapUsers";
pub const ACCOUNTS_FIELD: &str = "mapAccounts";

/// Best-effort result of parsing a mapping document.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub users: Vec<UserMapping>,
    pub user_patterns: Vec<PatternEntry<UserMapping>>,
    pub roles: Vec<RoleMapping>,
    pub role_patterns: Vec<PatternEntry<RoleMapping>>,
    pub accounts: Vec<String>,
    /// Every cause found; empty when the whole document was valid.
    pub errors: ParseErrors,
}

impl ParsedDocument {
    /// The aggregate error, if any record or field was rejected.
    pub fn error(&self) -> Option<&ParseErrors> {
        (!self.errors.is_empty()).then_some(&self.errors)
    }

    /// Exact and ARN-like user records, in that order.
    pub fn all_users(&self) -> Vec<UserMapping> {
        self.users
            .iter()
            .cloned()
            .chain(self.user_patterns.iter().map(|e| e.mapping.clone()))
            .collect()
    }

    /// Exact and ARN-like role records, in that order.
    pub fn all_roles(&self) -> Vec<RoleMapping> {
        self.roles
            .iter()
            .cloned()
            .chain(self.role_patterns.iter().map(|e| e.mapping.clone()))
            .collect()
    }
}

#[derive(serde::Deserialize)]
struct Accounts(#[serde(deserialize_with = "scalar::strings")] Vec<String>);

/// Parse the mapping fields of `data`. Absent fields are not errors.
pub fn parse_document(data: &BTreeMap<String, String>) -> ParsedDocument {
    let mut parsed = ParsedDocument::default();

    if let Some(text) = data.get(USERS_FIELD) {
        let records = decode_records::<UserMapping>(USERS_FIELD, text, &mut parsed.errors);
        (parsed.users, parsed.user_patterns) = classify(USERS_FIELD, records, &mut parsed.errors);
    }

    if let Some(text) = data.get(ROLES_FIELD) {
        let records = decode_records::<RoleMapping>(ROLES_FIELD, text, &mut parsed.errors);
        (parsed.roles, parsed.role_patterns) = classify(ROLES_FIELD, records, &mut parsed.errors);
    }

    if let Some(text) = data.get(ACCOUNTS_FIELD) {
        if !text.trim().is_empty() {
            match serde_yaml::from_str::<Accounts>(text) {
                Ok(Accounts(accounts)) => parsed.accounts = accounts,
                Err(e) => parsed.errors.push(ACCOUNTS_FIELD, None, e.to_string()),
            }
        }
    }

    if let Some(errors) = parsed.error() {
        warn!(event = "Parse", phase = "Validate", errors = %errors, "Errors parsing mapping document");
    }
    parsed
}

/// Decode each record of a list field on its own so one bad record only
/// costs that record. Returns records paired with their index in the list.
fn decode_records<M: DeserializeOwned>(
    field: &str,
    text: &str,
    errors: &mut ParseErrors,
) -> Vec<(usize, M)> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    if text.trim_start().starts_with('[') {
        if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(text) {
            return values
                .into_iter()
                .enumerate()
                .filter_map(|(index, value)| {
                    match check_typed(&value).and_then(|_| {
                        serde_json::from_value(value).map_err(|e| e.to_string())
                    }) {
                        Ok(record) => Some((index, record)),
                        Err(message) => {
                            errors.push(field, Some(index), message);
                            None
                        }
                    }
                })
                .collect();
        }
        // Not JSON; a YAML flow sequence is handled below.
    }

    let values = match serde_yaml::from_str::<Option<Vec<serde_yaml::Value>>>(text) {
        Ok(values) => values.unwrap_or_default(),
        Err(e) => {
            errors.push(field, None, e.to_string());
            return Vec::new();
        }
    };

    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_yaml::from_value(value) {
            Ok(record) => Some((index, record)),
            Err(e) => {
                errors.push(field, Some(index), e.to_string());
                None
            }
        })
        .collect()
}

/// The strict form takes no scalar coercion: every record field must be a
/// string, a list of strings, or null.
fn check_typed(value: &serde_json::Value) -> Result<(), String> {
    use serde_json::Value;

    let object = value
        .as_object()
        .ok_or_else(|| format!("expected an object, found {value}"))?;
    for (key, field) in object {
        let typed = match field {
            Value::Null | Value::String(_) => true,
            Value::Array(items) => items.iter().all(Value::is_string),
            _ => false,
        };
        if !typed {
            return Err(format!("field {key:?} must be a string or a list of strings, found {field}"));
        }
    }
    Ok(())
}

/// Validate records and split them into exact and ARN-like sets.
fn classify<M: PrincipalMapping>(
    field: &str,
    records: Vec<(usize, M)>,
    errors: &mut ParseErrors,
) -> (Vec<M>, Vec<PatternEntry<M>>) {
    let mut exact = Vec::new();
    let mut patterns = Vec::new();

    for (index, record) in records {
        match PatternEntry::compile(record.clone()) {
            Ok(None) => exact.push(record),
            Ok(Some(entry)) => patterns.push(entry),
            Err(e) => errors.push(field, Some(index), e.to_string()),
        }
    }

    (exact, patterns)
}

/// Encode record lists into document fields. Empty lists leave their field out.
pub fn encode_document(
    users: &[UserMapping],
    roles: &[RoleMapping],
    accounts: &[String],
) -> Result<BTreeMap<String, String>, EncodeError> {
    let mut data = BTreeMap::new();
    encode_field(&mut data, USERS_FIELD, users)?;
    encode_field(&mut data, ROLES_FIELD, roles)?;
    encode_field(&mut data, ACCOUNTS_FIELD, accounts)?;
    Ok(data)
}

fn encode_field<T: Serialize>(
    data: &mut BTreeMap<String, String>,
    field: &str,
    items: &[T],
) -> Result<(), EncodeError> {
    if items.is_empty() {
        return Ok(());
    }
    let body = serde_yaml::to_string(items).map_err(|source| EncodeError {
        field: field.to_string(),
        source,
    })?;
    data.insert(field.to_string(), body);
    Ok(())
}
