use std::fmt::{Display, Formatter, Result as FmtResult};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A mapping record, ARN or ARN-like pattern failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("arn '{arn}' is invalid: {reason}")]
    MalformedArn { arn: String, reason: String },

    #[error("ARN-like pattern '{pattern}' is invalid: {reason}")]
    MalformedPattern { pattern: String, reason: String },

    #[error("One of {field} or {field}Like must be supplied")]
    MissingIdentifier { field: String },

    #[error("Only one of {field} or {field}Like can be supplied")]
    ConflictingIdentifiers { field: String },

    #[error("{field}Like '{pattern}' did not match an ARN for an IAM {principal}")]
    PatternShape {
        field: String,
        pattern: String,
        principal: String,
    },

    #[error("mapping for '{key}' has an empty username")]
    EmptyUsername { key: String },

    #[error("mapping for '{key}' has an empty group name")]
    EmptyGroup { key: String },
}

/// Errors surfaced on the resolution path.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MapperError {
    #[error("ARN is not mapped")]
    NotMapped,

    #[error("User not found in configmap")]
    UserNotFound,

    #[error("Role not found in configmap")]
    RoleNotFound,

    #[error("User not matched to any UserARNLike strings in configmap")]
    UserArnLikeNotMatched,

    #[error("Role not matched to any RoleARNLike strings in configmap")]
    RoleArnLikeNotMatched,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Poisoned lock error: {0}")]
    PoisonedLock(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl MapperError {
    /// True for the expected "this ARN has no identity" outcomes.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            MapperError::NotMapped
                | MapperError::UserNotFound
                | MapperError::RoleNotFound
                | MapperError::UserArnLikeNotMatched
                | MapperError::RoleArnLikeNotMatched
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for MapperError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        MapperError::PoisonedLock(err.to_string())
    }
}

/// Failures reported by the external document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("document '{name}' not found")]
    NotFound { name: String },

    #[error("document '{name}' was modified concurrently: expected version {expected}, found {actual}")]
    Conflict {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("document source unavailable: {0}")]
    Unavailable(String),
}

/// One cause collected while parsing a mapping document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// Document field the cause was found in, e.g. `mapRoles`.
    pub field: String,
    /// Index of the offending record, `None` when the whole field failed to decode.
    pub index: Option<usize>,
    pub message: String,
}

impl Display for ParseIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.index {
            Some(index) => write!(f, "{}[{}]: {}", self.field, index, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// Aggregate of every cause found while parsing a mapping document.
///
/// Returned next to the records that did parse, so callers decide whether
/// a partially valid document is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("error parsing config map: [{}]", .issues.iter().join("; "))]
pub struct ParseErrors {
    issues: Vec<ParseIssue>,
}

impl ParseErrors {
    pub(crate) fn push(&mut self, field: &str, index: Option<usize>, message: impl Into<String>) {
        self.issues.push(ParseIssue {
            field: field.to_string(),
            index,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }
}

#[derive(Debug, Error)]
#[error("failed to encode {field}: {source}")]
pub struct EncodeError {
    pub field: String,
    #[source]
    pub source: serde_yaml::Error,
}

/// Errors from the read-modify-write path against the external document.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("cannot add duplicate {kind} ARN {key:?}")]
    Duplicate { kind: String, key: String },

    #[error("invalid mapping entry: {0}")]
    InvalidEntry(#[from] ValidationError),

    #[error("failed to parse configmap {0}")]
    Parse(ParseErrors),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("gave up after {attempts} conflicting update attempts: {last}")]
    RetriesExhausted { attempts: u32, last: SourceError },
}
