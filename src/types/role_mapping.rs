//! IAM role to cluster identity mappings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::arn::{ArnPattern, PrincipalType, ROLE_SHAPE};
use crate::traits::PrincipalMapping;

use super::scalar;

/// Maps an IAM role, by exact ARN or ARN-like pattern, to a username and groups.
///
/// Exactly one of `role_arn` and `role_arn_like` must be set; see
/// [`PrincipalMapping::validate`]. The username is a template passed through
/// untouched (e.g. `system:node:{{EC2PrivateDNSName}}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleMapping {
    #[serde(
        rename = "rolearn",
        default,
        deserialize_with = "scalar::identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub role_arn: Option<String>,
    #[serde(
        rename = "rolearnLike",
        default,
        deserialize_with = "scalar::identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub role_arn_like: Option<String>,
    #[serde(default, deserialize_with = "scalar::string")]
    pub username: String,
    #[serde(default, deserialize_with = "scalar::strings")]
    pub groups: Vec<String>,
}

impl RoleMapping {
    /// A mapping for one exact role ARN.
    pub fn exact<A, U, I, G>(role_arn: A, username: U, groups: I) -> Self
    where
        A: Into<String>,
        U: Into<String>,
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        RoleMapping {
            role_arn: Some(role_arn.into()),
            role_arn_like: None,
            username: username.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// A mapping for every role matching an ARN-like pattern.
    pub fn like<P, U, I, G>(pattern: P, username: U, groups: I) -> Self
    where
        P: Into<String>,
        U: Into<String>,
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        RoleMapping {
            role_arn: None,
            role_arn_like: Some(pattern.into()),
            username: username.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }
}

impl PrincipalMapping for RoleMapping {
    fn arn_field() -> &'static str {
        "rolearn"
    }

    fn principal_type() -> PrincipalType {
        PrincipalType::Role
    }

    fn shape() -> &'static ArnPattern {
        &ROLE_SHAPE
    }

    fn arn(&self) -> Option<&str> {
        self.role_arn.as_deref().filter(|s| !s.is_empty())
    }

    fn arn_like(&self) -> Option<&str> {
        self.role_arn_like.as_deref().filter(|s| !s.is_empty())
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn groups(&self) -> &[String] {
        &self.groups
    }
}
