//! IAM user to cluster identity mappings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::arn::{ArnPattern, PrincipalType, USER_SHAPE};
use crate::traits::PrincipalMapping;

use super::scalar;

/// Maps an IAM user, by exact ARN or ARN-like pattern, to a username and groups.
///
/// Exactly one of `user_arn` and `user_arn_like` must be set; see
/// [`PrincipalMapping::validate`]. The username is passed through
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserMapping {
    #[serde(
        rename = "userarn",
        default,
        deserialize_with = "scalar::identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_arn: Option<String>,
    #[serde(
        rename = "userarnLike",
        default,
        deserialize_with = "scalar::identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_arn_like: Option<String>,
    #[serde(default, deserialize_with = "scalar::string")]
    pub username: String,
    #[serde(default, deserialize_with = "scalar::strings")]
    pub groups: Vec<String>,
}

impl UserMapping {
    /// A mapping for one exact user ARN.
    pub fn exact<A, U, I, G>(user_arn: A, username: U, groups: I) -> Self
    where
        A: Into<String>,
        U: Into<String>,
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        UserMapping {
            user_arn: Some(user_arn.into()),
            user_arn_like: None,
            username: username.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// A mapping for every user matching an ARN-like pattern.
    pub fn like<P, U, I, G>(pattern: P, username: U, groups: I) -> Self
    where
        P: Into<String>,
        U: Into<String>,
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        UserMapping {
            user_arn: None,
            user_arn_like: Some(pattern.into()),
            username: username.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }
}

impl PrincipalMapping for UserMapping {
    fn arn_field() -> &'static str {
        "userarn"
    }

    fn principal_type() -> PrincipalType {
        PrincipalType::User
    }

    fn shape() -> &'static ArnPattern {
        &USER_SHAPE
    }

    fn arn(&self) -> Option<&str> {
        self.user_arn.as_deref().filter(|s| !s.is_empty())
    }

    fn arn_like(&self) -> Option<&str> {
        self.user_arn_like.as_deref().filter(|s| !s.is_empty())
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn groups(&self) -> &[String] {
        &self.groups
    }
}
