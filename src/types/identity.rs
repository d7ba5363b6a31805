//! Resolution results.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The cluster identity an ARN resolved to.
///
/// Built fresh for every successful resolution and owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IdentityMapping {
    /// The canonical ARN that was resolved.
    #[serde(rename = "identityARN")]
    pub identity_arn: String,
    pub username: String,
    pub groups: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_json_snapshot;

    #[test]
    fn test_identity_mapping_serialization() {
        let identity = IdentityMapping {
            identity_arn: "arn:aws:iam::0123456789012:role/test-role".into(),
            username: "roland".into(),
            groups: vec!["system:masters".into()],
        };
        assert_json_snapshot!(identity, @r#"
        {
          "identityARN": "arn:aws:iam::0123456789012:role/test-role",
          "username": "roland",
          "groups": [
            "system:masters"
          ]
        }
        "#);
    }
}
