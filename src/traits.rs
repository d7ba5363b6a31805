use crate::arn::{ArnPattern, PrincipalType};
use crate::error::ValidationError;
use crate::types::IdentityMapping;

/// The validated identifier of a mapping record: either an exact ARN or a
/// compiled ARN-like pattern, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Exact(String),
    Pattern(ArnPattern),
}

/// Behaviour shared by role and user mapping records.
///
/// Implementors only expose their fields; validation, keying and matching
/// are provided.
pub trait PrincipalMapping: Clone + Send + Sync + 'static {
    /// Name of the exact-ARN field in documents, e.g. `rolearn`.
    fn arn_field() -> &'static str;

    /// Principal kind the ARN-like field must describe.
    fn principal_type() -> PrincipalType;

    /// Pattern every ARN-like value of this record kind must itself match.
    fn shape() -> &'static ArnPattern;

    fn arn(&self) -> Option<&str>;

    fn arn_like(&self) -> Option<&str>;

    fn username(&self) -> &str;

    fn groups(&self) -> &[String];

    /// Validate the record and return its identifier, compiling the pattern
    /// if the record is ARN-like.
    fn identifier(&self) -> Result<Identifier, ValidationError> {
        let field = Self::arn_field().to_string();
        let identifier = match (self.arn(), self.arn_like()) {
            (None, None) => return Err(ValidationError::MissingIdentifier { field }),
            (Some(_), Some(_)) => return Err(ValidationError::ConflictingIdentifiers { field }),
            (Some(arn), None) => Identifier::Exact(arn.to_string()),
            (None, Some(pattern)) => {
                let compiled = ArnPattern::parse(pattern)?;
                let shaped = Self::shape().matches(pattern).map_err(|e| {
                    ValidationError::MalformedPattern {
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                if !shaped {
                    return Err(ValidationError::PatternShape {
                        field,
                        pattern: pattern.to_string(),
                        principal: Self::principal_type().to_string(),
                    });
                }
                Identifier::Pattern(compiled)
            }
        };

        if self.username().is_empty() {
            return Err(ValidationError::EmptyUsername {
                key: self.key().to_string(),
            });
        }
        if self.groups().iter().any(|g| g.is_empty()) {
            return Err(ValidationError::EmptyGroup {
                key: self.key().to_string(),
            });
        }

        Ok(identifier)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.identifier().map(|_| ())
    }

    /// The exact ARN or the ARN-like pattern, whichever is set.
    fn key(&self) -> &str {
        self.arn().or(self.arn_like()).unwrap_or_default()
    }

    /// Build the resolution result for `identity_arn` from this record.
    fn to_identity(&self, identity_arn: &str) -> IdentityMapping {
        IdentityMapping {
            identity_arn: identity_arn.to_string(),
            username: self.username().to_string(),
            groups: self.groups().to_vec(),
        }
    }
}
