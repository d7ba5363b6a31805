use crate::arn::ArnPattern;
use crate::error::ValidationError;
use crate::traits::{Identifier, PrincipalMapping};

/// An ARN-like mapping record together with its compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEntry<M> {
    pub pattern: ArnPattern,
    pub mapping: M,
}

impl<M: PrincipalMapping> PatternEntry<M> {
    /// Validate `mapping` and compile its pattern. Returns `Ok(None)` for
    /// exact-ARN records.
    pub fn compile(mapping: M) -> Result<Option<Self>, ValidationError> {
        match mapping.identifier()? {
            Identifier::Exact(_) => Ok(None),
            Identifier::Pattern(pattern) => Ok(Some(PatternEntry { pattern, mapping })),
        }
    }

    pub fn matches(&self, candidate: &str) -> Result<bool, ValidationError> {
        self.pattern.matches(candidate)
    }
}
