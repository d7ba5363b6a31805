//! ARN canonicalization and ARN-like (glob) matching.
//!
//! Exact lookups compare canonical, lower-cased ARNs. ARN-like patterns are
//! matched component by component: the six `:`-separated sections of the
//! pattern are globbed against the matching sections of the candidate, so a
//! `*` never spans a section boundary. Pattern matching is case-sensitive and
//! callers hand it canonical (lower-cased) candidates.

use std::fmt::{Display, Formatter, Result as FmtResult};

use once_cell::sync::Lazy;
use regex::Regex;
use strum::{AsRefStr, Display as StrumDisplay};

use crate::error::ValidationError;

const ARN_SECTIONS: usize = 6;

const PARTITIONS: &[&str] = &[
    "aws",
    "aws-cn",
    "aws-us-gov",
    "aws-iso",
    "aws-iso-b",
    "aws-iso-e",
    "aws-iso-f",
    "eusc",
];

/// The kind of IAM principal a canonical ARN names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, AsRefStr)]
pub enum PrincipalType {
    Root,
    User,
    Role,
    FederatedUser,
}

pub(crate) static ROLE_SHAPE: Lazy<ArnPattern> = Lazy::new(|| {
    ArnPattern::parse("arn:*:iam:*:*:role/*").expect("role shape pattern is a valid ARN pattern")
});

pub(crate) static USER_SHAPE: Lazy<ArnPattern> = Lazy::new(|| {
    ArnPattern::parse("arn:*:iam:*:*:user/*").expect("user shape pattern is a valid ARN pattern")
});

fn split_sections(arn: &str) -> Option<Vec<&str>> {
    let sections: Vec<&str> = arn.splitn(ARN_SECTIONS, ':').collect();
    (sections.len() == ARN_SECTIONS && sections[0] == "arn").then_some(sections)
}

/// Validate `arn` and return its canonical, lower-cased form.
///
/// STS assumed-role ARNs are rewritten to the IAM role they were assumed
/// from, so `arn:aws:sts::123:assumed-role/Admin/session` canonicalizes to
/// `arn:aws:iam::123:role/admin`.
pub fn canonicalize(arn: &str) -> Result<String, ValidationError> {
    canonicalize_with_type(arn).map(|(_, canonical)| canonical)
}

/// Like [`canonicalize`], also reporting which kind of principal the ARN names.
pub fn canonicalize_with_type(arn: &str) -> Result<(PrincipalType, String), ValidationError> {
    let malformed = |reason: String| ValidationError::MalformedArn {
        arn: arn.to_string(),
        reason,
    };

    let lowered = arn.to_lowercase();
    let sections = split_sections(&lowered)
        .ok_or_else(|| malformed("expected 'arn:<partition>:<service>:<region>:<account>:<resource>'".into()))?;
    let (partition, service, account, resource) = (sections[1], sections[2], sections[4], sections[5]);

    if !PARTITIONS.contains(&partition) {
        return Err(malformed(format!("partition '{partition}' is not recognized")));
    }
    if account.is_empty() {
        return Err(malformed("missing account id".into()));
    }

    let segments: Vec<&str> = resource.split('/').collect();
    let named = segments.len() >= 2 && segments.iter().all(|s| !s.is_empty());

    match (service, segments[0]) {
        ("iam", "root") if segments.len() == 1 => Ok((PrincipalType::Root, lowered.clone())),
        ("iam", "role") if named => Ok((PrincipalType::Role, lowered.clone())),
        ("iam", "user") if named => Ok((PrincipalType::User, lowered.clone())),
        ("sts", "federated-user") if named => Ok((PrincipalType::FederatedUser, lowered.clone())),
        ("sts", "assumed-role") => {
            if segments.len() < 3 || segments[1].is_empty() {
                return Err(malformed("assumed-role arn does not have a role".into()));
            }
            Ok((
                PrincipalType::Role,
                format!("arn:{partition}:iam::{account}:role/{}", segments[1]),
            ))
        }
        ("iam" | "sts", _) => Err(malformed(format!(
            "unrecognized resource '{resource}' for service {service}"
        ))),
        (other, _) => Err(malformed(format!(
            "service '{other}' is not a valid service for identities"
        ))),
    }
}

/// A compiled ARN-like pattern.
///
/// `*` matches any run of characters and `?` exactly one, within a single
/// ARN section. Compiled once when a mapping is ingested.
#[derive(Debug, Clone)]
pub struct ArnPattern {
    source: String,
    sections: Vec<Regex>,
}

impl ArnPattern {
    pub fn parse(pattern: &str) -> Result<Self, ValidationError> {
        let malformed = |reason: String| ValidationError::MalformedPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let raw = split_sections(pattern)
            .ok_or_else(|| malformed("expected six ':'-separated sections starting with 'arn'".into()))?;
        let sections = raw
            .iter()
            .map(|section| glob_to_regex(section).map_err(|e| malformed(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ArnPattern {
            source: pattern.to_string(),
            sections,
        })
    }

    /// The pattern as it was configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match `candidate` against this pattern.
    ///
    /// A candidate that is not shaped like an ARN is an error, not a miss.
    pub fn matches(&self, candidate: &str) -> Result<bool, ValidationError> {
        let sections = split_sections(candidate).ok_or_else(|| ValidationError::MalformedArn {
            arn: candidate.to_string(),
            reason: "expected six ':'-separated sections starting with 'arn'".into(),
        })?;

        Ok(self
            .sections
            .iter()
            .zip(sections)
            .all(|(re, section)| re.is_match(section)))
    }
}

impl PartialEq for ArnPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for ArnPattern {}

impl Display for ArnPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.source)
    }
}

/// Match `candidate` against the ARN-like `pattern`, compiling the pattern on the fly.
pub fn arn_like(candidate: &str, pattern: &str) -> Result<bool, ValidationError> {
    ArnPattern::parse(pattern)?.matches(candidate)
}

fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(glob.len() + 8);
    expr.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for ch in glob.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    expr.push('$');
    Regex::new(&expr)
}
