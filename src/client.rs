//! Read-modify-write updates of the live mapping document.
//!
//! Every update reads the current document, appends one record and writes
//! the result back conditioned on the version that was read. A concurrent
//! write makes the condition fail; the whole cycle is then repeated from a
//! fresh read, a bounded number of times.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::codec::{ACCOUNTS_FIELD, ParsedDocument, ROLES_FIELD, USERS_FIELD, encode_document, parse_document};
use crate::config::UpdateConfig;
use crate::error::{SourceError, UpdateError};
use crate::source::{Document, DocumentStore};
use crate::table::exact_key;
use crate::traits::PrincipalMapping;
use crate::types::{RoleMapping, UserMapping};

pub struct UpdateClient {
    source: Arc<dyn DocumentStore>,
    config: UpdateConfig,
    document_name: String,
}

impl UpdateClient {
    pub fn new(
        source: Arc<dyn DocumentStore>,
        config: UpdateConfig,
        document_name: impl Into<String>,
    ) -> Self {
        UpdateClient {
            source,
            config,
            document_name: document_name.into(),
        }
    }

    /// Append `role` to the document's role list.
    ///
    /// Fails with [`UpdateError::Duplicate`] if a role record with the same
    /// ARN (ignoring case) or pattern already exists; the document is then
    /// left untouched.
    pub async fn add_role(&self, role: RoleMapping) -> Result<Document, UpdateError> {
        role.validate()?;
        self.modify(|parsed| {
            let mut roles = parsed.all_roles();
            ensure_unique("role", &roles, &role)?;
            roles.push(role.clone());
            Ok(encode_document(&parsed.all_users(), &roles, &parsed.accounts)?)
        })
        .await
    }

    /// Append `user` to the document's user list. Same rules as
    /// [`UpdateClient::add_role`].
    pub async fn add_user(&self, user: UserMapping) -> Result<Document, UpdateError> {
        user.validate()?;
        self.modify(|parsed| {
            let mut users = parsed.all_users();
            ensure_unique("user", &users, &user)?;
            users.push(user.clone());
            Ok(encode_document(&users, &parsed.all_roles(), &parsed.accounts)?)
        })
        .await
    }

    async fn modify<F>(&self, edit: F) -> Result<Document, UpdateError>
    where
        F: Fn(&ParsedDocument) -> Result<BTreeMap<String, String>, UpdateError> + Send + Sync,
    {
        let name = self.document_name.as_str();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut document = self.source.get(name).await.inspect_err(|e| {
                if matches!(e, SourceError::NotFound { .. }) {
                    warn!(event = "Update", phase = "Read", document = name, "Mapping document does not exist");
                }
            })?;

            let parsed = parse_document(&document.data);
            if let Some(errors) = parsed.error() {
                return Err(UpdateError::Parse(errors.clone()));
            }

            let fields = edit(&parsed)?;
            for field in [USERS_FIELD, ROLES_FIELD, ACCOUNTS_FIELD] {
                document.data.remove(field);
            }
            document.data.extend(fields);

            match self.source.update(document).await {
                Ok(written) => {
                    info!(
                        event = "Update",
                        phase = "Written",
                        document = name,
                        version = written.version,
                        attempt = attempt
                    );
                    return Ok(written);
                }
                Err(conflict @ SourceError::Conflict { .. }) => {
                    if attempt >= max_attempts {
                        return Err(UpdateError::RetriesExhausted {
                            attempts: attempt,
                            last: conflict,
                        });
                    }
                    warn!(
                        event = "Update",
                        phase = "Conflict",
                        document = name,
                        attempt = attempt,
                        error = %conflict,
                        "Document changed underneath us, retrying"
                    );
                    sleep(self.config.retry_interval).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Exact ARNs compare the way the live table keys them; patterns compare
/// as written.
fn identity_key<M: PrincipalMapping>(mapping: &M) -> String {
    match mapping.arn() {
        Some(arn) => exact_key(arn),
        None => mapping.key().to_string(),
    }
}

fn ensure_unique<M: PrincipalMapping>(kind: &str, existing: &[M], new: &M) -> Result<(), UpdateError> {
    let key = identity_key(new);
    if existing.iter().any(|m| identity_key(m) == key) {
        return Err(UpdateError::Duplicate {
            kind: kind.to_string(),
            key: new.key().to_string(),
        });
    }
    Ok(())
}
