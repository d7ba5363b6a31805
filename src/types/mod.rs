//! Mapping record model.
//!
//! Document field forms:
//! - role record: `{rolearn | rolearnLike, username, groups}`
//! - user record: `{userarn | userarnLike, username, groups}`
//!
//! Identifier fields left empty (`rolearnLike: ""`) are treated as absent.
//! Records are validated once, when they are ingested, and never mutated
//! afterwards.

mod identity;
mod pattern_entry;
mod role_mapping;
pub(crate) mod scalar;
mod user_mapping;

pub use identity::IdentityMapping;
pub use pattern_entry::PatternEntry;
pub use role_mapping::RoleMapping;
pub use user_mapping::UserMapping;
