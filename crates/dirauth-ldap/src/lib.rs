//! Directory-backed authentication and authorization adapter over LDAP.
//!
//! This crate resolves a login to a directory entry, verifies credentials by
//! binding as that entry, evaluates supplementary authorization rules (group
//! membership, required attribute values), and supports administrative
//! password rotation and group-membership lookup.

#![deny(missing_docs)]
#![cfg_attr(test, allow(missing_docs))]

mod adapter;
mod authorize;
mod config;
mod dn;
mod password;
mod resolver;
mod session;

pub use adapter::DirectoryAuthenticator;
pub use authorize::AuthorizationEvaluator;
pub use config::{
    DirectoryConfig, GroupRequirement, DEFAULT_CONNECTION_TIMEOUT_SECS,
    DEFAULT_MEMBERSHIP_ATTRIBUTE, DEFAULT_OPERATION_TIMEOUT_SECS,
};
pub use dn::{DistinguishedName, DistinguishedNameError, RelativeDistinguishedName};
pub use password::{generate_ssha, verify_ssha, PASSWORD_ATTRIBUTE};
pub use resolver::{FallbackIdentity, IdentityResolver, RdnUnderBase};
pub use session::{
    DirectoryConnector, DirectoryEntry, DirectorySession, LdapConnector, SearchScope,
};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = dirauth_core::Result<T>;
