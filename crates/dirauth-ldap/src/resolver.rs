//! Identity resolution: login to distinguished name.

use crate::{
    config::DirectoryConfig,
    dn::{DistinguishedName, RelativeDistinguishedName},
    session::{escape_filter_value, DirectorySession, SearchScope},
    Result,
};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Strategy for constructing a subject DN when the primary directory lookup
/// finds nothing or fails.
///
/// Invoked with the identifying attribute, the login, and the session the
/// lookup ran over, so implementations may consult the directory themselves.
#[async_trait]
pub trait FallbackIdentity: Send + Sync {
    /// Builds a distinguished name for the login.
    async fn build(
        &self,
        attribute: &str,
        login: &str,
        session: &mut dyn DirectorySession,
    ) -> Result<DistinguishedName>;
}

/// Default fallback builder: `attribute=login` prefixed onto a base DN.
pub struct RdnUnderBase {
    base: DistinguishedName,
}

impl RdnUnderBase {
    /// Creates a builder that places logins directly under `base`.
    #[must_use]
    pub const fn new(base: DistinguishedName) -> Self {
        Self { base }
    }
}

#[async_trait]
impl FallbackIdentity for RdnUnderBase {
    async fn build(
        &self,
        attribute: &str,
        login: &str,
        _session: &mut dyn DirectorySession,
    ) -> Result<DistinguishedName> {
        Ok(self
            .base
            .clone()
            .with_prefix(RelativeDistinguishedName::new(attribute, login)))
    }
}

/// Resolves a login to a distinguished name via a bounded directory search,
/// falling back to the injected identity builder on a miss or a transport
/// failure.
pub struct IdentityResolver<'a> {
    config: &'a DirectoryConfig,
}

impl<'a> IdentityResolver<'a> {
    /// Creates a resolver over the given configuration.
    #[must_use]
    pub const fn new(config: &'a DirectoryConfig) -> Self {
        Self { config }
    }

    /// Resolves `login` to a DN.
    ///
    /// The search is an equality filter on the configured identifying
    /// attribute, subtree-scoped under the configured base, and bounded by
    /// the operation timeout. A timeout or protocol failure is recovered
    /// locally through the fallback builder and never surfaces to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error only when the fallback builder itself fails or the
    /// server hands back a malformed DN.
    pub async fn resolve(
        &self,
        session: &mut dyn DirectorySession,
        fallback: &dyn FallbackIdentity,
        login: &str,
    ) -> Result<DistinguishedName> {
        let attribute = self.config.attribute();
        debug!(attribute, login, "directory identity search");

        let filter = format!("({attribute}={})", escape_filter_value(login));
        let attributes = [attribute.to_string()];
        let outcome = timeout(
            self.config.operation_timeout(),
            session.search(
                self.config.base().as_str(),
                SearchScope::Subtree,
                &filter,
                &attributes,
            ),
        )
        .await;

        let entries = match outcome {
            Err(_) => {
                warn!(login, "identity search deadline exceeded, using fallback identity");
                return fallback.build(attribute, login, session).await;
            }
            Ok(Err(err)) if err.is_recoverable_lookup_failure() => {
                warn!(login, error = %err, "identity search failed, using fallback identity");
                return fallback.build(attribute, login, session).await;
            }
            Ok(Err(err)) => return Err(err),
            Ok(Ok(entries)) => entries,
        };

        // First match wins; the adapter does not enforce uniqueness.
        match entries.first() {
            Some(entry) => Ok(DistinguishedName::parse(&entry.dn)?),
            None => fallback.build(attribute, login, session).await,
        }
    }
}
