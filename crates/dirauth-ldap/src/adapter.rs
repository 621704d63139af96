//! High-level directory authentication adapter.
//!
//! Each public operation is stateless across calls: it builds a per-call
//! session context, opens its own connection(s), and discards them when
//! done. Credential validation always resolves to a boolean; the only error
//! that escapes it is an unavailable admin connection, which indicates
//! service misconfiguration rather than bad end-user credentials.

use crate::{
    authorize::AuthorizationEvaluator,
    config::DirectoryConfig,
    dn::DistinguishedName,
    password::{generate_ssha, PASSWORD_ATTRIBUTE},
    resolver::{FallbackIdentity, IdentityResolver, RdnUnderBase},
    session::{
        admin_session, escape_filter_value, DirectoryConnector, DirectorySession, LdapConnector,
        SearchScope,
    },
    Result,
};
use dirauth_core::Error;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ANY_ENTRY_FILTER: &str = "(objectClass=*)";

/// Per-operation state: the subject login and its lazily resolved DN.
///
/// Created per invocation and never shared; the resolved DN is cached so a
/// single logical operation performs at most one resolution search.
struct SessionContext {
    login: String,
    resolved: Option<DistinguishedName>,
}

impl SessionContext {
    fn new(login: &str) -> Self {
        Self {
            login: login.to_string(),
            resolved: None,
        }
    }

    async fn resolved_dn(
        &mut self,
        config: &DirectoryConfig,
        session: &mut dyn DirectorySession,
        fallback: &dyn FallbackIdentity,
    ) -> Result<DistinguishedName> {
        if let Some(dn) = &self.resolved {
            return Ok(dn.clone());
        }
        let dn = IdentityResolver::new(config)
            .resolve(session, fallback, &self.login)
            .await?;
        self.resolved = Some(dn.clone());
        Ok(dn)
    }
}

/// Directory-backed authentication and authorization adapter.
pub struct DirectoryAuthenticator {
    config: Arc<DirectoryConfig>,
    connector: Box<dyn DirectoryConnector>,
    fallback: Box<dyn FallbackIdentity>,
}

impl std::fmt::Debug for DirectoryAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryAuthenticator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DirectoryAuthenticator {
    /// Creates an adapter that connects to a real directory server.
    ///
    /// The configuration is validated here, so instances that arrived via
    /// deserialization are checked before their first connection. The
    /// fallback identity builder defaults to placing `attribute=login`
    /// directly under the configured search base.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] or [`Error::ConfigError`] when the
    /// configuration is incomplete or its endpoint is malformed.
    pub fn new(config: DirectoryConfig) -> Result<Self> {
        config.ensure_valid()?;
        let config = Arc::new(config);
        let connector: Box<dyn DirectoryConnector> = Box::new(LdapConnector::new(config.clone()));
        let fallback: Box<dyn FallbackIdentity> = Box::new(RdnUnderBase::new(config.base().clone()));
        Ok(Self {
            config,
            connector,
            fallback,
        })
    }

    /// Replaces the fallback identity builder.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Box<dyn FallbackIdentity>) -> Self {
        self.fallback = fallback;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_connector(
        config: DirectoryConfig,
        connector: Box<dyn DirectoryConnector>,
    ) -> Self {
        let config = Arc::new(config);
        let fallback: Box<dyn FallbackIdentity> = Box::new(RdnUnderBase::new(config.base().clone()));
        Self {
            config,
            connector,
            fallback,
        }
    }

    /// Verifies a login/credential pair and evaluates the configured
    /// authorization policy.
    ///
    /// Resolution misses, bind rejections, timeouts, and unreachable
    /// directories all surface as `Ok(false)` so a caller cannot distinguish
    /// them from a wrong password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AdminUnavailable`] when an enabled policy check (or
    /// admin-bound resolution) cannot obtain its privileged connection.
    pub async fn valid_credentials(&self, login: &str, password: &str) -> Result<bool> {
        if password.is_empty() {
            // An empty credential would turn the simple bind into an
            // unauthenticated bind, which servers accept.
            debug!(login, "rejecting empty credential");
            return Ok(false);
        }

        info!(attribute = self.config.attribute(), login, "authorizing directory user");

        let mut session = match self.open_session().await {
            Ok(session) => session,
            Err(err @ Error::AdminUnavailable(_)) => return Err(err),
            Err(err) => {
                warn!(login, error = %err, "directory connection failed");
                return Ok(false);
            }
        };

        let mut context = SessionContext::new(login);
        let dn = match context
            .resolved_dn(&self.config, session.as_mut(), self.fallback.as_ref())
            .await
        {
            Ok(dn) => dn,
            Err(err) => {
                warn!(login, error = %err, "identity resolution failed");
                let _ = session.unbind().await;
                return Ok(false);
            }
        };

        if let Err(err) = session.simple_bind(dn.as_str(), password).await {
            debug!(login, error = %err, "directory bind rejected");
            let _ = session.unbind().await;
            return Ok(false);
        }
        let _ = session.unbind().await;

        AuthorizationEvaluator::new(&self.config)
            .evaluate(&dn, self.connector.as_ref())
            .await
    }

    /// Replaces the subject's password with a salted hashed value.
    ///
    /// A blank new password is a no-op; no connection is opened.
    ///
    /// # Errors
    ///
    /// Returns an error when resolution, the admin bind, or the modify
    /// operation fails.
    pub async fn update_password(&self, login: &str, new_password: &str) -> Result<()> {
        if new_password.is_empty() {
            debug!(login, "skipping password update for blank credential");
            return Ok(());
        }

        let dn = self.resolve_and_close(login).await?;
        let hashed = generate_ssha(new_password);

        let mut admin = admin_session(self.connector.as_ref(), &self.config).await?;
        info!(user = %dn, "replacing directory password");
        admin
            .modify_replace(dn.as_str(), PASSWORD_ATTRIBUTE, vec![hashed])
            .await?;
        admin.unbind().await?;
        Ok(())
    }

    /// Lists the distinguished names of the posix groups the login belongs
    /// to, under the configured group base.
    ///
    /// # Errors
    ///
    /// Returns an error when the admin session or the search fails.
    pub async fn groups_of(&self, login: &str) -> Result<Vec<DistinguishedName>> {
        let mut admin = admin_session(self.connector.as_ref(), &self.config).await?;
        debug!(login, "listing directory groups");

        let filter = format!(
            "(&(objectClass=posixGroup)(memberUid={}))",
            escape_filter_value(login)
        );
        let entries = admin
            .search(
                self.config.group_base().as_str(),
                SearchScope::Subtree,
                &filter,
                &[],
            )
            .await?;
        admin.unbind().await?;

        Ok(entries
            .iter()
            .filter_map(|entry| match DistinguishedName::parse(&entry.dn) {
                Ok(dn) => Some(dn),
                Err(err) => {
                    warn!(dn = %entry.dn, error = %err, "skipping group with malformed DN");
                    None
                }
            })
            .collect())
    }

    /// Resolves a login to its distinguished name, falling back to the
    /// injected identity builder on a miss.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection cannot be established or the
    /// fallback builder fails.
    pub async fn resolve_dn(&self, login: &str) -> Result<DistinguishedName> {
        self.resolve_and_close(login).await
    }

    /// Fetches the first value of the named attribute from the subject's
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the resolved entry does not exist.
    pub async fn attribute_value(&self, login: &str, attribute: &str) -> Result<Option<String>> {
        let (dn, mut session) = self.resolve_with_session(login).await?;
        debug!(user = %dn, attribute, "fetching directory attribute");

        let entries = session
            .search(
                dn.as_str(),
                SearchScope::Base,
                ANY_ENTRY_FILTER,
                &[attribute.to_string()],
            )
            .await?;
        let _ = session.unbind().await;

        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("directory entry `{dn}` not found")))?;
        Ok(entry.first(attribute).map(str::to_owned))
    }

    /// Opens the session used for identity resolution: admin-bound when the
    /// deployment binds through the admin account, plain otherwise.
    async fn open_session(&self) -> Result<Box<dyn DirectorySession>> {
        if self.config.use_admin_to_bind() {
            admin_session(self.connector.as_ref(), &self.config).await
        } else {
            self.connector.connect().await
        }
    }

    async fn resolve_and_close(&self, login: &str) -> Result<DistinguishedName> {
        let (dn, mut session) = self.resolve_with_session(login).await?;
        let _ = session.unbind().await;
        Ok(dn)
    }

    async fn resolve_with_session(
        &self,
        login: &str,
    ) -> Result<(DistinguishedName, Box<dyn DirectorySession>)> {
        let mut session = self.open_session().await?;
        let mut context = SessionContext::new(login);
        let dn = context
            .resolved_dn(&self.config, session.as_mut(), self.fallback.as_ref())
            .await?;
        Ok((dn, session))
    }
}
