//! Directory protocol seam and its `ldap3`-backed implementation.
//!
//! Every logical operation opens its own session through a
//! [`DirectoryConnector`], uses it, and drops it; sessions are never pooled
//! or shared. All protocol calls are deadline-bounded so a stalled directory
//! cannot block a caller indefinitely.

use crate::{config::DirectoryConfig, Result};
use async_trait::async_trait;
use dirauth_core::Error;
use ldap3::{LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry};
use native_tls::{Certificate, TlsConnector};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Represents the search scope for directory queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// Directory entry representation used by the adapter.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values preserve server order).
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Returns the first value of the attribute if present.
    ///
    /// Attribute names are matched case-insensitively; servers are free to
    /// return them in any casing.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Returns all values for the attribute (case-insensitive name match).
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        if let Some(values) = self.attributes.get(attribute) {
            return Some(values.as_slice());
        }
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values.as_slice())
    }
}

/// An opened, optionally-bound directory session.
///
/// Owned exclusively by the operation that created it and discarded at the
/// end of the operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectorySession: Send {
    /// Authenticates the session as `dn` via simple bind.
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;

    /// Executes a filtered, scoped search.
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<DirectoryEntry>>;

    /// Replaces all values of `attribute` on the entry at `dn`.
    async fn modify_replace(&mut self, dn: &str, attribute: &str, values: Vec<String>)
        -> Result<()>;

    /// Terminates the session.
    async fn unbind(&mut self) -> Result<()>;
}

/// Opens fresh directory sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Establishes a new, unbound session.
    async fn connect(&self) -> Result<Box<dyn DirectorySession>>;
}

/// Opens a session bound with the configured admin credentials.
///
/// This is the only path to elevated access. A connect or bind failure is
/// reported as [`Error::AdminUnavailable`], which is fatal to the enclosing
/// operation rather than a mere authorization denial.
pub(crate) async fn admin_session(
    connector: &dyn DirectoryConnector,
    config: &DirectoryConfig,
) -> Result<Box<dyn DirectorySession>> {
    let admin_unavailable = |err: Error| {
        warn!(error = %err, "cannot bind to admin directory user");
        Error::AdminUnavailable(err.to_string())
    };

    let mut session = connector.connect().await.map_err(admin_unavailable)?;
    session
        .simple_bind(config.admin().bind_dn(), config.admin().password())
        .await
        .map_err(admin_unavailable)?;
    Ok(session)
}

/// Escapes RFC 4515 filter metacharacters in an assertion value.
pub(crate) fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Real connector backed by `ldap3`.
pub struct LdapConnector {
    config: Arc<DirectoryConfig>,
}

impl LdapConnector {
    /// Creates a new connector instance.
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self) -> Result<Box<dyn DirectorySession>> {
        let settings = build_conn_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.url())
            .await
            .map_err(map_ldap_error)?;
        ldap3::drive!(conn);
        Ok(Box::new(LdapSession {
            inner: ldap,
            operation_timeout: self.config.operation_timeout(),
        }))
    }
}

struct LdapSession {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let result = timeout(self.operation_timeout, self.inner.simple_bind(dn, password))
            .await
            .map_err(|_| Error::Timeout("directory bind timed out".to_string()))?
            .map_err(map_ldap_error)?;
        ensure_success(result)
    }

    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<DirectoryEntry>> {
        let result = timeout(
            self.operation_timeout,
            self.inner
                .search(base, scope.into(), filter, attributes.to_vec()),
        )
        .await
        .map_err(|_| Error::Timeout("directory search timed out".to_string()))?
        .map_err(map_ldap_error)?;
        let (entries, _) = result.success().map_err(map_ldap_error)?;
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| DirectoryEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect())
    }

    async fn modify_replace(
        &mut self,
        dn: &str,
        attribute: &str,
        values: Vec<String>,
    ) -> Result<()> {
        let change = Mod::Replace(
            attribute.to_string(),
            values.into_iter().collect::<HashSet<_>>(),
        );
        let result = timeout(self.operation_timeout, self.inner.modify(dn, vec![change]))
            .await
            .map_err(|_| Error::Timeout("directory modify timed out".to_string()))?
            .map_err(map_ldap_error)?;
        ensure_success(result)
    }

    async fn unbind(&mut self) -> Result<()> {
        timeout(self.operation_timeout, self.inner.unbind())
            .await
            .map_err(|_| Error::Timeout("directory unbind timed out".to_string()))?
            .map_err(map_ldap_error)?;
        Ok(())
    }
}

fn build_conn_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());

    if !config.tls_verify() {
        warn!("TLS verification disabled for directory client");
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = config.tls_ca_cert() {
        let pem = fs::read(cert_path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read directory CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem).map_err(|err| {
            Error::ConfigError(format!("invalid directory CA certificate: {err}"))
        })?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to load directory CA certificate: {err}"))
            })?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn map_ldap_error(err: ldap3::LdapError) -> Error {
    Error::Protocol(err.to_string())
}

fn ensure_success(result: ldap3::LdapResult) -> Result<()> {
    result.success().map_err(map_ldap_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with(attribute: &str, values: &[&str]) -> DirectoryEntry {
        let mut attributes = HashMap::new();
        attributes.insert(
            attribute.to_string(),
            values.iter().map(ToString::to_string).collect(),
        );
        DirectoryEntry {
            dn: "uid=jdoe,dc=example,dc=com".to_string(),
            attributes,
        }
    }

    #[test]
    fn entry_first_and_values() {
        let entry = entry_with("mail", &["jdoe@example.com", "john@example.com"]);
        assert_eq!(entry.first("mail"), Some("jdoe@example.com"));
        assert_eq!(entry.values("mail").unwrap().len(), 2);
        assert_eq!(entry.first("missing"), None);
    }

    #[test]
    fn entry_lookup_ignores_attribute_case() {
        let entry = entry_with("uniquemember", &["uid=jdoe,dc=example,dc=com"]);
        assert_eq!(
            entry.first("uniqueMember"),
            Some("uid=jdoe,dc=example,dc=com")
        );
    }

    #[test]
    fn filter_escaping() {
        assert_eq!(escape_filter_value("jdoe"), "jdoe");
        assert_eq!(escape_filter_value("j*doe"), "j\\2adoe");
        assert_eq!(escape_filter_value("(jdoe)"), "\\28jdoe\\29");
        assert_eq!(escape_filter_value("a\\b"), "a\\5cb");
        assert_eq!(escape_filter_value("a\0b"), "a\\00b");
    }

    #[tokio::test]
    async fn admin_session_binds_with_configured_credentials() {
        use crate::dn::DistinguishedName;
        use dirauth_core::AdminCredentials;

        let config = DirectoryConfig::new(
            "ldap.example.com",
            389,
            DistinguishedName::parse("dc=example,dc=com").unwrap(),
            "uid",
            AdminCredentials::new("cn=admin,dc=example,dc=com".to_string(), "secret".to_string()),
        )
        .unwrap();

        let mut connector = MockDirectoryConnector::new();
        connector.expect_connect().return_once(|| {
            let mut session = MockDirectorySession::new();
            session
                .expect_simple_bind()
                .withf(|dn, password| dn == "cn=admin,dc=example,dc=com" && password == "secret")
                .returning(|_, _| Ok(()));
            Ok(Box::new(session))
        });

        assert!(admin_session(&connector, &config).await.is_ok());
    }

    #[tokio::test]
    async fn admin_session_failure_is_distinct() {
        use crate::dn::DistinguishedName;
        use dirauth_core::AdminCredentials;

        let config = DirectoryConfig::new(
            "ldap.example.com",
            389,
            DistinguishedName::parse("dc=example,dc=com").unwrap(),
            "uid",
            AdminCredentials::new("cn=admin,dc=example,dc=com".to_string(), "wrong".to_string()),
        )
        .unwrap();

        let mut connector = MockDirectoryConnector::new();
        connector.expect_connect().return_once(|| {
            let mut session = MockDirectorySession::new();
            session
                .expect_simple_bind()
                .returning(|_, _| Err(Error::Protocol("invalid credentials".to_string())));
            Ok(Box::new(session))
        });

        assert!(matches!(
            admin_session(&connector, &config).await,
            Err(Error::AdminUnavailable(_))
        ));
    }
}
