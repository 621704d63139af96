//! Configuration for reaching and binding to the directory service.

use crate::{dn::DistinguishedName, Result};
use dirauth_core::AdminCredentials;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;
/// Membership attribute assumed when a group requirement names only a DN.
pub const DEFAULT_MEMBERSHIP_ATTRIBUTE: &str = "uniqueMember";

/// A single group-membership requirement.
///
/// Configuration may list a bare group DN (the membership attribute defaults
/// to `uniqueMember`) or an explicit `[attribute, dn]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupRequirement {
    /// Group DN with the implied `uniqueMember` membership attribute.
    Dn(DistinguishedName),
    /// Explicit membership attribute and group DN.
    Pair(String, DistinguishedName),
}

impl GroupRequirement {
    /// The attribute whose values hold the member DNs.
    #[must_use]
    pub fn membership_attribute(&self) -> &str {
        match self {
            Self::Dn(_) => DEFAULT_MEMBERSHIP_ATTRIBUTE,
            Self::Pair(attribute, _) => attribute,
        }
    }

    /// The distinguished name of the required group.
    #[must_use]
    pub const fn group_dn(&self) -> &DistinguishedName {
        match self {
            Self::Dn(dn) | Self::Pair(_, dn) => dn,
        }
    }
}

/// Configuration for connecting to the directory service.
///
/// Loaded once per adapter instantiation by an external configuration loader
/// and shared read-only afterwards. [`DirectoryConfig::new`] and the adapter
/// constructor run [`DirectoryConfig::ensure_valid`], so deserialized
/// instances are checked before their first connection.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DirectoryConfig {
    /// Directory server host
    #[validate(length(min = 1))]
    host: String,

    /// Directory server port
    #[validate(range(min = 1))]
    port: u16,

    /// Whether to connect over TLS
    #[serde(default)]
    ssl: bool,

    /// Search base for identity resolution
    base: DistinguishedName,

    /// Attribute identifying a login (e.g. `uid`)
    #[validate(length(min = 1))]
    attribute: String,

    /// Search base for group lookups; defaults to `base`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_base: Option<DistinguishedName>,

    /// Groups the subject must belong to for authorization
    #[serde(default)]
    required_groups: Vec<GroupRequirement>,

    /// Attribute values the subject's entry must carry for authorization
    #[serde(default)]
    require_attribute: HashMap<String, String>,

    /// Admin bind credentials
    #[serde(flatten)]
    admin: AdminCredentials,

    /// Whether to evaluate the group-membership check
    #[serde(default)]
    check_group_membership: bool,

    /// Whether to evaluate the required-attribute check
    #[serde(default)]
    check_attributes: bool,

    /// Whether identity resolution searches run over an admin-bound session
    #[serde(default)]
    use_admin_to_bind: bool,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    tls_verify: bool,

    /// Optional path to custom CA certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tls_ca_cert: Option<PathBuf>,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout_secs")]
    connection_timeout_secs: u64,

    /// Operation timeout in seconds
    #[serde(default = "default_timeout_secs")]
    operation_timeout_secs: u64,
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

impl DirectoryConfig {
    /// Creates a new configuration with required parameters and defaults for
    /// everything else.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails (empty host or identifying
    /// attribute, invalid endpoint).
    pub fn new(
        host: impl Into<String>,
        port: u16,
        base: DistinguishedName,
        attribute: impl Into<String>,
        admin: AdminCredentials,
    ) -> Result<Self> {
        let config = Self {
            host: host.into(),
            port,
            ssl: false,
            base,
            attribute: attribute.into(),
            group_base: None,
            required_groups: Vec::new(),
            require_attribute: HashMap::new(),
            admin,
            check_group_membership: false,
            check_attributes: false,
            use_admin_to_bind: false,
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        };
        config.ensure_valid()?;
        Ok(config)
    }

    /// Validates the configuration, including the derived endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if a field fails validation or the host/port pair
    /// does not form a valid endpoint.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()?;
        Url::parse(&self.url())?;
        Ok(())
    }

    /// Returns the directory endpoint URL (`ldap://` or `ldaps://`).
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.ssl { "ldaps" } else { "ldap" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Returns the directory server host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the directory server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns whether the connection uses TLS.
    #[must_use]
    pub const fn ssl(&self) -> bool {
        self.ssl
    }

    /// Returns the search base for identity resolution.
    #[must_use]
    pub const fn base(&self) -> &DistinguishedName {
        &self.base
    }

    /// Returns the attribute identifying a login.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Returns the group search base (falls back to the resolution base).
    #[must_use]
    pub fn group_base(&self) -> &DistinguishedName {
        self.group_base.as_ref().unwrap_or(&self.base)
    }

    /// Returns the configured group requirements.
    #[must_use]
    pub fn required_groups(&self) -> &[GroupRequirement] {
        &self.required_groups
    }

    /// Returns the required attribute/value pairs.
    #[must_use]
    pub const fn require_attribute(&self) -> &HashMap<String, String> {
        &self.require_attribute
    }

    /// Returns the admin bind credentials.
    #[must_use]
    pub const fn admin(&self) -> &AdminCredentials {
        &self.admin
    }

    /// Returns whether the group-membership check is enabled.
    #[must_use]
    pub const fn check_group_membership(&self) -> bool {
        self.check_group_membership
    }

    /// Returns whether the required-attribute check is enabled.
    #[must_use]
    pub const fn check_attributes(&self) -> bool {
        self.check_attributes
    }

    /// Returns whether identity resolution uses an admin-bound session.
    #[must_use]
    pub const fn use_admin_to_bind(&self) -> bool {
        self.use_admin_to_bind
    }

    /// Returns whether TLS certificate verification is enabled.
    #[must_use]
    pub const fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Optional custom CA certificate path.
    #[must_use]
    pub fn tls_ca_cert(&self) -> Option<&PathBuf> {
        self.tls_ca_cert.as_ref()
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the operation timeout duration.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Enables or disables TLS for the connection.
    #[must_use]
    pub const fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Overrides the group search base.
    #[must_use]
    pub fn with_group_base(mut self, dn: DistinguishedName) -> Self {
        self.group_base = Some(dn);
        self
    }

    /// Replaces the group requirements.
    #[must_use]
    pub fn with_required_groups<I>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = GroupRequirement>,
    {
        self.required_groups = groups.into_iter().collect();
        self
    }

    /// Replaces the required attribute/value pairs.
    #[must_use]
    pub fn with_require_attribute<I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.require_attribute = pairs.into_iter().collect();
        self
    }

    /// Enables or disables the group-membership check.
    #[must_use]
    pub const fn with_group_membership_check(mut self, enabled: bool) -> Self {
        self.check_group_membership = enabled;
        self
    }

    /// Enables or disables the required-attribute check.
    #[must_use]
    pub const fn with_attribute_check(mut self, enabled: bool) -> Self {
        self.check_attributes = enabled;
        self
    }

    /// Enables or disables admin-bound identity resolution.
    #[must_use]
    pub const fn with_admin_bind(mut self, enabled: bool) -> Self {
        self.use_admin_to_bind = enabled;
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets the custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_admin() -> AdminCredentials {
        AdminCredentials::new(
            "cn=admin,dc=example,dc=com".to_string(),
            "secret".to_string(),
        )
    }

    fn sample_base() -> DistinguishedName {
        DistinguishedName::parse("ou=People,dc=example,dc=com").unwrap()
    }

    #[test]
    fn builder_overrides() {
        let group_base = DistinguishedName::parse("ou=Groups,dc=example,dc=com").unwrap();
        let config = DirectoryConfig::new("ldap.example.com", 636, sample_base(), "uid", sample_admin())
            .unwrap()
            .with_ssl(true)
            .with_group_base(group_base.clone())
            .with_group_membership_check(true)
            .with_attribute_check(true)
            .with_admin_bind(true)
            .with_connection_timeout_secs(5)
            .with_operation_timeout_secs(20)
            .with_tls_verification(false);

        assert_eq!(config.url(), "ldaps://ldap.example.com:636");
        assert_eq!(config.group_base(), &group_base);
        assert!(config.check_group_membership());
        assert!(config.check_attributes());
        assert!(config.use_admin_to_bind());
        assert_eq!(config.connection_timeout(), Duration::from_secs(5));
        assert_eq!(config.operation_timeout(), Duration::from_secs(20));
        assert!(!config.tls_verify());
    }

    #[test]
    fn group_base_defaults_to_resolution_base() {
        let config =
            DirectoryConfig::new("ldap.example.com", 389, sample_base(), "uid", sample_admin())
                .unwrap();
        assert_eq!(config.group_base(), config.base());
        assert_eq!(config.url(), "ldap://ldap.example.com:389");
    }

    #[test]
    fn empty_attribute_rejected() {
        let result =
            DirectoryConfig::new("ldap.example.com", 389, sample_base(), "", sample_admin());
        assert!(result.is_err());
    }

    #[test]
    fn empty_host_rejected() {
        let result = DirectoryConfig::new("", 389, sample_base(), "uid", sample_admin());
        assert!(result.is_err());
    }

    #[test]
    fn deserialize_external_config_shape() {
        let config: DirectoryConfig = serde_json::from_str(
            r#"{
                "host": "ldap.example.com",
                "port": 636,
                "ssl": true,
                "base": "ou=People,dc=example,dc=com",
                "attribute": "uid",
                "group_base": "ou=Groups,dc=example,dc=com",
                "required_groups": [
                    "cn=admins,ou=Groups,dc=example,dc=com",
                    ["member", "cn=staff,ou=Groups,dc=example,dc=com"]
                ],
                "require_attribute": {"accountStatus": "active"},
                "admin_user": "cn=admin,dc=example,dc=com",
                "admin_password": "secret",
                "check_group_membership": true
            }"#,
        )
        .unwrap();
        config.ensure_valid().unwrap();

        assert!(config.ssl());
        assert!(config.check_group_membership());
        assert!(!config.check_attributes());
        assert_eq!(config.admin().bind_dn(), "cn=admin,dc=example,dc=com");
        assert_eq!(config.operation_timeout(), Duration::from_secs(10));

        let groups = config.required_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].membership_attribute(), "uniqueMember");
        assert_eq!(
            groups[0].group_dn().as_str(),
            "cn=admins,ou=Groups,dc=example,dc=com"
        );
        assert_eq!(groups[1].membership_attribute(), "member");
        assert_eq!(
            groups[1].group_dn().as_str(),
            "cn=staff,ou=Groups,dc=example,dc=com"
        );

        assert_eq!(
            config.require_attribute().get("accountStatus"),
            Some(&"active".to_string())
        );
    }

    #[test]
    fn group_requirement_accessors() {
        let dn = DistinguishedName::parse("cn=admins,dc=example,dc=com").unwrap();
        let implied = GroupRequirement::Dn(dn.clone());
        assert_eq!(implied.membership_attribute(), DEFAULT_MEMBERSHIP_ATTRIBUTE);
        assert_eq!(implied.group_dn(), &dn);

        let explicit = GroupRequirement::Pair("memberUid".to_string(), dn.clone());
        assert_eq!(explicit.membership_attribute(), "memberUid");
        assert_eq!(explicit.group_dn(), &dn);
    }
}
