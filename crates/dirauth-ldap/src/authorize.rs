//! Authorization policy evaluation: group membership and required
//! attributes.
//!
//! Both checks run over privileged (admin-bound) sessions, independent of
//! the connection that authenticated the subject. Policy failures resolve to
//! a boolean denial; only an unavailable admin connection escapes as an
//! error.

use crate::{
    config::DirectoryConfig,
    dn::DistinguishedName,
    session::{admin_session, DirectoryConnector, SearchScope},
    Result,
};
use tracing::{debug, warn};

const ANY_ENTRY_FILTER: &str = "(objectClass=*)";

/// Evaluates the configured authorization policy for an authenticated
/// subject.
pub struct AuthorizationEvaluator<'a> {
    config: &'a DirectoryConfig,
}

impl<'a> AuthorizationEvaluator<'a> {
    /// Creates an evaluator over the given configuration.
    #[must_use]
    pub const fn new(config: &'a DirectoryConfig) -> Self {
        Self { config }
    }

    /// Runs both checks; each is vacuously true when its toggle is off.
    ///
    /// # Errors
    ///
    /// Returns [`dirauth_core::Error::AdminUnavailable`] when the admin bind
    /// fails; every policy outcome is a boolean.
    pub async fn evaluate(
        &self,
        user_dn: &DistinguishedName,
        connector: &dyn DirectoryConnector,
    ) -> Result<bool> {
        if !self.in_required_groups(user_dn, connector).await? {
            return Ok(false);
        }
        self.has_required_attributes(user_dn, connector).await
    }

    /// Checks that the subject appears in every required group.
    ///
    /// Fails closed when the check is enabled but no groups are configured,
    /// when a required group is missing from the directory, and when a group
    /// lookup fails.
    pub async fn in_required_groups(
        &self,
        user_dn: &DistinguishedName,
        connector: &dyn DirectoryConnector,
    ) -> Result<bool> {
        if !self.config.check_group_membership() {
            return Ok(true);
        }
        if self.config.required_groups().is_empty() {
            warn!("group membership checking enabled but no required groups configured, denying");
            return Ok(false);
        }

        let mut admin = admin_session(connector, self.config).await?;
        for requirement in self.config.required_groups() {
            let group_dn = requirement.group_dn();
            let attribute = requirement.membership_attribute();
            let attributes = [attribute.to_string()];

            let entries = match admin
                .search(
                    group_dn.as_str(),
                    SearchScope::Base,
                    ANY_ENTRY_FILTER,
                    &attributes,
                )
                .await
            {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(group = %group_dn, error = %err, "group lookup failed, denying");
                    let _ = admin.unbind().await;
                    return Ok(false);
                }
            };

            let Some(entry) = entries.first() else {
                warn!(group = %group_dn, "required group not found in directory, denying");
                let _ = admin.unbind().await;
                return Ok(false);
            };

            let is_member = entry
                .values(attribute)
                .is_some_and(|members| members.iter().any(|member| user_dn.matches(member)));
            if !is_member {
                warn!(user = %user_dn, group = %group_dn, "user is not in required group");
                let _ = admin.unbind().await;
                return Ok(false);
            }
        }
        admin.unbind().await?;
        Ok(true)
    }

    /// Checks that the subject's entry carries every required attribute
    /// value.
    pub async fn has_required_attributes(
        &self,
        user_dn: &DistinguishedName,
        connector: &dyn DirectoryConnector,
    ) -> Result<bool> {
        if !self.config.check_attributes() {
            return Ok(true);
        }

        let mut admin = admin_session(connector, self.config).await?;
        debug!(user = %user_dn, "fetching entry for required-attribute checks");

        let attributes: Vec<String> = self.config.require_attribute().keys().cloned().collect();
        let entries = match admin
            .search(
                user_dn.as_str(),
                SearchScope::Base,
                ANY_ENTRY_FILTER,
                &attributes,
            )
            .await
        {
            Ok(entries) => entries,
            Err(err) => {
                warn!(user = %user_dn, error = %err, "entry lookup failed, denying");
                let _ = admin.unbind().await;
                return Ok(false);
            }
        };

        let Some(entry) = entries.first() else {
            warn!(user = %user_dn, "entry not found for attribute checks, denying");
            let _ = admin.unbind().await;
            return Ok(false);
        };

        for (key, expected) in self.config.require_attribute() {
            let matched = entry
                .values(key)
                .is_some_and(|values| values.iter().any(|value| value == expected));
            if !matched {
                warn!(user = %user_dn, attribute = %key, value = %expected, "user did not match required attribute");
                let _ = admin.unbind().await;
                return Ok(false);
            }
        }
        admin.unbind().await?;
        Ok(true)
    }
}
