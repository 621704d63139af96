//! Admin bind credentials.

use serde::{Deserialize, Serialize};

/// Credentials used for privileged (admin) binds against the directory.
///
/// The password is never serialized; configuration loaders only ever
/// deserialize it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCredentials {
    /// Admin bind DN (Distinguished Name)
    #[serde(rename = "admin_user")]
    pub bind_dn: String,

    /// Admin bind password
    #[serde(rename = "admin_password", skip_serializing)]
    pub password: String,
}

impl AdminCredentials {
    /// Create new admin credentials.
    ///
    /// # Arguments
    ///
    /// * `bind_dn` - The directory DN for the admin account
    /// * `password` - The admin password
    #[must_use]
    pub const fn new(bind_dn: String, password: String) -> Self {
        Self { bind_dn, password }
    }

    /// Get the admin bind DN.
    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// Get the admin bind password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}
