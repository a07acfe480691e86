//! Registry authentication records.

use crate::error::{MaestroError, Result};

/// Credentials for one Docker registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    /// Registry username.
    pub username: String,
    /// Registry password.
    pub password: String,
    /// Optional account email, some registries still require this.
    pub email: Option<String>,
    /// Optional auth endpoint override.
    pub auth_url: Option<String>,
}

impl RegistryAuth {
    /// Build a registry record, failing if username or password is empty.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return Err(MaestroError::configuration(
                "registry auth requires both username and password",
            ));
        }
        Ok(Self {
            username,
            password,
            email: None,
            auth_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_is_rejected() {
        assert!(RegistryAuth::new("bob", "").is_err());
    }

    #[test]
    fn valid_record_is_accepted() {
        let auth = RegistryAuth::new("bob", "hunter2").unwrap();
        assert_eq!(auth.username, "bob");
    }
}
