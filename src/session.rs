//! Session role as reported by the identity provider.
//!
//! The provider owns authentication; this module only mirrors the current
//! role into a `watch` channel so role-gated components (the admin alert
//! subscriber) can react to sign-in, sign-out and role changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Platform operator.
    Admin,
    /// Franchise or unit owner.
    Owner,
    Professional,
    Client,
    /// Role the provider reported but this crate does not know about.
    Other(String),
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Owner => "owner",
            Role::Professional => "professional",
            Role::Client => "client",
            Role::Other(value) => value,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "admin" => Role::Admin,
            "owner" => Role::Owner,
            "professional" => Role::Professional,
            "client" => Role::Client,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::from(s.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current role of the signed-in user; `None` while signed out.
#[derive(Debug)]
pub struct SessionRoles {
    current: watch::Sender<Option<Role>>,
}

impl SessionRoles {
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    /// Publishes a role. Re-publishing the same role does not wake observers.
    pub fn set_role(&self, role: Role) {
        self.current.send_if_modified(|current| {
            if current.as_ref() == Some(&role) {
                return false;
            }
            debug!(role = %role, "session role changed");
            *current = Some(role);
            true
        });
    }

    pub fn sign_out(&self) {
        self.current.send_if_modified(|current| current.take().is_some());
    }

    #[must_use]
    pub fn current(&self) -> Option<Role> {
        self.current.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Role>> {
        self.current.subscribe()
    }
}

impl Default for SessionRoles {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_unknown_roles() {
        assert_eq!(Role::from("Admin".to_string()), Role::Admin);
        assert_eq!(" client ".parse::<Role>().ok(), Some(Role::Client));
        assert_eq!(
            Role::from("groomer".to_string()),
            Role::Other("groomer".to_string())
        );
        assert!(!Role::Other("admin-ish".to_string()).is_admin());
    }

    #[test]
    fn serde_uses_plain_strings() -> serde_json::Result<()> {
        let role: Role = serde_json::from_str("\"owner\"")?;
        assert_eq!(role, Role::Owner);
        assert_eq!(serde_json::to_string(&Role::Professional)?, "\"professional\"");
        Ok(())
    }

    #[test]
    fn set_role_only_notifies_on_change() {
        let roles = SessionRoles::new();
        let mut rx = roles.subscribe();

        roles.set_role(Role::Admin);
        assert!(rx.has_changed().unwrap_or(false));
        rx.borrow_and_update();

        roles.set_role(Role::Admin);
        assert!(!rx.has_changed().unwrap_or(true));

        roles.sign_out();
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(roles.current(), None);
    }
}
