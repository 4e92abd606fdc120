//! Remember-me preference for the login form. Stored in the persistent scope
//! with no expiry; it lives until the caller clears it.

use crate::store::{keys, Scope, SettingsStore};
use crate::Result;
use serde::Serialize;
use tracing::{debug, instrument};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RememberMePreference {
    pub enabled: bool,
    pub saved_email: String,
}

#[derive(Clone, Debug)]
pub struct RememberMeStore {
    store: SettingsStore,
}

impl RememberMeStore {
    #[must_use]
    pub fn new(store: SettingsStore) -> Self {
        Self { store }
    }

    /// Reads the saved preference. A missing flag or e-mail reads as disabled/empty.
    ///
    /// # Errors
    /// Returns an error if the persistent scope cannot be read.
    #[instrument(skip(self))]
    pub fn load(&self) -> Result<RememberMePreference> {
        let enabled = self.store.flag(Scope::Persistent, keys::REMEMBER_ME)?;
        let saved_email = self
            .store
            .get(Scope::Persistent, keys::SAVED_EMAIL)?
            .unwrap_or_default();
        Ok(RememberMePreference {
            enabled,
            saved_email,
        })
    }

    /// Persists the preference when `remember` is set and an e-mail is given,
    /// otherwise clears it. Returns the new state.
    ///
    /// # Errors
    /// Returns an error if the persistent scope cannot be written.
    #[instrument(skip(self, email))]
    pub fn save(&self, remember: bool, email: Option<&str>) -> Result<RememberMePreference> {
        match email.map(str::trim).filter(|email| !email.is_empty()) {
            Some(email) if remember => {
                self.store
                    .set(Scope::Persistent, keys::REMEMBER_ME, keys::TRUE_SENTINEL)?;
                self.store.set(Scope::Persistent, keys::SAVED_EMAIL, email)?;
                debug!("remember-me saved");
                Ok(RememberMePreference {
                    enabled: true,
                    saved_email: email.to_string(),
                })
            }
            _ => {
                self.clear()?;
                Ok(RememberMePreference::default())
            }
        }
    }

    /// # Errors
    /// Returns an error if the persistent scope cannot be written.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(Scope::Persistent, keys::REMEMBER_ME)?;
        self.store.remove(Scope::Persistent, keys::SAVED_EMAIL)?;
        debug!("remember-me cleared");
        Ok(())
    }
}
