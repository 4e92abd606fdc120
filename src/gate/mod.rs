//! Settings unlock gate.
//!
//! A boolean flag in the session scope that gates the sensitive settings area.
//! The external "enter settings password" flow calls [`SettingsGate::unlock`];
//! guards observe it through [`GateWatch`], which is driven by store events, so
//! a write anywhere in the session is seen without polling. The flag is
//! advisory and can be flipped by anyone with access to session storage.

pub mod guard;

pub use self::guard::{GuardDecision, ProtectedRoute, SETTINGS_ENTRY_PATH};

use crate::store::{keys, Scope, SettingsStore, StoreEvent};
use crate::Result;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct SettingsGate {
    store: SettingsStore,
}

impl SettingsGate {
    #[must_use]
    pub fn new(store: SettingsStore) -> Self {
        Self { store }
    }

    /// True iff the session flag holds the unlocked sentinel. Read failures count as locked.
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        match self.store.flag(Scope::Session, keys::SETTINGS_UNLOCKED) {
            Ok(unlocked) => unlocked,
            Err(err) => {
                warn!("failed to read settings gate, treating as locked: {err}");
                false
            }
        }
    }

    /// Unlocks settings for the rest of the session.
    ///
    /// # Errors
    /// Returns an error if the session scope cannot be written.
    pub fn unlock(&self) -> Result<()> {
        self.store
            .set(Scope::Session, keys::SETTINGS_UNLOCKED, keys::TRUE_SENTINEL)?;
        info!("settings unlocked");
        Ok(())
    }

    /// # Errors
    /// Returns an error if the session scope cannot be written.
    pub fn lock(&self) -> Result<()> {
        self.store.remove(Scope::Session, keys::SETTINGS_UNLOCKED)?;
        info!("settings locked");
        Ok(())
    }

    /// Observer of the gate starting from its current value.
    #[must_use]
    pub fn watch(&self) -> GateWatch {
        // Subscribe before reading so no write can slip between the two.
        let events = self.store.subscribe(Scope::Session);
        GateWatch {
            events,
            gate: self.clone(),
            last: self.is_unlocked(),
        }
    }
}

/// Push-based view of the gate. Repeated observations of the same value are
/// collapsed, so duplicate store events are harmless.
#[derive(Debug)]
pub struct GateWatch {
    events: broadcast::Receiver<StoreEvent>,
    gate: SettingsGate,
    last: bool,
}

impl GateWatch {
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.last
    }

    /// Waits until the gate flips and returns the new value. Returns `None`
    /// if the session scope stops publishing changes.
    pub async fn changed(&mut self) -> Option<bool> {
        loop {
            let next = match self.events.recv().await {
                Ok(event) if event.key == keys::SETTINGS_UNLOCKED => {
                    event.value.as_deref() == Some(keys::TRUE_SENTINEL)
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "gate watch lagged, re-reading flag");
                    self.gate.is_unlocked()
                }
                Err(RecvError::Closed) => return None,
            };

            if next != self.last {
                self.last = next;
                return Some(next);
            }
        }
    }
}
