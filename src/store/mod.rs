//! Typed key-value settings store with two scopes and change subscriptions.
//!
//! Flow Overview:
//! 1) Each scope is backed by a [`KeyValueStore`]: session state lives in a
//!    [`MemoryStore`], durable preferences in a [`FileStore`].
//! 2) Every `set`/`remove` publishes one [`StoreEvent`] carrying the written
//!    value, so observers in the same process see writes without polling.
//! 3) Consumers (gate, remember-me) hold a [`SettingsStore`] and never touch
//!    raw keys of another consumer.
//!
//! The store is advisory state, not a security boundary.

pub mod file;
pub mod keys;
pub mod memory;

pub use self::file::FileStore;
pub use self::memory::MemoryStore;

use crate::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of each store's change channel. Slow observers that lag behind
/// re-read the current value instead of replaying history.
pub(crate) const EVENT_CAPACITY: usize = 64;

/// Change notification emitted after a write. `value` is `None` on removal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreEvent {
    pub key: String,
    pub value: Option<String>,
}

/// Storage medium abstraction shared by both scopes.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    ///
    /// # Errors
    /// Returns an error if the underlying medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value and notifies subscribers.
    ///
    /// # Errors
    /// Returns an error if the underlying medium cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a value and notifies subscribers. Removing a missing key still notifies.
    ///
    /// # Errors
    /// Returns an error if the underlying medium cannot be written.
    fn remove(&self, key: &str) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Tab/session scoped, cleared when the session ends.
    Session,
    /// Durable, kept until explicitly cleared.
    Persistent,
}

#[derive(Clone)]
pub struct SettingsStore {
    session: Arc<dyn KeyValueStore>,
    persistent: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore").finish_non_exhaustive()
    }
}

impl SettingsStore {
    #[must_use]
    pub fn new(session: Arc<dyn KeyValueStore>, persistent: Arc<dyn KeyValueStore>) -> Self {
        Self {
            session,
            persistent,
        }
    }

    /// Both scopes in memory. Used by tests and by callers without a durable medium.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Fresh session scope over a durable file, as a new process would see it.
    #[must_use]
    pub fn with_file(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(FileStore::new(path)))
    }

    fn backend(&self, scope: Scope) -> &dyn KeyValueStore {
        match scope {
            Scope::Session => self.session.as_ref(),
            Scope::Persistent => self.persistent.as_ref(),
        }
    }

    /// # Errors
    /// Propagates read failures from the scope's medium.
    pub fn get(&self, scope: Scope, key: &str) -> Result<Option<String>> {
        self.backend(scope).get(key)
    }

    /// # Errors
    /// Propagates write failures from the scope's medium.
    pub fn set(&self, scope: Scope, key: &str, value: &str) -> Result<()> {
        self.backend(scope).set(key, value)
    }

    /// # Errors
    /// Propagates write failures from the scope's medium.
    pub fn remove(&self, scope: Scope, key: &str) -> Result<()> {
        self.backend(scope).remove(key)
    }

    /// True iff `key` holds the `"true"` sentinel.
    ///
    /// # Errors
    /// Propagates read failures from the scope's medium.
    pub fn flag(&self, scope: Scope, key: &str) -> Result<bool> {
        Ok(self.get(scope, key)?.as_deref() == Some(keys::TRUE_SENTINEL))
    }

    #[must_use]
    pub fn subscribe(&self, scope: Scope) -> broadcast::Receiver<StoreEvent> {
        self.backend(scope).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_are_isolated() -> Result<()> {
        let store = SettingsStore::in_memory();
        store.set(Scope::Session, "k", "session")?;
        store.set(Scope::Persistent, "k", "persistent")?;

        assert_eq!(store.get(Scope::Session, "k")?.as_deref(), Some("session"));
        assert_eq!(
            store.get(Scope::Persistent, "k")?.as_deref(),
            Some("persistent")
        );

        store.remove(Scope::Session, "k")?;
        assert_eq!(store.get(Scope::Session, "k")?, None);
        assert!(store.get(Scope::Persistent, "k")?.is_some());
        Ok(())
    }

    #[test]
    fn flag_requires_exact_sentinel() -> Result<()> {
        let store = SettingsStore::in_memory();
        assert!(!store.flag(Scope::Session, keys::SETTINGS_UNLOCKED)?);

        store.set(Scope::Session, keys::SETTINGS_UNLOCKED, "yes")?;
        assert!(!store.flag(Scope::Session, keys::SETTINGS_UNLOCKED)?);

        store.set(Scope::Session, keys::SETTINGS_UNLOCKED, "true")?;
        assert!(store.flag(Scope::Session, keys::SETTINGS_UNLOCKED)?);
        Ok(())
    }

    #[test]
    fn subscribe_only_sees_own_scope() -> Result<()> {
        let store = SettingsStore::in_memory();
        let mut session_rx = store.subscribe(Scope::Session);

        store.set(Scope::Persistent, "other", "1")?;
        store.set(Scope::Session, "mine", "2")?;

        let event = session_rx.try_recv().ok();
        assert_eq!(event.map(|e| e.key).as_deref(), Some("mine"));
        assert!(session_rx.try_recv().is_err());
        Ok(())
    }
}
