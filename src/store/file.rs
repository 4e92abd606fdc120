//! Durable scope backed by a single JSON object on disk.
//!
//! The file is read once on first access and rewritten in full after every
//! write (temp file + rename). A missing file is an empty store.

use super::{KeyValueStore, StoreEvent, EVENT_CAPACITY};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

type Entries = BTreeMap<String, String>;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    cache: Mutex<Option<Entries>>,
    events: broadcast::Sender<StoreEvent>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            path: path.into(),
            cache: Mutex::new(None),
            events,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn read_file(&self) -> Result<Entries> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("store file missing, starting empty");
                return Ok(Entries::new());
            }
            Err(source) => {
                return Err(Error::Storage {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Entries::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| Error::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    #[instrument(skip(self, entries), fields(path = %self.path.display()))]
    fn write_file(&self, entries: &Entries) -> Result<()> {
        let payload = serde_json::to_vec_pretty(entries)?;
        let storage_err = |source| Error::Storage {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, payload).map_err(storage_err)?;
        std::fs::rename(&tmp, &self.path).map_err(storage_err)?;
        debug!(entries = entries.len(), "store file written");
        Ok(())
    }

    /// Runs `f` against the loaded entries, loading the file on first use.
    fn with_entries<T>(&self, f: impl FnOnce(&mut Entries) -> Result<T>) -> Result<T> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.is_none() {
            *cache = Some(self.read_file()?);
        }
        f(cache.get_or_insert_with(Entries::new))
    }

    fn publish(&self, key: &str, value: Option<&str>) {
        let _ = self.events.send(StoreEvent {
            key: key.to_string(),
            value: value.map(str::to_string),
        });
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entries(|entries| Ok(entries.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_entries(|entries| {
            let previous = entries.insert(key.to_string(), value.to_string());
            if let Err(err) = self.write_file(entries) {
                // Keep the cache in step with the disk.
                match previous {
                    Some(previous) => entries.insert(key.to_string(), previous),
                    None => entries.remove(key),
                };
                return Err(err);
            }
            Ok(())
        })?;
        self.publish(key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_entries(|entries| {
            if let Some(previous) = entries.remove(key) {
                if let Err(err) = self.write_file(entries) {
                    entries.insert(key.to_string(), previous);
                    return Err(err);
                }
            }
            Ok(())
        })?;
        self.publish(key, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
