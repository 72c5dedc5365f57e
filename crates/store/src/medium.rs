//! Storage media underneath the [`Store`](crate::Store).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::Context;

/// A browser-localStorage-shaped medium: flat string keys, encoded string
/// values, shared by the session layer and any other persistence client.
/// Writes are last-writer-wins; there is no transaction discipline.
pub trait StorageMedium: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, encoded: &str);
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
    fn clear(&self);
}

/// File-backed medium: one JSON document, flushed on every mutation.
pub struct FileMedium {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileMedium {
    /// Open (or create) the backing file at the default OS location:
    /// `{app_data_dir}/vitrina/session.json`.
    pub fn open_default() -> anyhow::Result<Self> {
        Self::open(default_store_path()?)
    }

    /// Open (or create) the backing file at an explicit path.
    ///
    /// An unreadable or corrupt file is reported here rather than silently
    /// emptied; the caller is expected to fall back to a non-persisted
    /// session.
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("corrupt store file at {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read store file at {}", path.display()));
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, entries: &BTreeMap<String, String>) {
        let payload = match serde_json::to_string_pretty(entries) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!("failed to serialize store file: {err:?}");
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                tracing::error!("failed to create store directory {}: {err:?}", parent.display());
                return;
            }
        }

        if let Err(err) = std::fs::write(&self.path, payload) {
            tracing::error!("failed to flush store file {}: {err:?}", self.path.display());
        }
    }
}

impl StorageMedium for FileMedium {
    fn read(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn write(&self, key: &str, encoded: &str) {
        let mut entries = self.lock();
        entries.insert(key.to_string(), encoded.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn clear(&self) {
        let mut entries = self.lock();
        entries.clear();
        self.flush(&entries);
    }
}

/// In-memory medium for tests. Counts writes so guarded-setter idempotence
/// is observable.
#[derive(Default)]
pub struct MemoryMedium {
    entries: Mutex<BTreeMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write` calls issued so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageMedium for MemoryMedium {
    fn read(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn write(&self, key: &str, encoded: &str) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(key.to_string(), encoded.to_string());
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Resolve the path to the store file: `{app_data_dir}/vitrina/session.json`.
fn default_store_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut dir = base;
    dir.push("vitrina");

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create store directory at {}", dir.display()))?;

    dir.push("session.json");
    Ok(dir)
}
