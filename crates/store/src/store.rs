//! Encoded key-value store.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::keys;
use crate::medium::StorageMedium;

/// Key-value store over a [`StorageMedium`].
///
/// Values are stored as `base64(json(value))`; decoding exactly inverts
/// encoding for arbitrary structured values, non-ASCII text included. A
/// value that fails to decode yields `None` so callers degrade to an
/// unauthenticated, non-persisted session instead of crashing on corrupt
/// state.
#[derive(Clone)]
pub struct Store {
    medium: Arc<dyn StorageMedium>,
}

impl Store {
    pub fn new(medium: Arc<dyn StorageMedium>) -> Self {
        Self { medium }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.medium.write(key, &STANDARD.encode(json)),
            Err(err) => tracing::error!(key, "failed to serialize value for store: {err:?}"),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let encoded = self.medium.read(key)?;
        let bytes = match STANDARD.decode(encoded.as_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(key, "undecodable store value: {err:?}");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, "corrupt store value: {err:?}");
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.medium.read(key).is_some()
    }

    pub fn remove(&self, key: &str) {
        self.medium.remove(key);
    }

    /// Wipe every key in the medium.
    pub fn clear_all(&self) {
        self.medium.clear();
    }

    /// Wipe the medium, then restore only the session whitelist using the
    /// pre-wipe values. Any other key is permanently lost. Used to recover
    /// from quota/corruption situations without destroying the session.
    pub fn selective_refresh(&self) {
        let snapshot: Vec<(&str, Option<String>)> = keys::RESTORE_WHITELIST
            .iter()
            .map(|key| (*key, self.medium.read(key)))
            .collect();

        self.medium.clear();

        for (key, value) in snapshot {
            if let Some(encoded) = value {
                self.medium.write(key, &encoded);
            }
        }
    }
}
