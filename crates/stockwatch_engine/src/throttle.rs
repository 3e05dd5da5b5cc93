//! Persisted per-recipient notification throttle.
//!
//! The store is one JSON object mapping `"<recipient>|<page url>"` to the Unix
//! time (seconds, fractional) of the last successful notification. Every
//! operation reloads the whole file and every mutation rewrites it; a single
//! mutex spans each load-modify-write cycle so concurrent checks cannot lose
//! each other's updates.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use stockwatch_core::{is_due, throttle_key};
use stockwatch_logging::{watch_debug, watch_warn};
use thiserror::Error;

use crate::persist::{write_atomically, PersistError};

pub const DEFAULT_THROTTLE_FILE: &str = "notice_cache.json";

pub type ThrottleMap = BTreeMap<String, f64>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read throttle file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("throttle file {path:?} is not a JSON object: {message}")]
    Malformed { path: PathBuf, message: String },
    #[error("failed to serialize throttle entries: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write throttle file: {0}")]
    Write(#[from] PersistError),
}

#[derive(Debug)]
pub struct ThrottleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ThrottleStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current mapping, with read problems reported instead of hidden.
    pub fn snapshot(&self) -> Result<ThrottleMap, StoreError> {
        let _guard = self.guard();
        self.read_map()
    }

    pub fn last_notified(&self, recipient: &str, page_url: &str) -> Option<f64> {
        let _guard = self.guard();
        self.read_map_or_empty()
            .get(&throttle_key(recipient, page_url))
            .copied()
    }

    pub fn should_notify(
        &self,
        recipient: &str,
        page_url: &str,
        cooldown_seconds: u64,
        now: f64,
    ) -> bool {
        is_due(self.last_notified(recipient, page_url), now, cooldown_seconds)
    }

    /// Split `recipients` into those due for a notification and those still
    /// inside their cooldown, preserving input order in both halves.
    /// Repeated addresses are only considered once.
    pub fn partition(
        &self,
        recipients: &[String],
        page_url: &str,
        cooldown_seconds: u64,
        now: f64,
    ) -> (Vec<String>, Vec<String>) {
        let map = {
            let _guard = self.guard();
            self.read_map_or_empty()
        };
        let mut seen = BTreeSet::new();
        recipients
            .iter()
            .filter(|recipient| seen.insert(recipient.as_str()))
            .cloned()
            .partition(|recipient| {
                let last = map.get(&throttle_key(recipient, page_url)).copied();
                is_due(last, now, cooldown_seconds)
            })
    }

    /// Set every `(recipient, page_url)` entry to `timestamp` and rewrite the file.
    pub fn record(
        &self,
        recipients: &[String],
        page_url: &str,
        timestamp: f64,
    ) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut map = self.read_map_or_empty();
        for recipient in recipients {
            map.insert(throttle_key(recipient, page_url), timestamp);
        }
        let content = serde_json::to_string(&map)?;
        write_atomically(&self.path, &content)?;
        watch_debug!(
            "Recorded {} notification(s) for {} in {:?}",
            recipients.len(),
            page_url,
            self.path
        );
        Ok(())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_map(&self) -> Result<ThrottleMap, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ThrottleMap::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(ThrottleMap::new());
        }

        let malformed = |message: String| StoreError::Malformed {
            path: self.path.clone(),
            message,
        };
        let value: Value = serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(entries) = value else {
            return Err(malformed("top-level value is not an object".into()));
        };

        let mut map = ThrottleMap::new();
        for (key, value) in entries {
            match value.as_f64() {
                Some(timestamp) => {
                    map.insert(key, timestamp);
                }
                None => watch_warn!(
                    "Dropping non-numeric throttle entry {:?} in {:?}",
                    key,
                    self.path
                ),
            }
        }
        Ok(map)
    }

    /// Reading is fail-open: an unreadable store never blocks a notification.
    fn read_map_or_empty(&self) -> ThrottleMap {
        self.read_map().unwrap_or_else(|err| {
            watch_warn!("{}; treating throttle store as empty", err);
            ThrottleMap::new()
        })
    }
}
