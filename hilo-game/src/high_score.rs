//! Best-streak persistence over a local key/value store.
use log::{error, warn};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;

use crate::constants::HIGH_SCORE_KEY;

/// Failures from a local durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is unavailable")]
    Unavailable,
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store contents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Trait for abstracting the local string key/value store.
/// Platform-specific implementations should provide this
pub trait KeyValueStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Store `value` under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected.
    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Remove `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the delete is rejected.
    fn delete(&self, key: &str) -> Result<(), Self::Error>;
}

/// Volatile store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValue {
    values: Rc<RefCell<HashMap<String, String>>>,
    unavailable: Rc<Cell<bool>>,
}

impl MemoryKeyValue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a store that rejects every call (private browsing, quota, ...).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    /// Raw view of a stored value, bypassing availability.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.get() {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryKeyValue {
    type Error = StoreError;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        self.check()?;
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.check()?;
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), Self::Error> {
        self.check()?;
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

/// Durable store kept as a flat JSON object in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let payload = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, payload)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    type Error = StoreError;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn delete(&self, key: &str) -> Result<(), Self::Error> {
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}

/// Persisted best streak.
///
/// Store failures never escape: the first one switches the store to
/// in-memory behavior for the rest of the session.
#[derive(Debug)]
pub struct HighScoreStore<S> {
    store: S,
    value: u32,
    degraded: bool,
}

impl<S: KeyValueStore> HighScoreStore<S> {
    /// Load the stored best streak; absent, malformed or unreadable values read as 0.
    pub fn open(store: S) -> Self {
        let mut this = Self {
            store,
            value: 0,
            degraded: false,
        };
        match this.store.get(HIGH_SCORE_KEY) {
            Ok(Some(raw)) => this.value = parse_stored(&raw),
            Ok(None) => {}
            Err(err) => this.degrade("read", &err),
        }
        this
    }

    /// Current best streak.
    #[must_use]
    pub const fn read(&self) -> u32 {
        self.value
    }

    /// Record `candidate` if it beats the current best. Returns whether it did.
    pub fn offer(&mut self, candidate: u32) -> bool {
        if candidate <= self.value {
            return false;
        }
        self.value = candidate;
        if !self.degraded
            && let Err(err) = self.store.set(HIGH_SCORE_KEY, &candidate.to_string())
        {
            self.degrade("write", &err);
        }
        true
    }

    /// Clear the best streak back to 0.
    pub fn reset(&mut self) {
        self.value = 0;
        if !self.degraded
            && let Err(err) = self.store.delete(HIGH_SCORE_KEY)
        {
            self.degrade("delete", &err);
        }
    }

    /// Whether persistence has been abandoned for this session.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn degrade(&mut self, op: &str, err: &S::Error) {
        if !self.degraded {
            error!("high score {op} failed, continuing in memory: {err}");
        }
        self.degraded = true;
    }
}

fn parse_stored(raw: &str) -> u32 {
    raw.trim().parse().unwrap_or_else(|_| {
        warn!("ignoring malformed stored high score {raw:?}");
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "hilo-store-{label}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn fresh_store_reads_zero() {
        let store = HighScoreStore::open(MemoryKeyValue::new());
        assert_eq!(store.read(), 0);
        assert!(!store.is_degraded());
    }

    #[test]
    fn offer_only_accepts_improvements() {
        let kv = MemoryKeyValue::new();
        let mut store = HighScoreStore::open(kv.clone());
        assert!(store.offer(4));
        assert!(!store.offer(4));
        assert!(!store.offer(3));
        assert!(store.offer(9));
        assert_eq!(store.read(), 9);
        assert_eq!(kv.peek(HIGH_SCORE_KEY).as_deref(), Some("9"));
    }

    #[test]
    fn offer_is_idempotent() {
        let kv = MemoryKeyValue::new();
        let mut store = HighScoreStore::open(kv.clone());
        assert!(store.offer(6));
        let persisted = kv.peek(HIGH_SCORE_KEY);
        assert!(!store.offer(6));
        assert_eq!(kv.peek(HIGH_SCORE_KEY), persisted);
        assert_eq!(store.read(), 6);
    }

    #[test]
    fn zero_never_counts_as_new_best() {
        let mut store = HighScoreStore::open(MemoryKeyValue::new());
        assert!(!store.offer(0));
    }

    #[test]
    fn reopen_sees_persisted_value() {
        let kv = MemoryKeyValue::new();
        HighScoreStore::open(kv.clone()).offer(12);
        assert_eq!(HighScoreStore::open(kv).read(), 12);
    }

    #[test]
    fn malformed_values_default_to_zero() {
        for raw in ["", "abc", "-3", "1.5"] {
            let kv = MemoryKeyValue::new();
            kv.set(HIGH_SCORE_KEY, raw).unwrap();
            assert_eq!(HighScoreStore::open(kv).read(), 0, "raw {raw:?}");
        }
    }

    #[test]
    fn unavailable_store_degrades_to_memory() {
        let kv = MemoryKeyValue::new();
        kv.set_unavailable(true);
        let mut store = HighScoreStore::open(kv.clone());
        assert_eq!(store.read(), 0);
        assert!(store.is_degraded());
        assert!(store.offer(3));
        assert_eq!(store.read(), 3);
        kv.set_unavailable(false);
        assert_eq!(kv.peek(HIGH_SCORE_KEY), None);
    }

    #[test]
    fn write_failure_keeps_in_memory_value() {
        let kv = MemoryKeyValue::new();
        let mut store = HighScoreStore::open(kv.clone());
        kv.set_unavailable(true);
        assert!(store.offer(5));
        assert!(store.is_degraded());
        assert_eq!(store.read(), 5);
        assert!(!store.offer(5));
    }

    #[test]
    fn reset_clears_value_and_key() {
        let kv = MemoryKeyValue::new();
        let mut store = HighScoreStore::open(kv.clone());
        store.offer(8);
        store.reset();
        assert_eq!(store.read(), 0);
        assert_eq!(kv.peek(HIGH_SCORE_KEY), None);
        assert!(store.offer(1));
    }

    #[test]
    fn json_file_store_round_trips_through_disk() {
        let path = temp_path("file");
        let store = JsonFileStore::new(&path);
        assert_eq!(store.get("missing").unwrap(), None);
        store.set(HIGH_SCORE_KEY, "17").unwrap();
        store.set("other", "x").unwrap();
        assert_eq!(
            JsonFileStore::new(&path)
                .get(HIGH_SCORE_KEY)
                .unwrap()
                .as_deref(),
            Some("17")
        );
        store.delete(HIGH_SCORE_KEY).unwrap();
        assert_eq!(store.get(HIGH_SCORE_KEY).unwrap(), None);
        assert_eq!(store.get("other").unwrap().as_deref(), Some("x"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_degrades_high_score() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "not json").unwrap();
        let store = HighScoreStore::open(JsonFileStore::new(&path));
        assert_eq!(store.read(), 0);
        assert!(store.is_degraded());
        let _ = std::fs::remove_file(path);
    }
}
