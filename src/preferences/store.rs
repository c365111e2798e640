//! Namespaced key-value persistence behind the display preferences.
//!
//! Keys are flat strings of the form `"{dashboard}_{leaf}"`, so several
//! dashboards (e.g. one per monitored interface) can share one backing store
//! without colliding. Every `write` goes straight through to the backend:
//! there is no batching and the last write wins.
//!
//! # Persistence Strategy
//!
//! [`JsonFileStore`] keeps the whole map in memory and rewrites the file on
//! each write: serialize → temp file → fsync → rename over target, so readers
//! never see a partial file. Load problems fall back to an empty map and are
//! reported through [`LoadOutcome`]; they never block startup.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::errors::{NetpanelError, Result};

/// Identity string of a dashboard instance; the namespace for its keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DashboardId(String);

impl DashboardId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified store key for `leaf`.
    #[must_use]
    pub fn scoped(&self, leaf: &str) -> String {
        format!("{}_{leaf}", self.0)
    }
}

impl fmt::Display for DashboardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw persistent store. Implementations must be safe to share across threads.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Option<Value>;

    fn write(&self, key: &str, value: Value) -> Result<()>;

    /// All stored keys in sorted order.
    fn keys(&self) -> Vec<String>;
}

/// Typed read of `namespace`'s `leaf`, falling back to `default` when the key
/// is absent or holds a value of the wrong shape.
pub fn get<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    namespace: &DashboardId,
    leaf: &str,
    default: T,
) -> T {
    store
        .read(&namespace.scoped(leaf))
        .and_then(|raw| serde_json::from_value(raw).ok())
        .unwrap_or(default)
}

/// Typed write-through of `namespace`'s `leaf`.
pub fn set<T: Serialize>(
    store: &dyn KeyValueStore,
    namespace: &DashboardId,
    leaf: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_value(value)?;
    store.write(&namespace.scoped(leaf), raw)
}

// ──────────────────── in-memory ────────────────────

/// Volatile store for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn write(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

// ──────────────────── JSON file ────────────────────

/// Load outcome from the file backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { entries: usize },
    /// File not found; starting empty (normal for first launch).
    Missing,
    /// File exists but is not a JSON object; starting empty.
    Corrupt { details: String },
    /// File could not be read; starting empty.
    IoError { details: String },
}

impl LoadOutcome {
    /// Whether the load was successful (loaded or first-launch missing).
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Loaded { .. } | Self::Missing)
    }
}

/// Store persisted as one JSON object on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Open (or start) the store at `path`. Never fails; see [`LoadOutcome`].
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> (Self, LoadOutcome) {
        let path = path.into();
        let (entries, outcome) = load_map(&path);
        let store = Self {
            path,
            entries: RwLock::new(entries),
        };
        (store, outcome)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn read(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn write(&self, key: &str, value: Value) -> Result<()> {
        // Hold the write lock across the save so files land in write order.
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value);
        save_map(&entries, &self.path).map_err(|e| NetpanelError::PreferenceStore {
            key: key.to_string(),
            details: format!("{}: {e}", self.path.display()),
        })
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

fn load_map(path: &Path) -> (BTreeMap<String, Value>, LoadOutcome) {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return (BTreeMap::new(), LoadOutcome::Missing);
        }
        // Binary garbage / invalid UTF-8 is corrupt content, not an I/O error.
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            return (
                BTreeMap::new(),
                LoadOutcome::Corrupt {
                    details: e.to_string(),
                },
            );
        }
        Err(e) => {
            return (
                BTreeMap::new(),
                LoadOutcome::IoError {
                    details: e.to_string(),
                },
            );
        }
    };

    match serde_json::from_str::<BTreeMap<String, Value>>(&content) {
        Ok(entries) => {
            let count = entries.len();
            (entries, LoadOutcome::Loaded { entries: count })
        }
        Err(e) => (
            BTreeMap::new(),
            LoadOutcome::Corrupt {
                details: e.to_string(),
            },
        ),
    }
}

fn save_map(entries: &BTreeMap<String, Value>, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_key_joins_with_underscore() {
        let id = DashboardId::new("Network");
        assert_eq!(id.scoped("chartScale"), "Network_chartScale");
    }

    #[test]
    fn get_falls_back_on_missing_or_mistyped() {
        let store = MemoryStore::new();
        let id = DashboardId::new("Network");
        assert_eq!(get(&store, &id, "processes", 8i64), 8);
        store
            .write("Network_processes", Value::String("lots".into()))
            .unwrap();
        assert_eq!(get(&store, &id, "processes", 8i64), 8);
    }

    #[test]
    fn namespaces_do_not_collide() {
        let store = MemoryStore::new();
        let a = DashboardId::new("en0");
        let b = DashboardId::new("en1");
        set(&store, &a, "reverseOrder", &true).unwrap();
        assert!(get(&store, &a, "reverseOrder", false));
        assert!(!get(&store, &b, "reverseOrder", false));
    }

    #[test]
    fn last_write_wins() {
        let store = MemoryStore::new();
        let id = DashboardId::new("Network");
        set(&store, &id, "base", &"byte").unwrap();
        set(&store, &id, "base", &"bit").unwrap();
        assert_eq!(get(&store, &id, "base", String::new()), "bit");
    }

    #[test]
    fn file_store_writes_through_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let id = DashboardId::new("Network");
        {
            let (store, outcome) = JsonFileStore::open(&path);
            assert_eq!(outcome, LoadOutcome::Missing);
            set(&store, &id, "chartFixedScale", &42).unwrap();
        }
        let (store, outcome) = JsonFileStore::open(&path);
        assert_eq!(outcome, LoadOutcome::Loaded { entries: 1 });
        assert_eq!(get(&store, &id, "chartFixedScale", 12i64), 42);
        assert_eq!(store.keys(), vec!["Network_chartFixedScale".to_string()]);
    }

    #[test]
    fn file_store_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not valid json {{{").unwrap();
        let (store, outcome) = JsonFileStore::open(&path);
        assert!(matches!(outcome, LoadOutcome::Corrupt { .. }));
        assert!(!outcome.is_ok());
        assert!(store.keys().is_empty());
    }

    #[test]
    fn file_store_creates_parent_dirs_without_tmp_leftover() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("nested").join("prefs.json");
        let (store, _) = JsonFileStore::open(&path);
        store.write("k", Value::Bool(true)).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn file_store_write_failure_keeps_value_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        // The parent "directory" is a regular file, so the save must fail.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let (store, _) = JsonFileStore::open(blocker.join("prefs.json"));
        let err = store.write("k", Value::Bool(true)).unwrap_err();
        assert_eq!(err.code(), "NP-1102");
        assert_eq!(store.read("k"), Some(Value::Bool(true)));
    }
}
