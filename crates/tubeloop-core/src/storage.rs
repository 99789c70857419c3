//! Durable key-value storage.
//!
//! The playlist, play mode, playback rate and preferences are each kept under
//! their own key. Reads never fail: missing or malformed values fall back to
//! defaults so a damaged store can't keep the player from starting. Writes
//! return errors, and callers decide whether to absorb them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::config::Preferences;
use crate::error::{Error, Result};
use crate::order::PlayMode;
use crate::player::{DEFAULT_PLAYBACK_RATE, validate_playback_rate};
use crate::playlist::PlaylistEntry;

/// Key holding the serialized playlist.
pub const PLAYLIST_KEY: &str = "youtube-player-playlist";
/// Key holding the play mode tag.
pub const MODE_KEY: &str = "youtube-player-mode";
/// Key holding the playback rate as a decimal string.
pub const RATE_KEY: &str = "youtube-player-rate";
/// Key holding user preferences as JSON.
pub const PREFERENCES_KEY: &str = "youtube-player-preferences";

/// A string-to-string durable store.
///
/// Implementations use interior mutability so one store can be shared by the
/// playlist and the coordinator.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| Error::StorageUnavailable("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a single JSON object file.
///
/// The whole file is rewritten on every `set`; the values are small.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store named `store.json` inside `directory`.
    pub fn in_directory(directory: &Path) -> Self {
        Self::new(directory.join("store.json"))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_content(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::StorageUnavailable(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, String>> {
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(content).map_err(|e| {
            Error::StorageUnavailable(format!("corrupt store {}: {e}", self.path.display()))
        })
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match self.read_content()? {
            Some(content) => self.parse(&content),
            None => Ok(BTreeMap::new()),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| Error::FileSystem {
                path: parent.to_path_buf(),
                message: format!("Failed to create store directory: {e}"),
            })?;
        }

        let content = serde_json::to_string_pretty(values)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content)
            .and_then(|()| fs::rename(&staging, &self.path))
            .map_err(|e| {
                Error::StorageUnavailable(format!("failed to write {}: {e}", self.path.display()))
            })
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::StorageUnavailable("file store lock poisoned".to_string()))?;

        // A file that can't be read is left alone; only malformed JSON is replaced.
        let mut values = match self.read_content()? {
            Some(content) => self.parse(&content).unwrap_or_else(|e| {
                warn!("Discarding unreadable store: {}", e);
                BTreeMap::new()
            }),
            None => BTreeMap::new(),
        };
        f(&mut values);
        self.write_all(&values)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }
}

fn read_or_none(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to read '{}', using default: {}", key, e);
            None
        }
    }
}

/// Load the saved playlist.
///
/// Entries that fail to decode and repeated identifiers are dropped; anything
/// that is not a JSON array yields an empty list.
pub fn load_playlist(store: &dyn KeyValueStore) -> Vec<PlaylistEntry> {
    let Some(raw) = read_or_none(store, PLAYLIST_KEY) else {
        return Vec::new();
    };

    let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(e) => {
            warn!("Saved playlist is not a list, starting empty: {}", e);
            return Vec::new();
        }
    };

    let total = values.len();
    let mut seen = HashSet::new();
    let entries: Vec<PlaylistEntry> = values
        .into_iter()
        .filter_map(|value| serde_json::from_value::<PlaylistEntry>(value).ok())
        .filter(|entry| seen.insert(entry.id.clone()))
        .collect();

    if entries.len() < total {
        warn!(
            "Dropped {} unreadable or repeated playlist entries",
            total - entries.len()
        );
    }
    debug!("Loaded {} playlist entries", entries.len());
    entries
}

/// Save the playlist.
pub fn save_playlist(store: &dyn KeyValueStore, entries: &[PlaylistEntry]) -> Result<()> {
    let json = serde_json::to_string(entries)?;
    store.set(PLAYLIST_KEY, &json)
}

/// Load the play mode, defaulting to sequential.
pub fn load_mode(store: &dyn KeyValueStore) -> PlayMode {
    read_or_none(store, MODE_KEY)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default()
}

/// Save the play mode.
pub fn save_mode(store: &dyn KeyValueStore, mode: PlayMode) -> Result<()> {
    store.set(MODE_KEY, mode.as_str())
}

/// Load the playback rate, defaulting to 1.0 when missing or out of range.
pub fn load_rate(store: &dyn KeyValueStore) -> f64 {
    read_or_none(store, RATE_KEY)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .and_then(|rate| validate_playback_rate(rate).ok())
        .unwrap_or(DEFAULT_PLAYBACK_RATE)
}

/// Save the playback rate.
pub fn save_rate(store: &dyn KeyValueStore, rate: f64) -> Result<()> {
    store.set(RATE_KEY, &rate.to_string())
}

/// Load preferences, defaulting any missing field.
pub fn load_preferences(store: &dyn KeyValueStore) -> Preferences {
    read_or_none(store, PREFERENCES_KEY)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

/// Save preferences.
pub fn save_preferences(store: &dyn KeyValueStore, preferences: &Preferences) -> Result<()> {
    let json = serde_json::to_string(preferences)?;
    store.set(PREFERENCES_KEY, &json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        store.set("k", "w").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("w"));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let path = temp_dir.path().join("nested/store.json");

        let store = FileStore::new(&path);
        store.set(MODE_KEY, "shuffle").unwrap();
        store.set(RATE_KEY, "1.5").unwrap();
        assert!(path.exists());

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get(MODE_KEY).unwrap().as_deref(), Some("shuffle"));
        assert_eq!(reopened.get(RATE_KEY).unwrap().as_deref(), Some("1.5"));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let store = FileStore::in_directory(temp_dir.path());
        assert_eq!(store.get(PLAYLIST_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_recovers_from_corrupt_file() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let store = FileStore::in_directory(temp_dir.path());
        fs::write(store.path(), "{not json").unwrap();

        assert!(store.get(MODE_KEY).is_err());
        assert_eq!(load_mode(&store), PlayMode::Sequential);

        store.set(MODE_KEY, "single-loop").unwrap();
        assert_eq!(load_mode(&store), PlayMode::SingleLoop);
    }

    #[test]
    fn test_file_store_keeps_file_it_cannot_read() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let store = FileStore::in_directory(temp_dir.path());
        let original = [0xff, 0xfe, 0x00, 0x7b];
        fs::write(store.path(), original).unwrap();

        assert!(store.set(RATE_KEY, "1.5").is_err());
        assert_eq!(fs::read(store.path()).unwrap(), original);
        assert_eq!(load_rate(&store), 1.0);
    }

    #[test]
    fn test_file_store_write_leaves_no_staging_file() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let store = FileStore::in_directory(temp_dir.path());
        store.set(MODE_KEY, "shuffle").unwrap();
        store.set(RATE_KEY, "0.5").unwrap();

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("store.json")]);
    }

    #[test]
    fn test_load_defaults_on_empty_store() {
        let store = MemoryStore::new();
        assert!(load_playlist(&store).is_empty());
        assert_eq!(load_mode(&store), PlayMode::Sequential);
        assert_eq!(load_rate(&store), 1.0);
        assert_eq!(load_preferences(&store), Preferences::default());
    }

    #[test]
    fn test_load_tolerates_malformed_values() {
        let store = MemoryStore::new();
        store.set(PLAYLIST_KEY, "{\"oops\": true}").unwrap();
        store.set(MODE_KEY, "backwards").unwrap();
        store.set(RATE_KEY, "fast").unwrap();
        store.set(PREFERENCES_KEY, "[]").unwrap();

        assert!(load_playlist(&store).is_empty());
        assert_eq!(load_mode(&store), PlayMode::Sequential);
        assert_eq!(load_rate(&store), 1.0);
        assert_eq!(load_preferences(&store), Preferences::default());
    }

    #[test]
    fn test_load_rate_rejects_out_of_range() {
        let store = MemoryStore::new();
        store.set(RATE_KEY, "4").unwrap();
        assert_eq!(load_rate(&store), 1.0);

        store.set(RATE_KEY, "1.25").unwrap();
        assert_eq!(load_rate(&store), 1.25);
    }

    #[test]
    fn test_load_playlist_reads_legacy_format() {
        let store = MemoryStore::new();
        store
            .set(
                PLAYLIST_KEY,
                r#"[
                    {"id":"dQw4w9WgXcQ","url":"https://youtu.be/dQw4w9WgXcQ"},
                    {"id":"9bZkp7q19f0","url":"9bZkp7q19f0","duration":252.1,"embedDisabled":true}
                ]"#,
            )
            .unwrap();

        let entries = load_playlist(&store);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].source_text, "https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(entries[0].duration_secs, None);
        assert!(!entries[0].embed_disabled);
        assert_eq!(entries[1].duration_secs, Some(252.1));
        assert!(entries[1].embed_disabled);
    }

    #[test]
    fn test_load_playlist_drops_bad_and_repeated_entries() {
        let store = MemoryStore::new();
        store
            .set(
                PLAYLIST_KEY,
                r#"[
                    {"id":"dQw4w9WgXcQ","url":"a"},
                    {"id":"bad","url":"b"},
                    {"url":"c"},
                    {"id":"dQw4w9WgXcQ","url":"d"}
                ]"#,
            )
            .unwrap();

        let entries = load_playlist(&store);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_text, "a");
    }

    #[test]
    fn test_save_then_load_mode_and_rate() {
        let store = MemoryStore::new();
        save_mode(&store, PlayMode::Shuffle).unwrap();
        save_rate(&store, 0.75).unwrap();

        assert_eq!(store.get(MODE_KEY).unwrap().as_deref(), Some("shuffle"));
        assert_eq!(store.get(RATE_KEY).unwrap().as_deref(), Some("0.75"));
        assert_eq!(load_mode(&store), PlayMode::Shuffle);
        assert_eq!(load_rate(&store), 0.75);
    }

    #[test]
    fn test_read_failure_falls_back() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .returning(|_| Err(Error::StorageUnavailable("quota".to_string())));

        assert!(load_playlist(&store).is_empty());
        assert_eq!(load_mode(&store), PlayMode::Sequential);
        assert_eq!(load_rate(&store), 1.0);
    }
}
