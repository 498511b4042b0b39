//! Thread title persistence.
//!
//! The hosted API does not always carry a thread title, so the client keeps
//! its own key/value mapping from thread id to title. Persistence is
//! best-effort: a failing store is logged and the UI carries on with the
//! in-memory cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use backboard_common::StoreError;

const MAX_DERIVED_TITLE_CHARS: usize = 40;

/// Fallback title derived from the first user message of a thread.
pub fn derive_title(first_message: &str) -> String {
    let text = first_message.trim().lines().next().unwrap_or("").trim();
    if text.is_empty() {
        return "New chat".to_string();
    }
    if text.chars().count() <= MAX_DERIVED_TITLE_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_DERIVED_TITLE_CHARS).collect();
    format!("{}…", truncated.trim_end())
}

/// Key/value store of thread titles.
pub trait TitleStore: Send + Sync {
    fn load_all(&self) -> Result<HashMap<String, String>, StoreError>;
    fn upsert(&self, thread_id: &str, title: &str) -> Result<(), StoreError>;
    fn delete(&self, thread_id: &str) -> Result<(), StoreError>;
}

/// JSON-file-backed title store under the user data directory.
pub struct FileTitleStore {
    path: PathBuf,
}

impl FileTitleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location, `<data dir>/backboard/titles.json`.
    pub fn default_location() -> Result<Self, StoreError> {
        let dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(Self::new(dir.join("backboard").join("titles.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(&self, titles: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(titles)
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl TitleStore for FileTitleStore {
    fn load_all(&self) -> Result<HashMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let json = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&json).map_err(|e| StoreError::Encode(e.to_string()))
    }

    fn upsert(&self, thread_id: &str, title: &str) -> Result<(), StoreError> {
        let mut titles = self.load_all()?;
        titles.insert(thread_id.to_string(), title.to_string());
        self.write_all(&titles)
    }

    fn delete(&self, thread_id: &str) -> Result<(), StoreError> {
        let mut titles = self.load_all()?;
        if titles.remove(thread_id).is_some() {
            self.write_all(&titles)?;
        }
        Ok(())
    }
}

/// Load-once cache over a [`TitleStore`], owned by the application context.
/// Writes go through to the store and update the cache in the same step;
/// store failures are logged and never block the caller.
pub struct TitleCache {
    store: Box<dyn TitleStore>,
    titles: HashMap<String, String>,
    loaded: bool,
}

impl TitleCache {
    pub fn new(store: Box<dyn TitleStore>) -> Self {
        Self {
            store,
            titles: HashMap::new(),
            loaded: false,
        }
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        match self.store.load_all() {
            Ok(titles) => {
                debug!(count = titles.len(), "thread titles loaded");
                self.titles = titles;
            }
            Err(e) => {
                warn!(error = %e, "failed to load thread titles");
            }
        }
        self.loaded = true;
    }

    pub fn get(&mut self, thread_id: &str) -> Option<&str> {
        self.ensure_loaded();
        self.titles.get(thread_id).map(String::as_str)
    }

    pub fn set(&mut self, thread_id: &str, title: &str) {
        self.ensure_loaded();
        self.titles
            .insert(thread_id.to_string(), title.to_string());
        if let Err(e) = self.store.upsert(thread_id, title) {
            warn!(thread_id, error = %e, "failed to persist thread title");
        }
    }

    pub fn remove(&mut self, thread_id: &str) {
        self.ensure_loaded();
        self.titles.remove(thread_id);
        if let Err(e) = self.store.delete(thread_id) {
            warn!(thread_id, error = %e, "failed to delete thread title");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_title_short_message() {
        assert_eq!(derive_title("How do I sort a Vec?"), "How do I sort a Vec?");
    }

    #[test]
    fn derive_title_uses_first_line_and_truncates() {
        let long = "This is a rather long first message that goes on and on\nsecond line";
        let title = derive_title(long);
        assert!(title.ends_with('…'));
        assert!(title.chars().count() <= MAX_DERIVED_TITLE_CHARS + 1);
        assert!(!title.contains("second"));
    }

    #[test]
    fn derive_title_empty_message() {
        assert_eq!(derive_title("   \n  "), "New chat");
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTitleStore::new(dir.path().join("titles.json"));

        assert!(store.load_all().unwrap().is_empty());

        store.upsert("t1", "First thread").unwrap();
        store.upsert("t2", "Second thread").unwrap();
        store.upsert("t1", "Renamed").unwrap();

        let titles = store.load_all().unwrap();
        assert_eq!(titles.len(), 2);
        assert_eq!(titles.get("t1").map(String::as_str), Some("Renamed"));

        store.delete("t1").unwrap();
        let titles = store.load_all().unwrap();
        assert_eq!(titles.len(), 1);
        assert!(!titles.contains_key("t1"));
    }

    #[test]
    fn file_store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTitleStore::new(dir.path().join("nested/deeper/titles.json"));
        store.upsert("t1", "title").unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn file_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("titles.json");
        std::fs::write(&path, "not json {{{").unwrap();

        let store = FileTitleStore::new(path);
        assert!(matches!(store.load_all(), Err(StoreError::Encode(_))));
    }

    #[test]
    fn cache_loads_once_and_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("titles.json");

        let seed = FileTitleStore::new(&path);
        seed.upsert("t1", "Seeded").unwrap();

        let mut cache = TitleCache::new(Box::new(FileTitleStore::new(&path)));
        assert_eq!(cache.get("t1"), Some("Seeded"));

        cache.set("t2", "Fresh");
        assert_eq!(cache.get("t2"), Some("Fresh"));

        // Write-through visible to an independent reader.
        let titles = FileTitleStore::new(&path).load_all().unwrap();
        assert_eq!(titles.get("t2").map(String::as_str), Some("Fresh"));

        cache.remove("t1");
        assert_eq!(cache.get("t1"), None);
        let titles = FileTitleStore::new(&path).load_all().unwrap();
        assert!(!titles.contains_key("t1"));
    }

    /// Store that always fails, to verify the cache never propagates.
    struct BrokenStore;

    impl TitleStore for BrokenStore {
        fn load_all(&self) -> Result<HashMap<String, String>, StoreError> {
            Err(StoreError::NoDataDir)
        }
        fn upsert(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::NoDataDir)
        }
        fn delete(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::NoDataDir)
        }
    }

    #[test]
    fn cache_survives_broken_store() {
        let mut cache = TitleCache::new(Box::new(BrokenStore));
        assert_eq!(cache.get("t1"), None);
        cache.set("t1", "memory only");
        assert_eq!(cache.get("t1"), Some("memory only"));
        cache.remove("t1");
        assert_eq!(cache.get("t1"), None);
    }
}
