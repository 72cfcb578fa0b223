use crate::error::{ChatError, ChatResult};
use crate::events::Theme;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Key holding the saved conversation snapshot
pub const HISTORY_KEY: &str = "phiChatHistory";

/// Key holding the light/dark preference
pub const THEME_KEY: &str = "themeColor";

/// Small key-value store backed by one JSON file per key.
///
/// Writes go through a sibling temp file and a rename, so a reader never
/// observes a half-written value. There is no versioning: the last writer wins.
#[derive(Debug, Clone)]
pub struct StorageManager {
    root: PathBuf,
}

impl StorageManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_directories(&self) -> ChatResult<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Raw stored text for `key`, or `None` if nothing was saved
    pub fn get_raw(&self, key: &str) -> ChatResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> ChatResult<Option<T>> {
        match self.get_raw(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|err| ChatError::PersistenceCorrupt(err.to_string())),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> ChatResult<()> {
        let content = serde_json::to_string_pretty(value)?;
        self.set_raw(key, &content)
    }

    pub fn set_raw(&self, key: &str, content: &str) -> ChatResult<()> {
        self.ensure_directories()?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Async variant of [`set_raw`](Self::set_raw) for background persistence
    pub async fn set_raw_async(&self, key: &str, content: String) -> ChatResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Remove `key`. Removing a key that was never written is not an error.
    pub fn remove(&self, key: &str) -> ChatResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    /// Saved theme, defaulting to dark when unset or unreadable
    pub fn load_theme(&self) -> Theme {
        match self.get::<Theme>(THEME_KEY) {
            Ok(Some(theme)) => theme,
            Ok(None) => Theme::default(),
            Err(err) => {
                tracing::warn!("Ignoring unreadable theme preference: {err}");
                Theme::default()
            }
        }
    }

    pub fn save_theme(&self, theme: Theme) -> ChatResult<()> {
        self.set(THEME_KEY, &theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_key_reads_as_none() {
        let temp = TempDir::new().expect("tempdir");
        let storage = StorageManager::new(temp.path());
        assert!(storage.get_raw("nothing").expect("read").is_none());
        assert!(!storage.contains("nothing"));
    }

    #[test]
    fn set_get_remove() {
        let temp = TempDir::new().expect("tempdir");
        let storage = StorageManager::new(temp.path().join("nested"));

        storage.set("numbers", &vec![1, 2, 3]).expect("set");
        let numbers: Option<Vec<i32>> = storage.get("numbers").expect("get");
        assert_eq!(numbers, Some(vec![1, 2, 3]));

        storage.remove("numbers").expect("remove");
        assert!(!storage.contains("numbers"));
        storage.remove("numbers").expect("second remove is a no-op");
    }

    #[test]
    fn unparsable_value_is_reported_as_corrupt() {
        let temp = TempDir::new().expect("tempdir");
        let storage = StorageManager::new(temp.path());
        storage.set_raw("numbers", "{not json").expect("set");

        let err = storage.get::<Vec<i32>>("numbers").expect_err("corrupt");
        assert!(matches!(err, ChatError::PersistenceCorrupt(_)));
    }

    #[test]
    fn theme_round_trips_and_defaults_to_dark() {
        let temp = TempDir::new().expect("tempdir");
        let storage = StorageManager::new(temp.path());
        assert_eq!(storage.load_theme(), Theme::Dark);

        storage.save_theme(Theme::Light).expect("save");
        assert_eq!(storage.load_theme(), Theme::Light);
        let raw = storage.get_raw(THEME_KEY).expect("raw").expect("present");
        assert_eq!(raw.trim(), "\"light_mode\"");

        storage.set_raw(THEME_KEY, "garbage").expect("set");
        assert_eq!(storage.load_theme(), Theme::Dark);
    }

    #[tokio::test]
    async fn async_write_is_visible_to_sync_reader() {
        let temp = TempDir::new().expect("tempdir");
        let storage = StorageManager::new(temp.path());
        storage
            .set_raw_async(HISTORY_KEY, "{\"a\":1}".to_string())
            .await
            .expect("write");
        assert_eq!(
            storage.get_raw(HISTORY_KEY).expect("read").as_deref(),
            Some("{\"a\":1}")
        );
    }
}
