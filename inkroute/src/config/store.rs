//! The configuration collaborator used by the orchestrator.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::display::ScreenType;
use crate::service::BoxFuture;

/// Read/write access to persisted settings.
///
/// Setters only change the in-memory copy; call [`save`](Self::save) to
/// persist. [`reload`](Self::reload) replaces the in-memory copy with what
/// is on disk.
pub trait ConfigStore: Send + Sync {
    /// Copy of the current settings.
    fn snapshot(&self) -> ConfigFile;

    /// Mutate the in-memory settings.
    fn update(&self, apply: &mut dyn FnMut(&mut ConfigFile));

    /// Persist the in-memory settings.
    fn save(&self) -> BoxFuture<'_, Result<(), ConfigFileError>>;

    /// Re-read settings from the backing file.
    fn reload(&self) -> BoxFuture<'_, Result<(), ConfigFileError>>;

    fn zoom(&self) -> u8 {
        self.snapshot().display.zoom
    }

    fn set_zoom(&self, zoom: u8) {
        self.update(&mut |c: &mut ConfigFile| c.display.zoom = zoom);
    }

    fn auto_center(&self) -> bool {
        self.snapshot().display.auto_center
    }

    fn set_auto_center(&self, enabled: bool) {
        self.update(&mut |c: &mut ConfigFile| c.display.auto_center = enabled);
    }

    fn rotate_with_bearing(&self) -> bool {
        self.snapshot().display.rotate_with_bearing
    }

    fn set_rotate_with_bearing(&self, enabled: bool) {
        self.update(&mut |c: &mut ConfigFile| c.display.rotate_with_bearing = enabled);
    }

    fn active_screen(&self) -> ScreenType {
        self.snapshot().display.screen
    }

    fn set_active_screen(&self, screen: ScreenType) {
        self.update(&mut |c: &mut ConfigFile| c.display.screen = screen);
    }

    fn auto_update_enabled(&self) -> bool {
        self.snapshot().auto_update.enabled
    }

    fn set_auto_update_enabled(&self, enabled: bool) {
        self.update(&mut |c: &mut ConfigFile| c.auto_update.enabled = enabled);
    }

    fn auto_update_interval(&self) -> Duration {
        self.snapshot().auto_update.interval()
    }

    fn set_auto_update_interval(&self, interval: Duration) {
        let secs = interval.as_secs();
        self.update(&mut |c: &mut ConfigFile| c.auto_update.interval_secs = secs);
    }

    fn active_gpx(&self) -> Option<PathBuf> {
        self.snapshot().gpx.active
    }

    fn set_active_gpx(&self, path: Option<PathBuf>) {
        let mut path = path;
        self.update(&mut |c: &mut ConfigFile| c.gpx.active = path.take());
    }
}

/// INI-file backed store. Without a path it keeps settings in memory only.
#[derive(Debug)]
pub struct IniConfigStore {
    path: Option<PathBuf>,
    config: RwLock<ConfigFile>,
}

impl IniConfigStore {
    /// In-memory store; `save` and `reload` are no-ops.
    pub fn in_memory(config: ConfigFile) -> Self {
        Self {
            path: None,
            config: RwLock::new(config),
        }
    }

    /// Open a file-backed store, loading defaults when the file is missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigFileError> {
        let path = path.into();
        let config = ConfigFile::load_from(&path)?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(Self {
            path: Some(path),
            config: RwLock::new(config),
        })
    }

    /// Open `~/.inkroute/config.ini`.
    pub fn open_default() -> Result<Self, ConfigFileError> {
        Self::open(super::file::config_file_path())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl ConfigStore for IniConfigStore {
    fn snapshot(&self) -> ConfigFile {
        self.config.read().clone()
    }

    fn update(&self, apply: &mut dyn FnMut(&mut ConfigFile)) {
        apply(&mut self.config.write());
    }

    fn save(&self) -> BoxFuture<'_, Result<(), ConfigFileError>> {
        Box::pin(async move {
            let Some(path) = self.path.clone() else {
                return Ok(());
            };
            let config = self.snapshot();
            tokio::task::spawn_blocking(move || config.save_to(&path))
                .await
                .map_err(|e| ConfigFileError::WriteError(e.to_string()))??;
            debug!("Configuration saved");
            Ok(())
        })
    }

    fn reload(&self) -> BoxFuture<'_, Result<(), ConfigFileError>> {
        Box::pin(async move {
            let Some(path) = self.path.clone() else {
                return Ok(());
            };
            let config = tokio::task::spawn_blocking(move || ConfigFile::load_from(&path))
                .await
                .map_err(|e| ConfigFileError::WriteError(e.to_string()))??;
            *self.config.write() = config;
            debug!("Configuration reloaded");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_setters_persist_after_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");

        let store = IniConfigStore::open(&path).unwrap();
        store.set_zoom(12);
        store.set_active_screen(ScreenType::TurnByTurn);
        store.set_auto_update_interval(Duration::from_secs(90));
        store.set_active_gpx(Some(PathBuf::from("/routes/a.json")));
        store.save().await.unwrap();

        let reopened = IniConfigStore::open(&path).unwrap();
        assert_eq!(reopened.zoom(), 12);
        assert_eq!(reopened.active_screen(), ScreenType::TurnByTurn);
        assert_eq!(reopened.auto_update_interval(), Duration::from_secs(90));
        assert_eq!(reopened.active_gpx(), Some(PathBuf::from("/routes/a.json")));
    }

    #[tokio::test]
    async fn test_reload_discards_unsaved_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        let store = IniConfigStore::open(&path).unwrap();
        store.save().await.unwrap();

        store.set_auto_center(false);
        store.reload().await.unwrap();
        assert!(store.auto_center());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = IniConfigStore::in_memory(ConfigFile::default());
        store.set_rotate_with_bearing(true);
        store.save().await.unwrap();
        store.reload().await.unwrap();
        assert!(store.rotate_with_bearing());
        assert!(store.path().is_none());
    }
}
