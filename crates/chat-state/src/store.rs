//! The global settings store.
//!
//! One explicitly constructed instance per state; nothing module-global, so
//! test runs never share settings. Reads are synchronous clones; updates
//! patch in place, bump a revision published on a watch channel and persist
//! through the storage boundary.

use std::sync::{Arc, RwLock};

use chat_core::GlobalSettings;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::StateError;
use crate::lock;
use crate::storage::ChatStorage;

/// Process-wide settings, loaded once and mutated only via [`update`].
///
/// [`update`]: SettingsStore::update
pub struct SettingsStore {
    storage: RwLock<Arc<dyn ChatStorage>>,
    settings: RwLock<GlobalSettings>,
    revision: watch::Sender<u64>,
}

impl SettingsStore {
    /// Load persisted settings, falling back to defaults on first run or
    /// when the stored document cannot be read.
    pub async fn load(storage: Arc<dyn ChatStorage>) -> Self {
        let settings = match storage.load_settings().await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                info!("no persisted settings, starting with defaults");
                GlobalSettings::default()
            }
            Err(err) => {
                warn!("failed to load settings, starting with defaults: {}", err);
                GlobalSettings::default()
            }
        };
        let (revision, _) = watch::channel(0);
        Self {
            storage: RwLock::new(storage),
            settings: RwLock::new(settings),
            revision,
        }
    }

    /// A snapshot of the current settings.
    pub fn get(&self) -> GlobalSettings {
        lock::read(&self.settings).clone()
    }

    /// Apply a patch, notify subscribers and persist.
    ///
    /// Persistence failure is logged, never fatal - the in-memory settings
    /// stay authoritative for the session.
    pub async fn update(&self, patch: impl FnOnce(&mut GlobalSettings)) {
        let snapshot = {
            let mut settings = lock::write(&self.settings);
            patch(&mut settings);
            settings.clone()
        };
        self.revision.send_modify(|rev| *rev += 1);

        let storage = lock::read(&self.storage).clone();
        if let Err(err) = storage.save_settings(&snapshot).await {
            warn!("failed to persist settings: {}", err);
        }
    }

    /// Apply a named provider profile to the endpoint fields.
    pub async fn apply_profile(&self, name: &str) -> Result<(), StateError> {
        let profile = self
            .get()
            .profile(name)
            .cloned()
            .ok_or_else(|| StateError::UnknownProfile(name.to_string()))?;
        self.update(|settings| settings.apply_profile(&profile)).await;
        Ok(())
    }

    /// Reset everything back to first-run defaults.
    pub async fn reset(&self) {
        self.update(|settings| *settings = GlobalSettings::default())
            .await;
    }

    /// Subscribe to the revision counter; it bumps on every update,
    /// including settings adopted from a newly attached storage backend.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Swap the storage backend and adopt whatever settings it holds.
    pub(crate) async fn set_storage(&self, storage: Arc<dyn ChatStorage>) {
        let adopted = match storage.load_settings().await {
            Ok(Some(settings)) => Some(settings),
            Ok(None) => None,
            Err(err) => {
                warn!("failed to read settings from new backend: {}", err);
                None
            }
        };
        *lock::write(&self.storage) = storage;
        if let Some(settings) = adopted {
            *lock::write(&self.settings) = settings;
            self.revision.send_modify(|rev| *rev += 1);
        }
    }
}
