use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::fingerprint::fingerprint;
use super::types::{CreatorPreference, Preference, ViewerSettings};
use crate::page::CreatorIdentity;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings storage i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("settings document is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read side used by the engine at every decision point. Implementations
/// return the latest persisted value; the engine never caches it.
pub trait PreferenceSource: Send + Sync {
    /// Preferences for `creator_id`, falling back to global. Empty id means global.
    fn preferences(&self, creator_id: &str) -> Result<Preference, SettingsError>;
}

/// Gate evaluated once before the engine starts.
pub trait IntegrityCheck {
    fn verify_integrity(&self) -> bool;
}

impl<F: Fn() -> bool> IntegrityCheck for F {
    fn verify_integrity(&self) -> bool {
        self()
    }
}

/// Fire-and-forget request to open the creator configuration page.
pub trait ConfigurationRequests: Send + Sync {
    fn configure_creator(&self, identity: &CreatorIdentity);
}

/// Settings held in memory only. Configuration requests are recorded, not forwarded.
#[derive(Debug, Default)]
pub struct InMemorySettings {
    settings: Mutex<ViewerSettings>,
    requests: Mutex<Vec<CreatorIdentity>>,
}

impl InMemorySettings {
    pub fn new(settings: ViewerSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn configuration_requests(&self) -> Vec<CreatorIdentity> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut ViewerSettings)) {
        f(&mut self.settings.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn settings(&self) -> ViewerSettings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PreferenceSource for InMemorySettings {
    fn preferences(&self, creator_id: &str) -> Result<Preference, SettingsError> {
        Ok(self.settings().resolve(creator_id))
    }
}

impl ConfigurationRequests for InMemorySettings {
    fn configure_creator(&self, identity: &CreatorIdentity) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(identity.clone());
    }
}

pub const CREATOR_PAGE: &str = "creator";
pub const HOME_PAGE: &str = "home";

/// Which options page to show next, with the creator it is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<CreatorIdentity>,
    pub timestamp: u64,
}

/// On-disk shape, mirroring the extension's local storage keys.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    viewer_settings: Option<ViewerSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    settings_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_request: Option<PageRequest>,
}

/// JSON file store. Every read goes to disk so edits made by another
/// process (the options page) are seen immediately.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    // Serializes read-modify-write cycles from this process.
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Result<StorageDocument, SettingsError> {
        if !self.path.exists() {
            return Ok(StorageDocument::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(StorageDocument::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, doc: &StorageDocument) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(doc)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// First-run initialization: defaults plus their fingerprint.
    pub fn install(&self) -> Result<(), SettingsError> {
        info!("Installing default settings at {}", self.path.display());
        self.save(&ViewerSettings::default())
    }

    pub fn settings(&self) -> Result<ViewerSettings, SettingsError> {
        Ok(self.load()?.viewer_settings.unwrap_or_default())
    }

    /// Persist `settings` and refresh the fingerprint in the same write.
    pub fn save(&self, settings: &ViewerSettings) -> Result<(), SettingsError> {
        let _guard = self.guard();
        let mut doc = self.load()?;
        doc.settings_fingerprint = Some(fingerprint(settings)?);
        doc.viewer_settings = Some(settings.clone());
        self.write(&doc)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ViewerSettings) -> R) -> Result<R, SettingsError> {
        let _guard = self.guard();
        let mut doc = self.load()?;
        let mut settings = doc.viewer_settings.take().unwrap_or_default();
        let out = f(&mut settings);
        doc.settings_fingerprint = Some(fingerprint(&settings)?);
        doc.viewer_settings = Some(settings);
        self.write(&doc)?;
        Ok(out)
    }

    pub fn set_global(&self, preference: Preference) -> Result<(), SettingsError> {
        self.update(|s| s.global = preference)
    }

    /// Creator entry for `identity`, seeded from the global values when it does not exist yet.
    pub fn ensure_creator(&self, identity: &CreatorIdentity) -> Result<CreatorPreference, SettingsError> {
        self.update(|s| s.ensure_creator(identity).clone())
    }

    pub fn configure_creator_preference(
        &self,
        identity: &CreatorIdentity,
        preference: Preference,
    ) -> Result<(), SettingsError> {
        self.update(|s| s.ensure_creator(identity).preference = preference)
    }

    pub fn remove_creator(&self, creator_id: &str) -> Result<bool, SettingsError> {
        self.update(|s| s.remove_creator(creator_id).is_some())
    }

    /// Compare the stored fingerprint with the current settings. On mismatch
    /// the settings are reset to defaults and `false` is returned.
    pub fn check_integrity(&self) -> Result<bool, SettingsError> {
        let doc = self.load()?;
        let current = fingerprint(&doc.viewer_settings.clone().unwrap_or_default())?;

        match doc.settings_fingerprint {
            Some(stored) if stored != current => {
                warn!("Settings integrity check failed");
                self.save(&ViewerSettings::default())?;
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    pub fn request_page(&self, page: &str, creator: Option<CreatorIdentity>) -> Result<(), SettingsError> {
        let _guard = self.guard();
        let mut doc = self.load()?;
        doc.page_request = Some(PageRequest {
            page: page.to_string(),
            creator,
            timestamp: now_millis(),
        });
        self.write(&doc)
    }

    pub fn request_home_page(&self) -> Result<(), SettingsError> {
        self.request_page(HOME_PAGE, None)
    }

    /// Consume the pending page request, if any.
    pub fn take_page_request(&self) -> Result<Option<PageRequest>, SettingsError> {
        let _guard = self.guard();
        let mut doc = self.load()?;
        let request = doc.page_request.take();
        if request.is_some() {
            self.write(&doc)?;
        }
        Ok(request)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

impl PreferenceSource for SettingsStore {
    fn preferences(&self, creator_id: &str) -> Result<Preference, SettingsError> {
        Ok(self.settings()?.resolve(creator_id))
    }
}

impl IntegrityCheck for SettingsStore {
    fn verify_integrity(&self) -> bool {
        match self.check_integrity() {
            Ok(valid) => valid,
            Err(e) => {
                error!("Settings integrity check could not run: {}", e);
                false
            }
        }
    }
}

impl ConfigurationRequests for SettingsStore {
    fn configure_creator(&self, identity: &CreatorIdentity) {
        if let Err(e) = self.request_page(CREATOR_PAGE, Some(identity.clone())) {
            error!("Failed to record creator configuration request: {}", e);
        }
    }
}
