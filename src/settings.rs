use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::{attendance::ControllerConfig, credentials::CredentialStore};

pub const ENV_BACKEND_URL: &str = "ATTENDANCE_BACKEND_URL";
pub const ENV_TOKEN: &str = "ATTENDANCE_TOKEN";
pub const ENV_DEBUG: &str = "ATTENDANCE_DEBUG";

const APP_DIR: &str = "hr-attendance";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserSettings {
    pub backend_url: String,
    pub token: Option<String>,
    pub employee_id: Option<String>,
    pub poll_interval_secs: u64,
    pub checkout_grace_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000/api".into(),
            token: None,
            employee_id: None,
            poll_interval_secs: 60,
            checkout_grace_secs: 10,
            request_timeout_secs: 15,
        }
    }
}

impl UserSettings {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            checkout_grace: Duration::from_secs(self.checkout_grace_secs.max(1)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// JSON settings file plus environment overrides. The token is kept here the
/// way the web dashboard kept it in local storage.
///
/// `data` mirrors the file; overrides live beside it and never reach disk.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
    env_backend_url: Option<String>,
    env_token: Option<String>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("ignoring unreadable settings in {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
            env_backend_url: None,
            env_token: None,
        })
    }

    /// Opens the store and applies `ATTENDANCE_BACKEND_URL` and
    /// `ATTENDANCE_TOKEN`.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => default_settings_path()?,
        };
        Ok(Self::new(path)?.with_overrides(env_value(ENV_BACKEND_URL), env_value(ENV_TOKEN)))
    }

    pub fn with_overrides(mut self, backend_url: Option<String>, token: Option<String>) -> Self {
        self.env_backend_url = backend_url;
        self.env_token = token;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Effective settings: the file contents with overrides applied.
    pub fn settings(&self) -> UserSettings {
        let mut settings = self.read().clone();
        if let Some(url) = &self.env_backend_url {
            settings.backend_url = url.clone();
        }
        settings
    }

    pub fn update(&self, apply: impl FnOnce(&mut UserSettings)) -> Result<()> {
        let mut guard = self.write();
        apply(&mut guard);
        self.persist(&guard)
    }

    pub fn set_token(&self, token: Option<String>) -> Result<()> {
        self.update(|settings| settings.token = token)
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

impl CredentialStore for SettingsStore {
    fn bearer_token(&self) -> Option<String> {
        let present = |token: &String| !token.trim().is_empty();
        self.env_token
            .clone()
            .filter(present)
            .or_else(|| self.read().token.clone().filter(present))
    }
}

pub fn default_settings_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("could not determine the user config directory")?;
    Ok(base.join(APP_DIR).join(SETTINGS_FILE))
}

pub fn debug_enabled() -> bool {
    env_value(ENV_DEBUG)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
