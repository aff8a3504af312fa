//! Persisted user settings and the immutable snapshot handed to the pipeline.
//!
//! [`SettingsStore`] owns the YAML file. Every mutation rewrites the file and
//! publishes the new value on a `watch` channel, so components that need to
//! react to a change (for example by re-fetching) subscribe instead of
//! polling the file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::app_config::LowPowerMode;
use crate::quakes::{Coordinate, Provider};
use crate::tiers::{
    effective_fetch_size, effective_search_radius, FetchSize, LastOption, SearchRadius,
};
use crate::CoreError;

const PLATFORM_PROFILE_PATH: &str = "/sys/firmware/acpi/platform_profile";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fetch_size: FetchSize,
    pub search_radius: SearchRadius,
    /// Providers queried by world and location fetches.
    pub providers: Vec<Provider>,
    pub last_option: Option<LastOption>,
    pub last_searched_place: Option<Coordinate>,
    /// Last known device location, used by [`LastOption::Nearby`].
    pub cached_place: Option<Coordinate>,
    /// `None` means no notification has ever been posted.
    pub last_push_at: Option<DateTime<Utc>>,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub has_attempted_notification_permission: bool,
    pub notifications_enabled: bool,
    pub push_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fetch_size: FetchSize::Medium,
            search_radius: SearchRadius::Medium,
            providers: vec![Provider::Usgs, Provider::Emsc],
            last_option: None,
            last_searched_place: None,
            cached_place: None,
            last_push_at: None,
            last_fetch_at: None,
            has_attempted_notification_permission: false,
            notifications_enabled: false,
            push_token: None,
        }
    }
}

impl Settings {
    /// Location used to scope notification counts: the last searched place,
    /// else the cached device location.
    #[must_use]
    pub fn notification_location(&self) -> Option<Coordinate> {
        self.last_searched_place.or(self.cached_place)
    }
}

/// Settings plus host state, frozen for the duration of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSnapshot {
    pub settings: Settings,
    pub low_power: bool,
}

impl SettingsSnapshot {
    #[must_use]
    pub fn new(settings: Settings, low_power: bool) -> Self {
        Self {
            settings,
            low_power,
        }
    }

    #[must_use]
    pub fn fetch_size(&self) -> FetchSize {
        effective_fetch_size(self.low_power, self.settings.fetch_size)
    }

    #[must_use]
    pub fn search_radius(&self) -> SearchRadius {
        effective_search_radius(self.low_power, self.settings.search_radius)
    }
}

/// File-backed settings with change notification.
pub struct SettingsStore {
    path: PathBuf,
    sender: watch::Sender<Settings>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Opens the settings file at `path`, falling back to defaults when the
    /// file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SettingsIo`] if the file exists but cannot be
    /// read, or [`CoreError::SettingsFormat`] if it is not valid YAML.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let settings = read_settings(&path)?;
        let (sender, _) = watch::channel(settings);
        Ok(Self {
            path,
            sender,
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn current(&self) -> Settings {
        self.sender.borrow().clone()
    }

    #[must_use]
    pub fn snapshot(&self, low_power: bool) -> SettingsSnapshot {
        SettingsSnapshot::new(self.current(), low_power)
    }

    /// Subscribes to the "settings changed" event.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.sender.subscribe()
    }

    /// Applies `mutate`, persists the result and notifies subscribers.
    ///
    /// No file write or notification happens when `mutate` leaves the
    /// settings unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SettingsIo`] if the file cannot be written.
    pub fn update<F>(&self, mutate: F) -> Result<Settings, CoreError>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut next = self.current();
        mutate(&mut next);
        if next == *self.sender.borrow() {
            return Ok(next);
        }

        write_settings(&self.path, &next)?;
        self.sender.send_replace(next.clone());
        tracing::debug!(path = %self.path.display(), "settings updated");
        Ok(next)
    }
}

fn read_settings(path: &Path) -> Result<Settings, CoreError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no settings file; using defaults");
            return Ok(Settings::default());
        }
        Err(source) => {
            return Err(CoreError::SettingsIo {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if raw.trim().is_empty() {
        return Ok(Settings::default());
    }

    serde_yaml::from_str(&raw).map_err(|source| CoreError::SettingsFormat {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes through a sibling temp file and renames it into place so readers
/// never see a half-written file.
fn write_settings(path: &Path, settings: &Settings) -> Result<(), CoreError> {
    let io_err = |source| CoreError::SettingsIo {
        path: path.to_path_buf(),
        source,
    };

    let yaml = serde_yaml::to_string(settings).map_err(|source| CoreError::SettingsFormat {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, yaml).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

/// Resolves the low-power flag for the current host.
#[must_use]
pub fn detect_low_power(mode: LowPowerMode) -> bool {
    match mode {
        LowPowerMode::On => true,
        LowPowerMode::Off => false,
        LowPowerMode::Auto => std::fs::read_to_string(PLATFORM_PROFILE_PATH)
            .map(|profile| profile.trim() == "low-power")
            .unwrap_or(false),
    }
}
