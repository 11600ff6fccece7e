use crate::casing::Casing;
use crate::date_format::parse_date_format;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Pattern daily-note basenames follow; blank disables renaming.
    pub date_format: String,
    pub casing: Casing,
    pub notify_on_rename: bool,
}

impl Settings {
    pub fn is_enabled(&self) -> bool {
        !self.date_format.trim().is_empty()
    }
}

pub fn default_settings_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("com", "daily-note-casing", "daily-note-casing")
        .context("could not determine the OS config directory")?;
    Ok(proj.config_dir().join("config.toml"))
}

/// Reads settings from `path`. Fields missing from the file keep their
/// defaults; a missing file yields all defaults.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read settings file: {}", path.display()))?;
    let settings = toml::from_str::<Settings>(&raw)
        .with_context(|| format!("could not parse settings file: {}", path.display()))?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("could not create settings directory: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(settings).context("could not serialize settings")?;
    fs::write(path, body)
        .with_context(|| format!("could not write settings file: {}", path.display()))?;
    Ok(())
}

/// Process-wide settings with write-through persistence.
///
/// Readers take a [`snapshot`](SettingsStore::snapshot); a change made while a
/// rename is in flight only affects later events.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Settings>,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = load_settings(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Settings {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Re-reads the settings file so changes made by another process take
    /// effect. An unreadable file keeps the last good settings.
    pub fn refresh(&self) -> Settings {
        let loaded = match load_settings(&self.path) {
            Ok(loaded) => loaded,
            Err(err) => {
                tracing::warn!("keeping previous settings: {err:#}");
                return self.snapshot();
            }
        };
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard != loaded {
            tracing::info!(path = %self.path.display(), "settings changed on disk");
            *guard = loaded.clone();
        }
        loaded
    }

    /// A blank format is accepted and disables renaming.
    pub fn set_date_format(&self, date_format: &str) -> Result<Settings> {
        if !date_format.trim().is_empty() {
            parse_date_format(date_format)
                .with_context(|| format!("invalid date format: {date_format:?}"))?;
        }
        self.update(|settings| settings.date_format = date_format.to_string())
    }

    /// Validates a raw casing value before storing it.
    pub fn set_casing(&self, raw: &str) -> Result<Settings> {
        let casing = raw.parse::<Casing>()?;
        self.update(|settings| settings.casing = casing)
    }

    pub fn set_notify_on_rename(&self, enabled: bool) -> Result<Settings> {
        self.update(|settings| settings.notify_on_rename = enabled)
    }

    fn update(&self, apply: impl FnOnce(&mut Settings)) -> Result<Settings> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = guard.clone();
        apply(&mut next);
        save_settings(&self.path, &next)?;
        *guard = next.clone();
        tracing::info!(path = %self.path.display(), "saved settings");
        Ok(next)
    }
}
