use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{beat_interval, ClackError, Result, Tempo, TimeSignature};

/// Environment variable that overrides the presets file location.
pub const CONFIG_ENV: &str = "CLACK_CONFIG";
pub const DEFAULT_TEMPO: i64 = 120;
pub const DEFAULT_TIME_SIGNATURE: &str = "4/4";

const CONFIG_FILE: &str = ".clack.json";

/// A named tempo and time signature saved by the user.
///
/// Values are stored unvalidated, exactly as they appear in the file, and
/// go through [`RunSettings::resolve`] before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub key: String,
    pub tempo: i64,
    pub timesig: String,
}

/// Ordered list of presets backed by a single JSON file.
#[derive(Debug)]
pub struct PresetStore {
    path: PathBuf,
    presets: Vec<Preset>,
}

impl PresetStore {
    /// Location of the presets file: `$CLACK_CONFIG` when set, otherwise
    /// `.clack.json` in the user's home directory.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        home::home_dir()
            .map(|home| home.join(CONFIG_FILE))
            .ok_or_else(|| {
                ClackError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    "could not determine the home directory",
                ))
            })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// Loads the store from `path`. A missing or empty file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };

        let presets: Vec<Preset> = if contents.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&contents).map_err(|source| ClackError::ConfigFormat {
                path: path.clone(),
                source,
            })?
        };

        tracing::debug!(path = %path.display(), count = presets.len(), "loaded presets");
        Ok(Self { path, presets })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn get(&self, key: &str) -> Result<&Preset> {
        self.presets
            .iter()
            .find(|preset| preset.key == key)
            .ok_or_else(|| ClackError::ConfigNotFound(key.to_string()))
    }

    /// Appends a preset and writes the file.
    pub fn add(&mut self, preset: Preset) -> Result<()> {
        if self.presets.iter().any(|existing| existing.key == preset.key) {
            return Err(ClackError::ConfigDuplicate(preset.key));
        }

        self.presets.push(preset);
        self.save()
    }

    /// Removes the preset named `key` and writes the file.
    pub fn remove(&mut self, key: &str) -> Result<Preset> {
        let index = self
            .presets
            .iter()
            .position(|preset| preset.key == key)
            .ok_or_else(|| ClackError::ConfigNotFound(key.to_string()))?;

        let removed = self.presets.remove(index);
        self.save()?;
        Ok(removed)
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.presets).map_err(|source| {
            ClackError::ConfigFormat {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Validated tempo and time signature the metronome runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub tempo: Tempo,
    pub signature: TimeSignature,
}

impl RunSettings {
    /// Validates command line values. A preset, when given, replaces both
    /// values before validation.
    pub fn resolve(tempo: i64, timesig: &str, preset: Option<&Preset>) -> Result<Self> {
        let (tempo, timesig) = match preset {
            Some(preset) => (preset.tempo, preset.timesig.as_str()),
            None => (tempo, timesig),
        };

        Ok(Self {
            tempo: Tempo::new(tempo)?,
            signature: TimeSignature::resolve(timesig)?,
        })
    }

    pub fn beat_interval(&self) -> Duration {
        beat_interval(self.tempo, self.signature)
    }
}
