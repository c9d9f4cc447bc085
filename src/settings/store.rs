use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::settings::types::RendererSettings;

/// Settings persistence errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// JSON-file backed renderer settings.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, returning defaults when the file does not exist.
    pub fn load(&self) -> Result<RendererSettings> {
        if !self.path.exists() {
            return Ok(RendererSettings::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Load settings, logging and falling back to defaults on any error.
    pub fn load_or_default(&self) -> RendererSettings {
        self.load().unwrap_or_else(|e| {
            tracing::warn!("Using default renderer settings: {e}");
            RendererSettings::default()
        })
    }

    /// Save settings atomically (write .tmp then rename).
    pub fn save(&self, settings: &RendererSettings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
