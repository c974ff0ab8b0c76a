use machina_generate::{DEFAULT_GROQ_URL, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub model: String,
    pub api_base_url: String,
    pub temperature: f64,
    /// Playback rate for camera and entrance animations; 0 disables them.
    pub animation_speed: f32,
    /// Remembered machine name, pre-filled in the bootstrap form.
    pub last_machine: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_GROQ_URL.to_string(),
            temperature: 0.7,
            animation_speed: 1.0,
            last_machine: String::new(),
        }
    }
}

impl AppSettings {
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("machina").join("settings.json"))
    }

    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("settings file not found, using defaults");
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::error!("failed to parse settings: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!("failed to read settings file: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        if let Some(path) = Self::settings_path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(content) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, content);
        }
    }
}
