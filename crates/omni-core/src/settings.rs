//! Workspace settings stored in `.omni/settings.json`.

use crate::error::Result;
use crate::project::workspace_dir;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const LOCAL_ENDPOINT_ENV: &str = "OMNI_LOCAL_ENDPOINT";
pub const CLOUD_BASE_URL_ENV: &str = "OMNI_CLOUD_BASE_URL";

const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are OmniStudio AI, a helpful multimodal assistant. You help users generate text, images, and videos. Be concise and creative.";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StudioSettings {
    pub local_endpoint: String,
    pub cloud_base_url: String,
    pub system_instruction: String,
    pub image_model: String,
    pub video_model: String,
    pub video_resolution: String,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self {
            local_endpoint: "http://localhost:11434".to_string(),
            cloud_base_url: "https://generativelanguage.googleapis.com".to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            video_model: "veo-3.1-fast-generate-preview".to_string(),
            video_resolution: "720p".to_string(),
            poll_interval_secs: 10,
            max_poll_attempts: 60,
        }
    }
}

impl StudioSettings {
    /// Reads the settings file (missing file means defaults) and applies
    /// environment overrides.
    pub fn load(base_path: &Path) -> Result<Self> {
        let path = workspace_dir(base_path).join("settings.json");
        let mut settings = match fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => serde_json::from_str(&content)?,
            Ok(_) => StudioSettings::default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StudioSettings::default(),
            Err(e) => return Err(e.into()),
        };
        settings.apply_env();
        Ok(settings)
    }

    pub fn save(&self, base_path: &Path) -> Result<()> {
        let path = workspace_dir(base_path).join("settings.json");
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Some(endpoint) = non_empty_env(LOCAL_ENDPOINT_ENV) {
            self.local_endpoint = endpoint;
        }
        if let Some(base_url) = non_empty_env(CLOUD_BASE_URL_ENV) {
            self.cloud_base_url = base_url;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
