//! Providers, model catalog and the per-session generation configuration.

use crate::error::{Result, StudioError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const LOCAL_MODELS: &[&str] = &["llama3", "mistral", "phi3", "bakllava"];
const CLOUD_MODELS: &[&str] = &["gemini-3-pro-preview", "gemini-3-flash-preview"];

/// The backend selected to fulfil a request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Cloud,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Local, Provider::Cloud];

    /// Model used when the provider is first selected.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Local => LOCAL_MODELS[0],
            Provider::Cloud => CLOUD_MODELS[0],
        }
    }

    /// The enumerated set of models offered for this provider.
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Provider::Local => LOCAL_MODELS,
            Provider::Cloud => CLOUD_MODELS,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Provider::Local => "Local",
            Provider::Cloud => "Cloud",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Local => write!(f, "Local (Ollama)"),
            Provider::Cloud => write!(f, "Cloud (Google Gemini)"),
        }
    }
}

impl FromStr for Provider {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "ollama" | "local (ollama)" => Ok(Provider::Local),
            "cloud" | "gemini" | "google" | "cloud (google gemini)" => Ok(Provider::Cloud),
            other => Err(StudioError::InvalidConfig(format!(
                "unknown provider '{}' (expected 'local' or 'cloud')",
                other
            ))),
        }
    }
}

/// The active content kind, i.e. what a submitted prompt should produce.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Video,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Video => "video",
        };
        f.write_str(name)
    }
}

impl FromStr for ContentKind {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ContentKind::Text),
            "image" => Ok(ContentKind::Image),
            "video" => Ok(ContentKind::Video),
            other => Err(StudioError::InvalidConfig(format!(
                "unknown content kind '{}' (expected text, image or video)",
                other
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 3] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }

    /// Video generation has no square output; `1:1` becomes `16:9`.
    pub fn for_video(self) -> AspectRatio {
        match self {
            AspectRatio::Square => AspectRatio::Landscape,
            other => other,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| {
                StudioError::InvalidConfig(format!(
                    "unsupported aspect ratio '{}' (expected 1:1, 16:9 or 9:16)",
                    s
                ))
            })
    }
}

/// Provider, model and sampling parameters used for the next turn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    provider: Provider,
    model: String,
    temperature: f32,
    aspect_ratio: AspectRatio,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Local,
            model: Provider::Local.default_model().to_string(),
            temperature: 0.7,
            aspect_ratio: AspectRatio::Square,
        }
    }
}

impl GenerationConfig {
    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    /// Switching provider always resets the model to that provider's default.
    pub fn set_provider(&mut self, provider: Provider) {
        self.provider = provider;
        self.model = provider.default_model().to_string();
    }

    pub fn set_model(&mut self, model: &str) -> Result<()> {
        let model = model.trim();
        if !self.provider.models().contains(&model) {
            return Err(StudioError::InvalidConfig(format!(
                "model '{}' is not offered by {} (available: {})",
                model,
                self.provider,
                self.provider.models().join(", ")
            )));
        }
        self.model = model.to_string();
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
            return Err(StudioError::InvalidConfig(format!(
                "temperature must be between 0 and 1, got {}",
                temperature
            )));
        }
        self.temperature = temperature;
        Ok(())
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        self.aspect_ratio = aspect_ratio;
    }
}

impl fmt::Display for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is active using the {} model (temperature {:.1}, aspect ratio {})",
            self.provider, self.model, self.temperature, self.aspect_ratio
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_provider_resets_model() {
        let mut config = GenerationConfig::default();
        config.set_model("mistral").unwrap();
        config.set_provider(Provider::Cloud);
        assert_eq!(config.model(), "gemini-3-pro-preview");
        config.set_provider(Provider::Local);
        assert_eq!(config.model(), "llama3");
    }

    #[test]
    fn model_must_belong_to_provider() {
        let mut config = GenerationConfig::default();
        let err = config.set_model("gemini-3-flash-preview").unwrap_err();
        assert!(matches!(err, StudioError::InvalidConfig(_)));
        assert_eq!(config.model(), "llama3");
    }

    #[test]
    fn temperature_is_bounded() {
        let mut config = GenerationConfig::default();
        assert!(config.set_temperature(1.0).is_ok());
        assert!(config.set_temperature(0.0).is_ok());
        assert!(config.set_temperature(1.2).is_err());
        assert!(config.set_temperature(f32::NAN).is_err());
        assert_eq!(config.temperature(), 0.0);
    }

    #[test]
    fn square_is_remapped_for_video_only() {
        assert_eq!(AspectRatio::Square.for_video(), AspectRatio::Landscape);
        assert_eq!(AspectRatio::Portrait.for_video(), AspectRatio::Portrait);
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert!("4:3".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!("Local (Ollama)".parse::<Provider>().unwrap(), Provider::Local);
        assert_eq!("gemini".parse::<Provider>().unwrap(), Provider::Cloud);
        assert!("openai".parse::<Provider>().is_err());
    }

    #[test]
    fn aspect_ratio_serializes_as_ratio_string() {
        let json = serde_json::to_string(&AspectRatio::Landscape).unwrap();
        assert_eq!(json, "\"16:9\"");
    }
}
