use async_trait::async_trait;
use omni_core::models::{AspectRatio, ContentKind, Provider};
use omni_core::{Result, StudioError};
use serde::{Deserialize, Serialize};

/// Server-issued handle of a long-running video generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoOperation {
    pub name: String,
    pub done: bool,
    pub video_uri: Option<String>,
    /// Error reported by the server once the operation finished unsuccessfully.
    pub error: Option<String>,
}

impl VideoOperation {
    pub fn started(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            video_uri: None,
            error: None,
        }
    }
}

/// Capability set shared by every backend. Operations a backend does not
/// offer fall back to `UnsupportedCapability`; callers check `supports`
/// before dispatching so those defaults are never reached over the network.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn provider(&self) -> Provider;

    fn supports(&self, kind: ContentKind) -> bool;

    async fn generate_text(&self, model: &str, prompt: &str, temperature: f32) -> Result<String>;

    /// Returns a `data:` URL, or an empty string when the response carried no image.
    async fn generate_image(&self, _prompt: &str, _aspect_ratio: AspectRatio) -> Result<String> {
        Err(self.unsupported(ContentKind::Image))
    }

    async fn generate_video(&self, _prompt: &str, _aspect_ratio: AspectRatio) -> Result<VideoOperation> {
        Err(self.unsupported(ContentKind::Video))
    }

    async fn poll_video(&self, _operation: &VideoOperation) -> Result<VideoOperation> {
        Err(self.unsupported(ContentKind::Video))
    }

    async fn fetch_video_asset(&self, _uri: &str) -> Result<Vec<u8>> {
        Err(self.unsupported(ContentKind::Video))
    }

    fn unsupported(&self, kind: ContentKind) -> StudioError {
        StudioError::UnsupportedCapability {
            provider: self.provider(),
            kind,
        }
    }
}
