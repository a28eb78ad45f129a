//! Error taxonomy shared by every OmniStudio crate.

use crate::models::{ContentKind, Provider};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StudioError>;

#[derive(Debug, Error)]
pub enum StudioError {
    /// The selected provider cannot produce this kind of content.
    #[error("{}", unsupported_hint(.provider, .kind))]
    UnsupportedCapability { provider: Provider, kind: ContentKind },

    #[error("Local Engine Error: {0}. Ensure Ollama is running and reachable (check OLLAMA_ORIGINS / OLLAMA_HOST).")]
    LocalEngineUnavailable(String),

    #[error("{provider} request failed with status {status}: {body}")]
    Transport {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("No API key selected. Run `omni secrets set GEMINI_API_KEY` or export GEMINI_API_KEY.")]
    MissingCredential,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("A generation is already in progress.")]
    Busy,

    #[error("Prompt is empty.")]
    EmptyPrompt,

    /// The conversation was reset while the turn was waiting on a provider.
    #[error("The conversation was reset before the reply arrived.")]
    Interrupted,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn unsupported_hint(provider: &Provider, kind: &ContentKind) -> String {
    match kind {
        ContentKind::Image => format!(
            "{} Image Generation is not supported in this build. Please switch 'Model Provider' to Cloud for Visual tasks.",
            provider.short_name()
        ),
        ContentKind::Video => format!(
            "{} Video Generation is not supported. Please switch to Cloud (Gemini/Veo).",
            provider.short_name()
        ),
        ContentKind::Text => format!("{} does not support text generation.", provider),
    }
}

impl StudioError {
    /// True when the error was raised before any request left the process.
    pub fn is_fast_fail(&self) -> bool {
        matches!(
            self,
            StudioError::UnsupportedCapability { .. }
                | StudioError::MissingCredential
                | StudioError::InvalidConfig(_)
                | StudioError::Busy
                | StudioError::EmptyPrompt
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_image_message_points_to_cloud() {
        let err = StudioError::UnsupportedCapability {
            provider: Provider::Local,
            kind: ContentKind::Image,
        };
        let text = err.to_string();
        assert!(text.starts_with("Local Image Generation is not supported"));
        assert!(text.contains("Cloud"));
        assert!(err.is_fast_fail());
    }

    #[test]
    fn local_engine_error_carries_remediation_hint() {
        let err = StudioError::LocalEngineUnavailable("connection refused".into());
        assert!(err.to_string().contains("Ensure Ollama is running"));
        assert!(!err.is_fast_fail());
    }
}
