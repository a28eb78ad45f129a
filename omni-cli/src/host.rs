use async_trait::async_trait;
use omni_core::secrets::{self, API_KEY_SECRET};
use omni_core::{Result, StudioError};
use omni_engine::KeySelector;
use std::path::PathBuf;
use tracing::{info, warn};

/// Asks the user for a Gemini API key on the terminal and stores it as a
/// secret so later sessions pick it up.
pub struct TerminalKeySelector {
    base_path: PathBuf,
}

impl TerminalKeySelector {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }
}

#[async_trait]
impl KeySelector for TerminalKeySelector {
    async fn select_key(&self) -> Result<String> {
        eprintln!("Video generation requires a Gemini API key with billing enabled.");
        let base_path = self.base_path.clone();
        let selected = tokio::task::spawn_blocking(move || {
            secrets::set_secret(&base_path, API_KEY_SECRET, None)?;
            secrets::read_secret(&base_path, API_KEY_SECRET)
        })
        .await;

        match selected {
            Ok(Ok(key)) => {
                info!("API key selected and stored");
                Ok(key)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "API key selection failed");
                Err(StudioError::MissingCredential)
            }
            Err(e) => {
                warn!(error = %e, "API key prompt did not complete");
                Err(StudioError::MissingCredential)
            }
        }
    }
}
