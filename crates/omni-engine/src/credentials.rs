//! Cloud API credential shared between the dispatcher and the cloud client.

use async_trait::async_trait;
use omni_core::Result;
use std::fmt;
use std::sync::OnceLock;

/// Write-once API key. Read-only for the rest of the session once installed.
#[derive(Default)]
pub struct ApiCredential {
    key: OnceLock<String>,
}

impl ApiCredential {
    pub fn new(key: Option<String>) -> Self {
        let credential = Self::default();
        if let Some(key) = key {
            credential.install(key);
        }
        credential
    }

    pub fn get(&self) -> Option<&str> {
        self.key.get().map(String::as_str)
    }

    pub fn is_selected(&self) -> bool {
        self.key.get().is_some()
    }

    /// Installs the key if none is set yet. Returns `false` when a key was
    /// already present (the existing key is kept).
    pub fn install(&self, key: String) -> bool {
        let key = key.trim().to_string();
        if key.is_empty() {
            return false;
        }
        self.key.set(key).is_ok()
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("selected", &self.is_selected())
            .finish()
    }
}

/// Host capability asked to supply a key before video generation when none
/// has been selected yet.
#[async_trait]
pub trait KeySelector: Send + Sync {
    async fn select_key(&self) -> Result<String>;
}

/// Selector for hosts that cannot prompt; always reports a missing key.
pub struct NoKeySelector;

#[async_trait]
impl KeySelector for NoKeySelector {
    async fn select_key(&self) -> Result<String> {
        Err(omni_core::StudioError::MissingCredential)
    }
}
