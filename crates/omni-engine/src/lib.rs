//! Provider clients, dispatch and the generation workflow for OmniStudio.

pub mod blobs;
pub mod credentials;
pub mod dispatch;
pub mod polling;
pub mod provider;
pub mod providers;
pub mod session;
pub mod studio;

pub use credentials::{ApiCredential, KeySelector, NoKeySelector};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use polling::PollOutcome;
pub use provider::{GenerationProvider, VideoOperation};
pub use session::{MediaTarget, StudioEvent};
pub use studio::{Studio, Turn};

use omni_core::settings::StudioSettings;
use std::sync::Arc;

/// Wires the local and cloud clients described by `settings` into a studio.
pub fn studio_from_settings(
    settings: &StudioSettings,
    credential: Arc<ApiCredential>,
    key_selector: Arc<dyn KeySelector>,
    events: Option<tokio::sync::mpsc::UnboundedSender<StudioEvent>>,
) -> omni_core::Result<Studio> {
    let local = Arc::new(providers::OllamaClient::new(&settings.local_endpoint));
    let cloud = Arc::new(providers::GeminiClient::new(settings, Arc::clone(&credential)));
    let dispatcher = Dispatcher::new(local, cloud, credential, key_selector);
    match events {
        Some(events) => Studio::with_events(dispatcher, settings, events),
        None => Studio::new(dispatcher, settings),
    }
}
