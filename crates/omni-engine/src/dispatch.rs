//! Routes a prompt to the provider selected by the generation configuration.

use crate::credentials::{ApiCredential, KeySelector};
use crate::provider::{GenerationProvider, VideoOperation};
use omni_core::models::{AspectRatio, ContentKind, GenerationConfig, Provider};
use omni_core::{Result, StudioError};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Text(String),
    Image {
        data_url: String,
        aspect_ratio: AspectRatio,
    },
    /// The operation is still running; `aspect_ratio` is the value actually sent.
    Video {
        operation: VideoOperation,
        aspect_ratio: AspectRatio,
    },
}

pub struct Dispatcher {
    local: Arc<dyn GenerationProvider>,
    cloud: Arc<dyn GenerationProvider>,
    credential: Arc<ApiCredential>,
    key_selector: Arc<dyn KeySelector>,
}

impl Dispatcher {
    pub fn new(
        local: Arc<dyn GenerationProvider>,
        cloud: Arc<dyn GenerationProvider>,
        credential: Arc<ApiCredential>,
        key_selector: Arc<dyn KeySelector>,
    ) -> Self {
        Self {
            local,
            cloud,
            credential,
            key_selector,
        }
    }

    pub fn client(&self, provider: Provider) -> Arc<dyn GenerationProvider> {
        match provider {
            Provider::Local => Arc::clone(&self.local),
            Provider::Cloud => Arc::clone(&self.cloud),
        }
    }

    pub async fn dispatch(
        &self,
        prompt: &str,
        kind: ContentKind,
        config: &GenerationConfig,
    ) -> Result<DispatchOutcome> {
        let client = self.client(config.provider());
        if !client.supports(kind) {
            debug!(provider = %config.provider(), %kind, "capability not offered");
            return Err(client.unsupported(kind));
        }

        match kind {
            ContentKind::Text => {
                let text = client
                    .generate_text(config.model(), prompt, config.temperature())
                    .await?;
                Ok(DispatchOutcome::Text(text))
            }
            ContentKind::Image => {
                let aspect_ratio = config.aspect_ratio();
                let data_url = client.generate_image(prompt, aspect_ratio).await?;
                Ok(DispatchOutcome::Image {
                    data_url,
                    aspect_ratio,
                })
            }
            ContentKind::Video => {
                self.ensure_credential().await?;
                let aspect_ratio = config.aspect_ratio().for_video();
                let operation = client.generate_video(prompt, aspect_ratio).await?;
                Ok(DispatchOutcome::Video {
                    operation,
                    aspect_ratio,
                })
            }
        }
    }

    async fn ensure_credential(&self) -> Result<()> {
        if self.credential.is_selected() {
            return Ok(());
        }
        info!("no API key selected, asking the host to select one");
        let key = self.key_selector.select_key().await?;
        if !self.credential.install(key) && !self.credential.is_selected() {
            return Err(StudioError::MissingCredential);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory provider counting every call that would reach the network.
    pub(crate) struct FakeProvider {
        pub provider: Provider,
        pub media: bool,
        pub text: String,
        pub image: String,
        pub calls: AtomicUsize,
        pub video_aspects: Mutex<Vec<AspectRatio>>,
    }

    impl FakeProvider {
        pub fn local(text: &str) -> Self {
            Self::new(Provider::Local, false, text)
        }

        pub fn cloud(text: &str) -> Self {
            Self::new(Provider::Cloud, true, text)
        }

        fn new(provider: Provider, media: bool, text: &str) -> Self {
            Self {
                provider,
                media,
                text: text.to_string(),
                image: String::new(),
                calls: AtomicUsize::new(0),
                video_aspects: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerationProvider for FakeProvider {
        fn provider(&self) -> Provider {
            self.provider
        }

        fn supports(&self, kind: ContentKind) -> bool {
            kind == ContentKind::Text || self.media
        }

        async fn generate_text(&self, _model: &str, _prompt: &str, _temperature: f32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.clone())
        }

        async fn generate_image(&self, _prompt: &str, _aspect_ratio: AspectRatio) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.image.clone())
        }

        async fn generate_video(&self, _prompt: &str, aspect_ratio: AspectRatio) -> Result<VideoOperation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.video_aspects.lock().unwrap().push(aspect_ratio);
            Ok(VideoOperation::started("operations/fake"))
        }
    }

    struct StaticSelector(Option<&'static str>, AtomicUsize);

    #[async_trait]
    impl KeySelector for StaticSelector {
        async fn select_key(&self) -> Result<String> {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0.map(str::to_string).ok_or(StudioError::MissingCredential)
        }
    }

    fn dispatcher(
        local: Arc<FakeProvider>,
        cloud: Arc<FakeProvider>,
        key: Option<&str>,
        selector: Arc<StaticSelector>,
    ) -> Dispatcher {
        Dispatcher::new(
            local,
            cloud,
            Arc::new(ApiCredential::new(key.map(str::to_string))),
            selector,
        )
    }

    #[tokio::test]
    async fn local_media_requests_fail_without_calls() {
        let local = Arc::new(FakeProvider::local("hi"));
        let cloud = Arc::new(FakeProvider::cloud("hi"));
        let selector = Arc::new(StaticSelector(Some("k"), AtomicUsize::new(0)));
        let dispatcher = dispatcher(local.clone(), cloud.clone(), None, selector.clone());
        let config = GenerationConfig::default();

        for kind in [ContentKind::Image, ContentKind::Video] {
            let err = dispatcher.dispatch("cat", kind, &config).await.unwrap_err();
            assert!(matches!(err, StudioError::UnsupportedCapability { provider: Provider::Local, .. }));
        }
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cloud.calls.load(Ordering::SeqCst), 0);
        assert_eq!(selector.1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn text_goes_to_selected_provider() {
        let local = Arc::new(FakeProvider::local("from local"));
        let cloud = Arc::new(FakeProvider::cloud("from cloud"));
        let selector = Arc::new(StaticSelector(None, AtomicUsize::new(0)));
        let dispatcher = dispatcher(local, cloud, Some("k"), selector);

        let mut config = GenerationConfig::default();
        let outcome = dispatcher.dispatch("hi", ContentKind::Text, &config).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Text("from local".into()));

        config.set_provider(Provider::Cloud);
        let outcome = dispatcher.dispatch("hi", ContentKind::Text, &config).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Text("from cloud".into()));
    }

    #[tokio::test]
    async fn square_video_is_sent_as_landscape() {
        let local = Arc::new(FakeProvider::local(""));
        let cloud = Arc::new(FakeProvider::cloud(""));
        let selector = Arc::new(StaticSelector(None, AtomicUsize::new(0)));
        let dispatcher = dispatcher(local, cloud.clone(), Some("k"), selector);

        let mut config = GenerationConfig::default();
        config.set_provider(Provider::Cloud);
        config.set_aspect_ratio(AspectRatio::Square);

        match dispatcher.dispatch("surf", ContentKind::Video, &config).await.unwrap() {
            DispatchOutcome::Video { operation, aspect_ratio } => {
                assert!(!operation.done);
                assert_eq!(aspect_ratio, AspectRatio::Landscape);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(*cloud.video_aspects.lock().unwrap(), vec![AspectRatio::Landscape]);
    }

    #[tokio::test]
    async fn video_asks_host_for_missing_key_once() {
        let local = Arc::new(FakeProvider::local(""));
        let cloud = Arc::new(FakeProvider::cloud(""));
        let selector = Arc::new(StaticSelector(Some("picked"), AtomicUsize::new(0)));
        let dispatcher = dispatcher(local, cloud, None, selector.clone());

        let mut config = GenerationConfig::default();
        config.set_provider(Provider::Cloud);
        dispatcher.dispatch("a", ContentKind::Video, &config).await.unwrap();
        dispatcher.dispatch("b", ContentKind::Video, &config).await.unwrap();
        assert_eq!(selector.1.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.credential.get(), Some("picked"));
    }

    #[tokio::test]
    async fn declined_key_selection_stops_video() {
        let local = Arc::new(FakeProvider::local(""));
        let cloud = Arc::new(FakeProvider::cloud(""));
        let selector = Arc::new(StaticSelector(None, AtomicUsize::new(0)));
        let dispatcher = dispatcher(local, cloud.clone(), None, selector);

        let mut config = GenerationConfig::default();
        config.set_provider(Provider::Cloud);
        let err = dispatcher.dispatch("a", ContentKind::Video, &config).await.unwrap_err();
        assert!(matches!(err, StudioError::MissingCredential));
        assert_eq!(cloud.calls.load(Ordering::SeqCst), 0);
    }
}
