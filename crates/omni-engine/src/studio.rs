//! The generation workflow controller.
//!
//! A `Studio` owns one conversation. `submit` runs a single user turn: it
//! appends the user message, dispatches the prompt, appends the assistant
//! reply and, for video, hands the pending operation to the poller and
//! returns without waiting for the render.

use crate::blobs::BlobStore;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::polling::{PollOutcome, VideoPoller};
use crate::session::{MediaTarget, Session, StudioEvent};
use omni_core::message::{MediaItem, Message};
use omni_core::models::{AspectRatio, ContentKind, GenerationConfig, Provider};
use omni_core::settings::StudioSettings;
use omni_core::{Result, StudioError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

pub const EMPTY_TEXT_PLACEHOLDER: &str = "No response generated.";
pub const EXCEPTION_PREFIX: &str = "⚠️ System Exception:";
pub const VIDEO_STARTED_MESSAGE: &str = "🎬 Veo Video sequence started. Rendering from Cloud Compute...";

/// Result of one turn: the assistant message it appended and, when the turn
/// failed, the error that message reports.
#[derive(Debug)]
pub struct Turn {
    pub reply: Message,
    pub failure: Option<StudioError>,
}

impl Turn {
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Clears the busy flag on every exit path of a turn.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Studio {
    dispatcher: Dispatcher,
    session: Arc<Session>,
    poller: VideoPoller,
    config: Mutex<GenerationConfig>,
    busy: AtomicBool,
    video_resolution: String,
}

impl Studio {
    pub fn new(dispatcher: Dispatcher, settings: &StudioSettings) -> Result<Self> {
        Self::build(dispatcher, settings, None)
    }

    /// Like `new`, additionally reporting every state change on `events`.
    pub fn with_events(
        dispatcher: Dispatcher,
        settings: &StudioSettings,
        events: UnboundedSender<StudioEvent>,
    ) -> Result<Self> {
        Self::build(dispatcher, settings, Some(events))
    }

    fn build(
        dispatcher: Dispatcher,
        settings: &StudioSettings,
        events: Option<UnboundedSender<StudioEvent>>,
    ) -> Result<Self> {
        Ok(Self {
            dispatcher,
            session: Arc::new(Session::new(BlobStore::new()?, events)),
            poller: VideoPoller::new(settings.poll_interval(), settings.max_poll_attempts),
            config: Mutex::new(GenerationConfig::default()),
            busy: AtomicBool::new(false),
            video_resolution: settings.video_resolution.clone(),
        })
    }

    fn config_guard(&self) -> MutexGuard<'_, GenerationConfig> {
        self.config.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> GenerationConfig {
        self.config_guard().clone()
    }

    pub fn set_provider(&self, provider: Provider) {
        self.config_guard().set_provider(provider);
    }

    pub fn set_model(&self, model: &str) -> Result<()> {
        self.config_guard().set_model(model)
    }

    pub fn set_temperature(&self, temperature: f32) -> Result<()> {
        self.config_guard().set_temperature(temperature)
    }

    pub fn set_aspect_ratio(&self, aspect_ratio: AspectRatio) {
        self.config_guard().set_aspect_ratio(aspect_ratio);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.session.snapshot()
    }

    pub fn media_item(&self, message_id: &str, media_id: &str) -> Option<MediaItem> {
        self.session.media(&MediaTarget {
            message_id: message_id.to_string(),
            media_id: media_id.to_string(),
        })
    }

    pub fn pending_polls(&self) -> usize {
        self.poller.pending()
    }

    /// Waits until every started video poll has settled.
    pub async fn settle(&self) -> Vec<PollOutcome> {
        self.poller.settle().await
    }

    /// Cancels outstanding polls, clears the conversation and releases its blobs.
    pub fn reset(&self) {
        let removed = self.session.reset();
        let cancelled = self.poller.cancel_all();
        info!(cancelled, removed, "conversation reset");
    }

    /// Runs one turn and returns the assistant message it appended.
    ///
    /// Blank prompts and submissions while another turn is in flight are
    /// rejected without touching the conversation, as is a turn whose
    /// conversation was reset before the reply arrived. Every other failure
    /// is reported as an assistant message and in `Turn::failure`.
    pub async fn submit(&self, prompt: &str, kind: ContentKind) -> Result<Turn> {
        if prompt.trim().is_empty() {
            return Err(StudioError::EmptyPrompt);
        }
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| StudioError::Busy)?;
        let _busy = BusyGuard(&self.busy);

        let config = self.config();
        let epoch = self.session.epoch();
        self.session
            .append_in_epoch(Message::user(prompt), epoch)
            .ok_or(StudioError::Interrupted)?;
        info!(%kind, provider = %config.provider(), model = config.model(), "turn submitted");

        let mut poll = None;
        let (reply, failure) = match self.dispatcher.dispatch(prompt, kind, &config).await {
            Ok(DispatchOutcome::Text(text)) => {
                let content = if text.is_empty() {
                    EMPTY_TEXT_PLACEHOLDER.to_string()
                } else {
                    text
                };
                (Message::assistant(content), None)
            }
            Ok(DispatchOutcome::Image {
                data_url,
                aspect_ratio,
            }) => {
                if data_url.is_empty() {
                    warn!("image response carried no inline data");
                }
                let item = MediaItem::completed_image(prompt, data_url, aspect_ratio);
                let content = format!("Image generated using Cloud Synthesis. Result for: \"{}\"", prompt);
                (Message::assistant_with_media(content, item), None)
            }
            Ok(DispatchOutcome::Video {
                operation,
                aspect_ratio,
            }) => {
                let item = MediaItem::pending_video(
                    prompt,
                    &operation.name,
                    aspect_ratio,
                    &self.video_resolution,
                );
                poll = Some((item.id.clone(), operation));
                (Message::assistant_with_media(VIDEO_STARTED_MESSAGE, item), None)
            }
            Err(e) => {
                if e.is_fast_fail() {
                    info!(error = %e, "turn rejected before any request");
                } else {
                    warn!(error = %e, "turn failed");
                }
                (Message::assistant(format!("{} {}", EXCEPTION_PREFIX, e)), Some(e))
            }
        };

        let Some(reply) = self.session.append_in_epoch(reply, epoch) else {
            info!("conversation reset during the turn, reply discarded");
            return Err(StudioError::Interrupted);
        };

        if let Some((media_id, operation)) = poll {
            self.poller.spawn(
                Arc::clone(&self.session),
                self.dispatcher.client(config.provider()),
                MediaTarget {
                    message_id: reply.id.clone(),
                    media_id: media_id.clone(),
                },
                operation,
            );
            if self.session.epoch() != epoch {
                self.poller.cancel(&media_id);
            }
        }
        Ok(Turn { reply, failure })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ApiCredential, NoKeySelector};
    use crate::dispatch::tests::FakeProvider;
    use crate::provider::{GenerationProvider, VideoOperation};
    use async_trait::async_trait;
    use omni_core::message::{MediaStatus, Role};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn studio(local: Arc<dyn GenerationProvider>, cloud: Arc<dyn GenerationProvider>) -> Studio {
        let dispatcher = Dispatcher::new(
            local,
            cloud,
            Arc::new(ApiCredential::new(Some("test-key".into()))),
            Arc::new(NoKeySelector),
        );
        Studio::new(dispatcher, &StudioSettings::default()).unwrap()
    }

    fn fakes() -> (Arc<FakeProvider>, Arc<FakeProvider>) {
        (
            Arc::new(FakeProvider::local("Hi!")),
            Arc::new(FakeProvider::cloud("cloud says hi")),
        )
    }

    #[tokio::test]
    async fn text_turn_appends_user_then_assistant() {
        let (local, cloud) = fakes();
        let studio = studio(local, cloud);

        let turn = studio.submit("Hello", ContentKind::Text).await.unwrap();
        assert!(!turn.is_failure());
        let reply = turn.reply;
        assert_eq!(reply.content, "Hi!");

        let messages = studio.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(!studio.is_busy());
    }

    #[tokio::test]
    async fn empty_text_gets_placeholder() {
        let local = Arc::new(FakeProvider::local(""));
        let (_, cloud) = fakes();
        let studio = studio(local, cloud);

        let reply = studio.submit("anything", ContentKind::Text).await.unwrap().reply;
        assert_eq!(reply.content, EMPTY_TEXT_PLACEHOLDER);
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_without_messages() {
        let (local, cloud) = fakes();
        let studio = studio(local.clone(), cloud);

        let err = studio.submit("   ", ContentKind::Text).await.unwrap_err();
        assert!(matches!(err, StudioError::EmptyPrompt));
        assert!(studio.messages().is_empty());
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn local_image_request_reports_exception_message() {
        let (local, cloud) = fakes();
        let studio = studio(local.clone(), cloud.clone());

        let turn = studio.submit("a cat", ContentKind::Image).await.unwrap();
        assert!(matches!(
            turn.failure,
            Some(StudioError::UnsupportedCapability { provider: Provider::Local, kind: ContentKind::Image })
        ));
        let reply = turn.reply;
        assert!(reply.content.starts_with(EXCEPTION_PREFIX));
        assert!(reply.content.contains("not supported"));
        assert!(reply.media.is_empty());
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cloud.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cloud_image_is_completed_immediately() {
        let (local, _) = fakes();
        let cloud = Arc::new(FakeProvider {
            image: "data:image/png;base64,AAAA".into(),
            ..FakeProvider::cloud("")
        });
        let studio = studio(local, cloud);
        studio.set_provider(Provider::Cloud);
        studio.set_aspect_ratio(AspectRatio::Portrait);

        let reply = studio.submit("a cat", ContentKind::Image).await.unwrap().reply;
        assert_eq!(reply.content, "Image generated using Cloud Synthesis. Result for: \"a cat\"");
        let item = &reply.media[0];
        assert_eq!(item.status, MediaStatus::Completed);
        assert_eq!(item.metadata.aspect_ratio, Some(AspectRatio::Portrait));
        assert_eq!(item.content.as_display(), "data:image/png;base64,AAAA");
    }

    #[tokio::test]
    async fn image_without_data_stays_completed_and_empty() {
        let (local, cloud) = fakes();
        let studio = studio(local, cloud);
        studio.set_provider(Provider::Cloud);

        let reply = studio.submit("nothing", ContentKind::Image).await.unwrap().reply;
        assert_eq!(reply.media[0].status, MediaStatus::Completed);
        assert!(reply.media[0].content.is_empty());
    }

    #[tokio::test]
    async fn square_video_is_recorded_as_landscape_and_polled() {
        let (local, cloud) = fakes();
        let studio = studio(local, cloud);
        studio.set_provider(Provider::Cloud);
        studio.set_aspect_ratio(AspectRatio::Square);

        let reply = studio.submit("surfing", ContentKind::Video).await.unwrap().reply;
        assert_eq!(reply.content, VIDEO_STARTED_MESSAGE);
        let item = &reply.media[0];
        assert_eq!(item.status, MediaStatus::Pending);
        assert_eq!(item.metadata.aspect_ratio, Some(AspectRatio::Landscape));
        assert_eq!(item.metadata.resolution.as_deref(), Some("720p"));
        assert_eq!(item.metadata.operation_id.as_deref(), Some("operations/fake"));
        assert_eq!(studio.pending_polls(), 1);
        assert!(studio.media_item(&reply.id, &item.id).is_some());
    }

    /// Text provider that takes a while to answer.
    struct SlowProvider(AtomicUsize);

    #[async_trait]
    impl GenerationProvider for SlowProvider {
        fn provider(&self) -> Provider {
            Provider::Local
        }

        fn supports(&self, kind: ContentKind) -> bool {
            kind == ContentKind::Text
        }

        async fn generate_text(&self, _model: &str, _prompt: &str, _temperature: f32) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("done".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_submit_while_busy_is_rejected() {
        let slow = Arc::new(SlowProvider(AtomicUsize::new(0)));
        let (_, cloud) = fakes();
        let studio = studio(slow.clone(), cloud);

        let (first, second) = tokio::join!(
            studio.submit("one", ContentKind::Text),
            studio.submit("two", ContentKind::Text)
        );
        assert_eq!(first.unwrap().reply.content, "done");
        assert!(matches!(second, Err(StudioError::Busy)));
        assert_eq!(slow.0.load(Ordering::SeqCst), 1);
        assert_eq!(studio.messages().len(), 2);
        assert!(!studio.is_busy());
    }

    /// Cloud provider whose video operations never finish.
    struct EndlessRender {
        start_delay: Duration,
        polls: AtomicUsize,
    }

    impl EndlessRender {
        fn new(start_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                start_delay,
                polls: AtomicUsize::new(0),
            })
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationProvider for EndlessRender {
        fn provider(&self) -> Provider {
            Provider::Cloud
        }

        fn supports(&self, _kind: ContentKind) -> bool {
            true
        }

        async fn generate_text(&self, _model: &str, _prompt: &str, _temperature: f32) -> Result<String> {
            Ok(String::new())
        }

        async fn generate_video(&self, _prompt: &str, _aspect_ratio: AspectRatio) -> Result<VideoOperation> {
            sleep(self.start_delay).await;
            Ok(VideoOperation::started("operations/endless"))
        }

        async fn poll_video(&self, operation: &VideoOperation) -> Result<VideoOperation> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(operation.clone())
        }
    }

    fn cloud_studio(render: &Arc<EndlessRender>) -> Studio {
        let (local, _) = fakes();
        let studio = studio(local, render.clone());
        studio.set_provider(Provider::Cloud);
        studio
    }

    #[tokio::test(start_paused = true)]
    async fn reset_stops_outstanding_polls() {
        let render = EndlessRender::new(Duration::ZERO);
        let studio = cloud_studio(&render);
        studio.submit("surfing", ContentKind::Video).await.unwrap();

        sleep(Duration::from_secs(25)).await;
        assert_eq!(render.polls(), 2);

        studio.reset();
        sleep(Duration::from_secs(100)).await;
        assert_eq!(render.polls(), 2);
        assert!(studio.messages().is_empty());
        assert_eq!(studio.pending_polls(), 0);

        studio.reset();
        assert!(studio.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_after_abandoned_settle_stops_polls() {
        let render = EndlessRender::new(Duration::ZERO);
        let studio = cloud_studio(&render);
        studio.submit("surfing", ContentKind::Video).await.unwrap();

        assert!(timeout(Duration::from_secs(25), studio.settle()).await.is_err());
        assert_eq!(studio.pending_polls(), 1);
        let polled = render.polls();

        studio.reset();
        sleep(Duration::from_secs(100)).await;
        assert_eq!(render.polls(), polled);
        assert_eq!(studio.pending_polls(), 0);
        assert!(studio.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_during_video_start_discards_the_reply() {
        let render = EndlessRender::new(Duration::from_secs(5));
        let studio = cloud_studio(&render);

        let (turn, _) = tokio::join!(studio.submit("surfing", ContentKind::Video), async {
            sleep(Duration::from_secs(1)).await;
            studio.reset();
        });
        assert!(matches!(turn, Err(StudioError::Interrupted)));
        assert!(studio.messages().is_empty());
        assert_eq!(studio.pending_polls(), 0);
        assert!(!studio.is_busy());

        sleep(Duration::from_secs(100)).await;
        assert_eq!(render.polls(), 0);
    }

    #[tokio::test]
    async fn reply_text_resembling_an_error_is_not_a_failure() {
        let local = Arc::new(FakeProvider::local("⚠️ System Exception: just quoting"));
        let (_, cloud) = fakes();
        let studio = studio(local, cloud);

        let turn = studio.submit("quote it", ContentKind::Text).await.unwrap();
        assert!(!turn.is_failure());
        assert!(turn.reply.content.starts_with(EXCEPTION_PREFIX));
    }
}
