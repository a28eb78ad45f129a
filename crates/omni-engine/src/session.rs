//! Conversation state shared between the controller and its poll tasks.

use crate::blobs::BlobStore;
use omni_core::conversation::Conversation;
use omni_core::message::{BlobRef, MediaContent, MediaItem, Message};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Notifications for front ends that render the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum StudioEvent {
    MessageAppended(Message),
    /// A media item changed status after its message was appended.
    MediaUpdated { message_id: String, media: MediaItem },
    Reset,
}

/// Identifies the media item a poll task reports to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTarget {
    pub message_id: String,
    pub media_id: String,
}

pub(crate) struct Session {
    conversation: Mutex<Conversation>,
    /// Bumped by every reset, only while the conversation lock is held.
    epoch: AtomicU64,
    pub(crate) blobs: BlobStore,
    events: Option<UnboundedSender<StudioEvent>>,
}

impl Session {
    pub(crate) fn new(blobs: BlobStore, events: Option<UnboundedSender<StudioEvent>>) -> Self {
        Self {
            conversation: Mutex::new(Conversation::new()),
            epoch: AtomicU64::new(0),
            blobs,
            events,
        }
    }

    fn conversation(&self) -> MutexGuard<'_, Conversation> {
        self.conversation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: StudioEvent) {
        if let Some(events) = &self.events {
            // A closed receiver only means nobody is rendering any more.
            let _ = events.send(event);
        }
    }

    pub(crate) fn append(&self, message: Message) -> Message {
        self.conversation().append(message.clone());
        self.emit(StudioEvent::MessageAppended(message.clone()));
        message
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Appends only if no reset happened since `epoch` was read.
    pub(crate) fn append_in_epoch(&self, message: Message, epoch: u64) -> Option<Message> {
        {
            let mut conversation = self.conversation();
            if self.epoch() != epoch {
                return None;
            }
            conversation.append(message.clone());
        }
        self.emit(StudioEvent::MessageAppended(message.clone()));
        Some(message)
    }

    pub(crate) fn snapshot(&self) -> Vec<Message> {
        self.conversation().messages().to_vec()
    }

    pub(crate) fn media(&self, target: &MediaTarget) -> Option<MediaItem> {
        self.conversation()
            .media_mut(&target.message_id, &target.media_id)
            .cloned()
    }

    /// Binds a downloaded blob to the target item. Returns `false` when the item
    /// is gone or already settled; the caller then owns the blob.
    pub(crate) fn complete_media(&self, target: &MediaTarget, blob: BlobRef) -> bool {
        let updated = {
            let mut conversation = self.conversation();
            conversation
                .media_mut(&target.message_id, &target.media_id)
                .and_then(|item| item.complete(MediaContent::Blob(blob)).then(|| item.clone()))
        };
        match updated {
            Some(media) => {
                self.emit(StudioEvent::MediaUpdated {
                    message_id: target.message_id.clone(),
                    media,
                });
                true
            }
            None => {
                debug!(media = %target.media_id, "media item no longer pending");
                false
            }
        }
    }

    /// Marks the target item failed and appends a visible notice.
    pub(crate) fn fail_media(&self, target: &MediaTarget, reason: &str) -> bool {
        let (media, notice) = {
            let mut conversation = self.conversation();
            let Some(item) = conversation.media_mut(&target.message_id, &target.media_id) else {
                return false;
            };
            if !item.fail(reason) {
                return false;
            }
            let media = item.clone();
            let notice = Message::assistant(format!("⚠️ Video generation failed: {}", reason));
            conversation.append(notice.clone());
            (media, notice)
        };
        self.emit(StudioEvent::MediaUpdated {
            message_id: target.message_id.clone(),
            media,
        });
        self.emit(StudioEvent::MessageAppended(notice));
        true
    }

    /// Clears the conversation and revokes every blob it referenced.
    pub(crate) fn reset(&self) -> usize {
        let removed = {
            let mut conversation = self.conversation();
            self.epoch.fetch_add(1, Ordering::SeqCst);
            conversation.reset()
        };
        for item in removed.iter().flat_map(|message| message.media.iter()) {
            if let MediaContent::Blob(blob) = &item.content {
                self.blobs.revoke(blob);
            }
        }
        self.emit(StudioEvent::Reset);
        removed.len()
    }
}
