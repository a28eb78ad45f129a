//! The ordered message log of one session.

use crate::message::{MediaItem, Message};

#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and returns its id.
    pub fn append(&mut self, message: Message) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Mutable access to one media item, matched by message and media id.
    pub fn media_mut(&mut self, message_id: &str, media_id: &str) -> Option<&mut MediaItem> {
        self.messages
            .iter_mut()
            .find(|m| m.id == message_id)?
            .media
            .iter_mut()
            .find(|item| item.id == media_id)
    }

    /// Clears the log, handing back what was removed.
    pub fn reset(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }
}
