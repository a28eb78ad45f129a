use crate::models::AspectRatio;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Generates an opaque identifier such as `msg-4fk2a9qz`.
pub fn generate_id(prefix: &str) -> String {
    let random_part: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("{}-{}", prefix, random_part.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("image"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Pending,
    Completed,
    Failed,
}

impl MediaStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, MediaStatus::Pending)
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaStatus::Pending => f.write_str("pending"),
            MediaStatus::Completed => f.write_str("completed"),
            MediaStatus::Failed => f.write_str("failed"),
        }
    }
}

/// A session-local handle to downloaded binary content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub id: String,
    pub path: PathBuf,
    pub mime_type: String,
}

impl BlobRef {
    pub fn url(&self) -> String {
        format!("blob:omni/{}", self.id)
    }
}

/// What a media item currently displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MediaContent {
    #[default]
    Empty,
    /// `data:<mime>;base64,<payload>`
    DataUrl(String),
    Blob(BlobRef),
}

impl MediaContent {
    /// Wraps an inline payload; an empty string stays `Empty`.
    pub fn inline(data_url: String) -> Self {
        if data_url.is_empty() {
            MediaContent::Empty
        } else {
            MediaContent::DataUrl(data_url)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, MediaContent::Empty)
    }

    /// The displayable reference, or `""` while nothing is bound.
    pub fn as_display(&self) -> String {
        match self {
            MediaContent::Empty => String::new(),
            MediaContent::DataUrl(url) => url.clone(),
            MediaContent::Blob(blob) => blob.url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub aspect_ratio: Option<AspectRatio>,
    pub resolution: Option<String>,
    pub operation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub kind: MediaKind,
    pub content: MediaContent,
    pub prompt: String,
    pub status: MediaStatus,
    pub created_at: DateTime<Utc>,
    pub metadata: MediaMetadata,
    /// Reason recorded when the item settles as `failed`.
    pub failure: Option<String>,
}

impl MediaItem {
    /// A finished image; the payload may be empty when the provider returned none.
    pub fn completed_image(prompt: &str, data_url: String, aspect_ratio: AspectRatio) -> Self {
        Self {
            id: generate_id("media"),
            kind: MediaKind::Image,
            content: MediaContent::inline(data_url),
            prompt: prompt.to_string(),
            status: MediaStatus::Completed,
            created_at: Utc::now(),
            metadata: MediaMetadata {
                aspect_ratio: Some(aspect_ratio),
                ..Default::default()
            },
            failure: None,
        }
    }

    /// A video placeholder bound to exactly one remote operation.
    pub fn pending_video(
        prompt: &str,
        operation_id: &str,
        aspect_ratio: AspectRatio,
        resolution: &str,
    ) -> Self {
        Self {
            id: generate_id("media"),
            kind: MediaKind::Video,
            content: MediaContent::Empty,
            prompt: prompt.to_string(),
            status: MediaStatus::Pending,
            created_at: Utc::now(),
            metadata: MediaMetadata {
                aspect_ratio: Some(aspect_ratio),
                resolution: Some(resolution.to_string()),
                operation_id: Some(operation_id.to_string()),
            },
            failure: None,
        }
    }

    /// Binds content and settles as `completed`. Returns `false` if already settled.
    pub fn complete(&mut self, content: MediaContent) -> bool {
        if self.status.is_settled() {
            return false;
        }
        self.content = content;
        self.status = MediaStatus::Completed;
        true
    }

    /// Settles as `failed`. Returns `false` if already settled.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.status.is_settled() {
            return false;
        }
        self.status = MediaStatus::Failed;
        self.failure = Some(reason.into());
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub media: Vec<MediaItem>,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self::new(Role::User, content.to_string(), Vec::new())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), Vec::new())
    }

    pub fn assistant_with_media(content: impl Into<String>, media: MediaItem) -> Self {
        Self::new(Role::Assistant, content.into(), vec![media])
    }

    fn new(role: Role, content: String, media: Vec<MediaItem>) -> Self {
        Self {
            id: generate_id("msg"),
            role,
            content,
            created_at: Utc::now(),
            media,
        }
    }
}
