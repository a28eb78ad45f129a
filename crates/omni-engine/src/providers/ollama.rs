//! Client for a local Ollama server.

use crate::provider::GenerationProvider;
use async_trait::async_trait;
use omni_core::models::{ContentKind, Provider};
use omni_core::{Result, StudioError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

#[derive(Deserialize, Debug)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Serialize, Deserialize, Debug)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize, Debug)]
struct TagsResponse {
    models: Vec<Tag>,
}

#[derive(Deserialize, Debug)]
struct Tag {
    name: String,
}

pub struct OllamaClient {
    http: reqwest::Client,
    endpoint: String,
}

impl OllamaClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Names of the models installed on the local server. Discovery is best
    /// effort: an unreachable server yields an empty list.
    pub async fn list_local_models(&self) -> Vec<String> {
        let url = format!("{}/api/tags", self.endpoint);
        let response = match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = %response.status(), "ollama model discovery returned an error status");
                return Vec::new();
            }
            Err(e) => {
                debug!(error = %e, "ollama model discovery failed");
                return Vec::new();
            }
        };
        match response.json::<TagsResponse>().await {
            Ok(tags) => tags.models.into_iter().map(|tag| tag.name).collect(),
            Err(e) => {
                warn!(error = %e, "could not decode ollama tag list");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl GenerationProvider for OllamaClient {
    fn provider(&self) -> Provider {
        Provider::Local
    }

    fn supports(&self, kind: ContentKind) -> bool {
        kind == ContentKind::Text
    }

    async fn generate_text(&self, model: &str, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
            "options": { "temperature": temperature },
        });
        debug!(%url, model, "sending local chat request");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StudioError::LocalEngineUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let mut reason = format!("connection failed with status {}", status.as_u16());
            if !detail.trim().is_empty() {
                reason.push_str(": ");
                reason.push_str(detail.trim());
            }
            return Err(StudioError::LocalEngineUnavailable(reason));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| StudioError::LocalEngineUnavailable(format!("unreadable response: {}", e)))?;
        Ok(chat.message.content)
    }
}
