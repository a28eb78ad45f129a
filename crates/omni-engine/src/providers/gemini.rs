//! Client for the Gemini / Veo REST API.

use crate::credentials::ApiCredential;
use crate::provider::{GenerationProvider, VideoOperation};
use async_trait::async_trait;
use omni_core::models::{AspectRatio, ContentKind, Provider};
use omni_core::settings::StudioSettings;
use omni_core::{Result, StudioError};
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

const PROVIDER_LABEL: &str = "gemini";

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    credential: Arc<ApiCredential>,
    system_instruction: String,
    image_model: String,
    video_model: String,
    video_resolution: String,
}

impl GeminiClient {
    pub fn new(settings: &StudioSettings, credential: Arc<ApiCredential>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: settings.cloud_base_url.trim_end_matches('/').to_string(),
            credential,
            system_instruction: settings.system_instruction.clone(),
            image_model: settings.image_model.clone(),
            video_model: settings.video_model.clone(),
            video_resolution: settings.video_resolution.clone(),
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.credential.get().ok_or(StudioError::MissingCredential)
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let api_key = self.api_key()?;
        debug!(%url, "sending gemini request");
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        response_json_or_error(response).await
    }
}

fn transport_error(err: reqwest::Error) -> StudioError {
    StudioError::Generation(format!("{} request could not be sent: {}", PROVIDER_LABEL, err))
}

async fn response_json_or_error(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        return Err(StudioError::Transport {
            provider: PROVIDER_LABEL.to_string(),
            status: status.as_u16(),
            body: detail,
        });
    }
    serde_json::from_str(&body).map_err(|e| {
        StudioError::Generation(format!("{} returned an unreadable response: {}", PROVIDER_LABEL, e))
    })
}

/// Concatenated text of the first candidate.
fn first_candidate_text(response: &Value) -> String {
    candidate_parts(response)
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect()
}

/// The first inline image as a data URL, or `""` if none is present.
fn first_inline_image(response: &Value) -> String {
    candidate_parts(response)
        .iter()
        .find_map(|part| {
            let inline = part.get("inlineData").or_else(|| part.get("inline_data"))?;
            let data = inline["data"].as_str()?;
            let mime = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            Some(format!("data:{};base64,{}", mime, data))
        })
        .unwrap_or_default()
}

fn candidate_parts(response: &Value) -> Vec<Value> {
    response["candidates"][0]["content"]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default()
}

fn parse_operation(value: &Value) -> Result<VideoOperation> {
    let name = value["name"]
        .as_str()
        .ok_or_else(|| StudioError::Generation("video operation has no name".to_string()))?;
    let done = value["done"].as_bool().unwrap_or(false);
    let response = &value["response"];
    let video_uri = response["generateVideoResponse"]["generatedSamples"][0]["video"]["uri"]
        .as_str()
        .or_else(|| response["generatedVideos"][0]["video"]["uri"].as_str())
        .map(str::to_string);
    let error = value["error"]["message"].as_str().map(str::to_string);
    Ok(VideoOperation {
        name: name.to_string(),
        done,
        video_uri,
        error,
    })
}

#[async_trait]
impl GenerationProvider for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Cloud
    }

    fn supports(&self, _kind: ContentKind) -> bool {
        true
    }

    async fn generate_text(&self, model: &str, prompt: &str, temperature: f32) -> Result<String> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": self.system_instruction }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": temperature },
        });
        let response = self.post_json(&self.model_url(model, "generateContent"), &body).await?;
        Ok(first_candidate_text(&response))
    }

    async fn generate_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "imageConfig": { "aspectRatio": aspect_ratio.as_str() }
            },
        });
        let response = self
            .post_json(&self.model_url(&self.image_model, "generateContent"), &body)
            .await?;
        Ok(first_inline_image(&response))
    }

    async fn generate_video(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<VideoOperation> {
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "aspectRatio": aspect_ratio.as_str(),
                "resolution": self.video_resolution,
                "numberOfVideos": 1,
            },
        });
        let response = self
            .post_json(&self.model_url(&self.video_model, "predictLongRunning"), &body)
            .await?;
        let operation = parse_operation(&response)?;
        info!(operation = %operation.name, "video generation started");
        Ok(operation)
    }

    async fn poll_video(&self, operation: &VideoOperation) -> Result<VideoOperation> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1beta/{}", self.base_url, operation.name.trim_start_matches('/'));
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(transport_error)?;
        parse_operation(&response_json_or_error(response).await?)
    }

    async fn fetch_video_asset(&self, uri: &str) -> Result<Vec<u8>> {
        let api_key = self.api_key()?;
        let mut url = Url::parse(uri)
            .map_err(|e| StudioError::Generation(format!("invalid video uri '{}': {}", uri, e)))?;
        url.query_pairs_mut().append_pair("key", api_key);

        let response = self.http.get(url).send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StudioError::Transport {
                provider: PROVIDER_LABEL.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}
