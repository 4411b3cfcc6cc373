use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::OpenAiError;
use super::types::{
    ChatMessage, ChatRequest, ChatResponse, ContentPart, ImageGenerationRequest,
    ImageGenerationResponse, ImageUrl,
};
use crate::config::OpenAiSettings;
use crate::error::ExecutionFailure;
use crate::services::{CopyGenerator, ImageGenerator, VisionAnalyzer};

const IMAGE_SIZE: &str = "1024x1024";
const MAX_TOKENS: u32 = 1024;

pub struct OpenAiClient {
    api_key: String,
    client: Client,
    base_url: String,
    image_model: String,
    vision_model: String,
    text_model: String,
}

impl OpenAiClient {
    pub fn new(settings: &OpenAiSettings, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_key: settings.api_key.clone(),
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            image_model: settings.image_model.clone(),
            vision_model: settings.vision_model.clone(),
            text_model: settings.text_model.clone(),
        })
    }

    /// Generates one image and returns its decoded PNG bytes.
    pub async fn create_image(&self, prompt: &str) -> Result<Vec<u8>, OpenAiError> {
        let req = ImageGenerationRequest {
            model: self.image_model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            size: IMAGE_SIZE.to_string(),
        };
        let body: ImageGenerationResponse = self.post("images/generations", &req).await?;
        let encoded = body
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .ok_or(OpenAiError::EmptyResponse("image"))?;
        Ok(STANDARD.decode(encoded.trim())?)
    }

    /// Sends a single user message and returns the first reply's text.
    pub async fn chat(&self, model: &str, content: Vec<ContentPart>) -> Result<String, OpenAiError> {
        let req = ChatRequest {
            model: model.to_string(),
            max_tokens: MAX_TOKENS,
            messages: vec![ChatMessage::user(content)],
        };
        let body: ChatResponse = self.post("chat/completions", &req).await?;
        body.first_text()
            .map(str::to_string)
            .ok_or(OpenAiError::EmptyResponse("text"))
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, OpenAiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, OpenAiError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000)
            .unwrap_or(1000);
        return Err(OpenAiError::RateLimited {
            retry_after_ms: retry_after,
        });
    }

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(OpenAiError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

/// Folds product reference URLs into the prompt text.
fn with_references(prompt: &str, references: &[String]) -> String {
    if references.is_empty() {
        return prompt.to_string();
    }
    format!(
        "{prompt}\n\nReference product pages:\n{}",
        references.join("\n")
    )
}

/// Keeps the server's retry-after hint so the retry loop can honour it.
fn to_failure(
    err: OpenAiError,
    service: &'static str,
    wrap: fn(String) -> ExecutionFailure,
) -> ExecutionFailure {
    match err {
        OpenAiError::RateLimited { retry_after_ms } => ExecutionFailure::RateLimited {
            service,
            retry_after_ms,
        },
        other => wrap(other.to_string()),
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate_image(
        &self,
        prompt: &str,
        references: &[String],
    ) -> Result<Vec<u8>, ExecutionFailure> {
        self.create_image(&with_references(prompt, references))
            .await
            .map_err(|e| to_failure(e, "image generation", ExecutionFailure::Generation))
    }
}

#[async_trait]
impl VisionAnalyzer for OpenAiClient {
    async fn analyze(&self, image_url: &str, prompt: &str) -> Result<String, ExecutionFailure> {
        let content = vec![
            ContentPart::Text {
                text: prompt.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image_url.to_string(),
                },
            },
        ];
        self.chat(&self.vision_model, content)
            .await
            .map_err(|e| to_failure(e, "vision analysis", ExecutionFailure::Vision))
    }
}

#[async_trait]
impl CopyGenerator for OpenAiClient {
    async fn write_copy(&self, prompt: &str) -> Result<String, ExecutionFailure> {
        let content = vec![ContentPart::Text {
            text: prompt.to_string(),
        }];
        self.chat(&self.text_model, content)
            .await
            .map_err(|e| to_failure(e, "copy generation", ExecutionFailure::Copy))
    }
}
