//! External capabilities the employees call into, and the bundle that
//! wraps them with rate limiting and retries.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AdcrewConfig;
use crate::error::{AdcrewError, ExecutionFailure};
use crate::openai::OpenAiClient;
use crate::publisher::{AdPublisher, AdSubmission, HttpAdPublisher};
use crate::rate_limit::RateLimiter;
use crate::retry::{Retry, RetryPolicy, retry};
use crate::storage::{FsObjectStorage, ObjectStorage};
use crate::store::ImageStore;

/// Produces an image from a prompt and optional product reference URLs.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        references: &[String],
    ) -> Result<Vec<u8>, ExecutionFailure>;
}

/// Answers a question about a hosted image.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze(&self, image_url: &str, prompt: &str) -> Result<String, ExecutionFailure>;
}

/// Writes ad copy from a prompt.
#[async_trait]
pub trait CopyGenerator: Send + Sync {
    async fn write_copy(&self, prompt: &str) -> Result<String, ExecutionFailure>;
}

/// What a successful task run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub produced: usize,
    pub detail: String,
}

impl TaskReport {
    pub fn new(produced: usize, detail: impl Into<String>) -> Self {
        Self {
            produced,
            detail: detail.into(),
        }
    }
}

/// Collaborators plus the cross-cutting policies applied to every call.
///
/// Generative calls (image, vision, copy) take a permit from the shared
/// [`RateLimiter`] before each attempt; every call is wrapped in [`Retry`].
#[derive(Clone)]
pub struct Services {
    pub images: Arc<dyn ImageGenerator>,
    pub vision: Arc<dyn VisionAnalyzer>,
    pub copy: Arc<dyn CopyGenerator>,
    pub storage: Arc<dyn ObjectStorage>,
    pub publisher: Arc<dyn AdPublisher>,
    pub limiter: Arc<RateLimiter>,
    pub retry: RetryPolicy,
}

impl Services {
    /// Wires the production collaborators described by `config`.
    ///
    /// One [`OpenAiClient`] serves image generation, vision and copy.
    pub fn from_config(config: &AdcrewConfig) -> Result<Self, AdcrewError> {
        if config.openai.api_key.is_empty() {
            return Err(AdcrewError::Config(
                "OpenAI API key not set (OPENAI_API_KEY or [openai].api_key)".into(),
            ));
        }
        let timeout = config.request_timeout();
        let openai = Arc::new(OpenAiClient::new(&config.openai, timeout)?);
        let publisher = HttpAdPublisher::new(
            config.launcher.endpoint.clone(),
            config.launcher.api_token.clone(),
            timeout,
        )?;
        Ok(Self {
            images: openai.clone(),
            vision: openai.clone(),
            copy: openai,
            storage: Arc::new(FsObjectStorage::new(
                config.storage.root.clone(),
                config.storage.public_base_url.clone(),
            )),
            publisher: Arc::new(publisher),
            limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            retry: config.retry.clone(),
        })
    }

    pub async fn generate_image(
        &self,
        prompt: &str,
        references: &[String],
    ) -> Result<Vec<u8>, ExecutionFailure> {
        let images = &self.images;
        Retry::new(&self.retry, "generate image")
            .rate_limited(&self.limiter)
            .run(move || async move { images.generate_image(prompt, references).await })
            .await
    }

    pub async fn analyze(&self, image_url: &str, prompt: &str) -> Result<String, ExecutionFailure> {
        let vision = &self.vision;
        Retry::new(&self.retry, "analyze image")
            .rate_limited(&self.limiter)
            .run(move || async move { vision.analyze(image_url, prompt).await })
            .await
    }

    pub async fn write_copy(&self, prompt: &str) -> Result<String, ExecutionFailure> {
        let copy = &self.copy;
        Retry::new(&self.retry, "write copy")
            .rate_limited(&self.limiter)
            .run(move || async move { copy.write_copy(prompt).await })
            .await
    }

    pub async fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        content_type: &str,
    ) -> Result<String, ExecutionFailure> {
        let storage = &self.storage;
        retry(&self.retry, "upload image", move || async move {
            storage.upload(bytes, file_name, content_type).await
        })
        .await
    }

    /// Publishing is not idempotent: attempts are never cut short, and only
    /// failures where the ad was certainly not created are retried.
    pub async fn publish(&self, submission: &AdSubmission) -> Result<String, ExecutionFailure> {
        let publisher = &self.publisher;
        Retry::new(&self.retry, "publish ad")
            .unbounded()
            .run(move || async move { publisher.publish(submission).await })
            .await
    }
}

/// Everything one task execution may touch.
pub struct ExecutionContext<'a> {
    pub user_id: &'a str,
    pub store: Option<&'a dyn ImageStore>,
    pub services: &'a Services,
}

impl<'a> ExecutionContext<'a> {
    /// The image store, or a failure if this dispatch was started without one.
    pub fn store(&self) -> Result<&'a dyn ImageStore, ExecutionFailure> {
        self.store
            .ok_or(ExecutionFailure::MissingResource("image store"))
    }
}
