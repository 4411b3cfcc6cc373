use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::ExecutionFailure;

/// One ad ready to be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdSubmission {
    pub user_id: String,
    pub image_url: String,
    pub primary_text: String,
    pub headline: String,
    pub description: String,
    pub call_to_action: String,
    pub landing_url: String,
    pub adsets: Vec<String>,
    pub daily_budget: u32,
}

/// Publishes ads and returns the platform's ad id.
#[async_trait]
pub trait AdPublisher: Send + Sync {
    async fn publish(&self, submission: &AdSubmission) -> Result<String, ExecutionFailure>;
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(alias = "adId", alias = "ad_id")]
    id: String,
}

/// Posts submissions as JSON to the ad-launch endpoint.
pub struct HttpAdPublisher {
    client: Client,
    endpoint: String,
    api_token: String,
}

impl HttpAdPublisher {
    pub fn new(endpoint: String, api_token: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_token,
        })
    }
}

#[async_trait]
impl AdPublisher for HttpAdPublisher {
    async fn publish(&self, submission: &AdSubmission) -> Result<String, ExecutionFailure> {
        if self.endpoint.is_empty() {
            return Err(ExecutionFailure::PublishRejected(
                "launcher endpoint is not configured".into(),
            ));
        }

        let mut request = self.client.post(&self.endpoint).json(submission);
        if !self.api_token.is_empty() {
            request = request.bearer_auth(&self.api_token);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ExecutionFailure::Publish(e.to_string())
            } else {
                ExecutionFailure::PublishUnconfirmed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            let message = format!("status {}: {message}", status.as_u16());
            return Err(classify_status(status, message));
        }

        let body = response
            .json::<PublishResponse>()
            .await
            .map_err(|e| ExecutionFailure::PublishUnconfirmed(format!("unexpected response: {e}")))?;
        Ok(body.id)
    }
}

/// 429 and 503 mean the launcher did not take the request. Other 5xx may
/// have created the ad before failing.
fn classify_status(status: StatusCode, message: String) -> ExecutionFailure {
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            ExecutionFailure::Publish(message)
        }
        s if s.is_client_error() => ExecutionFailure::PublishRejected(message),
        _ => ExecutionFailure::PublishUnconfirmed(message),
    }
}
