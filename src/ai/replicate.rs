use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{FragmentStream, InferenceClient, InferenceInput, InferenceRequest};
use crate::config::ApiToken;
use crate::error::{ChatError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";

#[derive(Serialize)]
struct PredictionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: &'a InferenceInput,
    stream: bool,
}

#[derive(Deserialize)]
struct Prediction {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    urls: PredictionUrls,
}

#[derive(Deserialize, Default)]
struct PredictionUrls {
    stream: Option<String>,
}

#[derive(Deserialize, Default)]
struct DoneEvent {
    reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEvent {
    detail: Option<String>,
}

/// Streams predictions from the Replicate HTTP API.
#[derive(Clone)]
pub struct ReplicateClient {
    client: Client,
    api_token: ApiToken,
    base_url: String,
}

impl ReplicateClient {
    pub fn new(api_token: ApiToken) -> Self {
        Self::with_base_url(api_token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_token: ApiToken, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Endpoint and pinned version for a model identifier.
    ///
    /// `owner/name:version` runs that exact version; a bare `owner/name`
    /// runs the model's current deployment.
    fn prediction_target<'a>(&self, model: &'a str) -> (String, Option<&'a str>) {
        match model.split_once(':') {
            Some((_, version)) => (format!("{}/v1/predictions", self.base_url), Some(version)),
            None => (format!("{}/v1/models/{}/predictions", self.base_url, model), None),
        }
    }

    async fn create_prediction(&self, request: &InferenceRequest) -> Result<Prediction> {
        let (url, version) = self.prediction_target(&request.model);
        let body = PredictionRequest {
            version,
            input: &request.input,
            stream: true,
        };

        debug!(model = request.model.as_str(), "creating Replicate prediction");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_token.expose())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            warn!(status, "Replicate rejected prediction");
            return Err(ChatError::api(status, text));
        }

        Ok(response.json().await?)
    }
}

/// What one server-sent event means for the fragment stream.
enum StreamStep {
    Fragment(String),
    Skip,
    Done,
    Failed(ChatError),
}

fn interpret(event: &str, data: String) -> StreamStep {
    match event {
        "output" => StreamStep::Fragment(data),
        "error" => {
            let detail = serde_json::from_str::<ErrorEvent>(&data)
                .ok()
                .and_then(|e| e.detail)
                .unwrap_or(data);
            StreamStep::Failed(ChatError::Prediction(detail))
        }
        "done" => {
            let done: DoneEvent = serde_json::from_str(&data).unwrap_or_default();
            match done.reason.as_deref() {
                Some(reason @ ("error" | "canceled")) => {
                    StreamStep::Failed(ChatError::Prediction(format!("prediction {}", reason)))
                }
                _ => StreamStep::Done,
            }
        }
        _ => StreamStep::Skip,
    }
}

fn stream_error(error: EventStreamError<reqwest::Error>) -> ChatError {
    match error {
        EventStreamError::Transport(e) => ChatError::Http(e),
        other => ChatError::Stream(other.to_string()),
    }
}

#[async_trait]
impl InferenceClient for ReplicateClient {
    async fn stream(&self, request: &InferenceRequest) -> Result<FragmentStream> {
        let prediction = self.create_prediction(request).await?;
        debug!(
            id = prediction.id.as_str(),
            status = prediction.status.as_deref().unwrap_or("unknown"),
            "prediction created"
        );

        let stream_url = prediction.urls.stream.ok_or_else(|| {
            ChatError::Stream(format!("prediction {} has no stream URL", prediction.id))
        })?;

        let response = self
            .client
            .get(&stream_url)
            .bearer_auth(self.api_token.expose())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::api(status, text));
        }

        let events = response.bytes_stream().eventsource();

        let stream = async_stream::stream! {
            futures_util::pin_mut!(events);

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(stream_error(e));
                        break;
                    }
                };

                match interpret(&event.event, event.data) {
                    StreamStep::Fragment(text) => yield Ok(text),
                    StreamStep::Skip => {}
                    StreamStep::Done => break,
                    StreamStep::Failed(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ReplicateClient {
        ReplicateClient::with_base_url(ApiToken::new("r8_test").unwrap(), "http://localhost:9/")
    }

    #[test]
    fn test_versioned_model_uses_predictions_endpoint() {
        let (url, version) = client().prediction_target("a16z-infra/llama7b-v2-chat:abc123");
        assert_eq!(url, "http://localhost:9/v1/predictions");
        assert_eq!(version, Some("abc123"));
    }

    #[test]
    fn test_unversioned_model_uses_model_endpoint() {
        let (url, version) = client().prediction_target("meta/llama-2-7b-chat");
        assert_eq!(url, "http://localhost:9/v1/models/meta/llama-2-7b-chat/predictions");
        assert_eq!(version, None);
    }

    #[test]
    fn test_interpret_events() {
        assert!(matches!(interpret("output", " Week".to_string()), StreamStep::Fragment(t) if t == " Week"));
        assert!(matches!(interpret("done", "{}".to_string()), StreamStep::Done));
        assert!(matches!(interpret("message", "x".to_string()), StreamStep::Skip));
        assert!(matches!(
            interpret("error", r#"{"detail":"out of memory"}"#.to_string()),
            StreamStep::Failed(ChatError::Prediction(d)) if d == "out of memory"
        ));
        assert!(matches!(
            interpret("done", r#"{"reason":"canceled"}"#.to_string()),
            StreamStep::Failed(ChatError::Prediction(_))
        ));
        assert!(matches!(
            interpret("error", "plain text failure".to_string()),
            StreamStep::Failed(ChatError::Prediction(d)) if d == "plain text failure"
        ));
    }
}
