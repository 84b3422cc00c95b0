pub mod replicate;

pub use replicate::ReplicateClient;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::Serialize;

use crate::error::Result;
use crate::model::ModelConfig;

/// Lazily produced, finite sequence of generated text fragments.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// One generation call: the model to run and its input.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub model: String,
    pub input: InferenceInput,
}

/// Wire shape of the model input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceInput {
    pub prompt: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_length: u32,
    pub repetition_penalty: u32,
}

impl InferenceRequest {
    pub fn new(prompt: String, config: &ModelConfig) -> Self {
        Self {
            model: config.model.identifier().to_string(),
            input: InferenceInput {
                prompt,
                temperature: config.temperature,
                top_p: config.top_p,
                max_length: config.max_length,
                repetition_penalty: 1,
            },
        }
    }
}

/// Hosted text generation.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Start a generation. Transport and API failures surface either here
    /// or as an `Err` item in the stream; nothing is retried.
    async fn stream(&self, request: &InferenceRequest) -> Result<FragmentStream>;
}

/// Drain a fragment stream, handing each piece to `on_fragment` as it
/// arrives, and return the concatenated text.
pub async fn collect_fragments<F>(mut stream: FragmentStream, mut on_fragment: F) -> Result<String>
where
    F: FnMut(&str),
{
    let mut full_response = String::new();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        on_fragment(&fragment);
        full_response.push_str(&fragment);
    }
    Ok(full_response)
}
