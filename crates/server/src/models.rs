use llmserve_core::{FinishReason, ModelKind, Usage};
use serde::{Deserialize, Serialize};

fn default_max_new_tokens() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub model: String,
    pub text: String,
    pub usage: Usage,
}

/// One SSE chunk of `/chat/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatStreamChunk {
    pub text: String,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionChoice {
    pub text: String,
    pub finish_reason: Option<FinishReason>,
}

/// One SSE chunk of `/completion`; only the last one carries usage.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionStreamChunk {
    pub choice: CompletionChoice,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnloadResponse {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: &'static str,
    pub kind: Option<ModelKind>,
    pub loaded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub object: &'static str,
    pub data: Vec<ModelInfo>,
    pub queue_depth: usize,
}
