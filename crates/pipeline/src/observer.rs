use std::fmt;
use std::time::Duration;

use tracing::info;

use crate::{FinishReason, ModelId, ModelKind, Usage};

/// Model lifecycle and generation events for observability.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    ConfigLoaded {
        config_path: Option<String>,
        active_model: ModelId,
    },

    ModelLoadStarted {
        model_id: ModelId,
    },

    ModelLoadFinished {
        model_id: ModelId,
        kind: ModelKind,
        context_length: usize,
        duration: Duration,
    },

    ModelUnloaded {
        model_id: ModelId,
    },

    GenerationStarted {
        model_id: ModelId,
        max_new_tokens: usize,
    },

    GenerationFinished {
        model_id: ModelId,
        usage: Usage,
        finish_reason: FinishReason,
        duration: Duration,
    },
}

fn format_duration_s(duration: &Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

impl serde::Serialize for PipelineEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use PipelineEvent::*;

        match self {
            ConfigLoaded {
                config_path,
                active_model,
            } => {
                #[derive(serde::Serialize)]
                struct Event<'a> {
                    kind: &'static str,
                    config_path: &'a Option<String>,
                    active_model: &'a ModelId,
                }

                Event {
                    kind: "config_loaded",
                    config_path,
                    active_model,
                }
                .serialize(serializer)
            }
            ModelLoadStarted { model_id } => {
                #[derive(serde::Serialize)]
                struct Event<'a> {
                    kind: &'static str,
                    model_id: &'a ModelId,
                }

                Event {
                    kind: "model_load_started",
                    model_id,
                }
                .serialize(serializer)
            }
            ModelLoadFinished {
                model_id,
                kind,
                context_length,
                duration,
            } => {
                #[derive(serde::Serialize)]
                struct Event<'a> {
                    kind: &'static str,
                    model_id: &'a ModelId,
                    model_kind: ModelKind,
                    context_length: usize,
                    duration_s: String,
                }

                Event {
                    kind: "model_load_finished",
                    model_id,
                    model_kind: *kind,
                    context_length: *context_length,
                    duration_s: format_duration_s(duration),
                }
                .serialize(serializer)
            }
            ModelUnloaded { model_id } => {
                #[derive(serde::Serialize)]
                struct Event<'a> {
                    kind: &'static str,
                    model_id: &'a ModelId,
                }

                Event {
                    kind: "model_unloaded",
                    model_id,
                }
                .serialize(serializer)
            }
            GenerationStarted {
                model_id,
                max_new_tokens,
            } => {
                #[derive(serde::Serialize)]
                struct Event<'a> {
                    kind: &'static str,
                    model_id: &'a ModelId,
                    max_new_tokens: usize,
                }

                Event {
                    kind: "generation_started",
                    model_id,
                    max_new_tokens: *max_new_tokens,
                }
                .serialize(serializer)
            }
            GenerationFinished {
                model_id,
                usage,
                finish_reason,
                duration,
            } => {
                #[derive(serde::Serialize)]
                struct Event<'a> {
                    kind: &'static str,
                    model_id: &'a ModelId,
                    prompt_tokens: usize,
                    completion_tokens: usize,
                    finish_reason: FinishReason,
                    duration_s: String,
                }

                Event {
                    kind: "generation_finished",
                    model_id,
                    prompt_tokens: usage.prompt_tokens,
                    completion_tokens: usage.completion_tokens,
                    finish_reason: *finish_reason,
                    duration_s: format_duration_s(duration),
                }
                .serialize(serializer)
            }
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PipelineEvent::*;

        match self {
            ConfigLoaded {
                config_path,
                active_model,
            } => {
                if let Some(path) = config_path {
                    write!(f, "ConfigLoaded {active_model} from {path}")
                } else {
                    write!(f, "ConfigLoaded {active_model}")
                }
            }
            ModelLoadStarted { model_id } => write!(f, "ModelLoadStarted {model_id}"),
            ModelLoadFinished {
                model_id,
                kind,
                context_length,
                duration,
            } => write!(
                f,
                "ModelLoadFinished {model_id} kind={kind} context_length={context_length} in {}",
                format_duration_s(duration)
            ),
            ModelUnloaded { model_id } => write!(f, "ModelUnloaded {model_id}"),
            GenerationStarted {
                model_id,
                max_new_tokens,
            } => write!(f, "GenerationStarted {model_id} max_new_tokens={max_new_tokens}"),
            GenerationFinished {
                model_id,
                usage,
                finish_reason,
                duration,
            } => write!(
                f,
                "GenerationFinished {model_id} prompt_tokens={} completion_tokens={} finish_reason={finish_reason} in {}",
                usage.prompt_tokens,
                usage.completion_tokens,
                format_duration_s(duration)
            ),
        }
    }
}

/// Observer interface for model lifecycle and generation metrics.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, _event: &PipelineEvent) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Forwards every event to `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        info!(target: "llmserve::pipeline", "{event}");
    }
}
