use std::path::PathBuf;

use clap::Args;
use llmserve_core::{DecodeParametersPatch, PromptTemplate, runtime::DeviceKind};

use crate::config::{ConfigOverrides, InferenceOverride, ServerOverride};

#[derive(Args, Debug, Clone, Default)]
pub struct CommonModelArgs {
    /// TOML configuration file; falls back to $LLMSERVE_CONFIG, then the platform config dir.
    #[arg(long, value_name = "PATH", help_heading = "Application")]
    pub config: Option<PathBuf>,

    /// Registry id of the model to serve; also becomes the warmup target.
    #[arg(long, value_name = "ID", help_heading = "Application")]
    pub model: Option<String>,

    /// `tokenizer.json` for the selected model.
    #[arg(long, value_name = "PATH", help_heading = "Application")]
    pub tokenizer: Option<PathBuf>,

    /// GGUF checkpoint for the selected model.
    #[arg(long, value_name = "PATH", help_heading = "Application")]
    pub weights: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CommonInferenceArgs {
    /// Device backend (cpu/cuda/metal).
    #[arg(long, help_heading = "Inference")]
    pub device: Option<DeviceKind>,

    /// Chat prompt template (plain/gemma/chatml/llama3).
    #[arg(long, help_heading = "Inference")]
    pub template: Option<PromptTemplate>,

    /// Context window in tokens.
    #[arg(long, help_heading = "Inference")]
    pub context_length: Option<usize>,

    /// Completion token budget.
    #[arg(long, help_heading = "Inference")]
    pub max_new_tokens: Option<usize>,

    /// Sample instead of decoding greedily.
    #[arg(long, help_heading = "Inference", value_name = "BOOL")]
    pub do_sample: Option<bool>,

    /// Softmax temperature.
    #[arg(long, help_heading = "Inference")]
    pub temperature: Option<f64>,

    /// Nucleus sampling probability mass.
    #[arg(long, help_heading = "Inference")]
    pub top_p: Option<f64>,

    /// Top-k sampling cutoff.
    #[arg(long, help_heading = "Inference")]
    pub top_k: Option<usize>,

    /// Repetition penalty.
    #[arg(long, help_heading = "Inference")]
    pub repetition_penalty: Option<f32>,

    /// Tokens considered by the repetition penalty.
    #[arg(long, help_heading = "Inference")]
    pub repeat_last_n: Option<usize>,

    /// Sampler seed.
    #[arg(long, help_heading = "Inference")]
    pub seed: Option<u64>,

    /// Stop string; may be repeated.
    #[arg(long = "stop", value_name = "TEXT", help_heading = "Inference")]
    pub stop: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServerBindArgs {
    /// Address to listen on.
    #[arg(long, help_heading = "Application")]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(long, help_heading = "Application")]
    pub port: Option<u16>,

    /// Maximum number of queued requests.
    #[arg(long, help_heading = "Application")]
    pub queue_capacity: Option<usize>,

    /// Model to load once the server is listening.
    #[arg(long, value_name = "ID", help_heading = "Application")]
    pub warmup: Option<String>,

    /// Skip the startup warmup.
    #[arg(long, help_heading = "Application", conflicts_with = "warmup")]
    pub no_warmup: bool,

    /// Directory holding `<id>/model.gguf` and `<id>/tokenizer.json`.
    #[arg(long, value_name = "PATH", help_heading = "Application")]
    pub models_dir: Option<PathBuf>,
}

impl From<&CommonInferenceArgs> for InferenceOverride {
    fn from(value: &CommonInferenceArgs) -> Self {
        Self {
            device: value.device,
            template: value.template,
            context_length: value.context_length,
            chat_stop: None,
            decode: DecodeParametersPatch {
                max_new_tokens: value.max_new_tokens,
                do_sample: value.do_sample,
                temperature: value.temperature,
                top_p: value.top_p,
                top_k: value.top_k,
                repetition_penalty: value.repetition_penalty,
                repeat_last_n: value.repeat_last_n,
                seed: value.seed,
                stop: (!value.stop.is_empty()).then(|| value.stop.clone()),
            },
        }
    }
}

impl From<&ServerBindArgs> for ServerOverride {
    fn from(value: &ServerBindArgs) -> Self {
        Self {
            host: value.host.clone(),
            port: value.port,
            queue_capacity: value.queue_capacity,
            warmup: value.warmup.clone(),
            no_warmup: value.no_warmup,
            models_dir: value.models_dir.clone(),
        }
    }
}

pub fn build_config_overrides(
    model: &CommonModelArgs,
    inference: &CommonInferenceArgs,
    bind: Option<&ServerBindArgs>,
) -> ConfigOverrides {
    ConfigOverrides {
        config_path: model.config.clone(),
        model_id: model.model.clone(),
        tokenizer: model.tokenizer.clone(),
        weights: model.weights.clone(),
        inference: inference.into(),
        server: bind.map(ServerOverride::from).unwrap_or_default(),
    }
}
