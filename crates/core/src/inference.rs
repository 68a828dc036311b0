use std::fmt;

use anyhow::Result;
use candle_core::{Device, Tensor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Decoding parameters that map directly onto generation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeParameters {
    pub max_new_tokens: usize,
    pub do_sample: bool,
    pub temperature: f64,
    /// Written as `1.0` when nucleus filtering is off.
    #[serde(serialize_with = "serialize_top_p", deserialize_with = "deserialize_top_p")]
    pub top_p: Option<f64>,
    /// Written as `0` when top-k filtering is off.
    #[serde(serialize_with = "serialize_top_k", deserialize_with = "deserialize_top_k")]
    pub top_k: Option<usize>,
    pub repetition_penalty: f32,
    pub repeat_last_n: usize,
    pub seed: Option<u64>,
    pub stop: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeParametersPatch {
    pub max_new_tokens: Option<usize>,
    pub do_sample: Option<bool>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<usize>,
    pub repetition_penalty: Option<f32>,
    pub repeat_last_n: Option<usize>,
    pub seed: Option<u64>,
    pub stop: Option<Vec<String>>,
}

impl DecodeParameters {
    pub fn greedy(max_new_tokens: usize) -> Self {
        Self {
            max_new_tokens,
            do_sample: false,
            temperature: 0.0,
            top_p: None,
            top_k: None,
            repetition_penalty: 1.0,
            repeat_last_n: 64,
            seed: None,
            stop: Vec::new(),
        }
    }

    pub fn is_greedy(&self) -> bool {
        !self.do_sample || self.temperature <= 0.0
    }
}

impl Default for DecodeParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            do_sample: true,
            temperature: 0.8,
            top_p: Some(0.95),
            top_k: Some(40),
            repetition_penalty: 1.0,
            repeat_last_n: 64,
            seed: None,
            stop: Vec::new(),
        }
    }
}

impl std::ops::AddAssign<&DecodeParametersPatch> for DecodeParameters {
    fn add_assign(&mut self, rhs: &DecodeParametersPatch) {
        if let Some(max_new_tokens) = rhs.max_new_tokens {
            self.max_new_tokens = max_new_tokens;
        }
        if let Some(sample) = rhs.do_sample {
            self.do_sample = sample;
        }
        if let Some(temp) = rhs.temperature {
            self.temperature = temp;
        }
        if let Some(prob) = rhs.top_p {
            self.top_p = normalize_top_p(prob);
        }
        if let Some(top_k) = rhs.top_k {
            self.top_k = normalize_top_k(top_k);
        }
        if let Some(repetition_penalty) = rhs.repetition_penalty {
            self.repetition_penalty = repetition_penalty;
        }
        if let Some(repeat_last_n) = rhs.repeat_last_n {
            self.repeat_last_n = repeat_last_n;
        }
        if let Some(seed) = rhs.seed {
            self.seed = Some(seed);
        }
        if let Some(stop) = rhs.stop.as_ref() {
            self.stop = stop.iter().filter(|s| !s.is_empty()).cloned().collect();
        }
    }
}

impl std::ops::Add<&DecodeParametersPatch> for DecodeParameters {
    type Output = DecodeParameters;

    fn add(mut self, rhs: &DecodeParametersPatch) -> Self::Output {
        self += rhs;
        self
    }
}

impl DecodeParametersPatch {
    /// Layer `rhs` over `self`; fields set in `rhs` win.
    pub fn merge_from(&mut self, rhs: &DecodeParametersPatch) {
        if rhs.max_new_tokens.is_some() {
            self.max_new_tokens = rhs.max_new_tokens;
        }
        if rhs.do_sample.is_some() {
            self.do_sample = rhs.do_sample;
        }
        if rhs.temperature.is_some() {
            self.temperature = rhs.temperature;
        }
        if rhs.top_p.is_some() {
            self.top_p = rhs.top_p;
        }
        if rhs.top_k.is_some() {
            self.top_k = rhs.top_k;
        }
        if rhs.repetition_penalty.is_some() {
            self.repetition_penalty = rhs.repetition_penalty;
        }
        if rhs.repeat_last_n.is_some() {
            self.repeat_last_n = rhs.repeat_last_n;
        }
        if rhs.seed.is_some() {
            self.seed = rhs.seed;
        }
        if rhs.stop.is_some() {
            self.stop = rhs.stop.clone();
        }
    }
}

fn normalize_top_p(probability: f64) -> Option<f64> {
    (probability > 0.0 && probability < 1.0).then_some(probability)
}

fn normalize_top_k(top_k: usize) -> Option<usize> {
    (top_k > 0).then_some(top_k)
}

// TOML has no null, so a disabled filter is stored as its neutral value.
fn serialize_top_p<S: Serializer>(
    top_p: &Option<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(top_p.unwrap_or(1.0))
}

fn deserialize_top_p<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.and_then(normalize_top_p))
}

fn serialize_top_k<S: Serializer>(
    top_k: &Option<usize>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(top_k.unwrap_or(0) as u64)
}

fn deserialize_top_k<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<usize>, D::Error> {
    Ok(Option::<usize>::deserialize(deserializer)?.and_then(normalize_top_k))
}

/// GGUF architectures the server knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Llama,
    Gemma3,
    Qwen2,
}

impl ModelKind {
    /// Map the GGUF `general.architecture` value onto a kind.
    pub fn from_architecture(arch: &str) -> Option<Self> {
        match arch.trim().to_ascii_lowercase().as_str() {
            "llama" | "mistral" => Some(Self::Llama),
            "gemma3" => Some(Self::Gemma3),
            "qwen2" => Some(Self::Qwen2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llama => "llama",
            Self::Gemma3 => "gemma3",
            Self::Qwen2 => "qwen2",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared interface implemented by every text-generation backend.
pub trait TextModel: Send {
    fn kind(&self) -> ModelKind;
    fn device(&self) -> &Device;

    /// Maximum context the weights were trained for, when known.
    fn context_length(&self) -> Option<usize> {
        None
    }

    /// Run `tokens` starting at `index_pos` and return the logits of the last
    /// position. `index_pos == 0` starts a fresh sequence.
    fn forward(&mut self, tokens: &[u32], index_pos: usize) -> Result<Tensor>;
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// EOS token or stop string.
    Stop,
    /// Token budget or context window exhausted.
    Length,
    /// The consumer went away.
    Cancelled,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Event produced while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// Newly decoded text, safe to forward to the client.
    Delta(String),
}

/// Collected results from a generate call.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub generated_tokens: Vec<u32>,
}
