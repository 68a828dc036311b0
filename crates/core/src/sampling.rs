use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use candle_core::{DType, Tensor};
use candle_transformers::{
    generation::{LogitsProcessor, Sampling},
    utils::apply_repeat_penalty,
};

use crate::DecodeParameters;

/// Picks the next token from a logits vector.
pub struct TokenSampler {
    processor: LogitsProcessor,
    repetition_penalty: f32,
    repeat_last_n: usize,
}

impl TokenSampler {
    pub fn new(params: &DecodeParameters) -> Self {
        let seed = params.seed.unwrap_or_else(time_seed);
        Self {
            processor: LogitsProcessor::from_sampling(seed, sampling_for(params)),
            repetition_penalty: params.repetition_penalty,
            repeat_last_n: params.repeat_last_n,
        }
    }

    /// `history` is the full token sequence so far (prompt included).
    pub fn sample(&mut self, logits: &Tensor, history: &[u32]) -> Result<u32> {
        let logits = logits.to_dtype(DType::F32)?;
        let logits = if (self.repetition_penalty - 1.0).abs() > f32::EPSILON
            && self.repeat_last_n > 0
        {
            let start = history.len().saturating_sub(self.repeat_last_n);
            apply_repeat_penalty(&logits, self.repetition_penalty, &history[start..])?
        } else {
            logits
        };
        Ok(self.processor.sample(&logits)?)
    }
}

pub fn sampling_for(params: &DecodeParameters) -> Sampling {
    if params.is_greedy() {
        return Sampling::ArgMax;
    }
    let temperature = params.temperature;
    match (params.top_k, params.top_p) {
        (None, None) => Sampling::All { temperature },
        (Some(k), None) => Sampling::TopK { k, temperature },
        (None, Some(p)) => Sampling::TopP { p, temperature },
        (Some(k), Some(p)) => Sampling::TopKThenTopP { k, p, temperature },
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(299_792_458)
}
