use std::time::Instant;

use anyhow::Result;
use candle_core::{IndexOp, Tensor};
use thiserror::Error;
use tokenizers::Tokenizer;
use tracing::debug;

use crate::{
    DecodeParameters, FinishReason, GenerationEvent, GenerationOutcome, TextModel, Usage,
    sampling::TokenSampler,
    streaming::{StreamStep, TextStreamer},
    tokenizer::encode,
};

/// Request-level failures a caller can report back as bad input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("prompt produced no tokens")]
    EmptyPrompt,
    #[error(
        "prompt is {prompt_tokens} tokens but the context window holds {context_length}"
    )]
    PromptTooLong {
        prompt_tokens: usize,
        context_length: usize,
    },
}

/// Model-level limits that apply to every request.
#[derive(Debug, Clone)]
pub struct GenerationLimits {
    pub context_length: usize,
    pub eos_token_ids: Vec<u32>,
}

/// Callback receiving decode events; return `false` to cancel.
pub type EventSink<'a> = &'a mut dyn FnMut(GenerationEvent) -> bool;

/// Prefill `prompt` once, then decode token by token until EOS, a stop
/// string, the token budget or the context window ends generation.
pub fn generate(
    model: &mut dyn TextModel,
    tokenizer: &Tokenizer,
    prompt: &str,
    params: &DecodeParameters,
    limits: &GenerationLimits,
    on_event: EventSink<'_>,
) -> Result<GenerationOutcome> {
    let prompt_ids = encode(tokenizer, prompt, true)?;
    if prompt_ids.is_empty() {
        return Err(GenerationError::EmptyPrompt.into());
    }
    if prompt_ids.len() >= limits.context_length {
        return Err(GenerationError::PromptTooLong {
            prompt_tokens: prompt_ids.len(),
            context_length: limits.context_length,
        }
        .into());
    }

    let budget = params
        .max_new_tokens
        .min(limits.context_length - prompt_ids.len());
    let start = Instant::now();
    let mut sampler = TokenSampler::new(params);
    let mut streamer = TextStreamer::new(tokenizer, &params.stop);
    let mut history = prompt_ids.clone();
    let mut generated = Vec::new();

    let finish_reason = if budget == 0 {
        FinishReason::Length
    } else {
        let mut logits = last_position(model.forward(&prompt_ids, 0)?)?;
        loop {
            let next = sampler.sample(&logits, &history)?;
            if limits.eos_token_ids.contains(&next) {
                if let Some(rest) = streamer.finish() {
                    on_event(GenerationEvent::Delta(rest));
                }
                break FinishReason::Stop;
            }

            generated.push(next);
            history.push(next);
            match streamer.push(next)? {
                StreamStep::Continue(delta) => {
                    if let Some(delta) = delta
                        && !on_event(GenerationEvent::Delta(delta))
                    {
                        break FinishReason::Cancelled;
                    }
                }
                StreamStep::Stopped(delta) => {
                    if let Some(delta) = delta {
                        on_event(GenerationEvent::Delta(delta));
                    }
                    break FinishReason::Stop;
                }
            }

            if generated.len() >= budget {
                if let Some(rest) = streamer.finish() {
                    on_event(GenerationEvent::Delta(rest));
                }
                break FinishReason::Length;
            }

            logits = last_position(model.forward(&[next], history.len() - 1)?)?;
        }
    };

    let usage = Usage::new(prompt_ids.len(), generated.len());
    let elapsed = start.elapsed();
    debug!(
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        finish_reason = %finish_reason,
        elapsed_ms = elapsed.as_millis() as u64,
        "generation finished"
    );

    Ok(GenerationOutcome {
        text: streamer.into_text(),
        finish_reason,
        usage,
        generated_tokens: generated,
    })
}

/// Reduce `[vocab]`, `[seq, vocab]` or `[batch, seq, vocab]` logits to the
/// last position.
fn last_position(logits: Tensor) -> Result<Tensor> {
    let logits = match logits.rank() {
        1 => logits,
        2 => {
            let rows = logits.dim(0)?;
            logits.i(rows - 1)?
        }
        3 => {
            let seq = logits.dim(1)?;
            logits.i((0, seq - 1))?
        }
        rank => anyhow::bail!("unexpected logits rank {rank}"),
    };
    Ok(logits)
}
