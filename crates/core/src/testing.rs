//! Deterministic stand-ins for a real checkpoint, shared by the workspace tests.

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use crate::{ModelKind, TextModel};

/// Vocabulary of [`word_tokenizer`]; the index is the token id.
pub const VOCAB: &[&str] = &[
    "[UNK]", "hello", "world", "<eos>", "the", "end", "stop", "here", "once", "upon", "a", "time",
];

pub const EOS_TOKEN: &str = "<eos>";

/// Id of `word` in [`VOCAB`].
pub fn token(word: &str) -> u32 {
    VOCAB
        .iter()
        .position(|candidate| *candidate == word)
        .map(|idx| idx as u32)
        .unwrap_or(0)
}

/// Whitespace word-level tokenizer over [`VOCAB`] with `<eos>` as a special token.
pub fn word_tokenizer() -> Tokenizer {
    let vocab = VOCAB
        .iter()
        .enumerate()
        .map(|(id, word)| format!("\"{word}\": {id}"))
        .collect::<Vec<_>>()
        .join(", ");
    let json = format!(
        r#"{{
          "version": "1.0",
          "truncation": null,
          "padding": null,
          "added_tokens": [
            {{"id": {eos}, "content": "{EOS_TOKEN}", "single_word": false, "lstrip": false,
              "rstrip": false, "normalized": false, "special": true}}
          ],
          "normalizer": null,
          "pre_tokenizer": {{"type": "Whitespace"}},
          "post_processor": null,
          "decoder": null,
          "model": {{
            "type": "WordLevel",
            "vocab": {{ {vocab} }},
            "unk_token": "[UNK]"
          }}
        }}"#,
        eos = token(EOS_TOKEN),
    );
    Tokenizer::from_bytes(json.as_bytes()).expect("word tokenizer json should parse")
}

/// One recorded `forward` call: number of input tokens and start position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardCall {
    pub tokens: usize,
    pub index_pos: usize,
}

/// Emits a fixed token script, one token per forward pass, then `<eos>`.
pub struct ScriptedModel {
    script: Vec<u32>,
    step: usize,
    device: Device,
    context_length: Option<usize>,
    fail_on_forward: bool,
    calls: Arc<Mutex<Vec<ForwardCall>>>,
}

impl ScriptedModel {
    pub fn new(words: &[&str]) -> Self {
        Self {
            script: words.iter().map(|word| token(word)).collect(),
            step: 0,
            device: Device::Cpu,
            context_length: None,
            fail_on_forward: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_context_length(mut self, context_length: usize) -> Self {
        self.context_length = Some(context_length);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_on_forward: true,
            ..Self::new(&[])
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<ForwardCall>>> {
        Arc::clone(&self.calls)
    }
}

impl TextModel for ScriptedModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Llama
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn context_length(&self) -> Option<usize> {
        self.context_length
    }

    fn forward(&mut self, tokens: &[u32], index_pos: usize) -> Result<Tensor> {
        if self.fail_on_forward {
            bail!("scripted forward failure");
        }
        if index_pos == 0 {
            self.step = 0;
        }
        self.calls
            .lock()
            .map_err(|_| anyhow!("forward call log poisoned"))?
            .push(ForwardCall {
                tokens: tokens.len(),
                index_pos,
            });

        let next = self
            .script
            .get(self.step)
            .copied()
            .unwrap_or_else(|| token(EOS_TOKEN));
        self.step += 1;

        let mut logits = vec![0.0_f32; VOCAB.len()];
        logits[next as usize] = 10.0;
        Ok(Tensor::from_vec(logits, (1, VOCAB.len()), &self.device)?)
    }
}
