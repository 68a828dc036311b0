use std::{fs::File, path::Path, time::Instant};

use anyhow::{Context, Result, anyhow};
use candle_core::{Device, Tensor, quantized::gguf_file};
use candle_transformers::models::{quantized_gemma3, quantized_llama, quantized_qwen2};
use tracing::info;

use crate::{ModelKind, TextModel, runtime::backend_label};

enum GgufWeights {
    Llama(quantized_llama::ModelWeights),
    Gemma3(quantized_gemma3::ModelWeights),
    Qwen2(quantized_qwen2::ModelWeights),
}

/// A quantized GGUF checkpoint loaded onto a candle device.
pub struct GgufModel {
    kind: ModelKind,
    device: Device,
    weights: GgufWeights,
    context_length: Option<usize>,
}

impl GgufModel {
    /// Load `path`, detecting the architecture from the file when `kind` is `None`.
    pub fn load(path: &Path, kind: Option<ModelKind>, device: &Device) -> Result<Self> {
        let start = Instant::now();
        let mut file = File::open(path)
            .with_context(|| format!("failed to open GGUF weights {}", path.display()))?;
        let content = gguf_file::Content::read(&mut file)
            .with_context(|| format!("failed to read GGUF header from {}", path.display()))?;

        let architecture = content
            .metadata
            .get("general.architecture")
            .and_then(|value| value.to_string().ok())
            .cloned();
        let kind = match kind {
            Some(kind) => kind,
            None => {
                let arch = architecture
                    .as_deref()
                    .ok_or_else(|| anyhow!("{} has no `general.architecture`", path.display()))?;
                ModelKind::from_architecture(arch)
                    .ok_or_else(|| anyhow!("unsupported GGUF architecture `{arch}`"))?
            }
        };
        let header_context = architecture
            .as_deref()
            .and_then(|arch| content.metadata.get(&format!("{arch}.context_length")))
            .and_then(|value| {
                value
                    .to_u32()
                    .map(|v| v as usize)
                    .or_else(|_| value.to_u64().map(|v| v as usize))
                    .ok()
            });
        let context_length = usable_context_length(kind, header_context);

        let weights = match kind {
            ModelKind::Llama => {
                GgufWeights::Llama(quantized_llama::ModelWeights::from_gguf(content, &mut file, device)?)
            }
            ModelKind::Gemma3 => GgufWeights::Gemma3(quantized_gemma3::ModelWeights::from_gguf(
                content, &mut file, device,
            )?),
            ModelKind::Qwen2 => {
                GgufWeights::Qwen2(quantized_qwen2::ModelWeights::from_gguf(content, &mut file, device)?)
            }
        };

        info!(
            path = %path.display(),
            kind = %kind,
            backend = backend_label(device),
            context_length = ?context_length,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "gguf weights loaded"
        );

        Ok(Self {
            kind,
            device: device.clone(),
            weights,
            context_length,
        })
    }
}

/// Context window the candle model can actually run.
///
/// `quantized_llama` precomputes rotary tables for `MAX_SEQ_LEN` positions
/// whatever the header advertises.
pub fn usable_context_length(kind: ModelKind, header: Option<usize>) -> Option<usize> {
    match kind {
        ModelKind::Llama => Some(
            header.map_or(quantized_llama::MAX_SEQ_LEN, |len| {
                len.min(quantized_llama::MAX_SEQ_LEN)
            }),
        ),
        ModelKind::Gemma3 | ModelKind::Qwen2 => header,
    }
}

impl TextModel for GgufModel {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn context_length(&self) -> Option<usize> {
        self.context_length
    }

    fn forward(&mut self, tokens: &[u32], index_pos: usize) -> Result<Tensor> {
        let input = Tensor::new(tokens, &self.device)?.unsqueeze(0)?;
        let logits = match &mut self.weights {
            GgufWeights::Llama(model) => model.forward(&input, index_pos)?,
            GgufWeights::Gemma3(model) => model.forward(&input, index_pos)?,
            GgufWeights::Qwen2(model) => model.forward(&input, index_pos)?,
        };
        Ok(logits)
    }
}
