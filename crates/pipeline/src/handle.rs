use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Result, anyhow};
use llmserve_config::InferenceSettings;
use llmserve_core::{
    DecodeParameters, DecodeParametersPatch, EventSink, GenerationLimits, GenerationOutcome,
    ModelKind, TextModel, Tokenizer, generate,
    tokenizer::{EOS_TOKEN_CANDIDATES, resolve_eos_tokens},
};

use crate::{
    ModelId,
    loader::LoadedModel,
    observer::{PipelineEvent, PipelineObserver},
};

/// How the prompt is turned into model input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptMode {
    /// Apply the model's prompt template and the chat stop strings.
    #[default]
    Chat,
    /// Feed the prompt verbatim.
    Raw,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub mode: PromptMode,
    pub decode: DecodeParametersPatch,
}

struct ModelSlot {
    id: ModelId,
    kind: ModelKind,
    model: Mutex<Box<dyn TextModel>>,
    tokenizer: Tokenizer,
    settings: InferenceSettings,
    limits: GenerationLimits,
    observer: Arc<dyn PipelineObserver>,
}

/// Cheap-to-clone handle on a resident model.
///
/// Generation on one handle is serialised by the model mutex.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<ModelSlot>,
}

impl ModelHandle {
    pub fn new(
        id: ModelId,
        loaded: LoadedModel,
        settings: InferenceSettings,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        let LoadedModel { model, tokenizer } = loaded;
        let context_length = match model.context_length() {
            Some(native) => settings.context_length.min(native),
            None => settings.context_length,
        };
        let limits = GenerationLimits {
            context_length,
            eos_token_ids: resolve_eos_tokens(&tokenizer, EOS_TOKEN_CANDIDATES),
        };
        Self {
            inner: Arc::new(ModelSlot {
                id,
                kind: model.kind(),
                model: Mutex::new(model),
                tokenizer,
                settings,
                limits,
                observer,
            }),
        }
    }

    pub fn id(&self) -> &ModelId {
        &self.inner.id
    }

    pub fn kind(&self) -> ModelKind {
        self.inner.kind
    }

    pub fn context_length(&self) -> usize {
        self.inner.limits.context_length
    }

    pub fn settings(&self) -> &InferenceSettings {
        &self.inner.settings
    }

    /// Prompt text and decode parameters after applying `request.mode`.
    pub fn prepare(&self, request: &GenerationRequest) -> (String, DecodeParameters) {
        let settings = &self.inner.settings;
        let mut params = settings.decode.clone() + &request.decode;
        let prompt = match request.mode {
            PromptMode::Chat => {
                for stop in &settings.chat_stop {
                    if !params.stop.contains(stop) {
                        params.stop.push(stop.clone());
                    }
                }
                settings.template.render(&request.prompt)
            }
            PromptMode::Raw => request.prompt.clone(),
        };
        (prompt, params)
    }

    pub fn generate(
        &self,
        request: &GenerationRequest,
        on_event: EventSink<'_>,
    ) -> Result<GenerationOutcome> {
        let slot = self.inner.as_ref();
        let (prompt, params) = self.prepare(request);

        slot.observer.on_event(&PipelineEvent::GenerationStarted {
            model_id: slot.id.clone(),
            max_new_tokens: params.max_new_tokens,
        });

        let start = Instant::now();
        let mut model = slot
            .model
            .lock()
            .map_err(|_| anyhow!("model `{}` mutex is poisoned", slot.id))?;
        let outcome = generate(
            &mut **model,
            &slot.tokenizer,
            &prompt,
            &params,
            &slot.limits,
            on_event,
        )?;
        drop(model);

        slot.observer.on_event(&PipelineEvent::GenerationFinished {
            model_id: slot.id.clone(),
            usage: outcome.usage,
            finish_reason: outcome.finish_reason,
            duration: start.elapsed(),
        });

        Ok(outcome)
    }
}
