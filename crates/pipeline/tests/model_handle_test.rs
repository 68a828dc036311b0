use std::sync::Arc;

use anyhow::Result;
use llmserve_config::{AppConfig, InferenceOverride, InferenceSettings};
use llmserve_core::testing::{ScriptedModel, word_tokenizer};
use llmserve_core::{GenerationError, PromptTemplate};
use llmserve_pipeline::{
    DecodeParametersPatch, FinishReason, GenerationEvent, GenerationRequest, LoadedModel,
    ModelHandle, ModelId, NoopObserver, PromptMode,
};

fn handle(script: &[&str], settings: InferenceSettings) -> ModelHandle {
    ModelHandle::new(
        ModelId::try_from("scripted").unwrap(),
        LoadedModel {
            model: Box::new(ScriptedModel::new(script)),
            tokenizer: word_tokenizer(),
        },
        settings,
        Arc::new(NoopObserver),
    )
}

fn greedy_settings() -> InferenceSettings {
    let mut settings = AppConfig::default().inference;
    settings += &InferenceOverride {
        decode: DecodeParametersPatch {
            do_sample: Some(false),
            ..Default::default()
        },
        ..InferenceOverride::default()
    };
    settings
}

#[test]
fn chat_mode_renders_template_and_adds_chat_stops() {
    let mut settings = greedy_settings();
    settings.template = PromptTemplate::Gemma;
    let handle = handle(&[], settings);

    let (prompt, params) = handle.prepare(&GenerationRequest {
        prompt: "hello".to_string(),
        mode: PromptMode::Chat,
        decode: DecodeParametersPatch {
            stop: Some(vec!["<eos>".to_string(), "###".to_string()]),
            ..Default::default()
        },
    });

    assert_eq!(
        prompt,
        "<start_of_turn>user\nhello<end_of_turn>\n<start_of_turn>model\n"
    );
    assert_eq!(params.stop, vec!["<eos>", "###", "<|endoftext|>"]);
}

#[test]
fn raw_mode_sends_prompt_verbatim_without_chat_stops() {
    let mut settings = greedy_settings();
    settings.template = PromptTemplate::Gemma;
    let handle = handle(&[], settings);

    let (prompt, params) = handle.prepare(&GenerationRequest {
        prompt: "hello".to_string(),
        mode: PromptMode::Raw,
        decode: DecodeParametersPatch::default(),
    });

    assert_eq!(prompt, "hello");
    assert!(params.stop.is_empty());
}

#[test]
fn request_patch_overrides_model_settings() -> Result<()> {
    let handle = handle(&["once", "upon", "a", "time"], greedy_settings());
    let mut deltas = Vec::new();

    let outcome = handle.generate(
        &GenerationRequest {
            prompt: "hello".to_string(),
            mode: PromptMode::Raw,
            decode: DecodeParametersPatch {
                max_new_tokens: Some(3),
                ..Default::default()
            },
        },
        &mut |event| {
            let GenerationEvent::Delta(text) = event;
            deltas.push(text);
            true
        },
    )?;

    assert_eq!(outcome.text, "once upon a");
    assert_eq!(outcome.finish_reason, FinishReason::Length);
    assert_eq!(deltas.concat(), "once upon a");
    Ok(())
}

#[test]
fn context_length_comes_from_settings_when_model_has_none() {
    let mut settings = greedy_settings();
    settings.context_length = 3;
    let handle = handle(&["once"], settings);

    assert_eq!(handle.context_length(), 3);

    let err = handle
        .generate(
            &GenerationRequest {
                prompt: "hello world the".to_string(),
                mode: PromptMode::Raw,
                decode: DecodeParametersPatch::default(),
            },
            &mut |_| true,
        )
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GenerationError>(),
        Some(GenerationError::PromptTooLong { .. })
    ));
}
