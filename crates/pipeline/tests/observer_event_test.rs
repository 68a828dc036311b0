use std::time::Duration;

use llmserve_pipeline::{FinishReason, ModelId, ModelKind, PipelineEvent, Usage};

fn model(id: &str) -> ModelId {
    ModelId::try_from(id).expect("valid model id")
}

#[test]
fn serialize_includes_all_fields_and_formats_duration() {
    let event = PipelineEvent::ModelLoadFinished {
        model_id: model("gemma-3-1b"),
        kind: ModelKind::Gemma3,
        context_length: 2048,
        duration: Duration::from_millis(1234),
    };

    let json = serde_json::to_string(&event).expect("serialize");

    assert!(json.contains("\"kind\":\"model_load_finished\""));
    assert!(json.contains("\"model_id\":\"gemma-3-1b\""));
    assert!(json.contains("\"model_kind\":\"gemma3\""));
    assert!(json.contains("\"context_length\":2048"));
    assert!(json.contains("\"duration_s\":\"1.234s\""));
}

#[test]
fn display_is_human_readable() {
    let event = PipelineEvent::GenerationFinished {
        model_id: model("qwen2-0.5b"),
        usage: Usage::new(10, 20),
        finish_reason: FinishReason::Length,
        duration: Duration::from_micros(5_550_000),
    };

    let text = event.to_string();

    assert!(text.starts_with("GenerationFinished qwen2-0.5b"));
    assert!(text.contains("prompt_tokens=10"));
    assert!(text.contains("completion_tokens=20"));
    assert!(text.contains("finish_reason=length"));
    assert!(text.contains("5.550s"));
}

#[test]
fn unload_event_serializes_with_kind_tag() {
    let event = PipelineEvent::ModelUnloaded {
        model_id: model("gemma-3-1b"),
    };

    let value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(
        value,
        serde_json::json!({"kind": "model_unloaded", "model_id": "gemma-3-1b"})
    );
    assert_eq!(event.to_string(), "ModelUnloaded gemma-3-1b");
}

#[test]
fn duration_format_matches_three_decimal_seconds() {
    let event = PipelineEvent::ModelLoadFinished {
        model_id: model("llama"),
        kind: ModelKind::Llama,
        context_length: 4096,
        duration: Duration::from_nanos(987_654_321),
    };

    let json = serde_json::to_string(&event).expect("serialize");

    assert!(json.contains("\"duration_s\":\"0.988s\""));
}
