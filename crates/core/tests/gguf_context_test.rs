use candle_transformers::models::quantized_llama::MAX_SEQ_LEN;
use llmserve_core::{ModelKind, gguf::usable_context_length};

#[test]
fn llama_context_is_capped_by_the_rotary_table() {
    assert_eq!(
        usable_context_length(ModelKind::Llama, Some(131_072)),
        Some(MAX_SEQ_LEN)
    );
    assert_eq!(usable_context_length(ModelKind::Llama, Some(2048)), Some(2048));
    assert_eq!(usable_context_length(ModelKind::Llama, None), Some(MAX_SEQ_LEN));
}

#[test]
fn other_architectures_keep_the_header_value() {
    assert_eq!(
        usable_context_length(ModelKind::Gemma3, Some(32_768)),
        Some(32_768)
    );
    assert_eq!(usable_context_length(ModelKind::Qwen2, None), None);
}
