use std::sync::Arc;

use llmserve_pipeline::llmserve_config::AppConfig;
use llmserve_pipeline::testing::ScriptedLoader;
use llmserve_pipeline::{FinishReason, GenerationRequest, ModelId, PromptMode};
use llmserve_server::{
    generation::{DisconnectGuard, run_blocking, until_disconnected},
    state::AppState,
};

fn state() -> AppState {
    let mut config = AppConfig::default();
    config.server.warmup = None;
    config.inference.decode.do_sample = false;
    AppState::with_loader(
        Arc::new(config),
        Arc::new(ScriptedLoader::new(&["once", "upon", "a", "time"])),
    )
}

fn request() -> GenerationRequest {
    GenerationRequest {
        prompt: "hello world".to_string(),
        mode: PromptMode::Raw,
        decode: Default::default(),
    }
}

#[test]
fn connected_caller_receives_the_whole_completion() {
    let state = state();
    let model_id = ModelId::parse("gemma-3-1b").expect("valid id");
    let guard = DisconnectGuard::new();
    let flag = guard.flag();

    let mut sink = until_disconnected(&flag);
    let outcome = run_blocking(state.manager(), &model_id, &request(), &mut sink)
        .expect("generation succeeds");

    assert_eq!(outcome.finish_reason, FinishReason::Stop);
    assert_eq!(outcome.text, "once upon a time");
    drop(guard);
}

#[test]
fn dropped_caller_cancels_decoding_at_the_next_token() {
    let state = state();
    let model_id = ModelId::parse("gemma-3-1b").expect("valid id");
    let guard = DisconnectGuard::new();
    let flag = guard.flag();
    drop(guard);

    let mut sink = until_disconnected(&flag);
    let outcome = run_blocking(state.manager(), &model_id, &request(), &mut sink)
        .expect("generation succeeds");

    assert_eq!(outcome.finish_reason, FinishReason::Cancelled);
    assert_eq!(outcome.usage.completion_tokens, 1);
}
