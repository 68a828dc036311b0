use clap::Parser;
use llmserve_config::{
    CommonInferenceArgs, CommonModelArgs, ServerBindArgs, build_config_overrides,
};
use llmserve_core::{PromptTemplate, runtime::DeviceKind};

#[derive(Parser, Debug)]
struct TestArgs {
    #[command(flatten)]
    model: CommonModelArgs,
    #[command(flatten)]
    inference: CommonInferenceArgs,
    #[command(flatten)]
    bind: ServerBindArgs,
}

#[test]
fn cli_flags_become_overrides() {
    let args = TestArgs::parse_from([
        "llmserve",
        "--model",
        "qwen",
        "--device",
        "cuda",
        "--template",
        "chatml",
        "--max-new-tokens",
        "16",
        "--stop",
        "###",
        "--stop",
        "END",
        "--port",
        "9001",
        "--no-warmup",
    ]);

    let overrides = build_config_overrides(&args.model, &args.inference, Some(&args.bind));

    assert_eq!(overrides.model_id.as_deref(), Some("qwen"));
    assert_eq!(overrides.inference.device, Some(DeviceKind::Cuda));
    assert_eq!(overrides.inference.template, Some(PromptTemplate::ChatMl));
    assert_eq!(overrides.inference.decode.max_new_tokens, Some(16));
    assert_eq!(
        overrides.inference.decode.stop,
        Some(vec!["###".to_string(), "END".to_string()])
    );
    assert_eq!(overrides.server.port, Some(9001));
    assert!(overrides.server.no_warmup);
}

#[test]
fn absent_flags_leave_everything_unset() {
    let args = TestArgs::parse_from(["llmserve"]);
    let overrides = build_config_overrides(&args.model, &args.inference, None);

    assert!(overrides.model_id.is_none());
    assert!(overrides.inference.device.is_none());
    assert!(overrides.inference.decode.stop.is_none());
    assert!(overrides.server.port.is_none());
    assert!(!overrides.server.no_warmup);
}

#[test]
fn warmup_and_no_warmup_conflict() {
    let result = TestArgs::try_parse_from(["llmserve", "--warmup", "a", "--no-warmup"]);
    assert!(result.is_err());
}
