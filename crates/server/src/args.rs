use clap::Parser;
use llmserve_pipeline::llmserve_config::{
    CommonInferenceArgs, CommonModelArgs, ConfigOverrides, ServerBindArgs, build_config_overrides,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Local LLM inference server", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub model: CommonModelArgs,

    #[command(flatten)]
    pub inference: CommonInferenceArgs,

    #[command(flatten)]
    pub bind: ServerBindArgs,
}

impl From<&Args> for ConfigOverrides {
    fn from(args: &Args) -> Self {
        build_config_overrides(&args.model, &args.inference, Some(&args.bind))
    }
}
