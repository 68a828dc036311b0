pub mod args;
pub mod config;
pub mod resource_resolver;

pub use args::{CommonInferenceArgs, CommonModelArgs, ServerBindArgs, build_config_overrides};
pub use config::{
    AppConfig, CONFIG_ENV, ConfigDescriptor, ConfigOverrides, DEFAULT_MODEL_ID,
    InferenceOverride, InferenceSettings, ModelDefaults, ModelEntry, ModelRegistry,
    ServerOverride, ServerSettings, default_config_path, save_config,
};
pub use resource_resolver::{MissingFile, ModelResources};
