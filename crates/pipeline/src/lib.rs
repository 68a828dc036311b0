pub mod handle;
pub mod loader;
pub mod manager;
pub mod model;
pub mod observer;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use handle::{GenerationRequest, ModelHandle, PromptMode};
pub use loader::{GgufLoader, LoadedModel, ModelLoader};
pub use manager::{ManagerError, ModelListing, ModelManager, WARMUP_PROMPT};
pub use model::ModelId;
pub use observer::{NoopObserver, PipelineEvent, PipelineObserver, TracingObserver};

pub use llmserve_config;
pub use llmserve_core;
pub use llmserve_core::{
    DecodeParameters, DecodeParametersPatch, FinishReason, GenerationEvent, GenerationOutcome,
    ModelKind, Usage, runtime::DeviceKind,
};
