pub mod generation;
pub mod gguf;
pub mod inference;
pub mod runtime;
pub mod sampling;
pub mod streaming;
pub mod template;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tokenizer;

pub use generation::{EventSink, GenerationError, GenerationLimits, generate};
pub use gguf::GgufModel;
pub use inference::{
    DecodeParameters, DecodeParametersPatch, FinishReason, GenerationEvent, GenerationOutcome,
    ModelKind, TextModel, Usage,
};
pub use runtime::{DeviceKind, prepare_device};
pub use template::PromptTemplate;
pub use tokenizers::Tokenizer;
