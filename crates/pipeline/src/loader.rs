use anyhow::Result;
use llmserve_config::{MissingFile, ModelResources};
use llmserve_core::{
    GgufModel, TextModel, Tokenizer, prepare_device, runtime::DeviceKind,
    tokenizer::load_tokenizer,
};

/// A freshly loaded model together with its tokenizer.
pub struct LoadedModel {
    pub model: Box<dyn TextModel>,
    pub tokenizer: Tokenizer,
}

/// Turns resolved registry resources into a runnable model.
pub trait ModelLoader: Send + Sync {
    /// First required file that is absent, checked before `load`.
    fn missing_resource(&self, resources: &ModelResources) -> Option<MissingFile> {
        resources.first_missing()
    }

    fn load(&self, resources: &ModelResources, device: DeviceKind) -> Result<LoadedModel>;
}

/// Loads GGUF weights with candle and a `tokenizer.json` next to them.
#[derive(Debug, Default)]
pub struct GgufLoader;

impl ModelLoader for GgufLoader {
    fn load(&self, resources: &ModelResources, device: DeviceKind) -> Result<LoadedModel> {
        let device = prepare_device(device)?;
        let model = GgufModel::load(&resources.weights, resources.kind, &device)?;
        let tokenizer = load_tokenizer(&resources.tokenizer)?;
        Ok(LoadedModel {
            model: Box::new(model),
            tokenizer,
        })
    }
}
