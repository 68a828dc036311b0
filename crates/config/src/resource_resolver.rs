use std::path::{Path, PathBuf};

use llmserve_core::ModelKind;

use crate::ModelEntry;

pub const DEFAULT_WEIGHTS_FILE: &str = "model.gguf";
pub const DEFAULT_TOKENIZER_FILE: &str = "tokenizer.json";

/// Concrete files backing one registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResources {
    pub id: String,
    pub kind: Option<ModelKind>,
    pub weights: PathBuf,
    pub tokenizer: PathBuf,
}

/// A required model file that is not on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFile {
    pub role: &'static str,
    pub path: PathBuf,
}

impl ModelResources {
    pub fn resolve(model_id: &str, entry: &ModelEntry, models_dir: &Path) -> Self {
        let model_dir = models_dir.join(model_id);
        Self {
            id: model_id.to_string(),
            kind: entry.kind,
            weights: entry
                .weights
                .clone()
                .unwrap_or_else(|| model_dir.join(DEFAULT_WEIGHTS_FILE)),
            tokenizer: entry
                .tokenizer
                .clone()
                .unwrap_or_else(|| model_dir.join(DEFAULT_TOKENIZER_FILE)),
        }
    }

    /// First required file that does not exist, weights before tokenizer.
    pub fn first_missing(&self) -> Option<MissingFile> {
        [("weights", &self.weights), ("tokenizer", &self.tokenizer)]
            .into_iter()
            .find(|(_, path)| !path.is_file())
            .map(|(role, path)| MissingFile {
                role,
                path: path.clone(),
            })
    }
}
