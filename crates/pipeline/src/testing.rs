//! In-memory loader for exercising the manager and HTTP layer without weights.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use llmserve_config::{MissingFile, ModelResources};
use llmserve_core::{
    runtime::DeviceKind,
    testing::{ScriptedModel, word_tokenizer},
};

use crate::loader::{LoadedModel, ModelLoader};

/// Hands out [`ScriptedModel`]s that emit `script` for every prompt.
pub struct ScriptedLoader {
    script: Vec<String>,
    delay: Option<Duration>,
    fail_with: Option<String>,
    loads: AtomicUsize,
}

impl ScriptedLoader {
    pub fn new(script: &[&str]) -> Self {
        Self {
            script: script.iter().map(|word| word.to_string()).collect(),
            delay: None,
            fail_with: None,
            loads: AtomicUsize::new(0),
        }
    }

    /// Sleep inside `load`, widening the window for concurrent callers.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(&[])
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for ScriptedLoader {
    fn missing_resource(&self, _resources: &ModelResources) -> Option<MissingFile> {
        None
    }

    fn load(&self, _resources: &ModelResources, _device: DeviceKind) -> Result<LoadedModel> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if let Some(message) = &self.fail_with {
            bail!("{message}");
        }
        let words = self.script.iter().map(String::as_str).collect::<Vec<_>>();
        Ok(LoadedModel {
            model: Box::new(ScriptedModel::new(&words)),
            tokenizer: word_tokenizer(),
        })
    }
}
