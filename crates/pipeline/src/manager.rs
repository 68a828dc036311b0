use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use llmserve_config::{AppConfig, InferenceOverride, InferenceSettings};
use llmserve_core::{DecodeParametersPatch, ModelKind};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    ModelId,
    handle::{GenerationRequest, ModelHandle, PromptMode},
    loader::{GgufLoader, ModelLoader},
    observer::{NoopObserver, PipelineEvent, PipelineObserver},
};

pub const WARMUP_PROMPT: &str = "Warmup";

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("model `{0}` is not configured")]
    UnknownModel(String),
    #[error("{role} for model `{model_id}` not found at {path}")]
    MissingResource {
        model_id: String,
        role: &'static str,
        path: String,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Registry entry as exposed to API listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelListing {
    pub id: ModelId,
    pub kind: Option<ModelKind>,
    pub loaded: bool,
}

/// Owns the resident model.
///
/// At most one model is resident: loading a model first drops every other
/// one. Loads are serialised by `load_lock` and re-check residency once the
/// lock is held, so concurrent requests for the same id load it once.
pub struct ModelManager {
    config: Arc<AppConfig>,
    base_inference: InferenceSettings,
    runtime_overrides: InferenceOverride,
    loader: Arc<dyn ModelLoader>,
    observer: Arc<dyn PipelineObserver>,
    resident: Mutex<HashMap<ModelId, ModelHandle>>,
    load_lock: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ModelManager {
    pub fn new(
        config: Arc<AppConfig>,
        base_inference: InferenceSettings,
        runtime_overrides: InferenceOverride,
    ) -> Self {
        Self {
            config,
            base_inference,
            runtime_overrides,
            loader: Arc::new(GgufLoader),
            observer: Arc::new(NoopObserver),
            resident: Mutex::new(HashMap::new()),
            load_lock: Mutex::new(()),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ModelLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn observer(&self) -> &dyn PipelineObserver {
        self.observer.as_ref()
    }

    pub fn is_configured(&self, model_id: &ModelId) -> bool {
        self.config.models.entries.contains_key(model_id.as_str())
    }

    pub fn available_models(&self) -> Vec<ModelListing> {
        let resident = lock(&self.resident);
        self.config
            .models
            .entries
            .iter()
            .filter_map(|(id, entry)| {
                let id = ModelId::try_from(id.as_str()).ok()?;
                Some(ModelListing {
                    loaded: resident.contains_key(&id),
                    kind: resident.get(&id).map(ModelHandle::kind).or(entry.kind),
                    id,
                })
            })
            .collect()
    }

    pub fn loaded_models(&self) -> Vec<ModelId> {
        let mut ids = lock(&self.resident).keys().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn is_ready(&self) -> bool {
        !lock(&self.resident).is_empty()
    }

    /// Return the resident handle for `model_id`, loading it if needed.
    pub fn get_model(&self, model_id: &ModelId) -> Result<ModelHandle, ManagerError> {
        if let Some(handle) = lock(&self.resident).get(model_id).cloned() {
            return Ok(handle);
        }
        if !self.is_configured(model_id) {
            return Err(ManagerError::UnknownModel(model_id.to_string()));
        }

        let _load_guard = lock(&self.load_lock);
        if let Some(handle) = lock(&self.resident).get(model_id).cloned() {
            return Ok(handle);
        }

        let evicted = lock(&self.resident)
            .drain()
            .map(|(id, _)| id)
            .collect::<Vec<_>>();
        for id in evicted {
            info!(model = %id, incoming = %model_id, "unloading resident model before load");
            self.observer
                .on_event(&PipelineEvent::ModelUnloaded { model_id: id });
        }

        let handle = self.load_uncached(model_id)?;
        lock(&self.resident).insert(model_id.clone(), handle.clone());
        Ok(handle)
    }

    fn load_uncached(&self, model_id: &ModelId) -> Result<ModelHandle, ManagerError> {
        let resources = self.config.model_resources(model_id.as_str())?;
        if let Some(missing) = self.loader.missing_resource(&resources) {
            return Err(ManagerError::MissingResource {
                model_id: model_id.to_string(),
                role: missing.role,
                path: missing.path.display().to_string(),
            });
        }
        let settings = self.config.effective_inference_for_model(
            model_id.as_str(),
            &self.base_inference,
            &self.runtime_overrides,
        )?;

        self.observer.on_event(&PipelineEvent::ModelLoadStarted {
            model_id: model_id.clone(),
        });
        let start = Instant::now();
        let loaded = self.loader.load(&resources, settings.device)?;
        let handle = ModelHandle::new(
            model_id.clone(),
            loaded,
            settings,
            Arc::clone(&self.observer),
        );
        self.observer.on_event(&PipelineEvent::ModelLoadFinished {
            model_id: model_id.clone(),
            kind: handle.kind(),
            context_length: handle.context_length(),
            duration: start.elapsed(),
        });

        Ok(handle)
    }

    /// Drop `model_id` if it is resident. Returns whether anything was dropped.
    pub fn unload_model(&self, model_id: &ModelId) -> bool {
        let removed = lock(&self.resident).remove(model_id).is_some();
        if removed {
            self.observer.on_event(&PipelineEvent::ModelUnloaded {
                model_id: model_id.clone(),
            });
        }
        removed
    }

    pub fn unload_all(&self) {
        let ids = lock(&self.resident)
            .drain()
            .map(|(id, _)| id)
            .collect::<Vec<_>>();
        for id in ids {
            self.observer
                .on_event(&PipelineEvent::ModelUnloaded { model_id: id });
        }
    }

    /// Load `model_id` and run a one-token raw completion through it.
    pub fn warmup(&self, model_id: &ModelId) -> Result<(), ManagerError> {
        let handle = self.get_model(model_id)?;
        let request = GenerationRequest {
            prompt: WARMUP_PROMPT.to_string(),
            mode: PromptMode::Raw,
            decode: DecodeParametersPatch {
                max_new_tokens: Some(1),
                ..Default::default()
            },
        };
        let outcome = handle.generate(&request, &mut |_| true).inspect_err(|err| {
            warn!(model = %model_id, error = %err, "warmup completion failed");
        })?;
        info!(
            model = %model_id,
            completion_tokens = outcome.usage.completion_tokens,
            "warmup finished"
        );
        Ok(())
    }
}
