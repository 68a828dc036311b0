use std::sync::Arc;

use llmserve_pipeline::{
    ModelId, ModelLoader, ModelManager, TracingObserver,
    llmserve_config::{AppConfig, InferenceOverride, InferenceSettings},
};
use rocket::tokio;
use tracing::{info, warn};

use crate::{error::ApiError, queue::InferenceQueue};

/// Shared server state: the model manager and the queue in front of it.
#[derive(Clone)]
pub struct AppState {
    manager: Arc<ModelManager>,
    queue: InferenceQueue,
}

impl AppState {
    pub fn bootstrap(
        config: Arc<AppConfig>,
        base_inference: InferenceSettings,
        inference_overrides: InferenceOverride,
    ) -> Self {
        let queue_capacity = config.server.queue_capacity;
        let manager = ModelManager::new(config, base_inference, inference_overrides)
            .with_observer(Arc::new(TracingObserver));
        Self::from_manager(manager, queue_capacity)
    }

    /// State backed by a custom loader, with the file settings as the only
    /// inference layer.
    pub fn with_loader(config: Arc<AppConfig>, loader: Arc<dyn ModelLoader>) -> Self {
        let queue_capacity = config.server.queue_capacity;
        let base_inference = config.inference.clone();
        let manager = ModelManager::new(config, base_inference, InferenceOverride::default())
            .with_loader(loader);
        Self::from_manager(manager, queue_capacity)
    }

    pub fn from_manager(manager: ModelManager, queue_capacity: usize) -> Self {
        Self {
            manager: Arc::new(manager),
            queue: InferenceQueue::new(queue_capacity),
        }
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    pub fn queue(&self) -> &InferenceQueue {
        &self.queue
    }

    pub fn config(&self) -> &AppConfig {
        self.manager.config()
    }

    /// Validate a request's model field against the registry.
    pub fn model_id(&self, raw: &str) -> Result<ModelId, ApiError> {
        let model_id = parse_model_id(raw)?;
        if !self.manager.is_configured(&model_id) {
            return Err(ApiError::NotFound(format!(
                "model `{model_id}` is not configured"
            )));
        }
        Ok(model_id)
    }

    /// Load the configured warmup model through the queue and run a
    /// one-token completion on it. Does nothing when warmup is disabled.
    pub async fn warmup(&self) -> Result<(), ApiError> {
        let Some(raw) = self.config().server.warmup.clone() else {
            return Ok(());
        };
        let model_id = self.model_id(&raw)?;
        info!(model = %model_id, "warming up model");

        let manager = Arc::clone(&self.manager);
        self.queue
            .enqueue(move || async move {
                tokio::task::spawn_blocking(move || manager.warmup(&model_id)).await
            })
            .await?
            .map_err(|err| ApiError::Internal(format!("warmup task failed: {err}")))?
            .map_err(ApiError::from)
    }

    /// Run [`AppState::warmup`] in the background; failures are logged only.
    pub fn spawn_warmup(&self) {
        let state = self.clone();
        tokio::spawn(async move {
            if let Err(err) = state.warmup().await {
                warn!(error = %err, "model warmup failed; models will load on first request");
            }
        });
    }

    pub fn shutdown(&self) {
        self.queue.shutdown();
        self.manager.unload_all();
        info!("server state released");
    }
}

pub fn parse_model_id(raw: &str) -> Result<ModelId, ApiError> {
    ModelId::try_from(raw).map_err(|err| ApiError::BadRequest(format!("invalid model id: {err}")))
}
