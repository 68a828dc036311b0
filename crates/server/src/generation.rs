use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use llmserve_pipeline::{
    GenerationEvent, GenerationOutcome, GenerationRequest, ModelId, ModelManager,
    llmserve_core::EventSink,
};
use rocket::tokio::{
    self,
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
};
use tracing::{error, warn};

use crate::{error::ApiError, state::AppState, stream::StreamMessage};

/// Resolve the model and decode on the current thread.
pub fn run_blocking(
    manager: &ModelManager,
    model_id: &ModelId,
    request: &GenerationRequest,
    on_event: EventSink<'_>,
) -> Result<GenerationOutcome, ApiError> {
    let handle = manager.get_model(model_id)?;
    handle
        .generate(request, on_event)
        .map_err(ApiError::from_generation)
}

/// Raises its flag when dropped, which happens when the HTTP caller goes
/// away before the request future completes.
pub struct DisconnectGuard {
    disconnected: Arc<AtomicBool>,
}

impl DisconnectGuard {
    pub fn new() -> Self {
        Self {
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.disconnected)
    }
}

impl Default for DisconnectGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

/// Sink that discards deltas and cancels once `disconnected` is set.
pub fn until_disconnected(disconnected: &AtomicBool) -> impl FnMut(GenerationEvent) -> bool + '_ {
    move |_| !disconnected.load(Ordering::SeqCst)
}

/// Queue a generation and wait for the full completion.
///
/// Dropping the returned future cancels decoding at the next token.
pub async fn generate_once(
    state: &AppState,
    model_id: ModelId,
    request: GenerationRequest,
) -> Result<GenerationOutcome, ApiError> {
    let manager = Arc::clone(state.manager());
    let guard = DisconnectGuard::new();
    let disconnected = guard.flag();
    let result = state
        .queue()
        .enqueue(move || async move {
            tokio::task::spawn_blocking(move || {
                let mut sink = until_disconnected(&disconnected);
                run_blocking(&manager, &model_id, &request, &mut sink)
            })
            .await
        })
        .await?
        .map_err(|err| ApiError::Internal(format!("generation task failed: {err}")))?;
    drop(guard);
    result
}

/// Queue a generation whose deltas are forwarded as they are decoded.
///
/// The channel ends with either `Finished` or `Failed`. Dropping the
/// receiver cancels decoding at the next token.
pub fn generate_stream(
    state: &AppState,
    model_id: ModelId,
    request: GenerationRequest,
) -> Result<UnboundedReceiver<StreamMessage>, ApiError> {
    let manager = Arc::clone(state.manager());
    let rx = state.queue().enqueue_stream(move |tx: UnboundedSender<StreamMessage>| async move {
        let joined = tokio::task::spawn_blocking(move || {
            let mut forward = |event: GenerationEvent| match event {
                GenerationEvent::Delta(text) => tx.send(StreamMessage::Delta(text)).is_ok(),
            };
            let message = match run_blocking(&manager, &model_id, &request, &mut forward) {
                Ok(outcome) => StreamMessage::Finished(outcome),
                Err(err) => {
                    warn!(model = %model_id, error = %err, "stream generation failed");
                    StreamMessage::Failed(err)
                }
            };
            let _ = tx.send(message);
        })
        .await;
        if let Err(err) = joined {
            error!(error = %err, "stream generation task failed");
        }
    })?;
    Ok(rx)
}
