use llmserve_pipeline::{DecodeParametersPatch, GenerationRequest, PromptMode};
use rocket::{
    Catcher, Either, Request, Route, State,
    http::Status,
    serde::json::Json,
};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::ApiError,
    generation,
    models::{
        GenerateRequest, GenerateResponse, HealthStatus, ModelInfo, ModelsResponse,
        UnloadResponse,
    },
    state::{AppState, parse_model_id},
    stream::{SseStream, StreamFormat, sse_response},
};

type GenerateReply = Either<Json<GenerateResponse>, SseStream>;

#[get("/health/live")]
fn live() -> Json<HealthStatus> {
    Json(HealthStatus { status: "online" })
}

#[get("/health/ready")]
fn ready(state: &State<AppState>) -> Result<Json<HealthStatus>, ApiError> {
    if !state.manager().is_ready() {
        return Err(ApiError::Unavailable(
            "model manager is still loading a model".to_string(),
        ));
    }
    Ok(Json(HealthStatus { status: "ready" }))
}

#[post("/chat/generate", format = "json", data = "<req>")]
async fn chat_generate(
    state: &State<AppState>,
    req: Json<GenerateRequest>,
) -> Result<GenerateReply, ApiError> {
    handle_generate(state, req.into_inner(), PromptMode::Chat, StreamFormat::Chat).await
}

#[post("/completion", format = "json", data = "<req>")]
async fn completion(
    state: &State<AppState>,
    req: Json<GenerateRequest>,
) -> Result<GenerateReply, ApiError> {
    handle_generate(
        state,
        req.into_inner(),
        PromptMode::Raw,
        StreamFormat::Completion,
    )
    .await
}

async fn handle_generate(
    state: &AppState,
    req: GenerateRequest,
    mode: PromptMode,
    format: StreamFormat,
) -> Result<GenerateReply, ApiError> {
    let model_id = state.model_id(&req.model)?;
    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        model = %model_id,
        ?mode,
        stream = req.stream,
        max_new_tokens = req.max_new_tokens,
        "generation request"
    );

    let request = GenerationRequest {
        prompt: req.prompt,
        mode,
        decode: DecodeParametersPatch {
            max_new_tokens: Some(req.max_new_tokens),
            ..Default::default()
        },
    };

    if req.stream {
        let rx = generation::generate_stream(state, model_id, request)?;
        return Ok(Either::Right(sse_response(rx, format)));
    }

    let outcome = generation::generate_once(state, model_id.clone(), request).await?;
    info!(
        %request_id,
        completion_tokens = outcome.usage.completion_tokens,
        finish_reason = ?outcome.finish_reason,
        "generation finished"
    );
    Ok(Either::Left(Json(GenerateResponse {
        model: model_id.to_string(),
        text: outcome.text,
        usage: outcome.usage,
    })))
}

/// Unloading a model that is not resident is not an error.
#[delete("/manage/unload/<model_id>")]
fn unload(state: &State<AppState>, model_id: &str) -> Result<Json<UnloadResponse>, ApiError> {
    let model_id = parse_model_id(model_id)?;
    let removed = state.manager().unload_model(&model_id);
    info!(model = %model_id, removed, "unload requested");
    Ok(Json(UnloadResponse {
        detail: format!("Model {model_id} unloaded successfully."),
    }))
}

#[get("/models")]
fn models(state: &State<AppState>) -> Json<ModelsResponse> {
    let data = state
        .manager()
        .available_models()
        .into_iter()
        .map(|listing| ModelInfo {
            id: listing.id.to_string(),
            object: "model",
            kind: listing.kind,
            loaded: listing.loaded,
        })
        .collect();
    Json(ModelsResponse {
        object: "list",
        data,
        queue_depth: state.queue().depth(),
    })
}

#[options("/<_..>")]
fn preflight() -> Status {
    Status::NoContent
}

pub fn v1_routes() -> Vec<Route> {
    routes![
        live,
        ready,
        chat_generate,
        completion,
        unload,
        models,
        preflight
    ]
}

/// Errors Rocket raises itself (bad JSON, unmatched routes) in the API's
/// error shape.
#[catch(default)]
fn api_catcher(status: Status, req: &Request<'_>) -> (Status, Json<Value>) {
    let reason = status.reason_lossy();
    let error = match status.code {
        400 | 422 => ApiError::BadRequest(format!("malformed request body: {reason}")),
        404 => ApiError::NotFound(format!("no route for {} {}", req.method(), req.uri())),
        503 => ApiError::Unavailable(reason.to_string()),
        _ => ApiError::Internal(reason.to_string()),
    };
    (status, Json(error.body()))
}

pub fn api_catchers() -> Vec<Catcher> {
    catchers![api_catcher]
}
