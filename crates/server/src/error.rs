use llmserve_core::GenerationError;
use llmserve_pipeline::ManagerError;
use rocket::{
    Request,
    http::Status,
    response::{self, Responder, Response},
    serde::json::Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::queue::QueueError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    message: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            Self::BadRequest(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::Unavailable(_) => Status::ServiceUnavailable,
            Self::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "invalid_request_error",
            Self::NotFound(_) => "not_found_error",
            Self::Unavailable(_) => "service_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Prompt problems are the caller's fault; everything else is ours.
    pub fn from_generation(err: anyhow::Error) -> Self {
        match err.downcast_ref::<GenerationError>() {
            Some(generation) => Self::BadRequest(generation.to_string()),
            None => Self::Internal(format!("generation failed: {err:#}")),
        }
    }

    pub fn body(&self) -> serde_json::Value {
        let message = self.to_string();
        serde_json::to_value(ErrorBody {
            error: ErrorDetail {
                message: &message,
                kind: self.kind(),
            },
        })
        .unwrap_or_default()
    }
}

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::UnknownModel(_) => Self::NotFound(err.to_string()),
            ManagerError::MissingResource { .. } => Self::Internal(err.to_string()),
            ManagerError::Other(inner) => Self::Internal(format!("{inner:#}")),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Full => Self::Unavailable(err.to_string()),
            QueueError::Closed => Self::Unavailable("server is shutting down".to_string()),
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        if matches!(self, Self::Internal(_)) {
            error!(error = %self, "request failed");
        }
        Response::build_from(Json(self.body()).respond_to(req)?)
            .status(self.status())
            .ok()
    }
}
