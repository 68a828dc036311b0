use llmserve_core::GenerationOutcome;
use rocket::{
    futures::{
        StreamExt,
        stream::{self, BoxStream},
    },
    response::stream::{Event, EventStream},
    tokio::sync::mpsc::UnboundedReceiver,
};
use serde::Serialize;
use tracing::error;

use crate::{
    error::ApiError,
    models::{ChatStreamChunk, CompletionChoice, CompletionStreamChunk},
};

/// Messages sent from the generation job to the SSE response.
#[derive(Debug)]
pub enum StreamMessage {
    Delta(String),
    Finished(GenerationOutcome),
    Failed(ApiError),
}

/// Chunk layout of the streamed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// `{"text", "finish_reason"}`
    Chat,
    /// `{"choice": {"text", "finish_reason"}, "usage"}`
    Completion,
}

pub type SseStream = EventStream<BoxStream<'static, Event>>;

pub const DONE_MARKER: &str = "[DONE]";

impl StreamFormat {
    fn delta(self, text: String) -> Event {
        match self {
            Self::Chat => json_event(&ChatStreamChunk {
                text,
                finish_reason: None,
            }),
            Self::Completion => json_event(&CompletionStreamChunk {
                choice: CompletionChoice {
                    text,
                    finish_reason: None,
                },
                usage: None,
            }),
        }
    }

    fn finish(self, outcome: &GenerationOutcome) -> Event {
        match self {
            Self::Chat => json_event(&ChatStreamChunk {
                text: String::new(),
                finish_reason: Some(outcome.finish_reason),
            }),
            Self::Completion => json_event(&CompletionStreamChunk {
                choice: CompletionChoice {
                    text: String::new(),
                    finish_reason: Some(outcome.finish_reason),
                },
                usage: Some(outcome.usage),
            }),
        }
    }
}

/// Rocket writes `data:` without a space; clients expect `data: <payload>`.
fn data_event(payload: &str) -> Event {
    Event::data(format!(" {payload}"))
}

fn json_event<T: Serialize>(value: &T) -> Event {
    match serde_json::to_string(value) {
        Ok(json) => data_event(&json),
        Err(err) => {
            error!(error = %err, "failed to encode stream chunk");
            Event::comment("chunk encoding failed")
        }
    }
}

fn error_event(err: &ApiError) -> Event {
    json_event(&err.body()).event("error")
}

enum StreamState {
    Open {
        rx: UnboundedReceiver<StreamMessage>,
        finished: bool,
    },
    Done,
}

/// Turn the job channel into an SSE body.
///
/// Deltas become data chunks, the outcome becomes a final chunk carrying
/// the finish reason, and `data: [DONE]` closes the stream. A failure is
/// reported as an `error` event and ends the stream without `[DONE]`.
pub fn sse_response(rx: UnboundedReceiver<StreamMessage>, format: StreamFormat) -> SseStream {
    let events = stream::unfold(
        StreamState::Open {
            rx,
            finished: false,
        },
        move |state| async move {
            let StreamState::Open { mut rx, finished } = state else {
                return None;
            };
            match rx.recv().await {
                Some(StreamMessage::Delta(text)) => {
                    Some((format.delta(text), StreamState::Open { rx, finished }))
                }
                Some(StreamMessage::Finished(outcome)) => Some((
                    format.finish(&outcome),
                    StreamState::Open { rx, finished: true },
                )),
                Some(StreamMessage::Failed(err)) => Some((error_event(&err), StreamState::Done)),
                None if finished => Some((data_event(DONE_MARKER), StreamState::Done)),
                None => Some((
                    error_event(&ApiError::Internal(
                        "generation ended before producing a result".to_string(),
                    )),
                    StreamState::Done,
                )),
            }
        },
    );
    EventStream::from(events.boxed())
}
