//! HTTP handlers for the relay API

use crate::server::ServerState;
use crate::types::{CancelRequest, CancelResponse, HealthResponse, StreamRequest};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatstream_core::{
    create_event_channel, ChatStreamError, EventPublisher, SessionHandle, StreamPipeline,
};
use futures_util::stream::{BoxStream, StreamExt};
use std::convert::Infallible;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::{oneshot, Semaphore};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

/// Cap on concurrently open streams, shared across handlers
fn stream_semaphore() -> Arc<Semaphore> {
    static STREAM_SEMAPHORE: OnceLock<Arc<Semaphore>> = OnceLock::new();
    STREAM_SEMAPHORE
        .get_or_init(|| {
            let max_concurrent = std::env::var("MAX_CONCURRENT_STREAMS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(64);
            Arc::new(Semaphore::new(max_concurrent))
        })
        .clone()
}

/// Streaming handler (SSE)
pub async fn stream_handler(
    State(state): State<ServerState>,
    Json(request): Json<StreamRequest>,
) -> Response {
    info!(
        "STREAM_REQUEST type={} question_len={} session_key={} profile={:?}",
        request.request_type,
        request.question.len(),
        request.session_key.as_deref().unwrap_or("-"),
        request.client_profile
    );

    if let Err(msg) = request.validate() {
        warn!("STREAM_REJECTED reason={}", msg);
        return ApiError::BadRequest(msg).into_response();
    }

    let session_key = request
        .session_key
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let (sender, receiver) = create_event_channel(state.stream.channel_capacity);
    let publisher = Arc::new(EventPublisher::new(sender));

    // Build the SSE stream up front so capacity rejection can still go
    // out through the channel as a proper error frame.
    let sse_stream: BoxStream<'static, std::result::Result<Event, Infallible>> =
        ReceiverStream::new(receiver)
            .filter_map(|event| async move {
                match serde_json::to_string(&event) {
                    Ok(data) => Some(Ok(Event::default().data(data))),
                    Err(e) => {
                        error!("SSE_ENCODE_FAILED err={}", e);
                        None
                    }
                }
            })
            .boxed();

    let permit = match stream_semaphore().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            warn!("STREAM_CAPACITY session={} rejected", session_key);
            let publisher = publisher.clone();
            tokio::spawn(async move {
                publisher.fail("Server at capacity, please retry").await;
            });
            return Sse::new(sse_stream).into_response();
        }
    };

    let (abort_tx, abort_rx) = oneshot::channel();
    state
        .registry
        .register(&session_key, SessionHandle::new(abort_tx, publisher.clone()));

    tokio::spawn(run_stream_job(
        state.clone(),
        request,
        session_key,
        publisher,
        abort_rx,
        permit,
    ));

    Sse::new(sse_stream).into_response()
}

/// Drive one session: forward upstream, relay events, enforce the
/// deadline, and always release the registry entry on the way out.
async fn run_stream_job(
    state: ServerState,
    request: StreamRequest,
    session_key: String,
    publisher: Arc<EventPublisher>,
    abort_rx: oneshot::Receiver<()>,
    permit: tokio::sync::OwnedSemaphorePermit,
) {
    let _permit = permit;
    let started = Instant::now();
    let buffer_size = state.stream.buffer_size_for(request.client_profile);
    let mut pipeline = StreamPipeline::new(publisher.clone(), buffer_size);

    let outcome = tokio::select! {
        res = tokio::time::timeout(
            state.stream.session_timeout,
            state.upstream.stream(&request, &session_key, &mut pipeline),
        ) => Some(res),
        _ = abort_rx => None,
    };

    match outcome {
        // Upstream drove the pipeline to a terminal event.
        Some(Ok(())) => {}
        // Deadline expired: partial delivery beats an indefinite hang.
        Some(Err(_elapsed)) => {
            finish_on_deadline(&pipeline, &publisher).await;
        }
        // Cancelled; the registry already closed the publisher.
        None => {
            debug!("STREAM_ABORTED session={}", session_key);
        }
    }

    publisher.close_once().await;
    state.registry.cleanup_if(&session_key, &publisher);

    let (overflows, dropped_lines) = pipeline.counters();
    info!(
        "STREAM_CLOSE session={} state={:?} elapsed_ms={} assembled_len={} overflows={} dropped_lines={}",
        session_key,
        publisher.state().await,
        started.elapsed().as_millis(),
        pipeline.assembled().len(),
        overflows,
        dropped_lines
    );
}

/// Force a terminal state at the deadline: `complete` with whatever
/// content was assembled, or `error` when there is none.
async fn finish_on_deadline(pipeline: &StreamPipeline, publisher: &EventPublisher) {
    let assembled = pipeline.assembled();
    if assembled.is_empty() {
        publisher
            .fail("The request timed out before any content arrived")
            .await;
    } else {
        warn!(
            "STREAM_DEADLINE delivering partial content len={}",
            assembled.len()
        );
        publisher.complete(assembled.to_string()).await;
    }
}

/// Cancel handler; a no-op success when the session is unknown or done
pub async fn cancel_handler(
    State(state): State<ServerState>,
    Json(request): Json<CancelRequest>,
) -> Json<CancelResponse> {
    let cancelled = state.registry.cancel(&request.session_key).await;
    info!(
        "STREAM_CANCEL session={} cancelled={}",
        request.session_key, cancelled
    );
    Json(CancelResponse {
        success: true,
        cancelled,
    })
}

/// Health check
pub async fn health_check(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_sessions: state.registry.active_count(),
    })
}

/// API error responses
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": message,
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<ChatStreamError> for ApiError {
    fn from(err: ChatStreamError) -> Self {
        error!("ChatStreamError: {}", err);
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatstream_core::{EventKind, SessionState};

    #[test]
    fn test_api_error_response() {
        let err = ApiError::BadRequest("test error".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_deadline_with_partial_content_completes() {
        let (sender, mut receiver) = create_event_channel(16);
        let publisher = Arc::new(EventPublisher::new(sender));
        let mut pipeline = StreamPipeline::new(publisher.clone(), 1024);

        // Upstream produced content but never sent an explicit end.
        pipeline
            .handle_chunk(b"{\"content\":\"partial answer\"}\n")
            .await;
        finish_on_deadline(&pipeline, &publisher).await;

        let chunk = receiver.recv().await.unwrap();
        assert_eq!(chunk.kind, EventKind::Chunk);
        let terminal = receiver.recv().await.unwrap();
        assert_eq!(terminal.kind, EventKind::Complete);
        assert_eq!(terminal.content, "partial answer");
        assert!(receiver.recv().await.is_none());
        assert_eq!(publisher.state().await, SessionState::Completed);
    }

    #[tokio::test]
    async fn test_deadline_with_no_content_errors() {
        let (sender, mut receiver) = create_event_channel(16);
        let publisher = Arc::new(EventPublisher::new(sender));
        let pipeline = StreamPipeline::new(publisher.clone(), 1024);

        finish_on_deadline(&pipeline, &publisher).await;

        let terminal = receiver.recv().await.unwrap();
        assert_eq!(terminal.kind, EventKind::Error);
        assert_eq!(publisher.state().await, SessionState::Errored);
    }
}
