//! Emulated Lambda Runtime API
//!
//! Serves the endpoints a custom runtime talks to, fed by a channel of
//! queued invocations. Each posted response or error is routed back to the
//! test that queued the invocation.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error};
use uniqueport_core::ErrorResponse;

/// Invocation waiting to be picked up by the runtime
pub struct Invocation {
    pub request_id: String,
    pub function_arn: String,
    pub deadline_ms: i64,
    pub trace_id: Option<String>,
    pub payload: Bytes,
    pub response_tx: oneshot::Sender<InvocationResult>,
}

/// What the runtime reported for an invocation
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    /// `POST /runtime/invocation/{id}/response`
    Response(Bytes),
    /// `POST /runtime/invocation/{id}/error`
    Error {
        error_type: String,
        response: ErrorResponse,
    },
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Response(_))
    }
}

/// State for the Runtime API server
pub struct RuntimeApiState {
    invocation_rx: Mutex<mpsc::Receiver<Invocation>>,
    current_invocation: Mutex<Option<ActiveInvocation>>,
    init_errors: Mutex<Vec<ErrorResponse>>,
}

struct ActiveInvocation {
    request_id: String,
    response_tx: oneshot::Sender<InvocationResult>,
}

impl RuntimeApiState {
    pub fn new(invocation_rx: mpsc::Receiver<Invocation>) -> Self {
        Self {
            invocation_rx: Mutex::new(invocation_rx),
            current_invocation: Mutex::new(None),
            init_errors: Mutex::new(Vec::new()),
        }
    }

    pub async fn init_errors(&self) -> Vec<ErrorResponse> {
        self.init_errors.lock().await.clone()
    }
}

/// Create the Runtime API router
pub fn runtime_api_router(state: Arc<RuntimeApiState>) -> Router {
    Router::new()
        .route(
            "/2018-06-01/runtime/invocation/next",
            get(get_next_invocation),
        )
        .route(
            "/2018-06-01/runtime/invocation/:request_id/response",
            post(post_invocation_response),
        )
        .route(
            "/2018-06-01/runtime/invocation/:request_id/error",
            post(post_invocation_error),
        )
        .route("/2018-06-01/runtime/init/error", post(post_init_error))
        .with_state(state)
}

/// GET /runtime/invocation/next
///
/// Blocks until an invocation is queued, then returns it.
async fn get_next_invocation(State(state): State<Arc<RuntimeApiState>>) -> Response {
    debug!("Runtime requesting next invocation");

    let invocation = {
        let mut rx = state.invocation_rx.lock().await;
        match rx.recv().await {
            Some(inv) => inv,
            None => {
                return (StatusCode::INTERNAL_SERVER_ERROR, "Invocation channel closed")
                    .into_response();
            }
        }
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("Lambda-Runtime-Aws-Request-Id", &invocation.request_id)
        .header(
            "Lambda-Runtime-Invoked-Function-Arn",
            &invocation.function_arn,
        )
        .header(
            "Lambda-Runtime-Deadline-Ms",
            invocation.deadline_ms.to_string(),
        );
    if let Some(trace_id) = &invocation.trace_id {
        builder = builder.header("Lambda-Runtime-Trace-Id", trace_id);
    }

    debug!(request_id = %invocation.request_id, "Delivering invocation to runtime");

    let response = builder.body(Body::from(invocation.payload));

    *state.current_invocation.lock().await = Some(ActiveInvocation {
        request_id: invocation.request_id,
        response_tx: invocation.response_tx,
    });

    response.unwrap_or_else(|e| {
        error!(error = %e, "Failed to build invocation response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

/// POST /runtime/invocation/{requestId}/response
async fn post_invocation_response(
    State(state): State<Arc<RuntimeApiState>>,
    Path(request_id): Path<String>,
    body: Bytes,
) -> StatusCode {
    debug!(request_id = %request_id, "Runtime sending response");
    complete(&state, &request_id, InvocationResult::Response(body)).await
}

/// POST /runtime/invocation/{requestId}/error
async fn post_invocation_error(
    State(state): State<Arc<RuntimeApiState>>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let error_type = header_or(&headers, "Runtime.UnhandledError");

    debug!(request_id = %request_id, error_type = %error_type, "Runtime sending error");

    let response = parse_error(&error_type, &body);
    complete(
        &state,
        &request_id,
        InvocationResult::Error {
            error_type,
            response,
        },
    )
    .await
}

/// POST /runtime/init/error
async fn post_init_error(
    State(state): State<Arc<RuntimeApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let error_type = header_or(&headers, "Runtime.InitError");

    error!(
        error_type = %error_type,
        body = %String::from_utf8_lossy(&body),
        "Runtime initialization error"
    );

    state
        .init_errors
        .lock()
        .await
        .push(parse_error(&error_type, &body));

    StatusCode::ACCEPTED
}

async fn complete(
    state: &RuntimeApiState,
    request_id: &str,
    result: InvocationResult,
) -> StatusCode {
    let mut current = state.current_invocation.lock().await;

    match current.take() {
        Some(invocation) if invocation.request_id == request_id => {
            let _ = invocation.response_tx.send(result);
            StatusCode::ACCEPTED
        }
        Some(invocation) => {
            error!(
                expected = %invocation.request_id,
                received = %request_id,
                "Request ID mismatch"
            );
            *current = Some(invocation);
            StatusCode::BAD_REQUEST
        }
        None => {
            error!(request_id = %request_id, "No active invocation");
            StatusCode::BAD_REQUEST
        }
    }
}

fn header_or(headers: &HeaderMap, default: &str) -> String {
    headers
        .get("Lambda-Runtime-Function-Error-Type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(default)
        .to_string()
}

fn parse_error(error_type: &str, body: &[u8]) -> ErrorResponse {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| ErrorResponse::new(error_type, String::from_utf8_lossy(body)))
}
