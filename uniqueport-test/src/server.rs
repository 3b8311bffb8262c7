//! Mock Runtime API server management

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;
use uniqueport_core::ErrorResponse;

use crate::runtime_api::{runtime_api_router, Invocation, InvocationResult, RuntimeApiState};

/// Deadline given to queued invocations
const DEFAULT_DEADLINE_MS: i64 = 30_000;

/// A running emulated Runtime API on a random local port
pub struct MockRuntimeApi {
    addr: SocketAddr,
    invocation_tx: mpsc::Sender<Invocation>,
    state: Arc<RuntimeApiState>,
    handle: JoinHandle<()>,
}

/// Outcome of a queued invocation, resolves once the runtime reports it
pub struct PendingResult {
    pub request_id: String,
    rx: oneshot::Receiver<InvocationResult>,
}

impl PendingResult {
    /// Wait for the runtime to post the outcome
    pub async fn result(self) -> Result<InvocationResult, TestError> {
        self.rx.await.map_err(|_| TestError::Dropped(self.request_id))
    }
}

impl MockRuntimeApi {
    /// Start the server on `127.0.0.1` with an OS-assigned port
    pub async fn start() -> Result<Self, TestError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| TestError::StartFailed(e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| TestError::StartFailed(e.to_string()))?;

        let (invocation_tx, invocation_rx) = mpsc::channel(16);
        let state = Arc::new(RuntimeApiState::new(invocation_rx));
        let router = runtime_api_router(state.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "Mock Runtime API stopped");
            }
        });

        info!(addr = %addr, "Mock Runtime API listening");

        Ok(Self {
            addr,
            invocation_tx,
            state,
            handle,
        })
    }

    /// Endpoint in `AWS_LAMBDA_RUNTIME_API` form (`host:port`)
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    /// Queue an invocation with the given payload
    pub async fn invoke(&self, payload: impl Into<Bytes>) -> Result<PendingResult, TestError> {
        self.invoke_traced(payload, None).await
    }

    /// Queue an invocation carrying an X-Ray trace header
    pub async fn invoke_traced(
        &self,
        payload: impl Into<Bytes>,
        trace_id: Option<&str>,
    ) -> Result<PendingResult, TestError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let (response_tx, rx) = oneshot::channel();

        let invocation = Invocation {
            request_id: request_id.clone(),
            function_arn: "arn:aws:lambda:us-east-1:000000000000:function:uniqueport".to_string(),
            deadline_ms: chrono::Utc::now().timestamp_millis() + DEFAULT_DEADLINE_MS,
            trace_id: trace_id.map(str::to_string),
            payload: payload.into(),
            response_tx,
        };

        self.invocation_tx
            .send(invocation)
            .await
            .map_err(|_| TestError::Closed)?;

        Ok(PendingResult { request_id, rx })
    }

    /// Errors posted to `/runtime/init/error` so far
    pub async fn init_errors(&self) -> Vec<ErrorResponse> {
        self.state.init_errors().await
    }
}

impl Drop for MockRuntimeApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Errors from the mock Runtime API
#[derive(Debug)]
pub enum TestError {
    StartFailed(String),
    Closed,
    Dropped(String),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::StartFailed(msg) => write!(f, "Failed to start mock Runtime API: {}", msg),
            TestError::Closed => write!(f, "Mock Runtime API is no longer accepting invocations"),
            TestError::Dropped(id) => write!(f, "Invocation {} was dropped without an outcome", id),
        }
    }
}

impl std::error::Error for TestError {}
