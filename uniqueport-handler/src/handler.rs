//! Invocation handler
//!
//! One call to [`InvocationHandler::handle`] per event: log the event and the
//! context, run the child with the serialized event, report the outcome
//! through the completion handle. The whole body runs inside a fault boundary
//! scoped to that single invocation, so a panic resolves this invocation as a
//! failure and nothing else.

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{error, info};
use uniqueport_core::{Done, InvocationContext, InvocationError, Outcome};

use crate::dump::{self, DumpLimits};
use crate::launcher::Launcher;

/// Handler that runs the bundled executable once per event
#[derive(Debug, Clone, Default)]
pub struct InvocationHandler {
    launcher: Launcher,
    limits: DumpLimits,
}

impl InvocationHandler {
    pub fn new(launcher: Launcher, limits: DumpLimits) -> Self {
        Self { launcher, limits }
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    /// Handle one event, reporting the outcome through `done`
    pub async fn handle(&self, event: Value, context: InvocationContext, done: Done) {
        let outcome = guarded(self.run(&event, &context)).await;

        match &outcome {
            Ok(()) => info!(request_id = %context.aws_request_id, "Invocation succeeded"),
            Err(e) => error!(
                request_id = %context.aws_request_id,
                error_type = e.error_type(),
                error = %e,
                "Invocation failed"
            ),
        }

        done.complete(outcome);
    }

    /// Handle one event and wait for its outcome
    pub async fn invoke(&self, event: Value, context: InvocationContext) -> Outcome {
        let (done, pending) = Done::channel();
        self.handle(event, context, done).await;
        pending.await
    }

    async fn run(&self, event: &Value, context: &InvocationContext) -> Outcome {
        info!("event {}", dump::render_value(event, &self.limits));
        info!("context {}", dump::render(context, &self.limits));

        let argument = serde_json::to_string(event)?;
        self.launcher
            .run(&argument, context.trace_id.as_deref())
            .await
    }
}

/// Poll `body` to completion, turning a panic into a failed outcome
pub async fn guarded<F>(body: F) -> Outcome
where
    F: Future<Output = Outcome>,
{
    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(InvocationError::Fault(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn explode(message: String) -> Outcome {
        panic!("{message}")
    }

    #[tokio::test]
    async fn test_guarded_passes_outcome_through() {
        assert!(guarded(async { Ok(()) }).await.is_ok());

        let err = guarded(async { Err(InvocationError::NonZeroExit(4)) })
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(4));
    }

    #[tokio::test]
    async fn test_guarded_catches_panic() {
        let err = guarded(explode("launcher exploded".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, InvocationError::Fault(_)));
        assert_eq!(err.to_string(), "Unhandled fault: launcher exploded");
    }

    #[tokio::test]
    async fn test_guarded_catches_formatted_panic() {
        let code = 7;
        let err = guarded(explode(format!("bad code {code}")))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Unhandled fault: bad code 7");
    }

    #[test]
    fn test_panic_message_non_string() {
        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), "panic with a non-string payload");
    }
}
