//! One-shot completion protocol between the handler and its host
//!
//! The host creates a [`Done`]/[`Pending`] pair per invocation, hands `Done` to
//! the handler and awaits `Pending`. Every completion method on `Done` takes
//! `self`, so an invocation can report at most one outcome. If `Done` is
//! dropped without reporting, `Pending` resolves to
//! [`InvocationError::Abandoned`] rather than waiting forever.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::InvocationError;

/// Result of one invocation
pub type Outcome = Result<(), InvocationError>;

/// Completion handle given to the handler
#[derive(Debug)]
pub struct Done {
    tx: oneshot::Sender<Outcome>,
}

/// Host side of a completion, resolves once the handler reports
#[derive(Debug)]
pub struct Pending {
    rx: oneshot::Receiver<Outcome>,
}

impl Done {
    /// Create a linked completion pair
    pub fn channel() -> (Done, Pending) {
        let (tx, rx) = oneshot::channel();
        (Done { tx }, Pending { rx })
    }

    /// Report success with no result value
    pub fn succeed(self) {
        self.complete(Ok(()));
    }

    /// Report failure
    pub fn fail(self, error: InvocationError) {
        self.complete(Err(error));
    }

    pub fn complete(self, outcome: Outcome) {
        // Receiver gone means the host stopped waiting; nothing left to notify.
        let _ = self.tx.send(outcome);
    }
}

impl Future for Pending {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(InvocationError::Abandoned)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_succeed() {
        let (done, pending) = Done::channel();
        done.succeed();
        assert!(pending.await.is_ok());
    }

    #[tokio::test]
    async fn test_fail() {
        let (done, pending) = Done::channel();
        done.fail(InvocationError::NonZeroExit(3));

        let err = pending.await.unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
    }

    #[tokio::test]
    async fn test_dropped_done_is_abandoned() {
        let (done, pending) = Done::channel();
        drop(done);

        assert!(matches!(pending.await, Err(InvocationError::Abandoned)));
    }

    #[tokio::test]
    async fn test_complete_from_other_task() {
        let (done, pending) = Done::channel();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            done.complete(Err(InvocationError::Fault("boom".to_string())));
        });

        let err = pending.await.unwrap_err();
        assert_eq!(err.to_string(), "Unhandled fault: boom");
    }

    #[test]
    fn test_complete_after_host_gone() {
        let (done, pending) = Done::channel();
        drop(pending);
        done.succeed();
    }
}
