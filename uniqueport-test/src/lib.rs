//! Test utilities for the uniqueport Lambda handler
//!
//! Provides an emulated Lambda Runtime API to drive the runtime loop and the
//! `bootstrap` binary in integration tests:
//! - queue invocations with arbitrary payloads
//! - collect the response or error the runtime posts back
//! - inspect init errors
//!
//! ## Usage
//!
//! ```rust,no_run
//! use uniqueport_test::MockRuntimeApi;
//!
//! #[tokio::test]
//! async fn test_runtime() {
//!     let api = MockRuntimeApi::start().await.unwrap();
//!
//!     // Point AWS_LAMBDA_RUNTIME_API at api.endpoint(), then:
//!     let pending = api.invoke(r#"{"port":8080}"#).await.unwrap();
//!     let result = pending.result().await.unwrap();
//!     assert!(result.is_success());
//! }
//! ```

pub mod runtime_api;
pub mod server;

pub use runtime_api::InvocationResult;
pub use server::{MockRuntimeApi, PendingResult, TestError};
