//! Core types for the uniqueport Lambda handler
//!
//! Shared between the handler and the runtime host:
//! - the per-invocation context handed to the handler
//! - the one-shot completion protocol (`Done` / `Pending`)
//! - the invocation error taxonomy and its Runtime API wire form

pub mod completion;
pub mod context;
pub mod error;
pub mod request_id;

pub use completion::{Done, Outcome, Pending};
pub use context::InvocationContext;
pub use error::{ErrorResponse, InvocationError};
pub use request_id::RequestId;
