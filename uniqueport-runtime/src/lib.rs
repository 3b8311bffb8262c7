//! Lambda Runtime API host for the uniqueport handler
//!
//! Polls the Runtime API for events, runs each one through the
//! [`InvocationHandler`](uniqueport_handler::InvocationHandler) and posts
//! the outcome back.

pub mod client;
pub mod error;
pub mod runtime;
pub mod settings;

pub use client::{NextInvocation, RuntimeApiClient};
pub use error::RuntimeError;
pub use runtime::Runtime;
pub use settings::FunctionSettings;
