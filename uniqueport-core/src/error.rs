//! Invocation errors and their Runtime API representation

use serde::{Deserialize, Serialize};
use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;

/// Ways an invocation can fail
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Process exited with non-zero status code: {0}")]
    NonZeroExit(i32),

    #[error("Process terminated by signal {}", signal_label(.0))]
    Signaled(Option<i32>),

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for child process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid event payload: {0}")]
    InvalidEvent(String),

    #[error("Unhandled fault: {0}")]
    Fault(String),

    #[error("Invocation completed without reporting an outcome")]
    Abandoned,
}

fn signal_label(signal: &Option<i32>) -> String {
    signal.map_or_else(|| "unknown".to_string(), |s| s.to_string())
}

impl InvocationError {
    /// Value for the `errorType` field and the `Lambda-Runtime-Function-Error-Type` header
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NonZeroExit(_) | Self::Signaled(_) => "Runtime.ExitError",
            Self::Spawn { .. } | Self::Wait(_) => "Runtime.LaunchError",
            Self::Timeout(_) => "Runtime.Timeout",
            Self::Serialize(_) | Self::InvalidEvent(_) => "Runtime.InvalidEvent",
            Self::Fault(_) | Self::Abandoned => "Runtime.UnhandledError",
        }
    }

    /// Exit code of the child, if it ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit(code) => Some(*code),
            _ => None,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::from(self)
    }
}

/// Lambda error response format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
            error_type: error_type.into(),
            stack_trace: None,
        }
    }
}

impl From<&InvocationError> for ErrorResponse {
    fn from(err: &InvocationError) -> Self {
        // Source chain goes into the trace so the message itself stays fixed.
        let mut trace = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push(cause.to_string());
            source = cause.source();
        }

        Self {
            error_message: err.to_string(),
            error_type: err.error_type().to_string(),
            stack_trace: if trace.is_empty() { None } else { Some(trace) },
        }
    }
}
