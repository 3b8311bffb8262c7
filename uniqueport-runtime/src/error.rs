//! Runtime host errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Runtime API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid header {name}: {value}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("Missing configuration value: {0}")]
    Config(&'static str),
}
