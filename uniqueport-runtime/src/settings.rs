//! Function settings from the Lambda environment
//!
//! https://docs.aws.amazon.com/lambda/latest/dg/configuration-envvars.html

use uniqueport_core::InvocationContext;

use crate::client::NextInvocation;
use crate::error::RuntimeError;

pub const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";

/// Settings shared by every invocation of this function instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSettings {
    pub runtime_api: String,
    pub function_name: String,
    pub function_version: String,
    pub memory_size: i32,
    pub log_group_name: String,
    pub log_stream_name: String,
}

impl FunctionSettings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, RuntimeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RuntimeError> {
        let runtime_api = lookup(RUNTIME_API_ENV).ok_or(RuntimeError::Config(RUNTIME_API_ENV))?;
        let function_name =
            lookup("AWS_LAMBDA_FUNCTION_NAME").unwrap_or_else(|| "uniqueport".to_string());

        Ok(Self {
            runtime_api,
            function_version: lookup("AWS_LAMBDA_FUNCTION_VERSION")
                .unwrap_or_else(|| "$LATEST".to_string()),
            memory_size: lookup("AWS_LAMBDA_FUNCTION_MEMORY_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(128),
            log_group_name: lookup("AWS_LAMBDA_LOG_GROUP_NAME")
                .unwrap_or_else(|| format!("/aws/lambda/{}", function_name)),
            log_stream_name: lookup("AWS_LAMBDA_LOG_STREAM_NAME").unwrap_or_default(),
            function_name,
        })
    }

    /// Build the context for one invocation
    pub fn context_for(&self, next: &NextInvocation) -> InvocationContext {
        InvocationContext {
            aws_request_id: next.request_id.clone(),
            invoked_function_arn: next.function_arn.clone().unwrap_or_default(),
            function_name: self.function_name.clone(),
            function_version: self.function_version.clone(),
            memory_limit_in_mb: self.memory_size,
            log_group_name: self.log_group_name.clone(),
            log_stream_name: self.log_stream_name.clone(),
            deadline_ms: next.deadline_ms,
            trace_id: next.trace_id.clone(),
            client_context: next.client_context.clone(),
            identity: next.identity.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_runtime_api_required() {
        let result = FunctionSettings::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(RuntimeError::Config(RUNTIME_API_ENV))));
    }

    #[test]
    fn test_defaults() {
        let settings = FunctionSettings::from_lookup(lookup(&[(RUNTIME_API_ENV, "127.0.0.1:9001")]))
            .unwrap();

        assert_eq!(settings.runtime_api, "127.0.0.1:9001");
        assert_eq!(settings.function_name, "uniqueport");
        assert_eq!(settings.function_version, "$LATEST");
        assert_eq!(settings.memory_size, 128);
        assert_eq!(settings.log_group_name, "/aws/lambda/uniqueport");
    }

    #[test]
    fn test_from_lambda_env() {
        let settings = FunctionSettings::from_lookup(lookup(&[
            (RUNTIME_API_ENV, "127.0.0.1:9001"),
            ("AWS_LAMBDA_FUNCTION_NAME", "unique-port"),
            ("AWS_LAMBDA_FUNCTION_VERSION", "7"),
            ("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "512"),
            ("AWS_LAMBDA_LOG_STREAM_NAME", "2024/01/01/[7]abc"),
        ]))
        .unwrap();

        assert_eq!(settings.function_name, "unique-port");
        assert_eq!(settings.function_version, "7");
        assert_eq!(settings.memory_size, 512);
        assert_eq!(settings.log_group_name, "/aws/lambda/unique-port");
        assert_eq!(settings.log_stream_name, "2024/01/01/[7]abc");
    }

    #[test]
    fn test_context_for() {
        let settings = FunctionSettings::from_lookup(lookup(&[(RUNTIME_API_ENV, "x:1")])).unwrap();
        let next = NextInvocation {
            request_id: "8476a536-e9f4-11e8-9739-2dfe598c3fcd".to_string(),
            deadline_ms: 1_542_409_706_888,
            function_arn: Some("arn:aws:lambda:us-east-2:123456789012:function:custom-runtime".to_string()),
            trace_id: Some("Root=1-5bef4de7-ad49b0e87f6ef6c87fc2e700".to_string()),
            client_context: None,
            identity: None,
            body: Bytes::from_static(b"{}"),
        };

        let ctx = settings.context_for(&next);
        assert_eq!(ctx.aws_request_id, next.request_id);
        assert_eq!(ctx.deadline_ms, 1_542_409_706_888);
        assert_eq!(ctx.trace_id, next.trace_id);
        assert!(ctx.invoked_function_arn.ends_with("custom-runtime"));
    }
}
