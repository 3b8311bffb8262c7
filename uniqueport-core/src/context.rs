//! Invocation context

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::request_id::RequestId;

/// Context passed to the handler for a single invocation
#[derive(Debug, Clone, Serialize)]
pub struct InvocationContext {
    pub aws_request_id: String,
    pub invoked_function_arn: String,
    pub function_name: String,
    pub function_version: String,
    pub memory_limit_in_mb: i32,
    pub log_group_name: String,
    pub log_stream_name: String,
    pub deadline_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Value>,
}

impl InvocationContext {
    /// Build a context for an invocation that did not come through the Runtime API.
    ///
    /// Used by local invocations and tests; the request id is freshly generated
    /// and the deadline is `timeout` from now.
    pub fn local(function_name: impl Into<String>, timeout: Duration) -> Self {
        let function_name = function_name.into();
        let request_id = RequestId::new();
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);

        Self {
            invoked_function_arn: format!(
                "arn:aws:lambda:us-east-1:000000000000:function:{}",
                function_name
            ),
            function_version: "$LATEST".to_string(),
            memory_limit_in_mb: 128,
            log_group_name: format!("/aws/lambda/{}", function_name),
            log_stream_name: format!("local/[$LATEST]{}", request_id.short()),
            deadline_ms: chrono::Utc::now()
                .timestamp_millis()
                .saturating_add(timeout_ms),
            aws_request_id: request_id.into_string(),
            function_name,
            trace_id: None,
            client_context: None,
            identity: None,
        }
    }

    /// Time left before the host's deadline, zero once it has passed
    pub fn remaining_time(&self) -> Duration {
        let now = chrono::Utc::now().timestamp_millis();
        let left = (self.deadline_ms - now).max(0);
        Duration::from_millis(u64::try_from(left).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_context() {
        let ctx = InvocationContext::local("uniqueport", Duration::from_secs(30));

        assert_eq!(ctx.function_name, "uniqueport");
        assert_eq!(ctx.log_group_name, "/aws/lambda/uniqueport");
        assert!(ctx.invoked_function_arn.ends_with(":function:uniqueport"));
        assert!(ctx.remaining_time() > Duration::from_secs(25));
        assert!(ctx.remaining_time() <= Duration::from_secs(30));
    }

    #[test]
    fn test_remaining_time_after_deadline() {
        let mut ctx = InvocationContext::local("uniqueport", Duration::from_secs(1));
        ctx.deadline_ms = 0;
        assert_eq!(ctx.remaining_time(), Duration::ZERO);
    }

    #[test]
    fn test_optional_fields_skipped() {
        let ctx = InvocationContext::local("uniqueport", Duration::from_secs(3));
        let value = serde_json::to_value(&ctx).unwrap();

        assert!(value.get("trace_id").is_none());
        assert!(value.get("client_context").is_none());
        assert_eq!(value["function_version"], "$LATEST");
    }
}
