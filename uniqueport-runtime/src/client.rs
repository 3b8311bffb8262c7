//! Lambda Runtime API client
//!
//! https://docs.aws.amazon.com/lambda/latest/dg/runtimes-api.html

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Response;
use serde_json::Value;
use tracing::{debug, warn};
use uniqueport_core::ErrorResponse;

use crate::error::RuntimeError;

pub const API_VERSION: &str = "2018-06-01";

pub const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
pub const DEADLINE_HEADER: &str = "Lambda-Runtime-Deadline-Ms";
pub const FUNCTION_ARN_HEADER: &str = "Lambda-Runtime-Invoked-Function-Arn";
pub const TRACE_ID_HEADER: &str = "Lambda-Runtime-Trace-Id";
pub const CLIENT_CONTEXT_HEADER: &str = "Lambda-Runtime-Client-Context";
pub const IDENTITY_HEADER: &str = "Lambda-Runtime-Cognito-Identity";
pub const ERROR_TYPE_HEADER: &str = "Lambda-Runtime-Function-Error-Type";

/// An invocation handed out by `GET /runtime/invocation/next`
#[derive(Debug, Clone)]
pub struct NextInvocation {
    pub request_id: String,
    pub deadline_ms: i64,
    pub function_arn: Option<String>,
    pub trace_id: Option<String>,
    pub client_context: Option<Value>,
    pub identity: Option<Value>,
    pub body: Bytes,
}

/// HTTP client for the Runtime API
#[derive(Debug, Clone)]
pub struct RuntimeApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl RuntimeApiClient {
    /// Create a client for an `AWS_LAMBDA_RUNTIME_API` style endpoint (`host:port`).
    ///
    /// An endpoint that already carries a scheme is used as is. The API is
    /// always local to the sandbox, so proxy settings are ignored.
    pub fn new(endpoint: &str) -> Result<Self, RuntimeError> {
        let endpoint = endpoint.trim_end_matches('/');
        let base_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        };

        let http = reqwest::Client::builder().no_proxy().build()?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/runtime/{}", self.base_url, API_VERSION, path)
    }

    /// Block until the next invocation is available
    pub async fn next_invocation(&self) -> Result<NextInvocation, RuntimeError> {
        let url = self.url("invocation/next");
        let resp = checked(self.http.get(&url).send().await?).await?;
        let headers = resp.headers().clone();

        let request_id = header(&headers, REQUEST_ID_HEADER)
            .ok_or(RuntimeError::MissingHeader(REQUEST_ID_HEADER))?;
        let deadline = header(&headers, DEADLINE_HEADER)
            .ok_or(RuntimeError::MissingHeader(DEADLINE_HEADER))?;
        let deadline_ms = deadline
            .parse::<i64>()
            .map_err(|_| RuntimeError::InvalidHeader {
                name: DEADLINE_HEADER,
                value: deadline.clone(),
            })?;

        debug!(request_id = %request_id, "Received invocation");

        Ok(NextInvocation {
            request_id,
            deadline_ms,
            function_arn: header(&headers, FUNCTION_ARN_HEADER),
            trace_id: header(&headers, TRACE_ID_HEADER),
            client_context: json_header(&headers, CLIENT_CONTEXT_HEADER),
            identity: json_header(&headers, IDENTITY_HEADER),
            body: resp.bytes().await?,
        })
    }

    /// Report success; the function returns no value, so the body is `null`
    pub async fn send_response(&self, request_id: &str) -> Result<(), RuntimeError> {
        let url = self.url(&format!("invocation/{}/response", request_id));
        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body("null")
            .send()
            .await?;
        checked(resp).await?;
        Ok(())
    }

    /// Report an invocation error
    pub async fn send_error(
        &self,
        request_id: &str,
        error: &ErrorResponse,
    ) -> Result<(), RuntimeError> {
        let url = self.url(&format!("invocation/{}/error", request_id));
        self.post_error(&url, error).await
    }

    /// Report a failure to initialize the runtime
    pub async fn send_init_error(&self, error: &ErrorResponse) -> Result<(), RuntimeError> {
        let url = self.url("init/error");
        self.post_error(&url, error).await
    }

    async fn post_error(&self, url: &str, error: &ErrorResponse) -> Result<(), RuntimeError> {
        let resp = self
            .http
            .post(url)
            .header(ERROR_TYPE_HEADER, error.error_type.as_str())
            .json(error)
            .send()
            .await?;
        checked(resp).await?;
        Ok(())
    }
}

async fn checked(resp: Response) -> Result<Response, RuntimeError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(RuntimeError::Status {
        status: status.as_u16(),
        body,
    })
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn json_header(headers: &HeaderMap, name: &'static str) -> Option<Value> {
    let raw = header(headers, name)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(header = name, error = %e, "Ignoring unparsable header");
            None
        }
    }
}
