//! Invocation loop against the Runtime API

use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};
use uniqueport_core::InvocationError;
use uniqueport_handler::InvocationHandler;

use crate::client::RuntimeApiClient;
use crate::error::RuntimeError;
use crate::settings::FunctionSettings;

/// Pause before polling again after a Runtime API failure
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Lambda runtime driving an [`InvocationHandler`]
pub struct Runtime {
    client: RuntimeApiClient,
    settings: FunctionSettings,
    handler: InvocationHandler,
}

impl Runtime {
    pub fn new(settings: FunctionSettings, handler: InvocationHandler) -> Result<Self, RuntimeError> {
        let client = RuntimeApiClient::new(&settings.runtime_api)?;
        Ok(Self {
            client,
            settings,
            handler,
        })
    }

    pub fn client(&self) -> &RuntimeApiClient {
        &self.client
    }

    /// Process invocations until the process is stopped
    pub async fn run(&self) {
        info!(
            endpoint = %self.client.base_url(),
            function_name = %self.settings.function_name,
            "Runtime loop starting"
        );

        loop {
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Runtime API request failed");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }

    /// Fetch one invocation, handle it and post its outcome
    pub async fn run_once(&self) -> Result<(), RuntimeError> {
        let next = self.client.next_invocation().await?;
        let request_id = next.request_id.clone();
        let context = self.settings.context_for(&next);

        let outcome = match serde_json::from_slice::<Value>(&next.body) {
            Ok(event) => self.handler.invoke(event, context).await,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Event body is not JSON");
                Err(InvocationError::InvalidEvent(e.to_string()))
            }
        };

        match outcome {
            Ok(()) => self.client.send_response(&request_id).await,
            Err(e) => {
                self.client
                    .send_error(&request_id, &e.to_response())
                    .await
            }
        }
    }
}
