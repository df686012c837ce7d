//! Flowwatch HTTP Client
//!
//! A small, type-safe client for the workflow server's REST API.
//!
//! The monitor uses it as its remote job service (fetching workflows and
//! their logs while polling) and the CLI uses it for the one-shot actions
//! (list, save, launch, resume, cancel, delete, upload, download).
//!
//! # Example
//!
//! ```no_run
//! use flowwatch_client::WorkflowClient;
//! use flowwatch_core::domain::workflow::WorkflowId;
//!
//! #[tokio::main]
//! async fn main() -> flowwatch_client::Result<()> {
//!     let client = WorkflowClient::new("http://localhost:8080");
//!
//!     let workflow = client.get_workflow(&WorkflowId::new("5f1d")).await?;
//!     println!("{} is {}", workflow.id, workflow.status);
//!     Ok(())
//! }
//! ```

pub mod error;
mod workflows;

pub use error::{ClientError, Result};
pub use workflows::InputFile;

use flowwatch_core::dto::workflow::ApiMessage;
use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the workflow server API
#[derive(Debug, Clone)]
pub struct WorkflowClient {
    /// Base URL of the server (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl WorkflowClient {
    /// Create a new workflow client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new workflow client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response whose body is not needed
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        Self::check_status(response).await.map(|_| ())
    }

    /// Turns a non-2xx response into a [`ClientError`]
    ///
    /// The server reports failures as `{ status, message }`; when the body
    /// has that shape only the message is kept.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::debug!(status = status.as_u16(), "request rejected by server");

        Err(status_error(status.as_u16(), &body))
    }
}

fn status_error(status: u16, body: &str) -> ClientError {
    let message = error_message(body);
    match status {
        404 => ClientError::NotFound(message),
        _ => ClientError::api_error(status, message),
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiMessage>(body) {
        Ok(msg) => msg.message,
        Err(_) => body.to_string(),
    }
}
