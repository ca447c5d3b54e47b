//! Error types for statemigrate-cloud.

use thiserror::Error;

/// Why a single API request failed.
#[derive(Debug, Error)]
pub enum RequestFailure {
    /// The server answered outside the 2xx range.
    #[error("server returned HTTP {0}")]
    Status(u16),

    /// Connection, TLS, DNS, or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be read.
    #[error("reading response body: {0}")]
    Body(#[source] std::io::Error),
}

/// All errors that can arise from remote API operations. Each variant names
/// the operation that issued the request.
#[derive(Debug, Error)]
pub enum CloudError {
    /// Transport failure or non-success status. Never retried.
    #[error("[{operation}] request failed: {failure}")]
    RemoteRequest {
        operation: &'static str,
        #[source]
        failure: RequestFailure,
    },

    /// The body was not valid JSON or did not match the endpoint's schema.
    #[error("[{operation}] could not parse response: {source}")]
    Parse {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A post-confirmation run was found and the abort policy is active.
    #[error("run {run_id} is past confirmation (status '{status}'); refusing to continue")]
    PostConfirmationRun { run_id: String, status: String },
}

impl CloudError {
    pub(crate) fn request(operation: &'static str, failure: RequestFailure) -> Self {
        CloudError::RemoteRequest { operation, failure }
    }

    /// HTTP status for a [`RequestFailure::Status`] failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            CloudError::RemoteRequest {
                failure: RequestFailure::Status(code),
                ..
            } => Some(*code),
            _ => None,
        }
    }
}

/// Decode `body` as `T`, tagging failures with `operation`.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    body: &str,
) -> Result<T, CloudError> {
    serde_json::from_str(body).map_err(|source| CloudError::Parse { operation, source })
}
