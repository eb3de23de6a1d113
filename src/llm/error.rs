use reqwest::StatusCode;
use thiserror::Error;

/// Failure classes of a completion request.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Could not reach the service, or the connection dropped / timed out.
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    /// 5xx from the provider
    #[error("Server error {0}: {1}")]
    Server(StatusCode, String),
    /// Credential rejected (401/403)
    #[error("Authentication failed {0}: {1}")]
    Auth(StatusCode, String),
    /// Any other 4xx: malformed request, unknown model, context too long
    #[error("Bad request {0}: {1}")]
    BadRequest(StatusCode, String),
    /// The body could not be decoded or carried no usable choice.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            429 => LlmError::RateLimited(body),
            401 | 403 => LlmError::Auth(status, body),
            // request timeout is transient even though it is a 4xx
            408 => LlmError::Transport(format!("{}: {}", status, body)),
            500..=599 => LlmError::Server(status, body),
            _ => LlmError::BadRequest(status, body),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Transport(_) | LlmError::RateLimited(_) | LlmError::Server(..)
        )
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            LlmError::from_status(status, err.to_string())
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}
