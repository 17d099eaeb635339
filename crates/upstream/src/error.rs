use std::time::Duration;

use thiserror::Error;

/// Why a single upstream call produced no usable body.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("Upstream timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Upstream error: {status_code} - {status_text}")]
    Rejected { status_code: u16, status_text: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl UpstreamError {
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err.to_string())
        }
    }

    /// HTTP status reported by the upstream, when it answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}
