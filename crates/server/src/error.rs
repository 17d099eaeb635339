use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sources::SourceError;
use thiserror::Error;
use utoipa::ToSchema;

pub type AppResult<T> = Result<T, AppError>;

/// JSON body of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct AppError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Map a source failure for the feed called `feed`.
    pub fn from_source(feed: &str, err: SourceError) -> Self {
        match err {
            SourceError::Validation(message) => Self::bad_request(message),
            SourceError::ConfigurationMissing(_) => {
                Self::internal(format!("{} feed is not configured", feed)).with_details(err.to_string())
            }
            other => Self::internal(format!("Failed to generate {} RSS feed", feed))
                .with_details(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            details: self.details,
        };
        (
            self.status,
            [("Access-Control-Allow-Origin", "*")],
            Json(body),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use upstream::UpstreamError;

    use super::*;

    #[test]
    fn test_source_error_status() {
        let validation = AppError::from_source("Reddit", SourceError::Validation("Invalid subreddit name".into()));
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(validation.to_string(), "Invalid subreddit name");

        let missing = AppError::from_source("Ticketmaster", SourceError::ConfigurationMissing("TICKETMASTER_API_KEY"));
        assert_eq!(missing.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            missing.details.as_deref(),
            Some("TICKETMASTER_API_KEY environment variable is not set")
        );

        let upstream = AppError::from_source(
            "Craigslist",
            SourceError::Upstream(UpstreamError::Rejected {
                status_code: 429,
                status_text: "Too Many Requests".into(),
            }),
        );
        assert_eq!(upstream.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(upstream.to_string(), "Failed to generate Craigslist RSS feed");
    }
}
