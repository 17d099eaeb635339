use thiserror::Error;
use upstream::UpstreamError;

#[derive(Debug, Error)]
pub enum SourceError {
    /// Bad request parameters. Always reported before any upstream work.
    #[error("{0}")]
    Validation(String),

    /// A credential the source needs is not configured.
    #[error("{0} environment variable is not set")]
    ConfigurationMissing(&'static str),

    #[error("Malformed upstream payload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<feed::FeedError> for SourceError {
    fn from(err: feed::FeedError) -> Self {
        Self::Malformed(err.to_string())
    }
}
