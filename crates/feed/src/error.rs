use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to parse feed: {0}")]
    Parse(String),

    #[error("Failed to render feed: {0}")]
    Render(String),
}
