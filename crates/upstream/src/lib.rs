mod client;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;

pub use client::{Fetcher, UpstreamClient};
pub use error::UpstreamError;
pub use models::{check_payload, Expect, Method, UpstreamRequest, UpstreamResponse};

pub type Result<T> = std::result::Result<T, UpstreamError>;
