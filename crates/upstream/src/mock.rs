//! Scripted [`Fetcher`] for tests.
//!
//! Replies are matched by URL substring in registration order. Every
//! request is recorded so tests can assert how many outbound calls were
//! made and what they carried.
//!
//! ```ignore
//! let fetcher = MockFetcher::new();
//! fetcher.on("api.weather.gov/alerts", MockReply::ok(r#"{"features":[]}"#));
//! fetcher.on("openrss.org", MockReply::err(UpstreamError::Rejected {
//!     status_code: 429,
//!     status_text: "Too Many Requests".into(),
//! }));
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::Fetcher;
use crate::error::UpstreamError;
use crate::models::{check_payload, UpstreamRequest, UpstreamResponse};

#[derive(Debug, Clone)]
pub enum MockReply {
    Ok(UpstreamResponse),
    Err(UpstreamError),
}

impl MockReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Ok(UpstreamResponse {
            body: body.into(),
            content_type: None,
        })
    }

    pub fn ok_with_type(body: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::Ok(UpstreamResponse {
            body: body.into(),
            content_type: Some(content_type.into()),
        })
    }

    pub fn err(error: UpstreamError) -> Self {
        Self::Err(error)
    }

    pub fn status(status_code: u16, status_text: impl Into<String>) -> Self {
        Self::Err(UpstreamError::Rejected {
            status_code,
            status_text: status_text.into(),
        })
    }
}

#[derive(Clone, Default)]
pub struct MockFetcher {
    routes: Arc<Mutex<Vec<(String, MockReply)>>>,
    requests: Arc<Mutex<Vec<UpstreamRequest>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the reply for URLs containing `fragment`.
    pub fn on(&self, fragment: impl Into<String>, reply: MockReply) -> &Self {
        let fragment = fragment.into();
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|(f, _)| *f == fragment) {
            Some(route) => route.1 = reply,
            None => routes.push((fragment, reply)),
        }
        self
    }

    /// Total number of requests made.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of requests whose URL contains `fragment`.
    pub fn calls_to(&self, fragment: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: UpstreamRequest) -> crate::Result<UpstreamResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let reply = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(fragment, _)| request.url.contains(fragment.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(MockReply::Ok(response)) => {
                check_payload(request.expect, &response.body)?;
                Ok(response)
            }
            Some(MockReply::Err(error)) => Err(error),
            None => Err(UpstreamError::Network(format!(
                "no mock route for {}",
                request.url
            ))),
        }
    }
}
