use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::error::UpstreamError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

static SECRET_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([?&](?:apikey|api_key|key|token)=)[^&]*").expect("Invalid secret pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// What a successful upstream body must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Any body is accepted.
    Any,
    /// A JSON object or array.
    Json,
    /// An RSS, Atom or RDF document.
    Feed,
}

/// A fully formed outbound request.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
    pub expect: Expect,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
            expect: Expect::Any,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::get(url)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn expect(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }

    /// The URL with credential-like query values masked, for logging.
    pub fn redacted_url(&self) -> String {
        SECRET_PARAM.replace_all(&self.url, "${1}***").into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub body: String,
    pub content_type: Option<String>,
}

/// Reject a 2xx body that is not the kind of document the caller asked for.
pub fn check_payload(expect: Expect, body: &str) -> Result<(), UpstreamError> {
    match expect {
        Expect::Any => Ok(()),
        Expect::Json => {
            let trimmed = body.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                Ok(())
            } else {
                Err(UpstreamError::InvalidPayload(
                    "response is not a JSON document".to_string(),
                ))
            }
        }
        Expect::Feed => {
            if body.contains("<rss") || body.contains("<feed") || body.contains("<rdf:RDF") {
                Ok(())
            } else {
                Err(UpstreamError::InvalidPayload(
                    "response does not contain an RSS or Atom root element".to_string(),
                ))
            }
        }
    }
}
