use std::time::Duration;

use async_trait::async_trait;
use cache::CacheKey;
use chrono::{DateTime, Utc};
use feed::FeedDocument;
use serde::de::DeserializeOwned;
use upstream::{Fetcher, UpstreamError};

/// How a source's upstream bodies may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Always fetch. Nothing is written to disk.
    Live,
    /// Serve cached bodies younger than `freshness` without fetching, and
    /// fall back to older ones when the upstream fails.
    Disk { freshness: Duration },
}

/// Per-request values a document may embed.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Public base URL of this service, without a trailing slash.
    pub public_url: String,
    pub now: DateTime<Utc>,
}

impl RenderContext {
    pub fn new(public_url: impl Into<String>, now: DateTime<Utc>) -> Self {
        let public_url = public_url.into();
        Self {
            public_url: public_url.trim_end_matches('/').to_string(),
            now,
        }
    }

    /// Absolute URL of a feed endpoint, used for the channel's self link.
    pub fn feed_url(&self, path: &str, query: &[(&str, &str)]) -> String {
        let mut url = format!("{}{}", self.public_url, path);
        for (i, (name, value)) in query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }
}

/// The common shape every source maps its upstream records onto.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem<P> {
    /// Stable identity used to build the item guid.
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub link: Option<String>,
    pub published: DateTime<Utc>,
    /// Source-specific fields.
    pub payload: P,
}

/// One upstream data source exposed as an RSS endpoint.
///
/// The request pipeline drives a source through a fixed sequence:
/// [`parse_query`](FeedSource::parse_query), [`check_ready`](FeedSource::check_ready),
/// then [`fetch`](FeedSource::fetch) and [`normalize`](FeedSource::normalize)
/// (possibly short-circuited by the cache), optionally
/// [`fallback`](FeedSource::fallback), and finally [`document`](FeedSource::document).
#[async_trait]
pub trait FeedSource: Send + Sync + 'static {
    /// Raw query-string parameters, all optional strings.
    type Params: DeserializeOwned + Send + 'static;
    /// Validated query.
    type Query: Send + Sync;
    /// Normalized record payload.
    type Record: Send;

    fn name(&self) -> &'static str;

    /// Route path, such as `/api/reddit`.
    fn path(&self) -> &'static str;

    /// Validate parameters. Runs before any upstream work.
    fn parse_query(&self, params: Self::Params) -> crate::Result<Self::Query>;

    /// Fail early when a required credential is absent.
    fn check_ready(&self) -> crate::Result<()> {
        Ok(())
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Live
    }

    fn cache_key(&self, query: &Self::Query) -> CacheKey;

    /// Value of the `Cache-Control: max-age` response header.
    fn max_age(&self) -> Duration;

    /// Fetch the raw upstream body.
    async fn fetch(&self, fetcher: &dyn Fetcher, query: &Self::Query) -> Result<String, UpstreamError>;

    /// Map an upstream body onto normalized records, in output order.
    fn normalize(
        &self,
        body: &str,
        query: &Self::Query,
        now: DateTime<Utc>,
    ) -> crate::Result<Vec<NormalizedItem<Self::Record>>>;

    /// Synthetic records served when the upstream is unavailable.
    fn fallback(&self, _query: &Self::Query, _now: DateTime<Utc>) -> Option<Vec<NormalizedItem<Self::Record>>> {
        None
    }

    /// Build the feed document for the given records.
    fn document(
        &self,
        query: &Self::Query,
        records: Vec<NormalizedItem<Self::Record>>,
        ctx: &RenderContext,
    ) -> FeedDocument;
}
