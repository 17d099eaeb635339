//! Static external feeds passed through unchanged.

use std::time::Duration;

use upstream::{Expect, Fetcher, UpstreamRequest, UpstreamResponse};

use crate::endpoints::Endpoints;

pub const DEFAULT_CONTENT_TYPE: &str = "application/xml";

const RELAY_ACCEPT: &str = "application/rss+xml, application/xml, text/xml, */*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFeed {
    /// Last path segment of the endpoint, as in `/api/{slug}`.
    pub slug: &'static str,
    pub title: &'static str,
    pub url: String,
}

impl RelayFeed {
    pub fn path(&self) -> String {
        format!("/api/{}", self.slug)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(1800)
    }

    /// Fetch the upstream document. Anything without an RSS, Atom or RDF
    /// root is rejected as an invalid payload.
    pub async fn fetch(&self, fetcher: &dyn Fetcher) -> upstream::Result<UpstreamResponse> {
        let request = UpstreamRequest::get(self.url.as_str())
            .header("Accept", RELAY_ACCEPT)
            .timeout(Duration::from_secs(30))
            .expect(Expect::Feed);
        let response = fetcher.fetch(request).await?;
        tracing::debug!("Fetched {} feed ({} bytes)", self.title, response.body.len());
        Ok(response)
    }
}

pub fn relay_feeds(endpoints: &Endpoints) -> Vec<RelayFeed> {
    vec![
        RelayFeed {
            slug: "mlive",
            title: "MLive",
            url: endpoints.mlive_feed.clone(),
        },
        RelayFeed {
            slug: "damnarbor",
            title: "Damn Arbor",
            url: endpoints.damnarbor_feed.clone(),
        },
        RelayFeed {
            slug: "michigandaily",
            title: "Michigan Daily",
            url: endpoints.michigandaily_feed.clone(),
        },
    ]
}
