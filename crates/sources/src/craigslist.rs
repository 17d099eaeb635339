//! Craigslist Ann Arbor "for sale" listings, read through an OpenRSS mirror.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use cache::CacheKey;
use chrono::{DateTime, Utc};
use feed::html::{escape, strip_tags, truncate};
use feed::{parse_items, Channel, ChannelImage, FeedDocument, FeedEntry, Item};
use regex::Regex;
use serde::Deserialize;
use upstream::{Expect, Fetcher, UpstreamError, UpstreamRequest};
use utoipa::IntoParams;

use crate::dates::parse_timestamp;
use crate::error::SourceError;
use crate::params::parse_limit;
use crate::source::{CachePolicy, FeedSource, NormalizedItem, RenderContext};
use crate::FEED_ACCEPT;

static PRICE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[\d,]+").expect("Invalid price pattern"));
static LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)$").expect("Invalid location pattern"));
static PRICE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-\s*\$[\d,]+").expect("Invalid price suffix pattern"));
static LOCATION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]+\)$").expect("Invalid location suffix pattern"));
static CATEGORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"craigslist\.org/([^/]+)/").expect("Invalid category pattern"));
static POST_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/(\d+)\.html").expect("Invalid post id pattern"));

const SEARCH_URL: &str = "https://annarbor.craigslist.org/search/sss?sort=date";
const DEFAULT_LOCATION: &str = "Ann Arbor";

/// Query parameters for the Craigslist feed
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CraigslistParams {
    /// Maximum number of items (1-100, default 25)
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraigslistQuery {
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub price: Option<String>,
    pub location: String,
    pub category: String,
    pub description: String,
}

pub struct Craigslist {
    feed_url: String,
    freshness: Duration,
}

impl Craigslist {
    pub fn new(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            freshness: Duration::from_secs(3 * 60 * 60),
        }
    }
}

#[async_trait]
impl FeedSource for Craigslist {
    type Params = CraigslistParams;
    type Query = CraigslistQuery;
    type Record = Listing;

    fn name(&self) -> &'static str {
        "craigslist"
    }

    fn path(&self) -> &'static str {
        "/api/craigslist"
    }

    fn parse_query(&self, params: CraigslistParams) -> crate::Result<CraigslistQuery> {
        Ok(CraigslistQuery {
            limit: parse_limit(params.limit)?,
        })
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Disk {
            freshness: self.freshness,
        }
    }

    fn cache_key(&self, _query: &CraigslistQuery) -> CacheKey {
        // The limit is applied after parsing, so every limit shares one body.
        CacheKey::new(self.name()).param("site", "annarbor").param("sort", "date")
    }

    fn max_age(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn fetch(&self, fetcher: &dyn Fetcher, _query: &CraigslistQuery) -> Result<String, UpstreamError> {
        let request = UpstreamRequest::get(&self.feed_url)
            .header("Accept", FEED_ACCEPT)
            .expect(Expect::Feed);
        Ok(fetcher.fetch(request).await?.body)
    }

    fn normalize(
        &self,
        body: &str,
        query: &CraigslistQuery,
        now: DateTime<Utc>,
    ) -> crate::Result<Vec<NormalizedItem<Listing>>> {
        let entries = parse_items(body)?;
        let items: Vec<_> = entries
            .into_iter()
            .filter(|e| !e.title.trim().is_empty() && !e.link.trim().is_empty())
            .map(|e| normalize_entry(e, now))
            .collect();

        if items.is_empty() {
            return Err(SourceError::Malformed("No items found in RSS feed".to_string()));
        }
        tracing::debug!("Processed {} Craigslist items", items.len());

        Ok(items.into_iter().take(query.limit).collect())
    }

    fn document(
        &self,
        query: &CraigslistQuery,
        records: Vec<NormalizedItem<Listing>>,
        ctx: &RenderContext,
    ) -> FeedDocument {
        let mut channel = Channel::new(
            "🏪 Craigslist Ann Arbor - For Sale",
            SEARCH_URL,
            "Latest items for sale on Craigslist Ann Arbor, sorted by date",
        );
        let limit = query.limit.to_string();
        channel.self_link = Some(ctx.feed_url(self.path(), &[("limit", limit.as_str())]));
        channel.categories = vec!["Craigslist".into(), "Ann Arbor".into(), "For Sale".into()];
        channel.copyright = Some("Content from Craigslist users".into());
        channel.managing_editor = Some("craigslist-rss@localhost".into());
        channel.web_master = Some("craigslist-rss@localhost".into());
        channel.ttl = Some(60);
        channel.generator = Some(crate::GENERATOR.into());
        channel.image = Some(ChannelImage {
            url: "https://www.craigslist.org/favicon.ico".into(),
            title: "Craigslist RSS Feed".into(),
            link: "https://annarbor.craigslist.org".into(),
        });

        let items = records.into_iter().map(render_item).collect();
        FeedDocument::new(channel, items)
    }
}

fn normalize_entry(entry: FeedEntry, now: DateTime<Utc>) -> NormalizedItem<Listing> {
    let original = entry.title.trim().to_string();
    let link = entry.link.trim().to_string();

    let price = PRICE.find(&original).map(|m| m.as_str().to_string());
    let location = LOCATION
        .captures(&original)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| DEFAULT_LOCATION.to_string());

    let without_price = PRICE_SUFFIX.replace(&original, "");
    let cleaned = LOCATION_SUFFIX.replace(&without_price, "").trim().to_string();
    let title = if cleaned.is_empty() { original.clone() } else { cleaned };

    let category = CATEGORY
        .captures(&link)
        .map(|c| category_name(&c[1]))
        .unwrap_or_else(|| "for-sale".to_string());

    let id = match POST_ID.captures(&link) {
        Some(c) => c[1].to_string(),
        None => entry
            .guid
            .as_deref()
            .unwrap_or(&link)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect(),
    };

    let published = entry
        .pub_date
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);

    NormalizedItem {
        id,
        title,
        tags: vec![category.clone(), location.clone()],
        link: Some(link),
        published,
        payload: Listing {
            price,
            location,
            category,
            description: strip_tags(&entry.description),
        },
    }
}

/// Map a Craigslist category code to a readable name. Unknown codes pass
/// through.
fn category_name(code: &str) -> String {
    let name = match code {
        "for" => "furniture",
        "ele" => "electronics",
        "spo" => "sporting",
        "mus" => "musical",
        "app" => "appliances",
        "bks" => "books",
        "cto" => "auto",
        "clo" => "clothing",
        "tls" => "tools",
        "grd" => "garden",
        "toy" => "toys",
        "jwl" => "jewelry",
        "art" => "art",
        "hea" => "health",
        "bty" => "beauty",
        "zip" => "free",
        "atq" => "antiques",
        "sss" => "general",
        other => other,
    };
    name.to_string()
}

fn category_emoji(category: &str) -> &'static str {
    match category {
        "furniture" => "🪑",
        "electronics" => "📱",
        "sporting" => "⚽",
        "musical" => "🎸",
        "appliances" => "🏠",
        "books" => "📚",
        "auto" => "🚗",
        "clothing" => "👕",
        "tools" => "🔧",
        "garden" => "🌱",
        "toys" => "🧸",
        "jewelry" => "💎",
        "art" => "🎨",
        "health" => "💊",
        "beauty" => "💄",
        _ => "🛍️",
    }
}

fn price_emoji(price: Option<&str>) -> &'static str {
    let Some(price) = price else {
        return "💰";
    };
    let digits: String = price.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u64>().unwrap_or(0) {
        n if n >= 1000 => "💎",
        n if n >= 500 => "💰",
        n if n >= 100 => "💵",
        n if n >= 50 => "💴",
        _ => "💳",
    }
}

fn render_item(record: NormalizedItem<Listing>) -> Item {
    let listing = &record.payload;
    let cat_emoji = category_emoji(&listing.category);
    let price_emoji = price_emoji(listing.price.as_deref());
    let link = record.link.clone().unwrap_or_default();

    let title = match &listing.price {
        Some(price) => format!("{} {} - {} (📍 {})", cat_emoji, record.title, price, listing.location),
        None => format!("{} {} (📍 {})", cat_emoji, record.title, listing.location),
    };

    let mut html = String::from(r#"<div style="font-family: Arial, sans-serif; max-width: 600px;">"#);
    html.push_str(&format!(
        r#"<h2 style="margin: 0 0 10px 0; color: #2c3e50;">{}</h2>"#,
        escape(&record.title)
    ));
    if let Some(price) = &listing.price {
        html.push_str(&format!(
            r#"<p><strong>{} Price:</strong> {}</p>"#,
            price_emoji,
            escape(price)
        ));
    }
    html.push_str(&format!(
        r#"<p><strong>📍 Location:</strong> {}</p><p><strong>{} Category:</strong> {}</p>"#,
        escape(&listing.location),
        cat_emoji,
        escape(&listing.category)
    ));
    if !listing.description.is_empty() {
        html.push_str(&format!(
            r#"<div style="background: #f8f9fa; padding: 15px; border-left: 4px solid #3498db;"><h3>📝 Description</h3><p>{}</p></div>"#,
            escape(&truncate(&listing.description, 300))
        ));
    }
    html.push_str(&format!(
        r#"<p><a href="{}">🔗 View on Craigslist</a></p>"#,
        escape(&link)
    ));
    html.push_str(&format!(
        "<p><strong>📅 Posted:</strong> {}</p>",
        record.published.format("%Y-%m-%d %H:%M UTC")
    ));
    html.push_str(
        "<p><strong>⚠️ Safety:</strong> Meet in public places, inspect items before purchase, be cautious of scams</p>",
    );
    html.push_str("</div>");

    let mut item = Item::new(format!("craigslist-{}", record.id), title, record.published)
        .link(link)
        .description(html)
        .category("Craigslist");
    for tag in record.tags {
        item = item.category(tag);
    }
    item
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use upstream::mock::{MockFetcher, MockReply};

    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>craigslist</title>
    <item>
      <title><![CDATA[Oak dining table - $150 (Ypsilanti)]]></title>
      <link>https://annarbor.craigslist.org/for/d/ypsilanti-oak-dining-table/7712345678.html</link>
      <description><![CDATA[<p>Solid oak &amp; six&nbsp;chairs</p>]]></description>
      <pubDate>Wed, 01 May 2024 09:00:00 -0400</pubDate>
    </item>
    <item>
      <title>Free couch</title>
      <link>https://annarbor.craigslist.org/zip/d/free-couch/7712345679.html</link>
      <description>Curb alert</description>
    </item>
    <item>
      <title></title>
      <link>https://annarbor.craigslist.org/ele/d/x/7712345680.html</link>
    </item>
    <item>
      <title>Gaming PC - $1,200</title>
      <link>https://annarbor.craigslist.org/sya/d/gaming-pc/7712345681.html</link>
    </item>
  </channel>
</rss>"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
    }

    fn source() -> Craigslist {
        Craigslist::new("https://openrss.org/annarbor.craigslist.org/search/sss?sort=date")
    }

    #[test]
    fn test_normalize_extracts_listing_fields() {
        let items = source().normalize(FEED, &CraigslistQuery { limit: 25 }, now()).unwrap();
        assert_eq!(items.len(), 3);

        let table = &items[0];
        assert_eq!(table.id, "7712345678");
        assert_eq!(table.title, "Oak dining table");
        assert_eq!(table.payload.price.as_deref(), Some("$150"));
        assert_eq!(table.payload.location, "Ypsilanti");
        assert_eq!(table.payload.category, "furniture");
        assert_eq!(table.payload.description, "Solid oak & six chairs");
        assert_eq!(table.published, Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap());

        let couch = &items[1];
        assert_eq!(couch.payload.price, None);
        assert_eq!(couch.payload.location, "Ann Arbor");
        assert_eq!(couch.payload.category, "free");
        assert_eq!(couch.published, now());

        assert_eq!(items[2].payload.category, "sya");
        assert_eq!(items[2].payload.price.as_deref(), Some("$1,200"));
    }

    #[test]
    fn test_normalize_applies_limit() {
        let items = source().normalize(FEED, &CraigslistQuery { limit: 1 }, now()).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_empty_feed_is_malformed() {
        let empty = r#"<rss version="2.0"><channel><title>x</title></channel></rss>"#;
        let result = source().normalize(empty, &CraigslistQuery { limit: 25 }, now());
        assert!(matches!(result, Err(SourceError::Malformed(_))));
    }

    #[test]
    fn test_price_emoji() {
        assert_eq!(price_emoji(None), "💰");
        assert_eq!(price_emoji(Some("$1,200")), "💎");
        assert_eq!(price_emoji(Some("$500")), "💰");
        assert_eq!(price_emoji(Some("$150")), "💵");
        assert_eq!(price_emoji(Some("$50")), "💴");
        assert_eq!(price_emoji(Some("$5")), "💳");
    }

    #[test]
    fn test_document_items() {
        let src = source();
        let query = CraigslistQuery { limit: 25 };
        let records = src.normalize(FEED, &query, now()).unwrap();
        let ctx = RenderContext::new("http://localhost:3000", now());
        let doc = src.document(&query, records, &ctx);

        assert_eq!(doc.channel.ttl, Some(60));
        assert_eq!(doc.channel.self_link.as_deref(), Some("http://localhost:3000/api/craigslist?limit=25"));
        let first = &doc.items[0];
        assert_eq!(first.title, "🪑 Oak dining table - $150 (📍 Ypsilanti)");
        assert_eq!(first.guid, "craigslist-7712345678");
        assert_eq!(first.categories, vec!["Craigslist", "furniture", "Ypsilanti"]);
        assert!(first.description.contains("Solid oak &amp; six chairs"));
        assert_eq!(doc.items[1].title, "🛍️ Free couch (📍 Ann Arbor)");
    }

    #[tokio::test]
    async fn test_fetch_sends_feed_headers() {
        let fetcher = MockFetcher::new();
        fetcher.on("openrss.org", MockReply::ok(FEED));

        let body = source().fetch(&fetcher, &CraigslistQuery { limit: 25 }).await.unwrap();
        assert_eq!(body, FEED);

        let request = &fetcher.requests()[0];
        assert_eq!(request.expect, Expect::Feed);
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| k == "Accept" && v.starts_with("application/rss+xml")));
        assert!(!request.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("user-agent")));
    }

    #[tokio::test]
    async fn test_fetch_rejects_html_body() {
        let fetcher = MockFetcher::new();
        fetcher.on("openrss.org", MockReply::ok("<html>blocked</html>"));

        let err = source().fetch(&fetcher, &CraigslistQuery { limit: 25 }).await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidPayload(_)));
    }
}
