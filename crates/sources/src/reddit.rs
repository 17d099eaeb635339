//! Subreddit listings from Reddit's public JSON API.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use cache::CacheKey;
use chrono::{DateTime, Utc};
use feed::html::{escape, truncate};
use feed::{Channel, ChannelImage, Enclosure, FeedDocument, Item};
use regex::Regex;
use serde::Deserialize;
use upstream::{Expect, Fetcher, UpstreamError, UpstreamRequest};
use utoipa::IntoParams;

use crate::error::SourceError;
use crate::params::{non_empty, parse_limit};
use crate::source::{CachePolicy, FeedSource, NormalizedItem, RenderContext};

const DEFAULT_SUBREDDIT: &str = "annarbor";
const MAX_SUBREDDIT_LEN: usize = 21;
const SELFTEXT_PREVIEW: usize = 500;

static SUBREDDIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid subreddit pattern"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("Invalid bold pattern"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("Invalid italic pattern"));
static STRIKE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~~(.*?)~~").expect("Invalid strike pattern"));
static SUPERSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^(.*?)(\s|$)").expect("Invalid superscript pattern"));

/// Query parameters for the Reddit feed
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RedditParams {
    /// Subreddit name without the `/r/` prefix (default annarbor)
    pub subreddit: Option<String>,
    /// Listing sort: hot, new, top or rising (default hot)
    pub sort: Option<String>,
    /// Time window for `top`: hour, day, week, month, year or all
    pub timeframe: Option<String>,
    /// Maximum number of posts (1-100, default 25)
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    Hot,
    New,
    Top,
    Rising,
}

impl Sort {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "hot" => Some(Self::Hot),
            "new" => Some(Self::New),
            "top" => Some(Self::Top),
            "rising" => Some(Self::Rising),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::New => "new",
            Self::Top => "top",
            Self::Rising => "rising",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Hot => "Hot",
            Self::New => "New",
            Self::Top => "Top",
            Self::Rising => "Rising",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl Timeframe {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedditQuery {
    pub subreddit: String,
    pub sort: Sort,
    pub timeframe: Option<Timeframe>,
    pub limit: usize,
}

impl RedditQuery {
    /// The timeframe actually sent upstream. Reddit ignores it for every
    /// sort but `top`.
    pub fn upstream_timeframe(&self) -> Option<Timeframe> {
        match self.sort {
            Sort::Top => self.timeframe,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub author: String,
    pub subreddit: String,
    pub url: String,
    pub selftext: String,
    pub score: i64,
    pub upvote_ratio: f64,
    pub num_comments: u64,
    pub image_url: Option<String>,
    pub is_video: bool,
    pub domain: String,
    pub flair: Option<String>,
    pub stickied: bool,
    pub locked: bool,
    pub nsfw: bool,
    pub spoiler: bool,
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: RawPost,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPost {
    id: String,
    title: String,
    author: String,
    subreddit: String,
    url: String,
    permalink: String,
    selftext: Option<String>,
    score: i64,
    upvote_ratio: f64,
    num_comments: u64,
    created_utc: f64,
    thumbnail: Option<String>,
    preview: Option<Preview>,
    is_video: bool,
    domain: String,
    link_flair_text: Option<String>,
    stickied: bool,
    locked: bool,
    over_18: bool,
    spoiler: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Preview {
    images: Vec<PreviewImage>,
}

#[derive(Debug, Deserialize)]
struct PreviewImage {
    source: PreviewSource,
}

#[derive(Debug, Deserialize)]
struct PreviewSource {
    url: String,
}

pub struct Reddit {
    base_url: String,
    freshness: Duration,
}

impl Reddit {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            freshness: Duration::from_secs(30 * 60),
        }
    }

    fn listing_url(&self, query: &RedditQuery) -> String {
        let mut url = format!(
            "{}/r/{}/{}.json?limit={}",
            self.base_url,
            query.subreddit,
            query.sort.as_str(),
            query.limit
        );
        if let Some(timeframe) = query.upstream_timeframe() {
            url.push_str("&t=");
            url.push_str(timeframe.as_str());
        }
        url
    }
}

#[async_trait]
impl FeedSource for Reddit {
    type Params = RedditParams;
    type Query = RedditQuery;
    type Record = Post;

    fn name(&self) -> &'static str {
        "reddit"
    }

    fn path(&self) -> &'static str {
        "/api/reddit"
    }

    fn parse_query(&self, params: RedditParams) -> crate::Result<RedditQuery> {
        let subreddit = non_empty(params.subreddit).unwrap_or_else(|| DEFAULT_SUBREDDIT.to_string());
        if subreddit.len() > MAX_SUBREDDIT_LEN || !SUBREDDIT.is_match(&subreddit) {
            return Err(SourceError::Validation("Invalid subreddit name".to_string()));
        }

        let sort = match non_empty(params.sort) {
            None => Sort::Hot,
            Some(raw) => Sort::parse(&raw).ok_or_else(|| {
                SourceError::Validation("sort must be one of hot, new, top, rising".to_string())
            })?,
        };

        let timeframe = match non_empty(params.timeframe) {
            None => None,
            Some(raw) => Some(Timeframe::parse(&raw).ok_or_else(|| {
                SourceError::Validation(
                    "timeframe must be one of hour, day, week, month, year, all".to_string(),
                )
            })?),
        };

        Ok(RedditQuery {
            subreddit,
            sort,
            timeframe,
            limit: parse_limit(params.limit)?,
        })
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Disk {
            freshness: self.freshness,
        }
    }

    fn cache_key(&self, query: &RedditQuery) -> CacheKey {
        CacheKey::new(self.name())
            .param("subreddit", query.subreddit.as_str())
            .param("sort", query.sort.as_str())
            .param_opt("timeframe", query.upstream_timeframe().map(|t| t.as_str()))
            .param("limit", query.limit.to_string())
    }

    fn max_age(&self) -> Duration {
        Duration::from_secs(1800)
    }

    async fn fetch(&self, fetcher: &dyn Fetcher, query: &RedditQuery) -> Result<String, UpstreamError> {
        let request = UpstreamRequest::get(self.listing_url(query)).expect(Expect::Json);
        Ok(fetcher.fetch(request).await?.body)
    }

    fn normalize(
        &self,
        body: &str,
        _query: &RedditQuery,
        now: DateTime<Utc>,
    ) -> crate::Result<Vec<NormalizedItem<Post>>> {
        let listing: ListingResponse = serde_json::from_str(body)?;
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| normalize_post(child.data, now))
            .collect())
    }

    fn document(
        &self,
        query: &RedditQuery,
        records: Vec<NormalizedItem<Post>>,
        ctx: &RenderContext,
    ) -> FeedDocument {
        let sub = &query.subreddit;
        let mut description = format!("{} posts from /r/{}", query.sort.label(), sub);
        if let Some(timeframe) = query.timeframe {
            description.push_str(&format!(" ({})", timeframe.as_str()));
        }

        let mut channel = Channel::new(
            format!("🤖 Reddit: /r/{} ({})", sub, query.sort.label()),
            format!("https://reddit.com/r/{}/{}", sub, query.sort.as_str()),
            description,
        );
        let limit = query.limit.to_string();
        let mut self_query = vec![("subreddit", sub.as_str()), ("sort", query.sort.as_str())];
        if let Some(timeframe) = query.timeframe {
            self_query.push(("timeframe", timeframe.as_str()));
        }
        self_query.push(("limit", limit.as_str()));
        channel.self_link = Some(ctx.feed_url(self.path(), &self_query));
        channel.categories = vec!["Reddit".into(), sub.clone()];
        channel.copyright = Some("Content from Reddit users".into());
        channel.managing_editor = Some("reddit-rss@localhost".into());
        channel.web_master = Some("reddit-rss@localhost".into());
        channel.ttl = Some(30);
        channel.generator = Some(crate::GENERATOR.into());
        channel.image = Some(ChannelImage {
            url: "https://www.redditstatic.com/desktop2x/img/favicon/android-icon-192x192.png".into(),
            title: format!("Reddit /r/{}", sub),
            link: format!("https://reddit.com/r/{}", sub),
        });

        let items = records.into_iter().map(render_item).collect();
        FeedDocument::new(channel, items)
    }
}

fn normalize_post(raw: RawPost, now: DateTime<Utc>) -> NormalizedItem<Post> {
    let permalink = format!("https://reddit.com{}", raw.permalink);
    let thumbnail = raw
        .thumbnail
        .filter(|t| !t.is_empty() && t != "self" && t != "default");
    let preview = raw
        .preview
        .and_then(|p| p.images.into_iter().next())
        .map(|img| img.source.url.replace("&amp;", "&"));
    let published = DateTime::from_timestamp(raw.created_utc as i64, 0).unwrap_or(now);

    let mut tags = vec![raw.subreddit.clone()];
    if let Some(flair) = &raw.link_flair_text {
        tags.push(flair.clone());
    }

    NormalizedItem {
        id: raw.id,
        title: raw.title,
        tags,
        link: Some(permalink),
        published,
        payload: Post {
            author: raw.author,
            subreddit: raw.subreddit,
            url: raw.url,
            selftext: raw.selftext.unwrap_or_default(),
            score: raw.score,
            upvote_ratio: raw.upvote_ratio,
            num_comments: raw.num_comments,
            image_url: preview.or(thumbnail),
            is_video: raw.is_video,
            domain: raw.domain,
            flair: raw.link_flair_text,
            stickied: raw.stickied,
            locked: raw.locked,
            nsfw: raw.over_18,
            spoiler: raw.spoiler,
        },
    }
}

fn post_type_emoji(post: &Post) -> &'static str {
    if post.stickied {
        "📌"
    } else if post.is_video {
        "🎥"
    } else if !post.selftext.is_empty() {
        "📝"
    } else if post.domain.contains("imgur") || post.domain.contains("i.redd.it") {
        "🖼️"
    } else if post.domain.contains("youtube") || post.domain.contains("youtu.be") {
        "📺"
    } else if post.domain == format!("self.{}", post.subreddit) {
        "💬"
    } else {
        "🔗"
    }
}

fn score_emoji(score: i64) -> &'static str {
    match score {
        s if s > 1000 => "🔥",
        s if s > 500 => "⭐",
        s if s > 100 => "👍",
        s if s > 50 => "👌",
        _ => "📊",
    }
}

/// Render the subset of Reddit markdown that reads well in a feed reader.
/// The text is escaped first, so only the markup added here is live.
fn format_markdown(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let html = escape(text);
    let html = BOLD.replace_all(&html, "<strong>$1</strong>");
    let html = ITALIC.replace_all(&html, "<em>$1</em>");
    let html = STRIKE.replace_all(&html, "<del>$1</del>");
    let html = SUPERSCRIPT.replace_all(&html, "<sup>$1</sup>$2");
    let html = html.replace("\n\n", "</p><p>").replace('\n', "<br>");
    format!("<p>{}</p>", html)
}

fn badge(background: &str, text: &str) -> String {
    format!(
        r#"<span style="background: {}; color: white; padding: 4px 8px; border-radius: 12px; font-size: 0.8em;">{}</span> "#,
        background, text
    )
}

fn render_item(record: NormalizedItem<Post>) -> Item {
    let post = &record.payload;
    let type_emoji = post_type_emoji(post);
    let score_emoji = score_emoji(post.score);
    let permalink = record.link.clone().unwrap_or_default();

    let mut html = String::from(r#"<div style="font-family: Arial, sans-serif; max-width: 600px;">"#);
    if let Some(image) = &post.image_url {
        html.push_str(&format!(
            r#"<img src="{}" alt="Post thumbnail" style="width: 120px; height: 120px; object-fit: cover; border-radius: 8px;"/>"#,
            escape(image)
        ));
    }
    html.push_str(&format!("<h2>{}</h2><div>", escape(&record.title)));
    html.push_str(&badge("#ff4500", &format!("👤 u/{}", escape(&post.author))));
    if let Some(flair) = &post.flair {
        html.push_str(&badge("#0079d3", &format!("🏷️ {}", escape(flair))));
    }
    if post.stickied {
        html.push_str(&badge("#46d160", "📌 Pinned"));
    }
    if post.locked {
        html.push_str(&badge("#ffd635", "🔒 Locked"));
    }
    if post.nsfw {
        html.push_str(&badge("#ff585b", "🔞 NSFW"));
    }
    if post.spoiler {
        html.push_str(&badge("#666666", "⚠️ Spoiler"));
    }
    html.push_str("</div>");

    if !post.selftext.is_empty() {
        let preview: String = post.selftext.chars().take(SELFTEXT_PREVIEW).collect();
        html.push_str(r#"<div style="background: #f8f9fa; padding: 15px; border-left: 4px solid #0079d3;"><h3>📝 Post Content</h3>"#);
        html.push_str(&format_markdown(&preview));
        if post.selftext.chars().count() > SELFTEXT_PREVIEW {
            html.push_str("<p><em>... (truncated)</em></p>");
        }
        html.push_str("</div>");
    }

    html.push_str(&format!(
        "<p><strong>{} Score:</strong> {} | <strong>💬 Comments:</strong> {} | <strong>📊 Upvote %:</strong> {}% | <strong>🌐 Domain:</strong> {}</p>",
        score_emoji,
        post.score,
        post.num_comments,
        (post.upvote_ratio * 100.0).round(),
        escape(&post.domain)
    ));
    html.push_str(&format!(
        r#"<p><a href="{}">💬 View Comments on Reddit</a>"#,
        escape(&permalink)
    ));
    if !post.url.is_empty() && post.url != permalink {
        html.push_str(&format!(r#" | <a href="{}">🔗 View Original Link</a>"#, escape(&post.url)));
    }
    html.push_str("</p>");
    html.push_str(&format!(
        "<p><strong>📅 Posted:</strong> {}<br><strong>🏠 Subreddit:</strong> /r/{}</p></div>",
        record.published.format("%Y-%m-%d %H:%M UTC"),
        escape(&post.subreddit)
    ));

    let title = format!(
        "{} {} ({} {} • 💬 {})",
        type_emoji,
        truncate(&record.title, 200),
        score_emoji,
        post.score,
        post.num_comments
    );

    let mut item = Item::new(
        format!("reddit-{}-{}", post.subreddit, record.id),
        title,
        record.published,
    )
    .link(permalink)
    .description(html)
    .category("Reddit")
    .author(format!("u/{}", post.author));
    for tag in &record.tags {
        item = item.category(tag.as_str());
    }
    if let Some(image) = &post.image_url {
        item = item.enclosure(Enclosure {
            url: image.clone(),
            mime_type: "image/jpeg".to_string(),
            length: 0,
        });
    }
    item
}
