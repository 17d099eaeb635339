//! Upcoming events near Ann Arbor from the Ticketmaster Discovery API.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use cache::CacheKey;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use feed::html::escape;
use feed::{Channel, ChannelImage, Enclosure, FeedDocument, Item};
use upstream::{Expect, Fetcher, UpstreamError, UpstreamRequest};

use self::models::{EventsResponse, RawEvent};
use crate::dates::parse_timestamp;
use crate::error::SourceError;
use crate::format::amount;
use crate::nws::LocationQuery;
use crate::params::LocationParams;
use crate::source::{FeedSource, NormalizedItem, RenderContext};

pub const API_KEY_VAR: &str = "TICKETMASTER_API_KEY";

const RADIUS_MILES: u32 = 25;
const PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub venue: String,
    pub city: String,
    pub state: String,
    pub address: Option<String>,
    pub image: Option<String>,
    pub category: String,
    pub genre: String,
    pub price_range: String,
    pub description: Option<String>,
    pub sale_start: Option<DateTime<Utc>>,
    pub sale_end: Option<DateTime<Utc>>,
    pub local_date: Option<NaiveDate>,
    pub local_time: Option<NaiveTime>,
}

impl Event {
    /// Local start used for ordering. Undated events sort last.
    fn sort_key(&self) -> NaiveDateTime {
        match self.local_date {
            Some(date) => date.and_time(self.local_time.unwrap_or(NaiveTime::MIN)),
            None => NaiveDateTime::MAX,
        }
    }
}

pub struct Ticketmaster {
    base_url: String,
    api_key: Option<String>,
}

impl Ticketmaster {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

#[async_trait]
impl FeedSource for Ticketmaster {
    type Params = LocationParams;
    type Query = LocationQuery;
    type Record = Event;

    fn name(&self) -> &'static str {
        "ticketmaster-events"
    }

    fn path(&self) -> &'static str {
        "/api/ticketmaster-events"
    }

    fn parse_query(&self, params: LocationParams) -> crate::Result<LocationQuery> {
        LocationQuery::parse(params)
    }

    fn check_ready(&self) -> crate::Result<()> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(SourceError::ConfigurationMissing(API_KEY_VAR)),
        }
    }

    fn cache_key(&self, query: &LocationQuery) -> CacheKey {
        CacheKey::new(self.name()).param("location", query.location.as_str())
    }

    fn max_age(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn fetch(&self, fetcher: &dyn Fetcher, query: &LocationQuery) -> Result<String, UpstreamError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(UpstreamError::HttpClient(format!("{} is not set", API_KEY_VAR)));
        };
        let url = format!(
            "{}/events.json?apikey={}&latlong={}&radius={}&unit=miles&size={}&sort=date,asc",
            self.base_url,
            urlencoding::encode(api_key),
            query.coordinates,
            RADIUS_MILES,
            PAGE_SIZE
        );
        let request = UpstreamRequest::get(url)
            .timeout(Duration::from_secs(20))
            .expect(Expect::Json);
        Ok(fetcher.fetch(request).await?.body)
    }

    /// Events in start order. A response without `_embedded` has no events.
    fn normalize(
        &self,
        body: &str,
        _query: &LocationQuery,
        now: DateTime<Utc>,
    ) -> crate::Result<Vec<NormalizedItem<Event>>> {
        let response: EventsResponse = serde_json::from_str(body)?;
        let raw = response.embedded.map(|e| e.events).unwrap_or_default();
        tracing::debug!("Found {} Ticketmaster events", raw.len());

        let mut events: Vec<_> = raw.into_iter().map(|e| normalize_event(e, now)).collect();
        events.sort_by_key(|e| e.payload.sort_key());
        Ok(events)
    }

    fn fallback(&self, _query: &LocationQuery, now: DateTime<Utc>) -> Option<Vec<NormalizedItem<Event>>> {
        Some(mock_events(now))
    }

    fn document(
        &self,
        query: &LocationQuery,
        records: Vec<NormalizedItem<Event>>,
        ctx: &RenderContext,
    ) -> FeedDocument {
        let loc = &query.location;
        let link = ctx.feed_url(self.path(), &[("location", loc.as_str())]);

        let mut channel = Channel::new(
            format!("🎪 Ticketmaster Events - {}", loc),
            link.clone(),
            format!(
                "Upcoming events and entertainment in {} (Ann Arbor, MI area) from Ticketmaster",
                loc
            ),
        );
        channel.self_link = Some(link.clone());
        channel.categories = vec!["Events".into(), "Entertainment".into(), "Ticketmaster".into()];
        channel.copyright = Some("Event data from Ticketmaster".into());
        channel.managing_editor = Some("ticketmaster-events@localhost".into());
        channel.web_master = Some("ticketmaster-events@localhost".into());
        channel.ttl = Some(360);
        channel.generator = Some(crate::GENERATOR.into());
        channel.image = Some(ChannelImage {
            url: "https://www.ticketmaster.com/favicon.ico".into(),
            title: "Ticketmaster Events RSS Feed".into(),
            link: link.clone(),
        });

        let items = if records.is_empty() {
            vec![no_events(loc, &link, ctx.now)]
        } else {
            records
                .iter()
                .map(|event| render_event(event, loc, &link, ctx.now))
                .collect()
        };
        FeedDocument::new(channel, items)
    }
}

fn normalize_event(raw: RawEvent, now: DateTime<Utc>) -> NormalizedItem<Event> {
    let venue = raw.embedded.and_then(|e| e.venues.into_iter().next()).unwrap_or_default();
    let classification = raw.classifications.into_iter().next().unwrap_or_default();
    let image = raw
        .images
        .iter()
        .find(|img| img.ratio.as_deref() == Some("16_9"))
        .or_else(|| raw.images.first())
        .map(|img| img.url.clone())
        .filter(|url| !url.is_empty());
    let price_range = raw
        .price_ranges
        .first()
        .and_then(|p| Some(format!("${} - ${}", amount(p.min?), amount(p.max?))))
        .unwrap_or_else(|| "TBA".to_string());
    let public_sale = raw.sales.and_then(|s| s.public).unwrap_or_default();
    let start = raw.dates.and_then(|d| d.start).unwrap_or_default();

    let local_date = start
        .local_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
    let local_time = start
        .local_time
        .as_deref()
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M:%S").ok());
    let published = start
        .date_time
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| local_date.map(|d| d.and_time(local_time.unwrap_or(NaiveTime::MIN)).and_utc()))
        .unwrap_or(now);

    let category = classification
        .segment
        .map(|s| s.name)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Event".to_string());
    let genre = classification
        .genre
        .map(|g| g.name)
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| "General".to_string());

    NormalizedItem {
        id: raw.id,
        title: raw.name,
        tags: vec![category.clone(), genre.clone()],
        link: raw.url,
        published,
        payload: Event {
            venue: venue.name.filter(|n| !n.is_empty()).unwrap_or_else(|| "TBA".to_string()),
            city: venue.city.map(|c| c.name).unwrap_or_default(),
            state: venue.state.map(|s| s.state_code).unwrap_or_default(),
            address: venue.address.map(|a| a.line1).filter(|a| !a.is_empty()),
            image,
            category,
            genre,
            price_range,
            description: raw.info.or(raw.please_note).filter(|d| !d.trim().is_empty()),
            sale_start: public_sale.start_date_time.as_deref().and_then(parse_timestamp),
            sale_end: public_sale.end_date_time.as_deref().and_then(parse_timestamp),
            local_date,
            local_time,
        },
    }
}

fn event_emoji(category: &str, genre: &str) -> &'static str {
    let cat = category.to_lowercase();
    let gen = genre.to_lowercase();

    if cat.contains("music") || gen.contains("music") {
        return if gen.contains("rock") || gen.contains("metal") {
            "🎸"
        } else if gen.contains("pop") || gen.contains("dance") {
            "🎤"
        } else if gen.contains("country") {
            "🤠"
        } else if gen.contains("jazz") || gen.contains("blues") {
            "🎷"
        } else if gen.contains("classical") {
            "🎼"
        } else if gen.contains("hip hop") || gen.contains("rap") {
            "🎧"
        } else {
            "🎵"
        };
    }
    if cat.contains("sports") {
        return if gen.contains("football") {
            "🏈"
        } else if gen.contains("basketball") {
            "🏀"
        } else if gen.contains("baseball") {
            "⚾"
        } else if gen.contains("hockey") {
            "🏒"
        } else if gen.contains("soccer") {
            "⚽"
        } else {
            "🏟️"
        };
    }
    if cat.contains("arts") || cat.contains("theatre") {
        "🎭"
    } else if cat.contains("family") {
        "👨‍👩‍👧‍👦"
    } else if cat.contains("comedy") {
        "😂"
    } else if cat.contains("film") {
        "🎬"
    } else {
        "🎪"
    }
}

fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn render_event(record: &NormalizedItem<Event>, location: &str, link: &str, now: DateTime<Utc>) -> Item {
    let event = &record.payload;
    let emoji = event_emoji(&event.category, &event.genre);
    let date = event
        .local_date
        .map(|d| d.format("%A, %B %-d, %Y").to_string())
        .unwrap_or_else(|| "Date TBA".to_string());
    let time = event
        .local_time
        .map(|t| t.format("%-I:%M %p").to_string())
        .unwrap_or_else(|| "Time TBA".to_string());
    let name = escape(&record.title);
    let event_url = record.link.clone().unwrap_or_else(|| link.to_string());

    let mut html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px;"><div style="background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 20px; border-radius: 10px;"><h2 style="margin: 0; color: white;">{} {}</h2><p><strong>📅 {}</strong> at <strong>🕐 {}</strong></p></div>"#,
        emoji, name, date, time
    );
    if let Some(image) = &event.image {
        html.push_str(&format!(
            r#"<div style="text-align: center; margin: 20px 0;"><img src="{}" alt="{}" style="max-width: 100%; height: auto; border-radius: 8px;"/></div>"#,
            escape(image),
            name
        ));
    }
    html.push_str(&format!(
        r#"<div style="background: #f8f9fa; padding: 15px; border-radius: 8px;"><h3>📍 Venue Information</h3><p><strong>🏟️ Venue:</strong> {}</p><p><strong>🏙️ Location:</strong> {}, {}</p>"#,
        escape(&event.venue),
        escape(&event.city),
        escape(&event.state)
    ));
    if let Some(address) = &event.address {
        html.push_str(&format!("<p><strong>📮 Address:</strong> {}</p>", escape(address)));
    }
    html.push_str(&format!(
        r#"</div><div style="background: #e3f2fd; padding: 15px; border-radius: 8px;"><h3>🎫 Event Details</h3><p><strong>🎭 Category:</strong> {}</p><p><strong>🎪 Genre:</strong> {}</p><p><strong>💰 Price Range:</strong> {}</p></div>"#,
        escape(&event.category),
        escape(&event.genre),
        escape(&event.price_range)
    ));
    if let Some(description) = &event.description {
        html.push_str(&format!(
            r#"<div style="background: #fff3e0; padding: 15px; border-radius: 8px;"><h3>ℹ️ Description</h3><p>{}</p></div>"#,
            escape(description)
        ));
    }
    if event.sale_start.is_some() || event.sale_end.is_some() {
        html.push_str(r#"<div style="background: #f3e5f5; padding: 15px; border-radius: 8px;"><h3>🎟️ Ticket Sales</h3>"#);
        if let Some(start) = event.sale_start {
            html.push_str(&format!("<p><strong>🚀 Sales Start:</strong> {}</p>", format_timestamp(start)));
        }
        if let Some(end) = event.sale_end {
            html.push_str(&format!("<p><strong>⏰ Sales End:</strong> {}</p>", format_timestamp(end)));
        }
        html.push_str("</div>");
    }
    html.push_str(&format!(
        r#"<p style="text-align: center;"><a href="{}">🎫 Buy Tickets on Ticketmaster</a></p><p><strong>📍 Location:</strong> {} (Ann Arbor, MI area)<br><strong>🎫 Source:</strong> Ticketmaster<br><strong>🆔 Event ID:</strong> {}<br><strong>🕒 Last Updated:</strong> {}</p></div>"#,
        escape(&event_url),
        escape(location),
        escape(&record.id),
        format_timestamp(now)
    ));

    let title = format!("{} {} - {} at {}", emoji, record.title, date, event.venue);
    let mut item = Item::new(
        format!("ticketmaster-event-{}-{}", location, record.id),
        title,
        record.published,
    )
    .link(event_url)
    .description(html)
    .category("Events")
    .author("ticketmaster-events@localhost");
    for tag in &record.tags {
        item = item.category(tag.as_str());
    }
    if let Some(image) = &event.image {
        item = item.enclosure(Enclosure {
            url: image.clone(),
            mime_type: "image/jpeg".to_string(),
            length: 0,
        });
    }
    item
}

fn no_events(location: &str, link: &str, now: DateTime<Utc>) -> Item {
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px;"><div style="background: #e8f5e8; border: 1px solid #c3e6cb; padding: 20px; border-radius: 10px; text-align: center;"><h2 style="color: #155724;">🎪 No Events Currently Listed</h2><p style="color: #155724;">There are currently no upcoming events listed for the Ann Arbor area. Check back later for new events!</p></div><p><strong>📍 Location:</strong> {} (Ann Arbor, MI area)<br><strong>🎫 Source:</strong> Ticketmaster<br><strong>🕒 Last Checked:</strong> {}</p></div>"#,
        escape(location),
        format_timestamp(now)
    );
    Item::new(
        format!("no-events-{}-{}", location, now.date_naive()),
        format!("🎪 No Upcoming Events Found - {}", location),
        now,
    )
    .link(link)
    .description(html)
    .category("Events")
    .category("Status")
    .author("ticketmaster-events@localhost")
}

struct MockEvent {
    id: &'static str,
    name: &'static str,
    days_ahead: i64,
    time: (u32, u32),
    venue: &'static str,
    address: &'static str,
    category: &'static str,
    genre: &'static str,
    price_range: &'static str,
}

const MOCK_EVENTS: [MockEvent; 3] = [
    MockEvent {
        id: "mock-event-001",
        name: "Detroit Symphony Orchestra",
        days_ahead: 3,
        time: (19, 30),
        venue: "Hill Auditorium",
        address: "825 N University Ave",
        category: "Music",
        genre: "Classical",
        price_range: "$25 - $85",
    },
    MockEvent {
        id: "mock-event-002",
        name: "Comedy Night at The Ark",
        days_ahead: 5,
        time: (20, 0),
        venue: "The Ark",
        address: "316 S Main St",
        category: "Arts & Theatre",
        genre: "Comedy",
        price_range: "$20 - $35",
    },
    MockEvent {
        id: "mock-event-003",
        name: "Michigan Wolverines Football",
        days_ahead: 10,
        time: (12, 0),
        venue: "Michigan Stadium",
        address: "1201 S Main St",
        category: "Sports",
        genre: "Football",
        price_range: "$60 - $250",
    },
];

/// Sample events shown while Ticketmaster is unreachable.
pub fn mock_events(now: DateTime<Utc>) -> Vec<NormalizedItem<Event>> {
    MOCK_EVENTS
        .iter()
        .map(|mock| {
            let date = (now + chrono::Duration::days(mock.days_ahead)).date_naive();
            let time = NaiveTime::from_hms_opt(mock.time.0, mock.time.1, 0).unwrap_or(NaiveTime::MIN);
            NormalizedItem {
                id: mock.id.to_string(),
                title: mock.name.to_string(),
                tags: vec![mock.category.to_string(), mock.genre.to_string()],
                link: Some("https://www.ticketmaster.com/discover/concerts/ann-arbor".to_string()),
                published: date.and_time(time).and_utc(),
                payload: Event {
                    venue: mock.venue.to_string(),
                    city: "Ann Arbor".to_string(),
                    state: "MI".to_string(),
                    address: Some(mock.address.to_string()),
                    image: None,
                    category: mock.category.to_string(),
                    genre: mock.genre.to_string(),
                    price_range: mock.price_range.to_string(),
                    description: None,
                    sale_start: None,
                    sale_end: None,
                    local_date: Some(date),
                    local_time: Some(time),
                },
            }
        })
        .collect()
}
