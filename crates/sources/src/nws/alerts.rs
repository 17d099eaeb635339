use std::time::Duration;

use async_trait::async_trait;
use cache::CacheKey;
use chrono::{DateTime, Utc};
use feed::html::escape;
use feed::{Channel, ChannelImage, FeedDocument, Item};
use upstream::{Expect, Fetcher, UpstreamError, UpstreamRequest};

use super::models::{AlertProperties, AlertsResponse};
use super::LocationQuery;
use crate::dates::parse_timestamp;
use crate::params::LocationParams;
use crate::source::{FeedSource, NormalizedItem, RenderContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub event: String,
    pub headline: Option<String>,
    pub description: String,
    pub severity: String,
    pub urgency: String,
    pub certainty: String,
    pub category: String,
    pub instruction: Option<String>,
    pub areas: Vec<String>,
    pub effective: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
}

pub struct Alerts {
    base_url: String,
}

impl Alerts {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FeedSource for Alerts {
    type Params = LocationParams;
    type Query = LocationQuery;
    type Record = Alert;

    fn name(&self) -> &'static str {
        "emergency-alerts"
    }

    fn path(&self) -> &'static str {
        "/api/emergency-alerts"
    }

    fn parse_query(&self, params: LocationParams) -> crate::Result<LocationQuery> {
        LocationQuery::parse(params)
    }

    fn cache_key(&self, query: &LocationQuery) -> CacheKey {
        CacheKey::new("nws-alerts").param("location", query.location.as_str())
    }

    fn max_age(&self) -> Duration {
        Duration::from_secs(900)
    }

    async fn fetch(&self, fetcher: &dyn Fetcher, query: &LocationQuery) -> Result<String, UpstreamError> {
        let url = format!("{}/alerts/active?point={}", self.base_url, query.coordinates);
        let response = fetcher
            .fetch(UpstreamRequest::get(url).expect(Expect::Json))
            .await?;
        Ok(response.body)
    }

    /// Alerts come out most critical first. An empty list is a valid result.
    fn normalize(
        &self,
        body: &str,
        _query: &LocationQuery,
        now: DateTime<Utc>,
    ) -> crate::Result<Vec<NormalizedItem<Alert>>> {
        let response: AlertsResponse = serde_json::from_str(body)?;
        let mut alerts: Vec<_> = response
            .features
            .into_iter()
            .map(|f| normalize_alert(f.properties, now))
            .collect();
        sort_by_priority(&mut alerts);
        Ok(alerts)
    }

    fn fallback(&self, _query: &LocationQuery, now: DateTime<Utc>) -> Option<Vec<NormalizedItem<Alert>>> {
        Some(mock_alerts(now))
    }

    fn document(
        &self,
        query: &LocationQuery,
        records: Vec<NormalizedItem<Alert>>,
        ctx: &RenderContext,
    ) -> FeedDocument {
        let loc = &query.location;
        let link = ctx.feed_url(self.path(), &[("location", loc.as_str())]);

        let mut channel = Channel::new(
            format!("🚨 Emergency Alerts - {}", loc),
            link.clone(),
            format!("Emergency and severe weather alerts for {} (Ann Arbor, MI area)", loc),
        );
        channel.self_link = Some(link.clone());
        channel.categories = vec!["Emergency".into(), "Weather Alerts".into(), "Ann Arbor".into()];
        channel.copyright = Some("Alert data from National Weather Service".into());
        channel.managing_editor = Some("emergency-alerts@localhost".into());
        channel.web_master = Some("emergency-alerts@localhost".into());
        channel.ttl = Some(15);
        channel.generator = Some(crate::GENERATOR.into());
        channel.image = Some(ChannelImage {
            url: "https://www.weather.gov/images/wrh/Climate/new/nws_logo.png".into(),
            title: "Emergency Alerts RSS Feed".into(),
            link: link.clone(),
        });

        let items = if records.is_empty() {
            vec![all_clear(loc, &link, ctx.now)]
        } else {
            records
                .iter()
                .map(|alert| render_alert(alert, loc, &link))
                .collect()
        };
        FeedDocument::new(channel, items)
    }
}

fn normalize_alert(props: AlertProperties, now: DateTime<Utc>) -> NormalizedItem<Alert> {
    let event = props.event.unwrap_or_else(|| "Alert".to_string());
    let title = props.headline.clone().unwrap_or_else(|| event.clone());
    let severity = props.severity.unwrap_or_else(|| "Unknown".to_string());
    let category = props.category.unwrap_or_default();
    let areas: Vec<String> = props
        .area_desc
        .split(';')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    let published = props
        .sent
        .as_deref()
        .or(props.effective.as_deref())
        .and_then(parse_timestamp)
        .unwrap_or(now);

    NormalizedItem {
        id: props.id,
        title,
        tags: vec![category.clone(), severity.clone()],
        link: None,
        published,
        payload: Alert {
            event,
            headline: props.headline,
            description: props.description.unwrap_or_default(),
            severity,
            urgency: props.urgency.unwrap_or_else(|| "Unknown".to_string()),
            certainty: props.certainty.unwrap_or_else(|| "Unknown".to_string()),
            category,
            instruction: props.instruction.filter(|i| !i.trim().is_empty()),
            areas,
            effective: props.effective.as_deref().and_then(parse_timestamp),
            expires: props.expires.as_deref().and_then(parse_timestamp),
        },
    }
}

fn severity_rank(severity: &str) -> u8 {
    match severity {
        "Extreme" => 4,
        "Severe" => 3,
        "Moderate" => 2,
        "Minor" => 1,
        _ => 0,
    }
}

fn urgency_rank(urgency: &str) -> u8 {
    match urgency {
        "Immediate" => 4,
        "Expected" => 3,
        "Future" => 2,
        "Past" => 1,
        _ => 0,
    }
}

/// Most severe first, then most urgent. Stable, so upstream order breaks ties.
fn sort_by_priority(alerts: &mut [NormalizedItem<Alert>]) {
    alerts.sort_by(|a, b| {
        severity_rank(&b.payload.severity)
            .cmp(&severity_rank(&a.payload.severity))
            .then_with(|| urgency_rank(&b.payload.urgency).cmp(&urgency_rank(&a.payload.urgency)))
    });
}

fn alert_emoji(severity: &str, category: &str) -> &'static str {
    match severity.to_lowercase().as_str() {
        "extreme" => return "🚨",
        "severe" => return "⚠️",
        "moderate" => return "⚡",
        "minor" => return "🔔",
        _ => {}
    }
    let cat = category.to_lowercase();
    let has = |needle: &str| cat.contains(needle);
    if has("fire") {
        "🔥"
    } else if has("flood") || has("tsunami") {
        "🌊"
    } else if has("tornado") {
        "🌪️"
    } else if has("hurricane") {
        "🌀"
    } else if has("winter") || has("snow") || has("ice") {
        "❄️"
    } else if has("heat") {
        "🌡️"
    } else if has("wind") {
        "💨"
    } else if has("thunder") || has("lightning") {
        "⛈️"
    } else if has("earthquake") {
        "🏔️"
    } else {
        "📢"
    }
}

fn alert_color(severity: &str) -> &'static str {
    match severity.to_lowercase().as_str() {
        "extreme" => "#8B0000",
        "severe" => "#FF4500",
        "moderate" => "#FFD700",
        "minor" => "#32CD32",
        _ => "#4169E1",
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(t) => t.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "Unknown".to_string(),
    }
}

fn render_alert(record: &NormalizedItem<Alert>, location: &str, link: &str) -> Item {
    let alert = &record.payload;
    let emoji = alert_emoji(&alert.severity, &alert.category);
    let color = alert_color(&alert.severity);
    let first_area = alert.areas.first().map(String::as_str).unwrap_or(location);

    let mut html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; border-left: 4px solid {color}; padding-left: 15px;"><div style="background: {color}; color: white; padding: 10px; border-radius: 5px;"><h2 style="margin: 0; color: white;">{emoji} {event}</h2><p><strong>Severity:</strong> {severity} | <strong>Urgency:</strong> {urgency} | <strong>Certainty:</strong> {certainty}</p></div>"#,
        color = color,
        emoji = emoji,
        event = escape(&alert.event),
        severity = escape(&alert.severity),
        urgency = escape(&alert.urgency),
        certainty = escape(&alert.certainty),
    );
    html.push_str(&format!(
        r#"<h3 style="color: {};">📍 Affected Areas</h3><p><strong>{}</strong></p>"#,
        color,
        escape(&alert.areas.join(", "))
    ));
    html.push_str(&format!(
        r#"<h3 style="color: {};">📋 Description</h3><p>{}</p>"#,
        color,
        escape(&alert.description).replace('\n', "<br>")
    ));
    if let Some(instruction) = &alert.instruction {
        html.push_str(&format!(
            r#"<div style="background: #fff3cd; border: 1px solid #ffeaa7; padding: 10px; border-radius: 5px;"><h3 style="color: #856404;">⚠️ What You Should Do</h3><p style="color: #856404;"><strong>{}</strong></p></div>"#,
            escape(instruction).replace('\n', "<br>")
        ));
    }
    html.push_str(&format!(
        r#"<h3 style="color: {};">🕒 Timing</h3><p><strong>Effective:</strong> {}</p><p><strong>Expires:</strong> {}</p>"#,
        color,
        format_time(alert.effective),
        format_time(alert.expires)
    ));
    html.push_str(&format!(
        "<p><strong>📡 Source:</strong> National Weather Service<br><strong>📍 Location:</strong> {}<br><strong>🆔 Alert ID:</strong> {}<br><strong>🕒 Issued:</strong> {}</p></div>",
        escape(location),
        escape(&record.id),
        format_time(Some(record.published))
    ));

    let title = format!(
        "{} {}: {} - {}",
        emoji,
        alert.severity.to_uppercase(),
        alert.event,
        first_area
    );
    let mut item = Item::new(
        format!("emergency-alert-{}-{}", location, record.id),
        title,
        record.published,
    )
    .link(link)
    .description(html)
    .category("Emergency")
    .author("emergency-alerts@localhost");
    for tag in &record.tags {
        item = item.category(tag.as_str());
    }
    item
}

fn all_clear(location: &str, link: &str, now: DateTime<Utc>) -> Item {
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px;"><div style="background: #d4edda; border: 1px solid #c3e6cb; padding: 15px; border-radius: 5px; text-align: center;"><h2 style="color: #155724;">✅ All Clear</h2><p style="color: #155724;">There are currently no active emergency alerts for your area.</p></div><p><strong>📍 Location:</strong> {} (Ann Arbor, MI area)<br><strong>📡 Source:</strong> National Weather Service<br><strong>🕒 Last Checked:</strong> {}<br><strong>🔄 Updates:</strong> This feed updates automatically when new alerts are issued</p></div>"#,
        escape(location),
        format_time(Some(now))
    );
    Item::new(
        format!("no-alerts-{}-{}", location, now.date_naive()),
        format!("✅ No Active Emergency Alerts - {}", location),
        now,
    )
    .link(link)
    .description(html)
    .category("Emergency")
    .category("Status")
    .author("emergency-alerts@localhost")
}

/// A severe thunderstorm warning and a winter weather advisory.
pub fn mock_alerts(now: DateTime<Utc>) -> Vec<NormalizedItem<Alert>> {
    let tomorrow = now + chrono::Duration::days(1);
    let mut alerts = vec![
        NormalizedItem {
            id: "mock-severe-thunderstorm-001".to_string(),
            title: "Severe Thunderstorm Warning issued for Ann Arbor area until 8:00 PM EDT".to_string(),
            tags: vec!["Met".to_string(), "Severe".to_string()],
            link: None,
            published: now,
            payload: Alert {
                event: "Severe Thunderstorm Warning".to_string(),
                headline: Some("Severe Thunderstorm Warning issued for Ann Arbor area until 8:00 PM EDT".to_string()),
                description: "A severe thunderstorm warning has been issued for your area. Damaging winds up to 70 mph and quarter-size hail are possible.".to_string(),
                severity: "Severe".to_string(),
                urgency: "Immediate".to_string(),
                certainty: "Likely".to_string(),
                category: "Met".to_string(),
                instruction: Some("Move to an interior room on the lowest floor of a sturdy building. Avoid windows.".to_string()),
                areas: vec!["Washtenaw County".to_string()],
                effective: Some(now),
                expires: Some(now + chrono::Duration::hours(3)),
            },
        },
        NormalizedItem {
            id: "mock-winter-weather-002".to_string(),
            title: "Winter Weather Advisory in effect from 6 AM to 6 PM EST tomorrow".to_string(),
            tags: vec!["Met".to_string(), "Moderate".to_string()],
            link: None,
            published: now,
            payload: Alert {
                event: "Winter Weather Advisory".to_string(),
                headline: Some("Winter Weather Advisory in effect from 6 AM to 6 PM EST tomorrow".to_string()),
                description: "Snow accumulations of 2 to 4 inches expected. Plan on slippery road conditions.".to_string(),
                severity: "Moderate".to_string(),
                urgency: "Expected".to_string(),
                certainty: "Likely".to_string(),
                category: "Met".to_string(),
                instruction: Some("Slow down and use caution while traveling. Check road conditions before heading out.".to_string()),
                areas: vec!["Washtenaw County".to_string(), "Wayne County".to_string()],
                effective: Some(tomorrow),
                expires: Some(tomorrow + chrono::Duration::hours(12)),
            },
        },
    ];
    sort_by_priority(&mut alerts);
    alerts
}
