use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use cache::CacheKey;
use chrono::{DateTime, NaiveDate, Utc};
use feed::html::escape;
use feed::{Channel, ChannelImage, Enclosure, FeedDocument, Item};
use rand::seq::SliceRandom;
use rand::Rng;
use upstream::{Expect, Fetcher, UpstreamError, UpstreamRequest};

use super::models::{ForecastResponse, Period, PointsResponse};
use super::{weather_emoji, LocationQuery};
use crate::error::SourceError;
use crate::params::LocationParams;
use crate::source::{FeedSource, NormalizedItem, RenderContext};

/// NWS returns day and night periods; two weeks of them cover seven days.
const MAX_PERIODS: usize = 14;
const FORECAST_DAYS: usize = 7;
const WEEKLY_WINDOWS: usize = 3;

const MOCK_CONDITIONS: [(&str, &str); 5] = [
    ("Sunny", "https://api.weather.gov/icons/land/day/skc?size=medium"),
    ("Partly Cloudy", "https://api.weather.gov/icons/land/day/sct?size=medium"),
    ("Cloudy", "https://api.weather.gov/icons/land/day/ovc?size=medium"),
    ("Light Rain", "https://api.weather.gov/icons/land/day/rain_light?size=medium"),
    ("Thunderstorms", "https://api.weather.gov/icons/land/day/tsra?size=medium"),
];
const WIND_DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastView {
    /// One item per day.
    Daily,
    /// One summary item per seven-day window.
    Weekly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub high: i32,
    pub low: i32,
    pub description: String,
    pub precipitation_chance: Option<u32>,
    pub humidity: Option<u32>,
    pub wind_speed: Option<u32>,
    pub wind_direction: Option<String>,
    pub icon: Option<String>,
}

pub struct Forecast {
    base_url: String,
    view: ForecastView,
}

impl Forecast {
    pub fn new(base_url: impl Into<String>, view: ForecastView) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            view,
        }
    }

    pub fn daily(base_url: impl Into<String>) -> Self {
        Self::new(base_url, ForecastView::Daily)
    }

    pub fn weekly(base_url: impl Into<String>) -> Self {
        Self::new(base_url, ForecastView::Weekly)
    }

    fn channel(&self, query: &LocationQuery, ctx: &RenderContext) -> Channel {
        let loc = &query.location;
        let feed_url = ctx.feed_url(self.path(), &[("location", loc.as_str())]);
        let (title, description, generator_icon) = match self.view {
            ForecastView::Daily => (
                format!("🌤️ 7-Day Weather Forecast - {}", loc),
                format!(
                    "Daily weather forecast for {} (Ann Arbor, MI area) with icons and detailed conditions",
                    loc
                ),
                "https://api.weather.gov/icons/land/day/skc?size=small",
            ),
            ForecastView::Weekly => (
                format!("📅 Weekly Weather Forecasts - {}", loc),
                format!(
                    "7-day weather forecasts starting from different days for {} (Ann Arbor, MI area)",
                    loc
                ),
                "https://api.weather.gov/icons/land/day/few?size=small",
            ),
        };

        let mut channel = Channel::new(title, feed_url.clone(), description);
        channel.self_link = Some(feed_url.clone());
        channel.categories = vec!["Weather".into(), "Forecast".into(), "Ann Arbor".into()];
        channel.copyright = Some("Weather data from National Weather Service".into());
        channel.managing_editor = Some("weather-rss@localhost".into());
        channel.web_master = Some("weather-rss@localhost".into());
        channel.ttl = Some(360);
        channel.generator = Some(crate::GENERATOR.into());
        channel.image = Some(ChannelImage {
            url: generator_icon.into(),
            title: "Weather RSS Feed".into(),
            link: feed_url,
        });
        channel
    }
}

#[async_trait]
impl FeedSource for Forecast {
    type Params = LocationParams;
    type Query = LocationQuery;
    type Record = DayForecast;

    fn name(&self) -> &'static str {
        match self.view {
            ForecastView::Daily => "daily-weather",
            ForecastView::Weekly => "weather",
        }
    }

    fn path(&self) -> &'static str {
        match self.view {
            ForecastView::Daily => "/api/daily-weather",
            ForecastView::Weekly => "/api/weather",
        }
    }

    fn parse_query(&self, params: LocationParams) -> crate::Result<LocationQuery> {
        LocationQuery::parse(params)
    }

    fn cache_key(&self, query: &LocationQuery) -> CacheKey {
        CacheKey::new("nws-forecast").param("location", query.location.as_str())
    }

    fn max_age(&self) -> Duration {
        Duration::from_secs(3600)
    }

    /// Resolve the grid point, then fetch its forecast.
    async fn fetch(&self, fetcher: &dyn Fetcher, query: &LocationQuery) -> Result<String, UpstreamError> {
        let points_url = format!("{}/points/{}", self.base_url, query.coordinates);
        let points = fetcher
            .fetch(UpstreamRequest::get(points_url).expect(Expect::Json))
            .await?;
        let forecast_url = serde_json::from_str::<PointsResponse>(&points.body)
            .map_err(|e| UpstreamError::InvalidPayload(format!("grid point lookup: {}", e)))?
            .properties
            .forecast;

        let forecast = fetcher
            .fetch(UpstreamRequest::get(forecast_url).expect(Expect::Json))
            .await?;
        Ok(forecast.body)
    }

    fn normalize(
        &self,
        body: &str,
        _query: &LocationQuery,
        _now: DateTime<Utc>,
    ) -> crate::Result<Vec<NormalizedItem<DayForecast>>> {
        let response: ForecastResponse = serde_json::from_str(body)?;
        let days = pair_periods(&response.properties.periods);
        if days.is_empty() {
            return Err(SourceError::Malformed("Forecast contains no periods".to_string()));
        }
        Ok(days.into_iter().map(into_item).collect())
    }

    fn fallback(&self, _query: &LocationQuery, now: DateTime<Utc>) -> Option<Vec<NormalizedItem<DayForecast>>> {
        let days = mock_forecast(&mut rand::thread_rng(), now.date_naive());
        Some(days.into_iter().map(into_item).collect())
    }

    fn document(
        &self,
        query: &LocationQuery,
        records: Vec<NormalizedItem<DayForecast>>,
        ctx: &RenderContext,
    ) -> FeedDocument {
        let channel = self.channel(query, ctx);
        let link = ctx.feed_url(self.path(), &[("location", query.location.as_str())]);
        let items = match self.view {
            ForecastView::Daily => records
                .iter()
                .map(|day| render_day(day, &query.location, &link))
                .collect(),
            ForecastView::Weekly => weekly_windows(&records)
                .iter()
                .enumerate()
                .map(|(i, week)| render_week(week, i, &query.location, &link, ctx.now))
                .collect(),
        };
        FeedDocument::new(channel, items)
    }
}

/// Fold NWS periods into days, treating even periods as daytime and the
/// following one as its night.
fn pair_periods(periods: &[Period]) -> Vec<DayForecast> {
    let mut days = Vec::new();
    let limit = periods.len().min(MAX_PERIODS);

    for i in (0..limit).step_by(2) {
        let day = &periods[i];
        let night = periods.get(i + 1);
        let Some(date) = crate::dates::parse_timestamp(&day.start_time).map(|dt| dt.date_naive()) else {
            tracing::debug!("Skipping forecast period with unreadable start time: {}", day.start_time);
            continue;
        };

        days.push(DayForecast {
            date,
            high: day.temperature,
            low: night.map(|n| n.temperature).unwrap_or(day.temperature - 15),
            description: day.short_forecast.clone(),
            precipitation_chance: measurement(day.probability_of_precipitation.as_ref()),
            humidity: measurement(day.relative_humidity.as_ref()),
            wind_speed: day
                .wind_speed
                .as_deref()
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.parse::<u32>().ok()),
            wind_direction: day.wind_direction.clone().filter(|d| !d.is_empty()),
            icon: day.icon.clone(),
        });

        if days.len() >= FORECAST_DAYS {
            break;
        }
    }
    days
}

fn measurement(m: Option<&super::models::Measurement>) -> Option<u32> {
    m.and_then(|m| m.value).map(|v| v.round().max(0.0) as u32)
}

/// Seven days of plausible weather starting at `today`.
pub fn mock_forecast(rng: &mut impl Rng, today: NaiveDate) -> Vec<DayForecast> {
    today
        .iter_days()
        .take(FORECAST_DAYS)
        .map(|date| {
            let (description, icon) = MOCK_CONDITIONS[rng.gen_range(0..MOCK_CONDITIONS.len())];
            DayForecast {
                date,
                high: rng.gen_range(70..90),
                low: rng.gen_range(50..65),
                description: description.to_string(),
                precipitation_chance: Some(rng.gen_range(0..100)),
                humidity: Some(rng.gen_range(40..80)),
                wind_speed: Some(rng.gen_range(5..20)),
                wind_direction: WIND_DIRECTIONS.choose(&mut *rng).map(|d| d.to_string()),
                icon: Some(icon.to_string()),
            }
        })
        .collect()
}

fn into_item(day: DayForecast) -> NormalizedItem<DayForecast> {
    let published = day
        .date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_default();
    NormalizedItem {
        id: day.date.to_string(),
        title: day.description.clone(),
        tags: vec!["Weather".to_string()],
        link: None,
        published,
        payload: day,
    }
}

fn short_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

fn render_day(record: &NormalizedItem<DayForecast>, location: &str, link: &str) -> Item {
    let day = &record.payload;
    let emoji = weather_emoji(&day.description);
    let weekday = day.date.format("%A");
    let description = escape(&day.description);

    let mut html = format!(
        r#"<div style="font-family: Arial, sans-serif;"><h3>{} {}, {}</h3>"#,
        emoji,
        weekday,
        short_date(day.date)
    );
    if let Some(icon) = &day.icon {
        html.push_str(&format!(
            r#"<p><img src="{}" alt="{}" style="width: 64px; height: 64px;"/></p>"#,
            escape(icon),
            description
        ));
    }
    html.push_str(&format!(
        "<p><strong>🌡️ Temperature:</strong> High {}°F, Low {}°F</p><p><strong>☁️ Conditions:</strong> {}</p>",
        day.high, day.low, description
    ));
    if let Some(chance) = day.precipitation_chance {
        html.push_str(&format!("<p><strong>🌧️ Precipitation Chance:</strong> {}%</p>", chance));
    }
    if let Some(humidity) = day.humidity {
        html.push_str(&format!("<p><strong>💧 Humidity:</strong> {}%</p>", humidity));
    }
    match (day.wind_speed, &day.wind_direction) {
        (Some(speed), Some(direction)) => html.push_str(&format!(
            "<p><strong>💨 Wind:</strong> {} {} mph</p>",
            escape(direction),
            speed
        )),
        (Some(speed), None) => html.push_str(&format!("<p><strong>💨 Wind Speed:</strong> {} mph</p>", speed)),
        _ => {}
    }
    html.push_str("</div>");

    let title = format!(
        "{} {} - {}°/{}°F - {}",
        emoji, weekday, day.high, day.low, day.description
    );
    let mut item = Item::new(format!("weather-{}-{}", location, day.date), title, record.published)
        .link(link)
        .description(html)
        .author("weather-rss@localhost");
    for tag in &record.tags {
        item = item.category(tag.as_str());
    }
    if let Some(icon) = &day.icon {
        item = item.enclosure(Enclosure {
            url: icon.clone(),
            mime_type: "image/png".to_string(),
            length: 0,
        });
    }
    item
}

/// Summary of seven consecutive days.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekSummary<'a> {
    pub days: &'a [NormalizedItem<DayForecast>],
    pub avg_high: i32,
    pub avg_low: i32,
    pub dominant: String,
    pub avg_precipitation: u32,
}

/// Seven-day windows starting at each of the first three days, keeping only
/// windows that are complete.
pub fn weekly_windows(days: &[NormalizedItem<DayForecast>]) -> Vec<WeekSummary<'_>> {
    let mut windows = Vec::new();
    for offset in 0..WEEKLY_WINDOWS {
        let Some(window) = days.get(offset..offset + FORECAST_DAYS) else {
            break;
        };
        windows.push(summarize(window));
    }
    windows
}

fn summarize(days: &[NormalizedItem<DayForecast>]) -> WeekSummary<'_> {
    let n = days.len() as f64;
    let avg_high = (days.iter().map(|d| d.payload.high as f64).sum::<f64>() / n).round() as i32;
    let avg_low = (days.iter().map(|d| d.payload.low as f64).sum::<f64>() / n).round() as i32;

    // Most frequent condition; ties go to the one seen first.
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for day in days {
        let count = counts.entry(day.payload.description.as_str()).or_insert(0);
        if *count == 0 {
            order.push(&day.payload.description);
        }
        *count += 1;
    }
    let mut dominant = "";
    let mut best = 0;
    for condition in order {
        if counts[condition] > best {
            best = counts[condition];
            dominant = condition;
        }
    }

    let chances: Vec<u32> = days.iter().filter_map(|d| d.payload.precipitation_chance).collect();
    let avg_precipitation = if chances.is_empty() {
        0
    } else {
        (chances.iter().sum::<u32>() as f64 / chances.len() as f64).round() as u32
    };

    WeekSummary {
        days,
        avg_high,
        avg_low,
        dominant: dominant.to_string(),
        avg_precipitation,
    }
}

fn render_week(week: &WeekSummary<'_>, index: usize, location: &str, link: &str, now: DateTime<Utc>) -> Item {
    let first = &week.days[0];
    let start = first.payload.date;
    let emoji = weather_emoji(&week.dominant);
    let heading = format!("7 Day Forecast starting {}", short_date(start));

    let mut html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px;"><h2>{} {}</h2>"#,
        emoji, heading
    );
    html.push_str(&format!(
        r#"<div style="background: #f0f8ff; padding: 15px; border-radius: 8px;"><h3>📊 Week Summary</h3><p><strong>🌡️ Average Temperature:</strong> High {}°F, Low {}°F</p><p><strong>☁️ Dominant Conditions:</strong> {}</p><p><strong>🌧️ Average Precipitation Chance:</strong> {}%</p></div>"#,
        week.avg_high,
        week.avg_low,
        escape(&week.dominant),
        week.avg_precipitation
    ));
    html.push_str("<h3>📅 Daily Breakdown</h3>");
    for record in week.days {
        let day = &record.payload;
        html.push_str(&format!(
            r#"<div style="border: 1px solid #ddd; padding: 10px;"><h4>{} {}, {}</h4><p><strong>🌡️</strong> {}°/{}°F</p><p><strong>☁️</strong> {}</p>"#,
            weather_emoji(&day.description),
            day.date.format("%A"),
            short_date(day.date),
            day.high,
            day.low,
            escape(&day.description)
        ));
        if let Some(chance) = day.precipitation_chance {
            html.push_str(&format!("<p><strong>🌧️</strong> {}% chance of precipitation</p>", chance));
        }
        if let (Some(speed), Some(direction)) = (day.wind_speed, &day.wind_direction) {
            html.push_str(&format!("<p><strong>💨</strong> {} {} mph</p>", escape(direction), speed));
        }
        if let Some(humidity) = day.humidity {
            html.push_str(&format!("<p><strong>💧</strong> {}% humidity</p>", humidity));
        }
        html.push_str("</div>");
    }
    html.push_str(&format!(
        "<p><strong>📍 Location:</strong> {} (Ann Arbor, MI area)<br><strong>📡 Data Source:</strong> National Weather Service<br><strong>🕒 Generated:</strong> {}</p></div>",
        escape(location),
        now.format("%Y-%m-%d %H:%M UTC")
    ));

    let title = format!(
        "{} {} - Avg {}°/{}°F - {}",
        emoji, heading, week.avg_high, week.avg_low, week.dominant
    );
    let mut item = Item::new(
        format!("weekly-weather-{}-{}-{}", location, start, index),
        title,
        first.published,
    )
    .link(link)
    .description(html)
    .category("Weather")
    .category("Weekly Forecast")
    .author("weather-rss@localhost");
    if let Some(icon) = &first.payload.icon {
        item = item.enclosure(Enclosure {
            url: icon.clone(),
            mime_type: "image/png".to_string(),
            length: 0,
        });
    }
    item
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use upstream::mock::{MockFetcher, MockReply};

    use super::*;

    const FORECAST: &str = r#"{
      "properties": {
        "periods": [
          {"number": 1, "name": "Wednesday", "startTime": "2024-05-01T06:00:00-04:00", "isDaytime": true,
           "temperature": 72, "windSpeed": "5 to 10 mph", "windDirection": "SW",
           "icon": "https://api.weather.gov/icons/land/day/few?size=medium", "shortForecast": "Sunny",
           "probabilityOfPrecipitation": {"unitCode": "wmoUnit:percent", "value": null},
           "relativeHumidity": {"unitCode": "wmoUnit:percent", "value": 55}},
          {"number": 2, "name": "Wednesday Night", "startTime": "2024-05-01T18:00:00-04:00", "isDaytime": false,
           "temperature": 51, "windSpeed": "5 mph", "windDirection": "W", "shortForecast": "Clear"},
          {"number": 3, "name": "Thursday", "startTime": "2024-05-02T06:00:00-04:00", "isDaytime": true,
           "temperature": 65, "windSpeed": "15 mph", "windDirection": "", "shortForecast": "Chance Rain Showers",
           "probabilityOfPrecipitation": {"value": 60}}
        ]
      }
    }"#;

    fn day(date: NaiveDate, high: i32, low: i32, description: &str, precip: Option<u32>) -> NormalizedItem<DayForecast> {
        into_item(DayForecast {
            date,
            high,
            low,
            description: description.to_string(),
            precipitation_chance: precip,
            humidity: None,
            wind_speed: None,
            wind_direction: None,
            icon: None,
        })
    }

    fn may(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn query() -> LocationQuery {
        LocationQuery::parse(LocationParams::default()).unwrap()
    }

    #[test]
    fn test_normalize_pairs_day_and_night() {
        let days = Forecast::daily("https://api.weather.gov")
            .normalize(FORECAST, &query(), Utc::now())
            .unwrap();
        assert_eq!(days.len(), 2);

        let first = &days[0].payload;
        assert_eq!(first.date, may(1));
        assert_eq!((first.high, first.low), (72, 51));
        assert_eq!(first.wind_speed, Some(5));
        assert_eq!(first.wind_direction.as_deref(), Some("SW"));
        assert_eq!(first.precipitation_chance, None);
        assert_eq!(first.humidity, Some(55));

        let second = &days[1].payload;
        assert_eq!((second.high, second.low), (65, 50));
        assert_eq!(second.precipitation_chance, Some(60));
        assert_eq!(second.wind_direction, None);
    }

    #[test]
    fn test_normalize_without_periods_is_malformed() {
        let result = Forecast::daily("https://api.weather.gov").normalize(
            r#"{"properties": {"periods": []}}"#,
            &query(),
            Utc::now(),
        );
        assert!(matches!(result, Err(SourceError::Malformed(_))));
    }

    #[test]
    fn test_mock_forecast_is_plausible() {
        let mut rng = StdRng::seed_from_u64(7);
        let days = mock_forecast(&mut rng, may(1));

        assert_eq!(days.len(), 7);
        for (i, d) in days.iter().enumerate() {
            assert_eq!(d.date, may(1 + i as u32));
            assert!(d.high >= d.low);
            assert!((70..90).contains(&d.high));
            assert!((50..65).contains(&d.low));
            assert!(d.icon.is_some());
        }
    }

    #[test]
    fn test_weekly_windows() {
        let days: Vec<_> = (1..=9)
            .map(|d| day(may(d), 70 + d as i32, 50, if d % 3 == 0 { "Rain" } else { "Sunny" }, Some(d * 10)))
            .collect();

        assert_eq!(weekly_windows(&days[..6]).len(), 0);
        assert_eq!(weekly_windows(&days[..7]).len(), 1);
        assert_eq!(weekly_windows(&days[..8]).len(), 2);
        let windows = weekly_windows(&days);
        assert_eq!(windows.len(), 3);

        let first = &windows[0];
        assert_eq!(first.days.len(), 7);
        assert_eq!(first.avg_high, 74);
        assert_eq!(first.avg_low, 50);
        assert_eq!(first.dominant, "Sunny");
        assert_eq!(first.avg_precipitation, 40);
        assert_eq!(windows[2].days[0].payload.date, may(3));
    }

    #[test]
    fn test_summary_without_precipitation_data() {
        let days: Vec<_> = (1..=7).map(|d| day(may(d), 80, 60, "Cloudy", None)).collect();
        assert_eq!(weekly_windows(&days)[0].avg_precipitation, 0);
    }

    #[test]
    fn test_daily_document() {
        let source = Forecast::daily("https://api.weather.gov");
        let records = source.normalize(FORECAST, &query(), Utc::now()).unwrap();
        let ctx = RenderContext::new("http://localhost:3000", Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let doc = source.document(&query(), records, &ctx);

        assert_eq!(doc.channel.title, "🌤️ 7-Day Weather Forecast - 48103");
        assert_eq!(doc.channel.ttl, Some(360));
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].title, "☀️ Wednesday - 72°/51°F - Sunny");
        assert_eq!(doc.items[0].guid, "weather-48103-2024-05-01");
        assert_eq!(doc.items[0].categories, vec!["Weather"]);
        assert_eq!(doc.items[0].enclosure.as_ref().map(|e| e.mime_type.as_str()), Some("image/png"));
    }

    #[test]
    fn test_weekly_document() {
        let source = Forecast::weekly("https://api.weather.gov");
        let records: Vec<_> = (1..=7).map(|d| day(may(d), 80, 60, "Partly Cloudy", None)).collect();
        let ctx = RenderContext::new("http://localhost:3000", Utc::now());
        let doc = source.document(&query(), records, &ctx);

        assert_eq!(doc.channel.title, "📅 Weekly Weather Forecasts - 48103");
        assert_eq!(doc.items.len(), 1);
        assert_eq!(
            doc.items[0].title,
            "⛅ 7 Day Forecast starting 5/1/2024 - Avg 80°/60°F - Partly Cloudy"
        );
        assert_eq!(doc.items[0].guid, "weekly-weather-48103-2024-05-01-0");
        assert_eq!(doc.items[0].categories, vec!["Weather", "Weekly Forecast"]);
    }

    #[tokio::test]
    async fn test_fetch_follows_grid_point() {
        let fetcher = MockFetcher::new();
        fetcher.on(
            "weather.gov/points/42.2808,-83.743",
            MockReply::ok(r#"{"properties": {"forecast": "https://api.weather.gov/gridpoints/DTX/65,33/forecast"}}"#),
        );
        fetcher.on("gridpoints/DTX/65,33/forecast", MockReply::ok(FORECAST));

        let body = Forecast::daily("https://api.weather.gov")
            .fetch(&fetcher, &query())
            .await
            .unwrap();
        assert_eq!(body, FORECAST);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_rejects_unreadable_grid_point() {
        let fetcher = MockFetcher::new();
        fetcher.on("weather.gov/points", MockReply::ok(r#"{"status": 404}"#));

        let err = Forecast::daily("https://api.weather.gov")
            .fetch(&fetcher, &query())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidPayload(_)));
        assert_eq!(fetcher.calls(), 1);
    }
}
