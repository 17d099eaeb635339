use std::time::Duration;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE},
        HeaderName,
    },
    response::{IntoResponse, Response},
};
use chrono::Utc;
use feed::RSS_CONTENT_TYPE;
use sources::craigslist::CraigslistParams;
use sources::realestate::RealEstateParams;
use sources::reddit::RedditParams;
use sources::{FeedSource, LocationParams, RenderContext};

use crate::error::{AppError, AppResult};
use crate::services::{run_pipeline, Origin, Outcome};
use crate::state::AppState;

const FEED_ORIGIN: &str = "x-feed-origin";

/// Validate, run the pipeline and render one source's feed.
async fn serve_feed<S: FeedSource>(
    state: &AppState,
    source: &S,
    label: &str,
    params: Result<Query<S::Params>, QueryRejection>,
) -> AppResult<Response> {
    let Query(params) = params.map_err(|e| {
        AppError::bad_request("Invalid query parameters").with_details(e.body_text())
    })?;
    let query = source
        .parse_query(params)
        .map_err(|e| AppError::from_source(label, e))?;
    source
        .check_ready()
        .map_err(|e| AppError::from_source(label, e))?;

    let now = Utc::now();
    let (records, origin) =
        match run_pipeline(source, &query, state.fetcher.as_ref(), &state.cache, now).await {
            Outcome::Ok { records, origin } => (records, origin),
            Outcome::Degraded(records) => (records, Origin::Degraded),
            Outcome::Failed(e) => {
                tracing::error!("Failed to generate {} feed: {}", source.name(), e);
                return Err(AppError::from_source(label, e));
            }
        };

    let count = records.len();
    let ctx = RenderContext::new(state.config.public_url.as_str(), now);
    let document = source.document(&query, records, &ctx);
    let xml = feed::render(&document, now).map_err(|e| {
        tracing::error!("Failed to render {} feed: {}", source.name(), e);
        AppError::internal(format!("Failed to generate {} RSS feed", label)).with_details(e.to_string())
    })?;

    tracing::info!(
        "Served {} feed with {} records ({})",
        source.name(),
        count,
        origin.as_str()
    );
    Ok(feed_response(xml, source.max_age(), origin))
}

fn feed_response(xml: String, max_age: Duration, origin: Origin) -> Response {
    (
        [
            (CONTENT_TYPE, RSS_CONTENT_TYPE.to_string()),
            (CACHE_CONTROL, format!("public, max-age={}", max_age.as_secs())),
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
            (HeaderName::from_static(FEED_ORIGIN), origin.as_str().to_string()),
        ],
        xml,
    )
        .into_response()
}

/// Craigslist Ann Arbor for-sale listings
#[utoipa::path(
    get,
    path = "/api/craigslist",
    tag = "feeds",
    params(CraigslistParams),
    responses(
        (status = 200, description = "RSS 2.0 feed", content_type = "application/rss+xml", body = String),
        (status = 400, description = "Invalid query parameters", body = crate::error::ErrorBody),
        (status = 500, description = "Upstream failed and no cached copy exists", body = crate::error::ErrorBody)
    )
)]
pub async fn craigslist_feed(
    State(state): State<AppState>,
    params: Result<Query<CraigslistParams>, QueryRejection>,
) -> AppResult<Response> {
    serve_feed(&state, &state.sources.craigslist, "Craigslist", params).await
}

/// Posts from one subreddit
#[utoipa::path(
    get,
    path = "/api/reddit",
    tag = "feeds",
    params(RedditParams),
    responses(
        (status = 200, description = "RSS 2.0 feed", content_type = "application/rss+xml", body = String),
        (status = 400, description = "Invalid query parameters", body = crate::error::ErrorBody),
        (status = 500, description = "Upstream failed and no cached copy exists", body = crate::error::ErrorBody)
    )
)]
pub async fn reddit_feed(
    State(state): State<AppState>,
    params: Result<Query<RedditParams>, QueryRejection>,
) -> AppResult<Response> {
    serve_feed(&state, &state.sources.reddit, "Reddit", params).await
}

/// One item per forecast day from the National Weather Service
#[utoipa::path(
    get,
    path = "/api/daily-weather",
    tag = "feeds",
    params(LocationParams),
    responses(
        (status = 200, description = "RSS 2.0 feed, generated when NWS is unreachable", content_type = "application/rss+xml", body = String),
        (status = 400, description = "Invalid query parameters", body = crate::error::ErrorBody)
    )
)]
pub async fn daily_weather_feed(
    State(state): State<AppState>,
    params: Result<Query<LocationParams>, QueryRejection>,
) -> AppResult<Response> {
    serve_feed(&state, &state.sources.daily_weather, "daily weather", params).await
}

/// Seven-day forecast summaries from the National Weather Service
#[utoipa::path(
    get,
    path = "/api/weather",
    tag = "feeds",
    params(LocationParams),
    responses(
        (status = 200, description = "RSS 2.0 feed, generated when NWS is unreachable", content_type = "application/rss+xml", body = String),
        (status = 400, description = "Invalid query parameters", body = crate::error::ErrorBody)
    )
)]
pub async fn weather_feed(
    State(state): State<AppState>,
    params: Result<Query<LocationParams>, QueryRejection>,
) -> AppResult<Response> {
    serve_feed(&state, &state.sources.weather, "weather", params).await
}

/// Active NWS alerts for a location
#[utoipa::path(
    get,
    path = "/api/emergency-alerts",
    tag = "feeds",
    params(LocationParams),
    responses(
        (status = 200, description = "RSS 2.0 feed", content_type = "application/rss+xml", body = String),
        (status = 400, description = "Invalid query parameters", body = crate::error::ErrorBody)
    )
)]
pub async fn emergency_alerts_feed(
    State(state): State<AppState>,
    params: Result<Query<LocationParams>, QueryRejection>,
) -> AppResult<Response> {
    serve_feed(&state, &state.sources.alerts, "emergency alerts", params).await
}

/// Upcoming Ticketmaster events near a location
#[utoipa::path(
    get,
    path = "/api/ticketmaster-events",
    tag = "feeds",
    params(LocationParams),
    responses(
        (status = 200, description = "RSS 2.0 feed", content_type = "application/rss+xml", body = String),
        (status = 400, description = "Invalid query parameters", body = crate::error::ErrorBody),
        (status = 500, description = "TICKETMASTER_API_KEY is not configured", body = crate::error::ErrorBody)
    )
)]
pub async fn ticketmaster_feed(
    State(state): State<AppState>,
    params: Result<Query<LocationParams>, QueryRejection>,
) -> AppResult<Response> {
    serve_feed(&state, &state.sources.ticketmaster, "Ticketmaster events", params).await
}

/// New for-sale listings and price band summaries
#[utoipa::path(
    get,
    path = "/api/realestate",
    tag = "feeds",
    params(RealEstateParams),
    responses(
        (status = 200, description = "RSS 2.0 feed", content_type = "application/rss+xml", body = String),
        (status = 400, description = "Invalid query parameters", body = crate::error::ErrorBody),
        (status = 500, description = "Missing RAPIDAPI_KEY or every MLS upstream failed", body = crate::error::ErrorBody)
    )
)]
pub async fn realestate_feed(
    State(state): State<AppState>,
    params: Result<Query<RealEstateParams>, QueryRejection>,
) -> AppResult<Response> {
    serve_feed(&state, &state.sources.realestate, "real estate", params).await
}
