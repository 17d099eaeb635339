use axum::{
    extract::State,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE,
        },
        HeaderName, StatusCode,
    },
    response::{IntoResponse, Response},
};
use sources::relay::DEFAULT_CONTENT_TYPE;
use sources::RelayFeed;
use upstream::UpstreamError;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

async fn relay(state: &AppState, slug: &str) -> AppResult<Response> {
    let feed = state
        .sources
        .relay(slug)
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, format!("Unknown feed: {}", slug)))?;

    let response = feed
        .fetch(state.fetcher.as_ref())
        .await
        .map_err(|e| relay_error(feed, e))?;

    let content_type = response
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    tracing::info!("Relayed {} feed ({} bytes)", feed.title, response.body.len());

    Ok((
        [
            (CONTENT_TYPE, content_type),
            (
                CACHE_CONTROL,
                format!("public, max-age={}", feed.max_age().as_secs()),
            ),
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
            (ACCESS_CONTROL_ALLOW_METHODS, "GET".to_string()),
            (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type".to_string()),
            (HeaderName::from_static("x-feed-origin"), "live".to_string()),
        ],
        response.body,
    )
        .into_response())
}

/// Upstream rejections keep their status. Timeouts become 504 and
/// non-feed payloads 502.
fn relay_error(feed: &RelayFeed, err: UpstreamError) -> AppError {
    tracing::error!("Failed to fetch {} feed: {}", feed.title, err);

    let message = format!("Failed to fetch {} RSS feed", feed.title);
    match &err {
        UpstreamError::Rejected {
            status_code,
            status_text,
        } => {
            let status = StatusCode::from_u16(*status_code).unwrap_or(StatusCode::BAD_GATEWAY);
            AppError::new(status, message).with_details(format!("{} {}", status_code, status_text))
        }
        UpstreamError::Timeout(_) => AppError::new(
            StatusCode::GATEWAY_TIMEOUT,
            format!("Request timeout - {} took too long to respond", feed.title),
        ),
        UpstreamError::InvalidPayload(_) => {
            AppError::new(StatusCode::BAD_GATEWAY, message).with_details(err.to_string())
        }
        _ => AppError::internal(message).with_details(err.to_string()),
    }
}

/// MLive Ann Arbor news, passed through unchanged
#[utoipa::path(
    get,
    path = "/api/mlive",
    tag = "relay",
    responses(
        (status = 200, description = "Upstream RSS document", content_type = "application/xml", body = String),
        (status = 502, description = "Upstream returned something other than a feed", body = crate::error::ErrorBody),
        (status = 504, description = "Upstream timed out", body = crate::error::ErrorBody)
    )
)]
pub async fn mlive_feed(State(state): State<AppState>) -> AppResult<Response> {
    relay(&state, "mlive").await
}

/// Damn Arbor, passed through unchanged
#[utoipa::path(
    get,
    path = "/api/damnarbor",
    tag = "relay",
    responses(
        (status = 200, description = "Upstream RSS document", content_type = "application/xml", body = String),
        (status = 502, description = "Upstream returned something other than a feed", body = crate::error::ErrorBody),
        (status = 504, description = "Upstream timed out", body = crate::error::ErrorBody)
    )
)]
pub async fn damnarbor_feed(State(state): State<AppState>) -> AppResult<Response> {
    relay(&state, "damnarbor").await
}

/// The Michigan Daily, passed through unchanged
#[utoipa::path(
    get,
    path = "/api/michigandaily",
    tag = "relay",
    responses(
        (status = 200, description = "Upstream RSS document", content_type = "application/xml", body = String),
        (status = 502, description = "Upstream returned something other than a feed", body = crate::error::ErrorBody),
        (status = 504, description = "Upstream timed out", body = crate::error::ErrorBody)
    )
)]
pub async fn michigandaily_feed(State(state): State<AppState>) -> AppResult<Response> {
    relay(&state, "michigandaily").await
}
