mod feeds;
mod relay;
mod system;

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::StatusCode;
use axum::response::IntoResponse;

pub use feeds::{
    __path_craigslist_feed, __path_daily_weather_feed, __path_emergency_alerts_feed,
    __path_realestate_feed, __path_reddit_feed, __path_ticketmaster_feed, __path_weather_feed,
    craigslist_feed, daily_weather_feed, emergency_alerts_feed, realestate_feed, reddit_feed,
    ticketmaster_feed, weather_feed,
};
pub use relay::{
    __path_damnarbor_feed, __path_michigandaily_feed, __path_mlive_feed, damnarbor_feed,
    michigandaily_feed, mlive_feed,
};
pub use system::{__path_health, health, not_found, openapi_json, HealthResponse};

/// CORS preflight for every feed path
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
    )
}
