use utoipa::OpenApi;

use crate::api::handlers;
use crate::api::handlers::HealthResponse;
use crate::error::ErrorBody;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Arbor Feeds API",
        version = "1.0.0"
    ),
    paths(
        handlers::craigslist_feed,
        handlers::reddit_feed,
        handlers::daily_weather_feed,
        handlers::weather_feed,
        handlers::emergency_alerts_feed,
        handlers::ticketmaster_feed,
        handlers::realestate_feed,
        handlers::mlive_feed,
        handlers::damnarbor_feed,
        handlers::michigandaily_feed,
        handlers::health
    ),
    tags(
        (name = "feeds", description = "Generated RSS feeds"),
        (name = "relay", description = "External feeds passed through unchanged"),
        (name = "system", description = "Health and API documentation")
    ),
    components(schemas(ErrorBody, HealthResponse))
)]
pub struct ApiDoc;
