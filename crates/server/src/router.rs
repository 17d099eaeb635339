use std::any::Any;

use axum::{
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::{api::handlers, error::AppError, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Generated feeds
        .route(
            "/api/craigslist",
            get(handlers::craigslist_feed).options(handlers::preflight),
        )
        .route(
            "/api/reddit",
            get(handlers::reddit_feed).options(handlers::preflight),
        )
        .route(
            "/api/daily-weather",
            get(handlers::daily_weather_feed).options(handlers::preflight),
        )
        .route(
            "/api/weather",
            get(handlers::weather_feed).options(handlers::preflight),
        )
        .route(
            "/api/emergency-alerts",
            get(handlers::emergency_alerts_feed).options(handlers::preflight),
        )
        .route(
            "/api/ticketmaster-events",
            get(handlers::ticketmaster_feed).options(handlers::preflight),
        )
        .route(
            "/api/realestate",
            get(handlers::realestate_feed).options(handlers::preflight),
        )
        // Relayed feeds
        .route(
            "/api/mlive",
            get(handlers::mlive_feed).options(handlers::preflight),
        )
        .route(
            "/api/damnarbor",
            get(handlers::damnarbor_feed).options(handlers::preflight),
        )
        .route(
            "/api/michigandaily",
            get(handlers::michigandaily_feed).options(handlers::preflight),
        )
        // System
        .route("/api/health", get(handlers::health))
        .route("/api/openapi.json", get(handlers::openapi_json))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
}

/// A panicking handler still answers with the JSON error body.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Request handler panicked: {}", message);
    AppError::internal("Internal server error").into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;
    use upstream::mock::{MockFetcher, MockReply};
    use upstream::UpstreamError;

    use super::*;
    use crate::config::Config;

    const LISTINGS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>craigslist</title>
<item><title>Desk lamp - $15 (Ypsilanti)</title>
<link>https://annarbor.craigslist.org/hsh/d/ypsilanti-desk-lamp/7700000001.html</link>
<description>Works fine</description></item>
</channel></rss>"#;

    const MLIVE: &str = r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"><title>MLive</title></feed>"#;

    struct TestApp {
        fetcher: MockFetcher,
        state: AppState,
        _dir: tempfile::TempDir,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_config(Config::default())
        }

        fn with_config(config: Config) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = Config {
                cache_dir: dir.path().to_path_buf(),
                ..config
            };
            let fetcher = MockFetcher::new();
            let state = AppState::with_fetcher(config, Arc::new(fetcher.clone()));
            Self {
                fetcher,
                state,
                _dir: dir,
            }
        }

        async fn request(&self, method: Method, uri: &str) -> Response {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            create_router(self.state.clone()).oneshot(request).await.unwrap()
        }

        async fn get(&self, uri: &str) -> Response {
            self.request(Method::GET, uri).await
        }
    }

    fn header<'a>(response: &'a Response, name: &str) -> &'a str {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_craigslist_feed_headers_and_body() {
        let app = TestApp::new();
        app.fetcher.on("openrss.org", MockReply::ok(LISTINGS));

        let response = app.get("/api/craigslist").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "content-type"), "application/rss+xml; charset=utf-8");
        assert_eq!(header(&response, "cache-control"), "public, max-age=3600");
        assert_eq!(header(&response, "access-control-allow-origin"), "*");
        assert_eq!(header(&response, "x-feed-origin"), "live");

        let xml = body_text(response).await;
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("Desk lamp"));
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let app = TestApp::new();
        app.fetcher.on("openrss.org", MockReply::ok(LISTINGS));

        app.get("/api/craigslist").await;
        let response = app.get("/api/craigslist").await;

        assert_eq!(header(&response, "x-feed-origin"), "cache");
        assert_eq!(app.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_craigslist_upstream_failure_without_cache() {
        let app = TestApp::new();
        app.fetcher.on("openrss.org", MockReply::status(503, "Service Unavailable"));

        let response = app.get("/api/craigslist").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(header(&response, "access-control-allow-origin"), "*");

        let body = body_json(response).await;
        assert_eq!(body["error"], "Failed to generate Craigslist RSS feed");
        assert!(body["details"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_invalid_subreddit_is_rejected_without_upstream_call() {
        let app = TestApp::new();

        let response = app.get("/api/reddit?subreddit=ann%3Barbor").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid subreddit name");
        assert_eq!(app.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_limit_is_rejected() {
        let app = TestApp::new();

        let response = app.get("/api/reddit?limit=0").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_alerts_renders_all_clear_item() {
        let app = TestApp::new();
        app.fetcher.on("alerts/active", MockReply::ok(r#"{"features": []}"#));

        let response = app.get("/api/emergency-alerts").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "cache-control"), "public, max-age=900");

        let xml = body_text(response).await;
        assert_eq!(xml.matches("<item>").count(), 1);
        assert!(xml.contains("No Active Emergency Alerts - 48103"));
    }

    #[tokio::test]
    async fn test_unreachable_weather_service_serves_generated_forecast() {
        let app = TestApp::new();
        app.fetcher.on(
            "api.weather.gov",
            MockReply::err(UpstreamError::Timeout(Duration::from_secs(10))),
        );

        let response = app.get("/api/daily-weather").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-feed-origin"), "degraded");

        let xml = body_text(response).await;
        assert_eq!(xml.matches("<item>").count(), 7);
    }

    #[tokio::test]
    async fn test_ticketmaster_without_key_is_not_configured() {
        let app = TestApp::new();

        let response = app.get("/api/ticketmaster-events").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Ticketmaster events feed is not configured");
        assert!(body["details"].as_str().unwrap().contains("TICKETMASTER_API_KEY"));
        assert_eq!(app.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_relay_passes_document_through() {
        let app = TestApp::new();
        app.fetcher.on(
            "rss-bridge.org",
            MockReply::ok_with_type(MLIVE, "application/atom+xml"),
        );

        let response = app.get("/api/mlive").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "content-type"), "application/atom+xml");
        assert_eq!(header(&response, "cache-control"), "public, max-age=1800");
        assert_eq!(header(&response, "access-control-allow-methods"), "GET");
        assert_eq!(body_text(response).await, MLIVE);
    }

    #[tokio::test]
    async fn test_relay_defaults_content_type() {
        let app = TestApp::new();
        app.fetcher.on("michigandaily.com", MockReply::ok(MLIVE));

        let response = app.get("/api/michigandaily").await;
        assert_eq!(header(&response, "content-type"), "application/xml");
    }

    #[tokio::test]
    async fn test_relay_keeps_upstream_status() {
        let app = TestApp::new();
        app.fetcher.on("damnarbor.com", MockReply::status(404, "Not Found"));

        let response = app.get("/api/damnarbor").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Failed to fetch Damn Arbor RSS feed");
    }

    #[tokio::test]
    async fn test_relay_timeout_is_gateway_timeout() {
        let app = TestApp::new();
        app.fetcher.on(
            "damnarbor.com",
            MockReply::err(UpstreamError::Timeout(Duration::from_secs(30))),
        );

        let response = app.get("/api/damnarbor").await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_relay_non_feed_payload_is_bad_gateway() {
        let app = TestApp::new();
        app.fetcher.on("michigandaily.com", MockReply::ok("<html>blocked</html>"));

        let response = app.get("/api/michigandaily").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_preflight() {
        let app = TestApp::new();

        let response = app.request(Method::OPTIONS, "/api/realestate").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "access-control-allow-methods"), "GET, OPTIONS");
        assert_eq!(app.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_health_and_openapi() {
        let app = TestApp::new();

        let health = body_json(app.get("/api/health").await).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

        let doc = body_json(app.get("/api/openapi.json").await).await;
        assert!(doc["paths"]["/api/reddit"].is_object());
        assert!(doc["paths"]["/api/mlive"].is_object());
    }

    async fn panicking_handler() -> &'static str {
        panic!("normalizer bug")
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_json_500() {
        let app = Router::new()
            .route("/boom", get(panicking_handler))
            .layer(CatchPanicLayer::custom(panic_response));
        let request = Request::builder().uri("/boom").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(header(&response, "access-control-allow-origin"), "*");
        assert_eq!(body_json(response).await["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_unknown_path_is_json_404() {
        let app = TestApp::new();

        let response = app.get("/api/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Not found");
    }
}
