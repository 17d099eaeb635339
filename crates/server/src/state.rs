use std::sync::Arc;

use cache::DiskCache;
use sources::{
    relay_feeds, Alerts, Craigslist, Forecast, RealEstate, Reddit, RelayFeed, Ticketmaster,
};
use upstream::{Fetcher, UpstreamClient, UpstreamError};

use crate::config::Config;

/// One descriptor per feed endpoint, built from the configured endpoints
/// and credentials.
pub struct Sources {
    pub craigslist: Craigslist,
    pub reddit: Reddit,
    pub daily_weather: Forecast,
    pub weather: Forecast,
    pub alerts: Alerts,
    pub ticketmaster: Ticketmaster,
    pub realestate: RealEstate,
    pub relays: Vec<RelayFeed>,
}

impl Sources {
    pub fn from_config(config: &Config) -> Self {
        let endpoints = &config.endpoints;
        let credentials = &config.credentials;

        Self {
            craigslist: Craigslist::new(endpoints.craigslist_feed.as_str()),
            reddit: Reddit::new(endpoints.reddit.as_str()),
            daily_weather: Forecast::daily(endpoints.nws.as_str()),
            weather: Forecast::weekly(endpoints.nws.as_str()),
            alerts: Alerts::new(endpoints.nws.as_str()),
            ticketmaster: Ticketmaster::new(
                endpoints.ticketmaster.as_str(),
                credentials.ticketmaster_api_key.clone(),
            ),
            realestate: RealEstate::new(
                endpoints.zillow.as_str(),
                endpoints.rentspree.as_str(),
                credentials.rapidapi_key.clone(),
                credentials.rentspree_api_key.clone(),
            ),
            relays: relay_feeds(endpoints),
        }
    }

    pub fn relay(&self, slug: &str) -> Option<&RelayFeed> {
        self.relays.iter().find(|feed| feed.slug == slug)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: Arc<dyn Fetcher>,
    pub cache: Arc<DiskCache>,
    pub sources: Arc<Sources>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, UpstreamError> {
        let client = UpstreamClient::new(config.user_agent.as_str())?;
        Ok(Self::with_fetcher(config, Arc::new(client)))
    }

    /// Build the state around an arbitrary fetcher, such as a mock.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Self {
        let cache = DiskCache::new(config.cache_dir.clone());
        let sources = Sources::from_config(&config);

        Self {
            config: Arc::new(config),
            fetcher,
            cache: Arc::new(cache),
            sources: Arc::new(sources),
        }
    }
}
