//! Source descriptors: how each upstream is queried, normalized and
//! rendered. Every feed endpoint is one [`FeedSource`] driven by the same
//! server pipeline.

mod dates;
mod error;
mod format;
mod geo;
mod params;
mod source;

pub mod craigslist;
pub mod endpoints;
pub mod nws;
pub mod realestate;
pub mod reddit;
pub mod relay;
pub mod ticketmaster;

pub use craigslist::Craigslist;
pub use endpoints::Endpoints;
pub use error::SourceError;
pub use geo::Coordinates;
pub use nws::{Alerts, Forecast, LocationQuery};
pub use params::LocationParams;
pub use realestate::RealEstate;
pub use reddit::Reddit;
pub use relay::{relay_feeds, RelayFeed};
pub use source::{CachePolicy, FeedSource, NormalizedItem, RenderContext};
pub use ticketmaster::Ticketmaster;

pub type Result<T> = std::result::Result<T, SourceError>;

/// Default User-Agent of the upstream client. Some feed hosts block
/// unknown clients.
pub const FEED_USER_AGENT: &str = "RSS-Feed-Bot/1.0 (Personal RSS aggregator)";
pub const FEED_ACCEPT: &str = "application/rss+xml, application/xml, text/xml";

/// Value of every rendered channel's `<generator>`.
pub const GENERATOR: &str = concat!("arbor-feeds ", env!("CARGO_PKG_VERSION"));
