use serde::{Deserialize, Serialize};

/// Upstream base URLs. Overridable from the config file, mostly for
/// pointing sources at a local stub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub craigslist_feed: String,
    pub reddit: String,
    pub nws: String,
    pub ticketmaster: String,
    pub zillow: String,
    pub rentspree: String,
    pub mlive_feed: String,
    pub damnarbor_feed: String,
    pub michigandaily_feed: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            craigslist_feed: "https://openrss.org/annarbor.craigslist.org/search/sss?sort=date".to_string(),
            reddit: "https://www.reddit.com".to_string(),
            nws: "https://api.weather.gov".to_string(),
            ticketmaster: "https://app.ticketmaster.com/discovery/v2".to_string(),
            zillow: "https://zillow-com1.p.rapidapi.com".to_string(),
            rentspree: "https://api.rentspree.com/v1".to_string(),
            mlive_feed: concat!(
                "https://rss-bridge.org/bridge01/?action=display&bridge=CssSelectorBridge",
                "&home_page=https%3A%2F%2Fwww.mlive.com%2Ftopic%2Flocal-aa%2Findex.html",
                "&url_selector=%23river+%3E+li+%3E+a&url_pattern=",
                "&content_selector=%23river+%3E+li+%3E+a+%3E+div.river-item__content+%3E+p",
                "&content_cleanup=&title_cleanup=&limit=25&format=Atom"
            )
            .to_string(),
            damnarbor_feed: "https://www.damnarbor.com/feeds/posts/default?alt=rss".to_string(),
            michigandaily_feed: "https://www.michigandaily.com/feed/".to_string(),
        }
    }
}
