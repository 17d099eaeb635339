use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventsResponse {
    #[serde(rename = "_embedded")]
    pub embedded: Option<EmbeddedEvents>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddedEvents {
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawEvent {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub images: Vec<Image>,
    pub sales: Option<Sales>,
    pub dates: Option<Dates>,
    pub classifications: Vec<Classification>,
    pub info: Option<String>,
    pub please_note: Option<String>,
    pub price_ranges: Vec<PriceRange>,
    #[serde(rename = "_embedded")]
    pub embedded: Option<EmbeddedVenues>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Image {
    pub ratio: Option<String>,
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Sales {
    pub public: Option<PublicSale>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PublicSale {
    pub start_date_time: Option<String>,
    pub end_date_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Dates {
    pub start: Option<Start>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Start {
    pub local_date: Option<String>,
    pub local_time: Option<String>,
    pub date_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Classification {
    pub segment: Option<Named>,
    pub genre: Option<Named>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddedVenues {
    pub venues: Vec<Venue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Venue {
    pub name: Option<String>,
    pub city: Option<Named>,
    pub state: Option<StateInfo>,
    pub address: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StateInfo {
    pub state_code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Address {
    pub line1: String,
}
