//! For-sale listings from Zillow (via RapidAPI) with RentSpree as a second
//! MLS source.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use cache::CacheKey;
use chrono::{DateTime, NaiveDate, Utc};
use feed::html::escape;
use feed::{Channel, ChannelImage, Enclosure, FeedDocument, Item};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use upstream::{Expect, Fetcher, UpstreamError, UpstreamRequest};
use utoipa::IntoParams;

use self::models::RawListing;
use crate::dates::parse_loose;
use crate::error::SourceError;
use crate::format::{amount, thousands};
use crate::params::{check_range, non_empty, parse_count};
use crate::source::{FeedSource, NormalizedItem, RenderContext};

pub const RAPIDAPI_KEY_VAR: &str = "RAPIDAPI_KEY";

const DEFAULT_LOCATION: &str = "Ann Arbor, MI";
const MAX_LOCATION_LEN: usize = 100;
const DEFAULT_HOME_TYPE: &str = "Houses";
const ZILLOW_HOST: &str = "zillow-com1.p.rapidapi.com";
const NEW_LISTING_DAYS: u32 = 3;
const MAX_NEW_ITEMS: usize = 10;
const SUMMARY_SAMPLE: usize = 5;
const AUTHOR: &str = "realestate-rss@localhost";

/// Query parameters for the real estate feed
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RealEstateParams {
    /// Free-form search location (default "Ann Arbor, MI")
    pub location: Option<String>,
    /// Lowest asking price in dollars
    pub min_price: Option<String>,
    /// Highest asking price in dollars
    pub max_price: Option<String>,
    /// Fewest bedrooms
    pub min_bedrooms: Option<String>,
    /// Most bedrooms
    pub max_bedrooms: Option<String>,
    /// Drop listings that have been on the market longer than this many days
    pub max_days_on_market: Option<String>,
    /// Upstream home type, such as Houses, Condos or Townhomes
    pub property_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealEstateQuery {
    pub location: String,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub min_bedrooms: Option<u64>,
    pub max_bedrooms: Option<u64>,
    pub max_days_on_market: Option<u64>,
    pub property_type: Option<String>,
}

impl RealEstateQuery {
    /// Filters forwarded upstream. Zero means unset, as it does upstream.
    fn filters(&self) -> [(&'static str, Option<u64>); 4] {
        let set = |v: Option<u64>| v.filter(|n| *n > 0);
        [
            ("price_min", set(self.min_price)),
            ("price_max", set(self.max_price)),
            ("beds_min", set(self.min_bedrooms)),
            ("beds_max", set(self.max_bedrooms)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    Active,
    Pending,
    Sold,
    New,
}

impl ListingStatus {
    fn classify(upstream: Option<&str>, days_on_market: u32) -> Self {
        let upstream = upstream.unwrap_or_default().to_lowercase();
        if upstream.contains("pending") {
            Self::Pending
        } else if upstream.contains("sold") {
            Self::Sold
        } else if days_on_market <= NEW_LISTING_DAYS {
            Self::New
        } else {
            Self::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Sold => "sold",
            Self::New => "new",
        }
    }

    fn emoji(&self) -> &'static str {
        match self {
            Self::New => "🆕",
            Self::Pending => "⏳",
            Self::Sold => "✅",
            Self::Active => "🏠",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub address: String,
    pub price: u64,
    pub bedrooms: u32,
    pub bathrooms: f64,
    pub square_footage: Option<u64>,
    pub lot_size: Option<String>,
    pub year_built: Option<u32>,
    pub property_type: String,
    pub listing_date: NaiveDate,
    pub description: String,
    pub image_url: Option<String>,
    pub mls_number: Option<String>,
    pub agent: Option<Agent>,
    pub features: Vec<String>,
    pub neighborhood: String,
    pub school_district: String,
    pub days_on_market: u32,
    pub price_per_sqft: Option<u64>,
    pub status: ListingStatus,
}

pub struct RealEstate {
    zillow_url: String,
    rentspree_url: String,
    rapidapi_key: Option<String>,
    rentspree_key: Option<String>,
}

impl RealEstate {
    pub fn new(
        zillow_url: impl Into<String>,
        rentspree_url: impl Into<String>,
        rapidapi_key: Option<String>,
        rentspree_key: Option<String>,
    ) -> Self {
        Self {
            zillow_url: zillow_url.into().trim_end_matches('/').to_string(),
            rentspree_url: rentspree_url.into().trim_end_matches('/').to_string(),
            rapidapi_key: rapidapi_key.filter(|k| !k.trim().is_empty()),
            rentspree_key: rentspree_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn zillow_request(&self, key: &str, query: &RealEstateQuery) -> UpstreamRequest {
        let location = if query.location.contains("Ann Arbor") {
            DEFAULT_LOCATION
        } else {
            query.location.as_str()
        };
        let mut url = format!(
            "{}/propertyExtendedSearch?location={}&status_type=ForSale&home_type={}",
            self.zillow_url,
            urlencoding::encode(location),
            urlencoding::encode(query.property_type.as_deref().unwrap_or(DEFAULT_HOME_TYPE)),
        );
        for (name, value) in query.filters() {
            if let Some(value) = value {
                url.push_str(&format!("&{}={}", name, value));
            }
        }

        UpstreamRequest::get(url)
            .header("X-RapidAPI-Key", key)
            .header("X-RapidAPI-Host", ZILLOW_HOST)
            .timeout(Duration::from_secs(20))
            .expect(Expect::Json)
    }

    fn rentspree_request(&self, key: &str, query: &RealEstateQuery) -> UpstreamRequest {
        let mut body = Map::new();
        body.insert("location".into(), json!(query.location));
        body.insert("listing_type".into(), json!("sale"));
        for (name, value) in query.filters() {
            if let Some(value) = value {
                let name = name.replace("beds_", "bedrooms_");
                body.insert(name, json!(value));
            }
        }
        if let Some(property_type) = &query.property_type {
            body.insert("property_type".into(), json!(property_type));
        }

        UpstreamRequest::post_json(format!("{}/listings/search", self.rentspree_url), Value::Object(body))
            .header("Authorization", format!("Bearer {}", key))
            .timeout(Duration::from_secs(20))
            .expect(Expect::Json)
    }
}

#[async_trait]
impl FeedSource for RealEstate {
    type Params = RealEstateParams;
    type Query = RealEstateQuery;
    type Record = Listing;

    fn name(&self) -> &'static str {
        "realestate"
    }

    fn path(&self) -> &'static str {
        "/api/realestate"
    }

    fn parse_query(&self, params: RealEstateParams) -> crate::Result<RealEstateQuery> {
        let location = non_empty(params.location).unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        if location.chars().count() > MAX_LOCATION_LEN {
            return Err(SourceError::Validation(format!(
                "location must be at most {} characters",
                MAX_LOCATION_LEN
            )));
        }

        let query = RealEstateQuery {
            location,
            min_price: parse_count("minPrice", params.min_price)?,
            max_price: parse_count("maxPrice", params.max_price)?,
            min_bedrooms: parse_count("minBedrooms", params.min_bedrooms)?,
            max_bedrooms: parse_count("maxBedrooms", params.max_bedrooms)?,
            max_days_on_market: parse_count("maxDaysOnMarket", params.max_days_on_market)?,
            property_type: non_empty(params.property_type),
        };
        check_range("Price", query.min_price, query.max_price)?;
        check_range("Bedrooms", query.min_bedrooms, query.max_bedrooms)?;
        Ok(query)
    }

    fn check_ready(&self) -> crate::Result<()> {
        match self.rapidapi_key {
            Some(_) => Ok(()),
            None => Err(SourceError::ConfigurationMissing(RAPIDAPI_KEY_VAR)),
        }
    }

    fn cache_key(&self, query: &RealEstateQuery) -> CacheKey {
        let key = CacheKey::new(self.name())
            .param("location", query.location.as_str())
            .param_opt("propertyType", query.property_type.as_deref())
            .param_opt("maxDaysOnMarket", query.max_days_on_market.map(|n| n.to_string()));
        query
            .filters()
            .into_iter()
            .fold(key, |key, (name, value)| key.param_opt(name, value.map(|n| n.to_string())))
    }

    fn max_age(&self) -> Duration {
        Duration::from_secs(1800)
    }

    /// Zillow first. RentSpree is tried only when its key is configured.
    async fn fetch(&self, fetcher: &dyn Fetcher, query: &RealEstateQuery) -> Result<String, UpstreamError> {
        let Some(rapidapi_key) = self.rapidapi_key.as_deref() else {
            return Err(UpstreamError::HttpClient(format!("{} is not set", RAPIDAPI_KEY_VAR)));
        };

        let zillow_error = match fetcher.fetch(self.zillow_request(rapidapi_key, query)).await {
            Ok(response) => return Ok(response.body),
            Err(e) => e,
        };
        let Some(rentspree_key) = self.rentspree_key.as_deref() else {
            return Err(zillow_error);
        };

        tracing::warn!("Zillow request failed, trying RentSpree: {}", zillow_error);
        match fetcher.fetch(self.rentspree_request(rentspree_key, query)).await {
            Ok(response) => Ok(response.body),
            Err(e) => {
                tracing::warn!("RentSpree request failed: {}", e);
                Err(e)
            }
        }
    }

    fn normalize(
        &self,
        body: &str,
        query: &RealEstateQuery,
        now: DateTime<Utc>,
    ) -> crate::Result<Vec<NormalizedItem<Listing>>> {
        let data: Value = serde_json::from_str(body)?;
        let entries = ["props", "results", "listings"]
            .iter()
            .find_map(|field| data.get(field).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default();

        let mut listings: Vec<_> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match RawListing::deserialize(&entry) {
                Ok(raw) => Some(normalize_listing(raw, &entry, now)),
                Err(e) => {
                    tracing::debug!("Skipping unreadable listing {}: {}", index, e);
                    None
                }
            })
            .filter(|item| match query.max_days_on_market.filter(|n| *n > 0) {
                Some(max) => u64::from(item.payload.days_on_market) <= max,
                None => true,
            })
            .collect();
        tracing::debug!("Kept {} listings for {}", listings.len(), query.location);

        listings.sort_by(|a, b| b.payload.listing_date.cmp(&a.payload.listing_date));
        Ok(listings)
    }

    fn document(
        &self,
        query: &RealEstateQuery,
        records: Vec<NormalizedItem<Listing>>,
        ctx: &RenderContext,
    ) -> FeedDocument {
        let loc = &query.location;
        let link = ctx.feed_url(self.path(), &[("location", loc.as_str())]);

        let mut channel = Channel::new(
            format!("🏠 Real Estate Listings - {}", loc),
            link.clone(),
            format!(
                "New real estate listings and market summaries for {} (Ann Arbor, MI area)",
                loc
            ),
        );
        channel.self_link = Some(link.clone());
        channel.categories = vec!["Real Estate".into(), "Property Listings".into()];
        channel.copyright = Some("Real Estate data from local MLS".into());
        channel.managing_editor = Some(AUTHOR.into());
        channel.web_master = Some(AUTHOR.into());
        channel.ttl = Some(60);
        channel.generator = Some(crate::GENERATOR.into());
        channel.image = Some(ChannelImage {
            url: "https://picsum.photos/64/64?random=house".into(),
            title: "Real Estate RSS Feed".into(),
            link: link.clone(),
        });

        let mut items: Vec<Item> = records
            .iter()
            .filter(|r| r.payload.status == ListingStatus::New)
            .take(MAX_NEW_ITEMS)
            .map(|r| render_listing(r, loc, &link))
            .collect();
        items.extend(
            PRICE_BANDS
                .iter()
                .filter_map(|band| render_band(band, &records, loc, &link, ctx.now)),
        );
        FeedDocument::new(channel, items)
    }
}

/// Id for a listing the upstream sent without one. It depends only on the
/// property, never on its position in the response.
fn content_id(mls_number: Option<&str>, address: Option<&str>, entry: &Value) -> String {
    let mut hasher = Sha256::new();
    match address {
        Some(address) => {
            if let Some(mls) = mls_number.map(str::trim).filter(|m| !m.is_empty()) {
                hasher.update(mls.to_lowercase());
                hasher.update(b"|");
            }
            hasher.update(address_fingerprint(address));
        }
        None => hasher.update(entry.to_string()),
    }
    let digest = hex::encode(hasher.finalize());
    format!("property-{}", &digest[..16])
}

/// Lowercased alphanumeric words, so spacing and punctuation differences
/// between fetches do not change the id.
fn address_fingerprint(address: &str) -> String {
    address
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_listing(raw: RawListing, entry: &Value, now: DateTime<Utc>) -> NormalizedItem<Listing> {
    let address_line = raw.address.as_ref().map(|a| a.line()).filter(|a| !a.is_empty());
    let id = raw
        .id
        .unwrap_or_else(|| content_id(raw.mls_number.as_deref(), address_line.as_deref(), entry));
    let address = address_line.unwrap_or_else(|| "Address not available".to_string());
    let price = raw.price.unwrap_or_default().max(0.0).round() as u64;
    let bedrooms = raw.bedrooms.unwrap_or_default().max(0.0).round() as u32;
    let bathrooms = raw.bathrooms.unwrap_or_default().max(0.0);
    let square_footage = raw.living_area.filter(|a| *a > 0.0).map(|a| a.round() as u64);
    let property_type = raw
        .home_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Single Family Home".to_string());
    let days_on_market = raw.days_on_market.unwrap_or_default().max(0.0).round() as u32;
    let listing_date = raw
        .date_posted
        .as_deref()
        .and_then(parse_loose)
        .unwrap_or(now)
        .date_naive();
    let description = raw.description.filter(|d| !d.trim().is_empty()).unwrap_or_else(|| {
        format!(
            "{} bedroom, {} bathroom {} in {}",
            bedrooms,
            amount(bathrooms),
            property_type.to_lowercase(),
            address
        )
    });
    let neighborhood = raw
        .neighborhood
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| neighborhood_for(&address).to_string());

    let listing = Listing {
        school_district: format!("{} Public Schools", city_for(&address)),
        price_per_sqft: square_footage.map(|sqft| (price as f64 / sqft as f64).round() as u64),
        lot_size: raw
            .lot_size
            .or_else(|| raw.lot_area_value.map(|v| format!("{} sq ft", amount(v)))),
        year_built: raw.year_built.map(|y| y as u32),
        image_url: raw
            .photos
            .into_iter()
            .map(|p| p.url)
            .find(|u| !u.is_empty())
            .or(raw.img_src),
        mls_number: raw.mls_number,
        agent: raw.agent.filter(|a| !a.name.is_empty()).map(|a| Agent {
            name: a.name,
            phone: a.phone,
            email: a.email,
        }),
        features: raw.amenities,
        status: ListingStatus::classify(raw.status.as_deref(), days_on_market),
        address,
        price,
        bedrooms,
        bathrooms,
        square_footage,
        property_type,
        listing_date,
        description,
        neighborhood,
        days_on_market,
    };

    NormalizedItem {
        id,
        title: listing.address.clone(),
        tags: vec![listing.property_type.clone(), listing.neighborhood.clone()],
        link: None,
        published: listing.listing_date.and_time(chrono::NaiveTime::MIN).and_utc(),
        payload: listing,
    }
}

fn neighborhood_for(address: &str) -> &'static str {
    if address.contains("Downtown") {
        "Downtown Ann Arbor"
    } else if address.contains("Kerrytown") {
        "Kerrytown"
    } else if address.contains("Burns Park") {
        "Burns Park"
    } else {
        "Ann Arbor Area"
    }
}

/// The second comma-separated part of a one-line address.
fn city_for(address: &str) -> &str {
    address
        .split(',')
        .nth(1)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("Ann Arbor")
}

fn property_type_emoji(property_type: &str) -> &'static str {
    let t = property_type.to_lowercase();
    if t.contains("condo") {
        "🏢"
    } else if t.contains("townhouse") {
        "🏘️"
    } else if t.contains("multi") {
        "🏬"
    } else {
        "🏠"
    }
}

struct PriceBand {
    label: &'static str,
    min: u64,
    max: Option<u64>,
}

impl PriceBand {
    fn contains(&self, price: u64) -> bool {
        price >= self.min && self.max.map_or(true, |max| price < max)
    }

    fn slug(&self) -> String {
        self.label.split_whitespace().collect::<Vec<_>>().join("-").to_lowercase()
    }
}

const PRICE_BANDS: [PriceBand; 4] = [
    PriceBand { label: "Under $300K", min: 0, max: Some(300_000) },
    PriceBand { label: "$300K - $500K", min: 300_000, max: Some(500_000) },
    PriceBand { label: "$500K - $750K", min: 500_000, max: Some(750_000) },
    PriceBand { label: "Over $750K", min: 750_000, max: None },
];

fn optional<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn render_listing(record: &NormalizedItem<Listing>, location: &str, link: &str) -> Item {
    let listing = &record.payload;
    let status = listing.status.emoji();
    let kind = property_type_emoji(&listing.property_type);
    let price = thousands(listing.price);

    let mut html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px;"><h2 style="margin: 0; color: #2c5aa0;">{} {} {}</h2>"#,
        status,
        kind,
        escape(&listing.address)
    );
    if let Some(image) = &listing.image_url {
        html.push_str(&format!(
            r#"<img src="{}" alt="Property photo" style="width: 100%; max-width: 400px; height: 250px; object-fit: cover; border-radius: 8px;"/>"#,
            escape(image)
        ));
    }
    html.push_str(&format!(
        r#"<div style="background: #f0f8ff; padding: 15px; border-radius: 8px;"><h3>💰 Price & Details</h3><p><strong>💵 Price:</strong> ${}</p><p><strong>🛏️ Bedrooms:</strong> {} | <strong>🛁 Bathrooms:</strong> {}</p><p><strong>📐 Square Footage:</strong> {} sq ft</p><p><strong>💲 Price per Sq Ft:</strong> ${}</p><p><strong>🏠 Property Type:</strong> {}</p><p><strong>📅 Year Built:</strong> {}</p><p><strong>📍 Neighborhood:</strong> {}</p></div><div style="background: #f9f9f9; padding: 15px; border-radius: 8px;"><h3>📋 Description</h3><p>{}</p></div>"#,
        price,
        listing.bedrooms,
        amount(listing.bathrooms),
        optional(listing.square_footage.map(thousands)),
        optional(listing.price_per_sqft),
        escape(&listing.property_type),
        optional(listing.year_built),
        escape(&listing.neighborhood),
        escape(&listing.description)
    ));
    if !listing.features.is_empty() {
        let features: String = listing
            .features
            .iter()
            .map(|f| format!("<li>{}</li>", escape(f)))
            .collect();
        html.push_str(&format!(
            r#"<div style="background: #f0fff0; padding: 15px; border-radius: 8px;"><h3>✨ Features</h3><ul style="margin: 0; padding-left: 20px;">{}</ul></div>"#,
            features
        ));
    }
    if let Some(agent) = &listing.agent {
        html.push_str(&format!(
            r#"<div style="background: #fff8f0; padding: 15px; border-radius: 8px;"><h3>👤 Listing Agent</h3><p><strong>Name:</strong> {}</p>"#,
            escape(&agent.name)
        ));
        if let Some(phone) = &agent.phone {
            html.push_str(&format!("<p><strong>Phone:</strong> {}</p>", escape(phone)));
        }
        if let Some(email) = &agent.email {
            html.push_str(&format!("<p><strong>Email:</strong> {}</p>", escape(email)));
        }
        html.push_str("</div>");
    }
    html.push_str(&format!(
        r#"<div style="padding: 10px; background: #f9f9f9; border-radius: 5px; font-size: 0.9em; color: #666;"><p><strong>📅 Listed:</strong> {}</p><p><strong>📊 Days on Market:</strong> {}</p>"#,
        listing.listing_date.format("%-m/%-d/%Y"),
        listing.days_on_market
    ));
    if let Some(mls) = &listing.mls_number {
        html.push_str(&format!("<p><strong>🏷️ MLS #:</strong> {}</p>", escape(mls)));
    }
    html.push_str(&format!(
        "<p><strong>🏫 School District:</strong> {}</p><p><strong>📍 Location:</strong> {}</p></div></div>",
        escape(&listing.school_district),
        escape(location)
    ));

    let title = format!(
        "{} {} NEW: {} - ${} | {}BR/{}BA",
        status,
        kind,
        listing.address,
        price,
        listing.bedrooms,
        amount(listing.bathrooms)
    );
    let mut item = Item::new(format!("realestate-{}", record.id), title, record.published)
        .link(link)
        .description(html)
        .category("Real Estate")
        .category("New Listing");
    for tag in &record.tags {
        item = item.category(tag.as_str());
    }
    item = item.author(AUTHOR);
    if let Some(image) = &listing.image_url {
        item = item.enclosure(Enclosure {
            url: image.clone(),
            mime_type: "image/jpeg".to_string(),
            length: 0,
        });
    }
    item
}

fn render_band(
    band: &PriceBand,
    records: &[NormalizedItem<Listing>],
    location: &str,
    link: &str,
    now: DateTime<Utc>,
) -> Option<Item> {
    let in_band: Vec<&Listing> = records
        .iter()
        .map(|r| &r.payload)
        .filter(|l| band.contains(l.price))
        .collect();
    if in_band.is_empty() {
        return None;
    }

    let count = in_band.len() as u64;
    let total: u64 = in_band.iter().map(|l| l.price).sum();
    let avg = (total as f64 / count as f64).round() as u64;
    let lowest = in_band.iter().map(|l| l.price).min().unwrap_or_default();
    let highest = in_band.iter().map(|l| l.price).max().unwrap_or_default();
    let new_count = in_band.iter().filter(|l| l.status == ListingStatus::New).count();

    let mut html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px;"><h2>📊 {} Price Range Summary</h2><div style="background: #f0f8ff; padding: 15px; border-radius: 8px;"><h3>📈 Market Summary</h3><p><strong>🏠 Total Listings:</strong> {}</p><p><strong>💰 Average Price:</strong> ${}</p><p><strong>📊 Price Range:</strong> ${} - ${}</p><p><strong>🆕 New Listings:</strong> {}</p></div><h3>🏠 Recent Listings in This Range</h3>"#,
        escape(band.label),
        count,
        thousands(avg),
        thousands(lowest),
        thousands(highest),
        new_count
    );
    for listing in in_band.iter().take(SUMMARY_SAMPLE) {
        html.push_str(&format!(
            r#"<div style="border: 1px solid #ddd; padding: 10px; border-radius: 5px; margin: 5px 0;"><h4>{} {} {}</h4><p><strong>💵</strong> ${} | <strong>🛏️</strong> {}BR/{}BA | <strong>📐</strong> {} sq ft</p><p><strong>📅</strong> Listed {} ({} days ago)</p><p><strong>📍</strong> {}</p></div>"#,
            listing.status.emoji(),
            property_type_emoji(&listing.property_type),
            escape(&listing.address),
            thousands(listing.price),
            listing.bedrooms,
            amount(listing.bathrooms),
            optional(listing.square_footage.map(thousands)),
            listing.listing_date.format("%-m/%-d/%Y"),
            listing.days_on_market,
            escape(&listing.neighborhood)
        ));
    }
    html.push_str(&format!(
        r#"<div style="padding: 10px; background: #f9f9f9; border-radius: 5px; font-size: 0.9em; color: #666;"><p><strong>📍 Location:</strong> {}</p><p><strong>🕒 Generated:</strong> {}</p></div></div>"#,
        escape(location),
        now.format("%Y-%m-%d %H:%M UTC")
    ));

    let title = format!(
        "📊 {} Summary: {} listings, avg ${}",
        band.label,
        count,
        thousands(avg)
    );
    Some(
        Item::new(
            format!("realestate-summary-{}-{}", band.slug(), now.date_naive()),
            title,
            now,
        )
        .link(link)
        .description(html)
        .category("Real Estate")
        .category("Market Summary")
        .category(band.label)
        .author(AUTHOR),
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use upstream::mock::{MockFetcher, MockReply};
    use upstream::Method;

    use super::*;

    const ZILLOW: &str = r#"{
      "props": [
        {"zpid": "111", "address": "12 Main St, Ann Arbor, MI 48104", "price": 450000,
         "bedrooms": 3, "bathrooms": 2, "livingArea": 1500, "homeType": "SINGLE_FAMILY",
         "datePostedString": "2024-04-29", "daysOnZillow": 2, "homeStatus": "FOR_SALE",
         "photos": [{"url": "https://photos.example/111.jpg"}]},
        {"zpid": "222", "address": "5 Kerrytown Ct, Ann Arbor, MI 48104", "price": 280000,
         "bedrooms": 2, "bathrooms": 1.5, "homeType": "CONDO",
         "datePostedString": "2024-04-01", "daysOnZillow": 30, "homeStatus": "PENDING"},
        {"zpid": "333", "address": "900 Hill St, Ann Arbor, MI 48104", "price": "$899,000",
         "bedrooms": 5, "bathrooms": 4, "homeType": "SINGLE_FAMILY",
         "datePostedString": "2024-04-30", "daysOnZillow": 1, "homeStatus": "FOR_SALE"},
        "not an object"
      ]
    }"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn source(rentspree: Option<&str>) -> RealEstate {
        RealEstate::new(
            "https://zillow-com1.p.rapidapi.com",
            "https://api.rentspree.com/v1",
            Some("rapid".to_string()),
            rentspree.map(String::from),
        )
    }

    fn query() -> RealEstateQuery {
        source(None).parse_query(RealEstateParams::default()).unwrap()
    }

    #[test]
    fn test_parse_query_defaults_and_ranges() {
        let src = source(None);
        assert_eq!(query().location, "Ann Arbor, MI");

        let params = RealEstateParams {
            min_price: Some("500000".into()),
            max_price: Some("300000".into()),
            ..Default::default()
        };
        let err = src.parse_query(params).unwrap_err();
        assert_eq!(err.to_string(), "minPrice must not exceed maxPrice");

        let params = RealEstateParams {
            min_bedrooms: Some("-1".into()),
            ..Default::default()
        };
        assert!(matches!(src.parse_query(params), Err(SourceError::Validation(_))));

        let params = RealEstateParams {
            location: Some("x".repeat(101)),
            ..Default::default()
        };
        assert!(matches!(src.parse_query(params), Err(SourceError::Validation(_))));
    }

    #[test]
    fn test_query_params_are_camel_case() {
        let params: RealEstateParams =
            serde_json::from_str(r#"{"minPrice": "1", "maxDaysOnMarket": "7"}"#).unwrap();
        assert_eq!(params.min_price.as_deref(), Some("1"));
        assert_eq!(params.max_days_on_market.as_deref(), Some("7"));
    }

    #[test]
    fn test_missing_rapidapi_key() {
        let src = RealEstate::new("z", "r", None, Some("rs".to_string()));
        assert!(matches!(
            src.check_ready(),
            Err(SourceError::ConfigurationMissing("RAPIDAPI_KEY"))
        ));
    }

    #[test]
    fn test_normalize_listings() {
        let listings = source(None).normalize(ZILLOW, &query(), now()).unwrap();
        let ids: Vec<&str> = listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["333", "111", "222"]);

        let newest = &listings[0].payload;
        assert_eq!(newest.price, 899_000);
        assert_eq!(newest.status, ListingStatus::New);

        let first = &listings[1].payload;
        assert_eq!(first.price_per_sqft, Some(300));
        assert_eq!(first.school_district, "Ann Arbor Public Schools");
        assert_eq!(first.image_url.as_deref(), Some("https://photos.example/111.jpg"));
        assert_eq!(first.description, "3 bedroom, 2 bathroom single_family in 12 Main St, Ann Arbor, MI 48104");

        let condo = &listings[2].payload;
        assert_eq!(condo.status, ListingStatus::Pending);
        assert_eq!(condo.neighborhood, "Kerrytown");
    }

    #[test]
    fn test_listing_without_id_keeps_guid_across_reorders() {
        let first = r#"{"props": [
            {"address": "12 Main St, Ann Arbor, MI 48104", "price": 450000},
            {"address": "900 Hill St, Ann Arbor, MI 48104", "price": 899000}
        ]}"#;
        let second = r#"{"props": [
            {"address": "77 Packard Rd, Ann Arbor, MI 48104", "price": 300000},
            {"address": "900  Hill St,  Ann Arbor, MI 48104", "price": 875000},
            {"address": "12 Main St, Ann Arbor, MI 48104", "price": 440000}
        ]}"#;
        let src = source(None);

        let id_for = |body: &str, street: &str| {
            src.normalize(body, &query(), now())
                .unwrap()
                .into_iter()
                .find(|l| l.payload.address.starts_with(street))
                .map(|l| l.id)
                .unwrap()
        };

        let main = id_for(first, "12 Main");
        let hill = id_for(first, "900");
        assert!(main.starts_with("property-"));
        assert_ne!(main, hill);
        assert_eq!(id_for(second, "12 Main"), main);
        assert_eq!(id_for(second, "900"), hill);
        assert_ne!(id_for(second, "77 Packard"), main);
    }

    #[test]
    fn test_mls_number_distinguishes_units_at_one_address() {
        let body = r#"{"props": [
            {"address": "1 Tower Plz, Ann Arbor, MI 48104", "mlsid": "A1"},
            {"address": "1 Tower Plz, Ann Arbor, MI 48104", "mlsid": "A2"}
        ]}"#;
        let listings = source(None).normalize(body, &query(), now()).unwrap();
        assert_ne!(listings[0].id, listings[1].id);
    }

    #[test]
    fn test_max_days_on_market_filter() {
        let mut q = query();
        q.max_days_on_market = Some(7);
        let listings = source(None).normalize(ZILLOW, &q, now()).unwrap();
        assert_eq!(listings.len(), 2);
        assert!(listings.iter().all(|l| l.payload.days_on_market <= 7));
    }

    #[test]
    fn test_rentspree_listings_field() {
        let body = r#"{"listings": [{"id": "rs-1", "address": {"street": "1 Main St", "city": "Ann Arbor",
            "state": "MI", "zip": "48104"}, "price": 310000, "bedrooms": 2, "bathrooms": 1,
            "days_on_market": 10, "status": "active", "neighborhood": "Old West Side"}]}"#;
        let listings = source(None).normalize(body, &query(), now()).unwrap();
        assert_eq!(listings[0].payload.address, "1 Main St, Ann Arbor, MI 48104");
        assert_eq!(listings[0].payload.neighborhood, "Old West Side");
        assert_eq!(listings[0].payload.status, ListingStatus::Active);
    }

    #[test]
    fn test_document_new_items_then_band_summaries() {
        let src = source(None);
        let records = src.normalize(ZILLOW, &query(), now()).unwrap();
        let doc = src.document(&query(), records, &RenderContext::new("http://localhost:3000", now()));

        let titles: Vec<&str> = doc.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "🆕 🏠 NEW: 900 Hill St, Ann Arbor, MI 48104 - $899,000 | 5BR/4BA",
                "🆕 🏠 NEW: 12 Main St, Ann Arbor, MI 48104 - $450,000 | 3BR/2BA",
                "📊 Under $300K Summary: 1 listings, avg $280,000",
                "📊 $300K - $500K Summary: 1 listings, avg $450,000",
                "📊 Over $750K Summary: 1 listings, avg $899,000",
            ]
        );
        assert_eq!(doc.items[0].guid, "realestate-333");
        assert_eq!(doc.items[2].guid, "realestate-summary-under-$300k-2024-05-01");
        assert_eq!(doc.channel.title, "🏠 Real Estate Listings - Ann Arbor, MI");
        assert_eq!(
            doc.channel.self_link.as_deref(),
            Some("http://localhost:3000/api/realestate?location=Ann%20Arbor%2C%20MI")
        );
    }

    #[tokio::test]
    async fn test_zillow_request() {
        let fetcher = MockFetcher::new();
        fetcher.on("propertyExtendedSearch", MockReply::ok(ZILLOW));

        let mut q = query();
        q.min_price = Some(200000);
        q.min_bedrooms = Some(0);
        source(None).fetch(&fetcher, &q).await.unwrap();

        let request = &fetcher.requests()[0];
        assert_eq!(
            request.url,
            "https://zillow-com1.p.rapidapi.com/propertyExtendedSearch?location=Ann%20Arbor%2C%20MI&status_type=ForSale&home_type=Houses&price_min=200000"
        );
        assert!(request
            .headers
            .contains(&("X-RapidAPI-Key".to_string(), "rapid".to_string())));
    }

    #[tokio::test]
    async fn test_zillow_failure_without_rentspree_key_surfaces() {
        let fetcher = MockFetcher::new();
        fetcher.on("propertyExtendedSearch", MockReply::status(403, "Forbidden"));

        let err = source(None).fetch(&fetcher, &query()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(403));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_zillow_failure_falls_back_to_rentspree() {
        let fetcher = MockFetcher::new();
        fetcher.on("propertyExtendedSearch", MockReply::status(429, "Too Many Requests"));
        fetcher.on("listings/search", MockReply::ok(r#"{"listings": []}"#));

        let body = source(Some("rs-key")).fetch(&fetcher, &query()).await.unwrap();
        assert_eq!(body, r#"{"listings": []}"#);

        let request = &fetcher.requests()[1];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body.as_ref().unwrap()["listing_type"], "sale");
        assert!(request
            .headers
            .contains(&("Authorization".to_string(), "Bearer rs-key".to_string())));
    }
}
