//! One listing shape for both MLS upstreams. Field names are Zillow's with
//! RentSpree's spelling accepted as an alias.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawListing {
    #[serde(rename = "zpid", alias = "id", deserialize_with = "lenient_string")]
    pub id: Option<String>,
    pub address: Option<RawAddress>,
    #[serde(deserialize_with = "lenient_number")]
    pub price: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub bedrooms: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub bathrooms: Option<f64>,
    #[serde(rename = "livingArea", alias = "sqft", deserialize_with = "lenient_number")]
    pub living_area: Option<f64>,
    #[serde(rename = "lotAreaValue", deserialize_with = "lenient_number")]
    pub lot_area_value: Option<f64>,
    pub lot_size: Option<String>,
    #[serde(rename = "yearBuilt", alias = "year_built", deserialize_with = "lenient_number")]
    pub year_built: Option<f64>,
    #[serde(rename = "homeType", alias = "property_type")]
    pub home_type: Option<String>,
    #[serde(rename = "datePostedString", alias = "listing_date")]
    pub date_posted: Option<String>,
    pub description: Option<String>,
    pub photos: Vec<Photo>,
    #[serde(rename = "imgSrc")]
    pub img_src: Option<String>,
    #[serde(rename = "mlsid", alias = "mls_number")]
    pub mls_number: Option<String>,
    #[serde(rename = "listingAgent", alias = "agent")]
    pub agent: Option<RawAgent>,
    pub amenities: Vec<String>,
    pub neighborhood: Option<String>,
    #[serde(rename = "daysOnZillow", alias = "days_on_market", deserialize_with = "lenient_number")]
    pub days_on_market: Option<f64>,
    #[serde(rename = "homeStatus", alias = "status")]
    pub status: Option<String>,
}

/// Zillow sends a one-line address, RentSpree a structured one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawAddress {
    Text(String),
    Parts {
        #[serde(default)]
        street: String,
        #[serde(default)]
        city: String,
        #[serde(default)]
        state: String,
        #[serde(default)]
        zip: String,
    },
}

impl RawAddress {
    pub fn line(&self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Parts {
                street,
                city,
                state,
                zip,
            } => format!("{}, {}, {} {}", street, city, state, zip).trim().to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Photo {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawAgent {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Accept `450000`, `450000.0` or `"$450,000"`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.replace(['$', ','], "").trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zillow_shape() {
        let raw: RawListing = serde_json::from_str(
            r#"{"zpid": 12345, "address": "412 Elm St, Ann Arbor, MI 48104", "price": "$450,000",
                "bedrooms": 3, "bathrooms": 2.5, "livingArea": 1800, "homeType": "SINGLE_FAMILY",
                "daysOnZillow": 2, "homeStatus": "FOR_SALE"}"#,
        )
        .unwrap();
        assert_eq!(raw.id.as_deref(), Some("12345"));
        assert_eq!(raw.price, Some(450000.0));
        assert_eq!(raw.bathrooms, Some(2.5));
        assert_eq!(raw.living_area, Some(1800.0));
        assert_eq!(raw.address.unwrap().line(), "412 Elm St, Ann Arbor, MI 48104");
    }

    #[test]
    fn test_rentspree_shape() {
        let raw: RawListing = serde_json::from_str(
            r#"{"id": "rs-9", "address": {"street": "1 Main St", "city": "Ann Arbor", "state": "MI", "zip": "48104"},
                "price": 325000, "sqft": 1300, "property_type": "Condo", "listing_date": "2024-04-28",
                "days_on_market": 3, "status": "active", "amenities": ["Garage"],
                "agent": {"name": "Pat Agent", "email": "pat@example.com"}}"#,
        )
        .unwrap();
        assert_eq!(raw.id.as_deref(), Some("rs-9"));
        assert_eq!(raw.living_area, Some(1300.0));
        assert_eq!(raw.home_type.as_deref(), Some("Condo"));
        assert_eq!(raw.date_posted.as_deref(), Some("2024-04-28"));
        assert_eq!(raw.agent.unwrap().name, "Pat Agent");
        assert_eq!(raw.address.unwrap().line(), "1 Main St, Ann Arbor, MI 48104");
    }
}
