//! National Weather Service forecasts and active alerts.

pub mod alerts;
pub mod forecast;
mod models;

use crate::geo::{coordinates_for_zip, Coordinates};
use crate::params::{parse_zip, LocationParams};

pub use alerts::{Alert, Alerts};
pub use forecast::{DayForecast, Forecast, ForecastView};

/// A validated ZIP code and the point it resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationQuery {
    pub location: String,
    pub coordinates: Coordinates,
}

impl LocationQuery {
    pub fn parse(params: LocationParams) -> crate::Result<Self> {
        let location = parse_zip(params.location)?;
        let coordinates = coordinates_for_zip(&location);
        Ok(Self {
            location,
            coordinates,
        })
    }
}

/// Pick an emoji for an NWS condition phrase such as "Chance Rain Showers".
pub fn weather_emoji(conditions: &str) -> &'static str {
    let c = conditions.to_lowercase();
    let has = |needle: &str| c.contains(needle);

    if has("sunny") || has("clear") {
        "☀️"
    } else if has("partly cloudy") || has("partly sunny") {
        "⛅"
    } else if has("mostly cloudy") || has("overcast") {
        "☁️"
    } else if has("cloudy") {
        "🌤️"
    } else if has("rain") && has("thunder") {
        "⛈️"
    } else if has("thunder") {
        "🌩️"
    } else if has("heavy rain") || has("downpour") {
        "🌧️"
    } else if has("rain") || has("shower") || has("drizzle") {
        "🌦️"
    } else if has("heavy snow") {
        "❄️"
    } else if has("snow") || has("sleet") || has("hail") {
        "🌨️"
    } else if has("fog") || has("mist") {
        "🌫️"
    } else if has("windy") || has("breezy") {
        "💨"
    } else if has("hot") {
        "🌡️"
    } else if has("cold") || has("freezing") {
        "🥶"
    } else {
        "🌤️"
    }
}
