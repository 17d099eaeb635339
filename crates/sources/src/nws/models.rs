use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PointsResponse {
    pub properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
pub struct PointsProperties {
    pub forecast: String,
}

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub properties: ForecastProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForecastProperties {
    pub periods: Vec<Period>,
}

/// A unit-tagged measurement such as `{"unitCode": "wmoUnit:percent", "value": 40}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Measurement {
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Period {
    pub name: String,
    pub start_time: String,
    pub is_daytime: bool,
    pub temperature: i32,
    pub wind_speed: Option<String>,
    pub wind_direction: Option<String>,
    pub icon: Option<String>,
    pub short_forecast: String,
    pub probability_of_precipitation: Option<Measurement>,
    pub relative_humidity: Option<Measurement>,
}

#[derive(Debug, Deserialize)]
pub struct AlertsResponse {
    pub features: Vec<AlertFeature>,
}

#[derive(Debug, Deserialize)]
pub struct AlertFeature {
    pub properties: AlertProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlertProperties {
    pub id: String,
    pub area_desc: String,
    pub sent: Option<String>,
    pub effective: Option<String>,
    pub expires: Option<String>,
    pub status: Option<String>,
    pub message_type: Option<String>,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub certainty: Option<String>,
    pub urgency: Option<String>,
    pub event: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
}
