use serde::{Deserialize, Serialize};

use crate::models::message::WeatherReport;

/// Payload of a successful weather lookup. Temperature is integer-rounded
/// degrees Celsius on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherData {
    pub city: String,
    pub temperature: f64,
    pub description: String,
    pub timestamp: String,
}

/// Envelope returned by the weather lookup collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub success: bool,
    pub data: Option<WeatherData>,
    pub message: Option<String>,
}

impl From<WeatherData> for WeatherReport {
    fn from(data: WeatherData) -> Self {
        WeatherReport {
            temperature: data.temperature,
            description: data.description,
            timestamp: data.timestamp,
        }
    }
}
