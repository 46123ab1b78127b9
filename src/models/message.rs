use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::{
    channel::NotificationChannel,
    subscription::{Frequency, Subscription},
};

/// The only message type this pipeline produces or consumes.
pub const WEATHER_NOTIFICATION_TYPE: &str = "weather_notification";

/// Wire contract between producer and consumers. Immutable once published;
/// consumers must tolerate unknown fields, so no `deny_unknown_fields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub channel: NotificationChannel,
    pub data: NotificationData,

    /// Producer-assigned send time, epoch milliseconds.
    pub timestamp: i64,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationData {
    pub subscription_id: String,
    pub recipient: String,
    pub city: String,
    pub frequency: Frequency,
    pub weather: WeatherReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub temperature: f64,
    pub description: String,

    /// ISO-8601, as reported by the weather lookup service.
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    High,
}

impl Priority {
    /// AMQP per-message priority carried on the publish.
    pub fn queue_priority(&self) -> u8 {
        match self {
            Priority::Normal => 5,
            Priority::High => 10,
        }
    }
}

impl NotificationMessage {
    pub fn weather(
        subscription: &Subscription,
        channel: NotificationChannel,
        recipient: &str,
        weather: WeatherReport,
    ) -> Self {
        Self {
            message_type: WEATHER_NOTIFICATION_TYPE.to_string(),
            channel,
            data: NotificationData {
                subscription_id: subscription.id.to_string(),
                recipient: recipient.to_string(),
                city: subscription.city.clone(),
                frequency: subscription.frequency,
                weather,
            },
            timestamp: Utc::now().timestamp_millis(),
            priority: Priority::Normal,
        }
    }

    pub fn subject(&self) -> String {
        format!("Weather Update for {}", self.data.city)
    }

    pub fn body_text(&self) -> String {
        format!(
            "Current weather in {}: {}°C, {}",
            self.data.city, self.data.weather.temperature, self.data.weather.description
        )
    }
}
