use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use reqwest::Client;
use tracing::{debug, info};

use crate::{config::Config, models::weather::{WeatherData, WeatherResponse}};

/// Client for the weather lookup collaborator. Lookup failures are
/// per-city; the liveness probe gates entire scheduler runs.
pub struct WeatherClient {
    http_client: Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(base_url = %config.weather_service_url, "Weather client initialized");

        Ok(Self {
            http_client,
            base_url: config.weather_service_url.clone(),
        })
    }

    pub fn with_base_url(base_url: String) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub async fn get_weather(&self, city: &str) -> Result<WeatherData, Error> {
        let url = format!("{}/weather/{}", self.base_url, city);

        debug!(city, "Fetching weather");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP error fetching weather for {}: {}", city, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Weather service returned status {}", status));
        }

        let body: WeatherResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse weather response: {}", e))?;

        if !body.success {
            return Err(anyhow!(
                "Weather fetch failed for {}: {}",
                city,
                body.message.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        body.data
            .ok_or_else(|| anyhow!("Weather response for {} has no data", city))
    }

    /// Cheap liveness probe; reports reachability only.
    pub async fn health_check(&self) -> Result<(), Error> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .map_err(|e| anyhow!("Weather service is not available: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Weather service health probe returned status {}",
                response.status()
            ));
        }

        Ok(())
    }
}
