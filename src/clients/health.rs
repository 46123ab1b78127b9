use std::{collections::HashMap, time::Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    clients::{database::DatabaseClient, rbmq::RabbitMqClient, weather::WeatherClient},
    config::Config,
    models::health::{HealthCheckResponse, HealthStatus, ServiceHealth},
};

pub struct HealthChecker {
    config: Config,
}

impl HealthChecker {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        let db_health = self.check_database().await;
        checks.insert("database".to_string(), db_health);

        let broker_health = self.check_broker().await;
        checks.insert("message_broker".to_string(), broker_health);

        let weather_health = self.check_weather().await;
        checks.insert("weather_service".to_string(), weather_health);

        let overall_status = determine_overall_status(&checks);

        HealthCheckResponse {
            status: overall_status,
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            checks,
        }
    }

    async fn check_database(&self) -> ServiceHealth {
        let start = Instant::now();

        match DatabaseClient::connect(&self.config.database_url).await {
            Ok(client) => match client.health_check().await {
                Ok(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    debug!(response_time_ms = elapsed, "Database health check passed");
                    ServiceHealth::healthy(elapsed)
                }
                Err(e) => {
                    warn!(error = %e, "Database health check failed");
                    ServiceHealth::unhealthy(format!("Health check query failed: {}", e))
                }
            },
            Err(e) => {
                warn!(error = %e, "Database connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_broker(&self) -> ServiceHealth {
        let start = Instant::now();

        match RabbitMqClient::connect(&self.config).await {
            Ok(client) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "RabbitMQ health check passed");
                client.disconnect().await;
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "RabbitMQ connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_weather(&self) -> ServiceHealth {
        let start = Instant::now();

        let client = match WeatherClient::new(&self.config) {
            Ok(client) => client,
            Err(e) => {
                return ServiceHealth::unhealthy(format!("Client creation failed: {}", e));
            }
        };

        match client.health_check().await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Weather service health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Weather service health check failed");
                ServiceHealth::unhealthy(format!("Probe failed: {}", e))
            }
        }
    }
}

/// Database and broker are critical; the pipeline survives a weather
/// outage by skipping runs, so that only degrades.
fn determine_overall_status(checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
    let critical_unhealthy = checks
        .iter()
        .filter(|(name, _)| name.as_str() == "database" || name.as_str() == "message_broker")
        .any(|(_, health)| health.status == HealthStatus::Unhealthy);

    if critical_unhealthy {
        return HealthStatus::Unhealthy;
    }

    let any_unhealthy = checks
        .values()
        .any(|health| health.status == HealthStatus::Unhealthy);

    if any_unhealthy {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
