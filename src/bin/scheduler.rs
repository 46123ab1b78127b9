use std::sync::Arc;

use anyhow::{Error, Result};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use weather_notify::{
    api,
    clients::{database::DatabaseClient, rbmq::RabbitMqClient, weather::WeatherClient},
    config::Config,
    scheduler::WeatherScheduler,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    info!("Configuration loaded, starting weather scheduler");

    let database = DatabaseClient::connect(&config.database_url).await?;
    let broker = Arc::new(RabbitMqClient::connect(&config).await?);
    let weather = WeatherClient::new(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Arc::new(WeatherScheduler::new(database, weather, Arc::clone(&broker)));
    let timers = Arc::clone(&scheduler).start_timers(&config, shutdown_rx.clone())?;

    tokio::select! {
        result = api::run_api_server(config.clone(), shutdown_rx.clone()) => {
            if let Err(e) = result {
                error!(error = %e, "Health check server failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    for timer in timers {
        let _ = timer.await;
    }
    broker.disconnect().await;

    info!("Weather scheduler stopped");

    Ok(())
}
