use std::sync::Arc;

use anyhow::{Error, Result};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use weather_notify::{
    api,
    clients::{
        database::DatabaseClient,
        rbmq::RabbitMqClient,
        senders::{EmailSender, TelegramSender, WhatsAppSender},
    },
    config::Config,
    consumer::ChannelConsumer,
    models::channel::NotificationChannel,
    rate_limit::RateLimiter,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    info!("Configuration loaded, starting notification sender");

    let database = Arc::new(DatabaseClient::connect(&config.database_url).await?);
    let broker = Arc::new(RabbitMqClient::connect(&config).await?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let retry = config.send_retry_config();

    let email = Arc::new(ChannelConsumer::new(
        EmailSender::new(&config)?,
        Arc::clone(&database),
        RateLimiter::from_millis(config.rate_limit_ms_for(NotificationChannel::Email)),
        retry.clone(),
    ));
    let telegram = Arc::new(ChannelConsumer::new(
        TelegramSender,
        Arc::clone(&database),
        RateLimiter::from_millis(config.rate_limit_ms_for(NotificationChannel::Telegram)),
        retry.clone(),
    ));
    let whatsapp = Arc::new(ChannelConsumer::new(
        WhatsAppSender,
        Arc::clone(&database),
        RateLimiter::from_millis(config.rate_limit_ms_for(NotificationChannel::WhatsApp)),
        retry.clone(),
    ));

    let workers = vec![
        tokio::spawn(email.run(Arc::clone(&broker), shutdown_rx.clone())),
        tokio::spawn(telegram.run(Arc::clone(&broker), shutdown_rx.clone())),
        tokio::spawn(whatsapp.run(Arc::clone(&broker), shutdown_rx.clone())),
    ];

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
    for worker in workers {
        let _ = worker.await;
    }
    broker.disconnect().await;

    info!("Notification sender stopped");

    Ok(())
}
