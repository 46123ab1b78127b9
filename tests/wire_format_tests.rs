use anyhow::Result;
use serde_json::{Value, json};
use uuid::Uuid;
use weather_notify::{
    config::Config,
    models::{
        channel::{ChannelRecipients, NotificationChannel},
        message::{NotificationMessage, Priority, WEATHER_NOTIFICATION_TYPE, WeatherReport},
        subscription::{Frequency, Subscription},
    },
};

/// Test: Serialized messages carry exactly the original wire field names
#[test]
fn test_message_wire_format_is_stable() -> Result<()> {
    let subscription = Subscription {
        id: Uuid::new_v4(),
        city: "Paris".to_string(),
        frequency: Frequency::Daily,
        recipients: ChannelRecipients {
            email: Some("a@x.com".to_string()),
            ..Default::default()
        },
    };
    let message = NotificationMessage::weather(
        &subscription,
        NotificationChannel::Email,
        "a@x.com",
        WeatherReport {
            temperature: 18.0,
            description: "clear".to_string(),
            timestamp: "2026-08-06T08:00:00Z".to_string(),
        },
    );

    let value: Value = serde_json::to_value(&message)?;

    assert_eq!(value["type"], "weather_notification");
    assert_eq!(value["channel"], "email");
    assert_eq!(value["priority"], "normal");
    assert!(value["timestamp"].is_i64());

    let data = &value["data"];
    assert_eq!(data["subscription_id"], subscription.id.to_string());
    assert_eq!(data["recipient"], "a@x.com");
    assert_eq!(data["city"], "Paris");
    assert_eq!(data["frequency"], "daily");
    assert_eq!(data["weather"]["temperature"], 18.0);
    assert_eq!(data["weather"]["description"], "clear");
    assert_eq!(data["weather"]["timestamp"], "2026-08-06T08:00:00Z");

    Ok(())
}

/// Test: Messages captured from the legacy producer still decode
#[test]
fn test_legacy_producer_payload_decodes() -> Result<()> {
    let payload = json!({
        "type": "weather_notification",
        "channel": "whatsapp",
        "data": {
            "subscription_id": "64b7f6a0c2a4e53d9c1f0e21",
            "recipient": "+441234567890",
            "city": "London",
            "frequency": "hourly",
            "weather": {
                "temperature": 11,
                "description": "light rain",
                "timestamp": "2026-08-06T07:00:00.000Z"
            }
        },
        "timestamp": 1754463600000i64,
        "priority": "high"
    })
    .to_string();

    let message: NotificationMessage = serde_json::from_str(&payload)?;

    assert_eq!(message.message_type, WEATHER_NOTIFICATION_TYPE);
    assert_eq!(message.channel, NotificationChannel::WhatsApp);
    assert_eq!(message.data.frequency, Frequency::Hourly);
    assert_eq!(message.data.weather.temperature, 11.0);
    assert_eq!(message.priority, Priority::High);

    Ok(())
}

/// Test: Channel queue resolution is stable and channel-isolated
#[test]
fn test_channel_queue_resolution_is_stable() -> Result<()> {
    let config = test_config();

    let queues = config.channel_queues();

    let email = queues.for_channel(NotificationChannel::Email);
    assert_eq!(email.queue_name, "email_q");
    assert_eq!(email.routing_key, "weather.email");
    assert_eq!(email.exchange_name, "weather_x");
    assert_eq!(email.prefetch, 3);

    let telegram = queues.for_channel(NotificationChannel::Telegram);
    assert_eq!(telegram.queue_name, "telegram_q");
    assert_ne!(telegram.routing_key, email.routing_key);

    // Resolving the static topology twice yields identical bindings.
    assert_eq!(queues, config.channel_queues());

    Ok(())
}

/// Test: Retry policy floors at a single attempt
#[test]
fn test_send_retry_policy_floors_at_one_attempt() -> Result<()> {
    let mut config = test_config();
    config.send_retry_max_attempts = 0;

    assert_eq!(config.send_retry_config().max_attempts, 1);

    config.send_retry_max_attempts = 4;
    assert_eq!(config.send_retry_config().max_attempts, 4);

    Ok(())
}

fn test_config() -> Config {
    Config {
        rabbitmq_url: "amqp://localhost:5672".to_string(),
        rabbitmq_exchange: "weather_x".to_string(),
        email_queue_name: "email_q".to_string(),
        email_routing_key: "weather.email".to_string(),
        email_prefetch: 3,
        telegram_queue_name: "telegram_q".to_string(),
        telegram_routing_key: "weather.telegram".to_string(),
        telegram_prefetch: 3,
        whatsapp_queue_name: "whatsapp_q".to_string(),
        whatsapp_routing_key: "weather.whatsapp".to_string(),
        whatsapp_prefetch: 3,
        hourly_cron: "0 * * * *".to_string(),
        daily_cron: "0 8 * * *".to_string(),
        weather_service_url: "http://localhost:3000".to_string(),
        database_url: "postgres://localhost/weather".to_string(),
        mail_api_url: "http://localhost:9000".to_string(),
        mail_api_token: "token".to_string(),
        mail_sender_name: "Weather Notification".to_string(),
        mail_sender_address: "noreply@weather.example".to_string(),
        email_rate_limit_ms: 500,
        telegram_rate_limit_ms: 500,
        whatsapp_rate_limit_ms: 500,
        send_retry_max_attempts: 1,
        send_retry_initial_delay_ms: 1000,
        send_retry_max_delay_ms: 30000,
        send_retry_backoff_multiplier: 2,
        server_port: 8080,
    }
}
