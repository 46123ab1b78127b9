use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::{
    channel::NotificationChannel,
    queue::{ChannelQueues, QueueConfig},
    retry::RetryConfig,
    subscription::Frequency,
};

/// Process-wide configuration, resolved once at startup and passed by
/// reference into each component.
#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub rabbitmq_url: String,

    #[serde(default = "default_exchange")]
    pub rabbitmq_exchange: String,

    #[serde(default = "default_email_queue")]
    pub email_queue_name: String,
    #[serde(default = "default_email_routing_key")]
    pub email_routing_key: String,
    #[serde(default = "default_prefetch")]
    pub email_prefetch: u16,

    #[serde(default = "default_telegram_queue")]
    pub telegram_queue_name: String,
    #[serde(default = "default_telegram_routing_key")]
    pub telegram_routing_key: String,
    #[serde(default = "default_prefetch")]
    pub telegram_prefetch: u16,

    #[serde(default = "default_whatsapp_queue")]
    pub whatsapp_queue_name: String,
    #[serde(default = "default_whatsapp_routing_key")]
    pub whatsapp_routing_key: String,
    #[serde(default = "default_prefetch")]
    pub whatsapp_prefetch: u16,

    #[serde(default = "default_hourly_cron")]
    pub hourly_cron: String,
    #[serde(default = "default_daily_cron")]
    pub daily_cron: String,

    pub weather_service_url: String,

    pub database_url: String,

    pub mail_api_url: String,
    pub mail_api_token: String,
    #[serde(default = "default_mail_sender_name")]
    pub mail_sender_name: String,
    pub mail_sender_address: String,

    #[serde(default = "default_rate_limit_ms")]
    pub email_rate_limit_ms: u64,
    #[serde(default = "default_rate_limit_ms")]
    pub telegram_rate_limit_ms: u64,
    #[serde(default = "default_rate_limit_ms")]
    pub whatsapp_rate_limit_ms: u64,

    /// 1 preserves the at-most-one-attempt send policy; higher values
    /// enable bounded retry with backoff.
    #[serde(default = "default_send_retry_max_attempts")]
    pub send_retry_max_attempts: u32,
    #[serde(default = "default_send_retry_initial_delay_ms")]
    pub send_retry_initial_delay_ms: u64,
    #[serde(default = "default_send_retry_max_delay_ms")]
    pub send_retry_max_delay_ms: u64,
    #[serde(default = "default_send_retry_backoff_multiplier")]
    pub send_retry_backoff_multiplier: u64,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        Ok(config)
    }

    pub fn channel_queues(&self) -> ChannelQueues {
        ChannelQueues {
            email: QueueConfig {
                exchange_name: self.rabbitmq_exchange.clone(),
                queue_name: self.email_queue_name.clone(),
                routing_key: self.email_routing_key.clone(),
                prefetch: self.email_prefetch,
            },
            telegram: QueueConfig {
                exchange_name: self.rabbitmq_exchange.clone(),
                queue_name: self.telegram_queue_name.clone(),
                routing_key: self.telegram_routing_key.clone(),
                prefetch: self.telegram_prefetch,
            },
            whatsapp: QueueConfig {
                exchange_name: self.rabbitmq_exchange.clone(),
                queue_name: self.whatsapp_queue_name.clone(),
                routing_key: self.whatsapp_routing_key.clone(),
                prefetch: self.whatsapp_prefetch,
            },
        }
    }

    pub fn cron_for(&self, frequency: Frequency) -> &str {
        match frequency {
            Frequency::Hourly => &self.hourly_cron,
            Frequency::Daily => &self.daily_cron,
        }
    }

    pub fn rate_limit_ms_for(&self, channel: NotificationChannel) -> u64 {
        match channel {
            NotificationChannel::Email => self.email_rate_limit_ms,
            NotificationChannel::Telegram => self.telegram_rate_limit_ms,
            NotificationChannel::WhatsApp => self.whatsapp_rate_limit_ms,
        }
    }

    pub fn send_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.send_retry_max_attempts.max(1),
            initial_delay_ms: self.send_retry_initial_delay_ms,
            max_delay_ms: self.send_retry_max_delay_ms,
            backoff_multiplier: self.send_retry_backoff_multiplier,
        }
    }
}

fn default_exchange() -> String {
    "weather_notifications".to_string()
}

fn default_email_queue() -> String {
    "email_notifications".to_string()
}

fn default_email_routing_key() -> String {
    "weather.email".to_string()
}

fn default_telegram_queue() -> String {
    "telegram_notifications".to_string()
}

fn default_telegram_routing_key() -> String {
    "weather.telegram".to_string()
}

fn default_whatsapp_queue() -> String {
    "whatsapp_notifications".to_string()
}

fn default_whatsapp_routing_key() -> String {
    "weather.whatsapp".to_string()
}

fn default_prefetch() -> u16 {
    5
}

fn default_hourly_cron() -> String {
    "0 * * * *".to_string()
}

fn default_daily_cron() -> String {
    "0 8 * * *".to_string()
}

fn default_mail_sender_name() -> String {
    "Weather Notification".to_string()
}

fn default_rate_limit_ms() -> u64 {
    500
}

fn default_send_retry_max_attempts() -> u32 {
    1
}

fn default_send_retry_initial_delay_ms() -> u64 {
    1000
}

fn default_send_retry_max_delay_ms() -> u64 {
    30000
}

fn default_send_retry_backoff_multiplier() -> u64 {
    2
}

fn default_server_port() -> u16 {
    8080
}
