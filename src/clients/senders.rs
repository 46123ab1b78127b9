use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{config::Config, models::channel::NotificationChannel};

/// Transport-assigned identifiers captured in the delivery log.
#[derive(Debug, Clone, Default)]
pub struct SendReceipt {
    pub message_id: Option<String>,
    pub response: Option<String>,
}

/// One delivery medium's side-effecting send. The consumer composes
/// subject and body; the sender only talks to its transport.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn channel(&self) -> NotificationChannel;

    async fn send(&self, recipient: &str, subject: &str, body: &str)
    -> Result<SendReceipt, Error>;
}

/// Email delivery through the mail relay's HTTP API.
pub struct EmailSender {
    http_client: Client,
    api_url: String,
    api_token: String,
    sender_name: String,
    sender_address: String,
}

#[derive(Serialize)]
struct MailAddress<'a> {
    name: &'a str,
    address: &'a str,
}

#[derive(Serialize)]
struct MailRequest<'a> {
    from: MailAddress<'a>,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: String,
}

#[derive(Deserialize)]
struct MailApiResponse {
    message_id: Option<String>,
    response: Option<String>,
}

impl EmailSender {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(api_url = %config.mail_api_url, "Email transport initialized");

        Ok(Self {
            http_client,
            api_url: config.mail_api_url.clone(),
            api_token: config.mail_api_token.clone(),
            sender_name: config.mail_sender_name.clone(),
            sender_address: config.mail_sender_address.clone(),
        })
    }

    fn html_content(&self, text: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<body>
    <div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2>Weather Notification</h2>
        <p>{}</p>
        <p style="color: #666; font-size: 12px;">This is an automated weather notification service.</p>
    </div>
</body>
</html>"#,
            text.replace('\n', "<br>")
        )
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<SendReceipt, Error> {
        debug!(recipient, subject, "Sending email");

        let request = MailRequest {
            from: MailAddress {
                name: &self.sender_name,
                address: &self.sender_address,
            },
            to: recipient,
            subject,
            text: body,
            html: self.html_content(body),
        };

        let response = self
            .http_client
            .post(format!("{}/messages", self.api_url))
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Mail API request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Mail API returned status {}: {}", status, error_text));
        }

        let receipt: MailApiResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse mail API response: {}", e))?;

        info!(recipient, "Email sent successfully");

        Ok(SendReceipt {
            message_id: receipt.message_id,
            response: receipt.response,
        })
    }
}

/// Placeholder Telegram sender: logs the composed notification and reports
/// success so the queue can be drained until the bot integration lands.
pub struct TelegramSender;

#[async_trait]
impl ChannelSender for TelegramSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Telegram
    }

    async fn send(
        &self,
        recipient: &str,
        _subject: &str,
        body: &str,
    ) -> Result<SendReceipt, Error> {
        let message_id = Uuid::new_v4().to_string();

        info!(
            channel = "telegram",
            recipient,
            message_id = %message_id,
            body,
            "Simulated telegram send"
        );

        Ok(SendReceipt {
            message_id: Some(message_id),
            response: None,
        })
    }
}

/// Placeholder WhatsApp sender, same contract as [`TelegramSender`].
pub struct WhatsAppSender;

#[async_trait]
impl ChannelSender for WhatsAppSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::WhatsApp
    }

    async fn send(
        &self,
        recipient: &str,
        _subject: &str,
        body: &str,
    ) -> Result<SendReceipt, Error> {
        let message_id = Uuid::new_v4().to_string();

        info!(
            channel = "whatsapp",
            recipient,
            message_id = %message_id,
            body,
            "Simulated whatsapp send"
        );

        Ok(SendReceipt {
            message_id: Some(message_id),
            response: None,
        })
    }
}
