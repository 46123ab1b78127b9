use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicRejectOptions},
};
use tokio::{
    sync::watch,
    task::JoinSet,
    time::{Duration, sleep},
};
use tracing::{error, info, warn};

use crate::{
    clients::{rbmq::RabbitMqClient, senders::ChannelSender},
    models::{
        channel::NotificationChannel,
        delivery::{DeliveryLogEntry, DeliveryStatus},
        message::{NotificationMessage, WEATHER_NOTIFICATION_TYPE},
        retry::RetryConfig,
    },
    rate_limit::RateLimiter,
    utils::retry_with_backoff,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Append-only delivery audit store. Write failures are logged and
/// swallowed; they never decide a message's fate.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn record(&self, entry: &DeliveryLogEntry) -> Result<(), Error>;
}

#[async_trait]
impl<L: DeliveryLog + ?Sized> DeliveryLog for Arc<L> {
    async fn record(&self, entry: &DeliveryLogEntry) -> Result<(), Error> {
        (**self).record(entry).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Delivered,

    /// Message can never become valid; acknowledged without processing.
    Dropped,
}

/// Drains one channel's queue: validates, waits out the rate gate,
/// performs the send, records the audit entry, and acks or rejects.
pub struct ChannelConsumer<T, L> {
    sender: T,
    delivery_log: L,
    rate_limiter: RateLimiter,
    retry: RetryConfig,
}

impl<T, L> ChannelConsumer<T, L>
where
    T: ChannelSender,
    L: DeliveryLog,
{
    pub fn new(sender: T, delivery_log: L, rate_limiter: RateLimiter, retry: RetryConfig) -> Self {
        Self {
            sender,
            delivery_log,
            rate_limiter,
            retry,
        }
    }

    pub fn channel(&self) -> NotificationChannel {
        self.sender.channel()
    }

    pub fn sender(&self) -> &T {
        &self.sender
    }

    pub fn delivery_log(&self) -> &L {
        &self.delivery_log
    }

    /// Full per-message pipeline. `Err` means the caller must reject
    /// without requeue; `Dropped` is acknowledged like a success.
    pub async fn handle_payload(&self, payload: &[u8]) -> Result<HandleOutcome, Error> {
        let message: NotificationMessage = serde_json::from_slice(payload)
            .map_err(|e| anyhow!("Undecodable notification payload: {}", e))?;

        if message.channel != self.sender.channel() {
            warn!(
                received = %message.channel,
                expected = %self.sender.channel(),
                "Received message for another channel, dropping"
            );
            return Ok(HandleOutcome::Dropped);
        }

        if message.message_type != WEATHER_NOTIFICATION_TYPE {
            warn!(message_type = %message.message_type, "Unknown message type, dropping");
            return Ok(HandleOutcome::Dropped);
        }

        let slot = self.rate_limiter.acquire().await;

        let subject = message.subject();
        let body = message.body_text();
        let recipient = &message.data.recipient;

        let send_result =
            retry_with_backoff(&self.retry, || self.sender.send(recipient, &subject, &body)).await;

        let entry = match &send_result {
            Ok(receipt) => DeliveryLogEntry::new(
                message.data.subscription_id.clone(),
                recipient.clone(),
                subject.clone(),
                DeliveryStatus::Delivered,
            )
            .with_receipt(receipt.message_id.clone(), receipt.response.clone()),
            Err(e) => DeliveryLogEntry::new(
                message.data.subscription_id.clone(),
                recipient.clone(),
                subject.clone(),
                DeliveryStatus::Failed,
            )
            .with_error(e.to_string()),
        };

        if let Err(e) = self.delivery_log.record(&entry).await {
            warn!(error = %e, "Failed to save delivery log");
        }

        match send_result {
            Ok(_) => {
                slot.record_send();
                info!(
                    channel = %self.sender.channel(),
                    recipient,
                    "Notification processed successfully"
                );
                Ok(HandleOutcome::Delivered)
            }
            Err(e) => Err(anyhow!(
                "Failed to send {} notification: {}",
                self.sender.channel(),
                e
            )),
        }
    }
}

impl<T, L> ChannelConsumer<T, L>
where
    T: ChannelSender + 'static,
    L: DeliveryLog + 'static,
{
    /// Consume loop. Deliveries are handled on spawned tasks so the broker
    /// can keep up to `prefetch` messages in flight; the rate limiter
    /// serializes the actual sends. A lost consumer stream is re-created
    /// through the broker client's reconnect path.
    pub async fn run(
        self: Arc<Self>,
        broker: Arc<RabbitMqClient>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut inflight: JoinSet<()> = JoinSet::new();

        loop {
            let mut consumer = match broker.create_consumer(self.channel()).await {
                Ok(consumer) => consumer,
                Err(e) => {
                    error!(
                        error = %e,
                        channel = %self.channel(),
                        "Failed to start consuming, retrying"
                    );
                    tokio::select! {
                        _ = sleep(RECONNECT_DELAY) => continue,
                        _ = shutdown.changed() => break,
                    }
                }
            };

            info!(channel = %self.channel(), "Started consuming notifications");

            loop {
                tokio::select! {
                    next = consumer.next() => {
                        match next {
                            Some(Ok(delivery)) => {
                                let this = Arc::clone(&self);
                                inflight.spawn(async move {
                                    this.process_delivery(delivery).await;
                                });
                            }
                            Some(Err(e)) => {
                                error!(error = %e, channel = %self.channel(), "Consumer stream error");
                                break;
                            }
                            None => {
                                warn!(channel = %self.channel(), "Consumer stream closed, reconnecting");
                                break;
                            }
                        }
                    }
                    Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
                    _ = shutdown.changed() => {
                        info!(channel = %self.channel(), "Consumer stopping");
                        while inflight.join_next().await.is_some() {}
                        return;
                    }
                }
            }

            tokio::select! {
                _ = sleep(RECONNECT_DELAY) => {}
                _ = shutdown.changed() => break,
            }
        }

        while inflight.join_next().await.is_some() {}
        info!(channel = %self.channel(), "Consumer stopped");
    }

    async fn process_delivery(&self, delivery: Delivery) {
        match self.handle_payload(&delivery.data).await {
            Ok(_) => {
                if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
                    error!(error = %e, "Failed to acknowledge message");
                }
            }
            Err(e) => {
                error!(error = %e, channel = %self.channel(), "Error processing message");

                // No requeue: a permanently failing send must not loop
                // through the queue forever.
                if let Err(e) = delivery
                    .acker
                    .reject(BasicRejectOptions { requeue: false })
                    .await
                {
                    error!(error = %e, "Failed to reject message");
                }
            }
        }
    }
}
