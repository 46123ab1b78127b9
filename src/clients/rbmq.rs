use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::{Error, Result, anyhow};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
    options::{
        BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable},
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    models::{channel::NotificationChannel, message::NotificationMessage, queue::ChannelQueues},
    scheduler::NotificationPublisher,
};

struct BrokerState {
    connection: Connection,
    channel: Channel,
}

/// Broker handle shared by producer and consumers. Declares the full
/// topology on every (re)connect; a lost connection is detected
/// asynchronously and repaired on the next publish/consume attempt.
pub struct RabbitMqClient {
    url: String,
    queues: ChannelQueues,
    state: Mutex<Option<BrokerState>>,
    connected: Arc<AtomicBool>,
}

impl RabbitMqClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let client = Self {
            url: config.rabbitmq_url.clone(),
            queues: config.channel_queues(),
            state: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        };

        let broker = client.open().await?;
        *client.state.lock().await = Some(broker);

        Ok(client)
    }

    async fn open(&self) -> Result<BrokerState, Error> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let connected = Arc::clone(&self.connected);
        connection.on_error(move |e| {
            error!(error = %e, "RabbitMQ connection failed");
            connected.store(false, Ordering::SeqCst);
        });

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))?;

        declare_topology(&channel, &self.queues).await?;

        self.connected.store(true, Ordering::SeqCst);
        info!("RabbitMQ connection established, topology declared");

        Ok(BrokerState {
            connection,
            channel,
        })
    }

    fn connection_alive(&self, state: &Option<BrokerState>) -> bool {
        self.connected.load(Ordering::SeqCst)
            && state
                .as_ref()
                .is_some_and(|broker| broker.connection.status().connected())
    }

    /// Returns the shared publish channel, reconnecting at most once when
    /// the connection was lost.
    async fn ensure_channel(&self) -> Result<Channel, Error> {
        let mut state = self.state.lock().await;

        if !self.connection_alive(&state) {
            warn!("RabbitMQ not connected, attempting to reconnect");
            *state = Some(self.open().await?);
        }

        state
            .as_ref()
            .map(|broker| broker.channel.clone())
            .ok_or_else(|| anyhow!("RabbitMQ connection unavailable"))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Publishes one notification to its channel's queue. Fails (without
    /// blocking or panicking) when the broker stays unreachable after one
    /// reconnect attempt; callers log and move on.
    pub async fn publish_notification(&self, message: &NotificationMessage) -> Result<(), Error> {
        let queue = self.queues.for_channel(message.channel);
        let payload = serde_json::to_vec(message)?;

        let channel = self
            .ensure_channel()
            .await
            .map_err(|e| anyhow!("RabbitMQ unavailable, message not published: {}", e))?;

        let mut headers = FieldTable::default();
        headers.insert(
            "channel".into(),
            AMQPValue::LongString(message.channel.as_str().into()),
        );
        headers.insert(
            "city".into(),
            AMQPValue::LongString(message.data.city.as_str().into()),
        );

        let properties = BasicProperties::default()
            .with_delivery_mode(2)
            .with_timestamp(message.timestamp as u64)
            .with_priority(message.priority.queue_priority())
            .with_message_id(Uuid::new_v4().to_string().into())
            .with_headers(headers);

        channel
            .basic_publish(
                &queue.exchange_name,
                &queue.routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await
            .map_err(|e| {
                self.connected.store(false, Ordering::SeqCst);
                anyhow!("Failed to publish {} message: {}", message.channel, e)
            })?;

        Ok(())
    }

    /// Starts consuming one channel's queue with its configured prefetch as
    /// the unacknowledged-delivery ceiling. Each consumer gets its own AMQP
    /// channel so prefetch applies per queue and acks reference the
    /// delivering channel.
    pub async fn create_consumer(&self, channel_kind: NotificationChannel) -> Result<Consumer, Error> {
        let queue = self.queues.for_channel(channel_kind);

        let channel = {
            let mut state = self.state.lock().await;

            if !self.connection_alive(&state) {
                warn!("RabbitMQ not connected, attempting to reconnect");
                *state = Some(self.open().await?);
            }

            let broker = state
                .as_ref()
                .ok_or_else(|| anyhow!("RabbitMQ connection unavailable"))?;

            broker
                .connection
                .create_channel()
                .await
                .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))?
        };

        channel
            .basic_qos(queue.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set up QoS: {}", e))?;

        let consumer = channel
            .basic_consume(
                &queue.queue_name,
                &format!("{}_worker", channel_kind.as_str()),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to create consumer for {}: {}", queue.queue_name, e))?;

        info!(
            queue = %queue.queue_name,
            prefetch = queue.prefetch,
            "Consumer created for queue"
        );

        Ok(consumer)
    }

    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;

        if let Some(broker) = state.take() {
            if let Err(e) = broker.connection.close(0, "shutting down").await {
                warn!(error = %e, "Error disconnecting from RabbitMQ");
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        info!("Disconnected from RabbitMQ");
    }
}

/// Idempotent: safe to repeat on every connect, a no-op when the topology
/// already exists with identical parameters.
async fn declare_topology(channel: &Channel, queues: &ChannelQueues) -> Result<(), Error> {
    for queue in queues.all() {
        channel
            .exchange_declare(
                &queue.exchange_name,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare exchange {}: {}", queue.exchange_name, e))?;

        channel
            .queue_declare(
                &queue.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare queue {}: {}", queue.queue_name, e))?;

        channel
            .queue_bind(
                &queue.queue_name,
                &queue.exchange_name,
                &queue.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to bind queue {}: {}", queue.queue_name, e))?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl NotificationPublisher for RabbitMqClient {
    async fn publish(&self, message: &NotificationMessage) -> Result<(), Error> {
        self.publish_notification(message).await
    }
}
