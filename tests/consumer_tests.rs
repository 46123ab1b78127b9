use std::sync::{
    Mutex,
    atomic::{AtomicU32, Ordering},
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use serde_json::json;
use tokio::time::{Duration, Instant, sleep};
use uuid::Uuid;
use weather_notify::{
    clients::senders::{ChannelSender, SendReceipt},
    consumer::{ChannelConsumer, DeliveryLog, HandleOutcome},
    models::{
        channel::{ChannelRecipients, NotificationChannel},
        delivery::{DeliveryLogEntry, DeliveryStatus},
        message::{NotificationMessage, WeatherReport},
        retry::RetryConfig,
        subscription::{Frequency, Subscription},
    },
    rate_limit::RateLimiter,
};

/// Test: A valid message is sent once and logged as DELIVERED
#[tokio::test]
async fn test_valid_message_is_sent_and_logged_delivered() -> Result<()> {
    let consumer = consumer_with(FakeSender::succeeding(), FakeDeliveryLog::default());

    let payload = serde_json::to_vec(&email_message("a@x.com", "Paris"))?;
    let outcome = consumer.handle_payload(&payload).await?;

    assert_eq!(outcome, HandleOutcome::Delivered);
    assert_eq!(consumer.sender().calls(), 1);

    let entries = consumer.delivery_log().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status_code, DeliveryStatus::Delivered);
    assert_eq!(entries[0].recipient, "a@x.com");
    assert_eq!(entries[0].subject, "Weather Update for Paris");
    assert_eq!(entries[0].message_id.as_deref(), Some("msg-1"));
    assert!(entries[0].error_message.is_none());

    Ok(())
}

/// Test: A message for another channel is dropped without a send or a log entry
#[tokio::test]
async fn test_wrong_channel_is_dropped_not_retried() -> Result<()> {
    let consumer = consumer_with(FakeSender::succeeding(), FakeDeliveryLog::default());

    let mut message = email_message("a@x.com", "Paris");
    message.channel = NotificationChannel::Telegram;
    let payload = serde_json::to_vec(&message)?;

    let outcome = consumer.handle_payload(&payload).await?;

    assert_eq!(outcome, HandleOutcome::Dropped);
    assert_eq!(consumer.sender().calls(), 0);
    assert!(consumer.delivery_log().entries().is_empty());

    Ok(())
}

/// Test: An unknown message type is dropped without a send
#[tokio::test]
async fn test_unknown_message_type_is_dropped() -> Result<()> {
    let consumer = consumer_with(FakeSender::succeeding(), FakeDeliveryLog::default());

    let mut message = email_message("a@x.com", "Paris");
    message.message_type = "marketing_blast".to_string();
    let payload = serde_json::to_vec(&message)?;

    let outcome = consumer.handle_payload(&payload).await?;

    assert_eq!(outcome, HandleOutcome::Dropped);
    assert_eq!(consumer.sender().calls(), 0);

    Ok(())
}

/// Test: Undecodable payloads surface an error for rejection
#[tokio::test]
async fn test_invalid_json_surfaces_an_error() -> Result<()> {
    let consumer = consumer_with(FakeSender::succeeding(), FakeDeliveryLog::default());

    let result = consumer.handle_payload(b"{ invalid json }").await;

    assert!(result.is_err());
    assert_eq!(consumer.sender().calls(), 0);
    assert!(consumer.delivery_log().entries().is_empty());

    Ok(())
}

/// Test: A failed send is logged as FAILED and surfaces an error, with one attempt by default
#[tokio::test]
async fn test_failed_send_is_logged_and_surfaced() -> Result<()> {
    let consumer = consumer_with(FakeSender::failing(), FakeDeliveryLog::default());

    let payload = serde_json::to_vec(&email_message("a@x.com", "Paris"))?;
    let result = consumer.handle_payload(&payload).await;

    assert!(result.is_err());
    assert_eq!(consumer.sender().calls(), 1, "default policy is a single attempt");

    let entries = consumer.delivery_log().entries();
    assert_eq!(entries.len(), 1, "exactly one audit entry per send attempt sequence");
    assert_eq!(entries[0].status_code, DeliveryStatus::Failed);
    assert!(
        entries[0]
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("transport rejected")
    );

    Ok(())
}

/// Test: A delivery-log write failure never changes the ack decision
#[tokio::test]
async fn test_log_write_failure_does_not_affect_outcome() -> Result<()> {
    let consumer = consumer_with(FakeSender::succeeding(), FakeDeliveryLog::failing());

    let payload = serde_json::to_vec(&email_message("a@x.com", "Paris"))?;
    let outcome = consumer.handle_payload(&payload).await?;

    assert_eq!(outcome, HandleOutcome::Delivered);

    Ok(())
}

/// Test: Bounded retry policy retries transient send failures within one consumption
#[tokio::test]
async fn test_bounded_retry_policy_retries_transient_failures() -> Result<()> {
    let retry = RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        backoff_multiplier: 2,
    };
    let consumer = ChannelConsumer::new(
        FakeSender::failing_times(2),
        FakeDeliveryLog::default(),
        RateLimiter::from_millis(0),
        retry,
    );

    let payload = serde_json::to_vec(&email_message("a@x.com", "Paris"))?;
    let outcome = consumer.handle_payload(&payload).await?;

    assert_eq!(outcome, HandleOutcome::Delivered);
    assert_eq!(consumer.sender().calls(), 3);

    let entries = consumer.delivery_log().entries();
    assert_eq!(entries.len(), 1, "retries within one consumption log once");
    assert_eq!(entries[0].status_code, DeliveryStatus::Delivered);

    Ok(())
}

/// Test: Unknown wire fields are ignored on decode
#[tokio::test]
async fn test_unknown_wire_fields_are_ignored() -> Result<()> {
    let consumer = consumer_with(FakeSender::succeeding(), FakeDeliveryLog::default());

    let payload = serde_json::to_vec(&json!({
        "type": "weather_notification",
        "channel": "email",
        "data": {
            "subscription_id": Uuid::new_v4().to_string(),
            "recipient": "a@x.com",
            "city": "Paris",
            "frequency": "daily",
            "weather": {
                "temperature": 18,
                "description": "clear",
                "timestamp": "2026-08-06T08:00:00Z",
                "humidity": 40
            }
        },
        "timestamp": 1754467200000i64,
        "priority": "normal",
        "trace_id": "added-by-a-newer-producer"
    }))?;

    let outcome = consumer.handle_payload(&payload).await?;

    assert_eq!(outcome, HandleOutcome::Delivered);

    Ok(())
}

/// Test: A message arriving inside the rate window is delayed by the remaining interval
#[tokio::test(start_paused = true)]
async fn test_send_is_delayed_by_remaining_rate_interval() -> Result<()> {
    let consumer = ChannelConsumer::new(
        FakeSender::succeeding(),
        FakeDeliveryLog::default(),
        RateLimiter::from_millis(300),
        RetryConfig::single_attempt(),
    );

    let payload = serde_json::to_vec(&email_message("a@x.com", "Paris"))?;
    consumer.handle_payload(&payload).await?;

    sleep(Duration::from_millis(100)).await;

    consumer.handle_payload(&payload).await?;

    let sends = consumer.sender().send_instants();
    assert_eq!(sends.len(), 2);
    let gap = sends[1] - sends[0];
    assert!(
        gap >= Duration::from_millis(300) && gap < Duration::from_millis(320),
        "second send should wait out the remaining ~200ms, gap was {:?}",
        gap
    );

    Ok(())
}

fn email_message(recipient: &str, city: &str) -> NotificationMessage {
    let subscription = Subscription {
        id: Uuid::new_v4(),
        city: city.to_string(),
        frequency: Frequency::Daily,
        recipients: ChannelRecipients {
            email: Some(recipient.to_string()),
            ..Default::default()
        },
    };

    NotificationMessage::weather(
        &subscription,
        NotificationChannel::Email,
        recipient,
        WeatherReport {
            temperature: 18.0,
            description: "clear".to_string(),
            timestamp: "2026-08-06T08:00:00Z".to_string(),
        },
    )
}

fn consumer_with(
    sender: FakeSender,
    delivery_log: FakeDeliveryLog,
) -> ChannelConsumer<FakeSender, FakeDeliveryLog> {
    ChannelConsumer::new(
        sender,
        delivery_log,
        RateLimiter::from_millis(0),
        RetryConfig::single_attempt(),
    )
}

struct FakeSender {
    calls: AtomicU32,
    fail_first: u32,
    always_fail: bool,
    send_instants: Mutex<Vec<Instant>>,
}

impl FakeSender {
    fn succeeding() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_first: 0,
            always_fail: false,
            send_instants: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::succeeding()
        }
    }

    fn failing_times(n: u32) -> Self {
        Self {
            fail_first: n,
            ..Self::succeeding()
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn send_instants(&self) -> Vec<Instant> {
        self.send_instants.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelSender for FakeSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    async fn send(
        &self,
        _recipient: &str,
        _subject: &str,
        _body: &str,
    ) -> Result<SendReceipt, Error> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.always_fail || attempt <= self.fail_first {
            return Err(anyhow!("transport rejected the message"));
        }

        self.send_instants.lock().unwrap().push(Instant::now());

        Ok(SendReceipt {
            message_id: Some("msg-1".to_string()),
            response: Some("250 OK".to_string()),
        })
    }
}

#[derive(Default)]
struct FakeDeliveryLog {
    entries: Mutex<Vec<DeliveryLogEntry>>,
    fail_writes: bool,
}

impl FakeDeliveryLog {
    fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    fn entries(&self) -> Vec<DeliveryLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryLog for FakeDeliveryLog {
    async fn record(&self, entry: &DeliveryLogEntry) -> Result<(), Error> {
        if self.fail_writes {
            return Err(anyhow!("delivery log unavailable"));
        }

        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
