use crate::models::channel::NotificationChannel;

/// Static binding of one channel's queue to the exchange. Resolved once at
/// process start and never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub exchange_name: String,
    pub queue_name: String,
    pub routing_key: String,

    /// Consumer concurrency bound (unacknowledged deliveries).
    pub prefetch: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelQueues {
    pub email: QueueConfig,
    pub telegram: QueueConfig,
    pub whatsapp: QueueConfig,
}

impl ChannelQueues {
    pub fn for_channel(&self, channel: NotificationChannel) -> &QueueConfig {
        match channel {
            NotificationChannel::Email => &self.email,
            NotificationChannel::Telegram => &self.telegram,
            NotificationChannel::WhatsApp => &self.whatsapp,
        }
    }

    pub fn all(&self) -> [&QueueConfig; 3] {
        [&self.email, &self.telegram, &self.whatsapp]
    }
}
