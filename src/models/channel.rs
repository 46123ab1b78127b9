use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Telegram,
    WhatsApp,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::Telegram => "telegram",
            NotificationChannel::WhatsApp => "whatsapp",
        }
    }
}

impl Display for NotificationChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(self.as_str())
    }
}

/// Per-channel recipient identifiers of one subscription. A channel is
/// active when its identifier is present and non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelRecipients {
    pub email: Option<String>,
    pub telegram: Option<String>,
    pub whatsapp: Option<String>,
}

impl ChannelRecipients {
    pub fn active_channels(&self) -> Vec<(NotificationChannel, &str)> {
        let mut channels = Vec::new();

        if let Some(email) = self.email.as_deref()
            && !email.is_empty()
        {
            channels.push((NotificationChannel::Email, email));
        }
        if let Some(telegram) = self.telegram.as_deref()
            && !telegram.is_empty()
        {
            channels.push((NotificationChannel::Telegram, telegram));
        }
        if let Some(whatsapp) = self.whatsapp.as_deref()
            && !whatsapp.is_empty()
        {
            channels.push((NotificationChannel::WhatsApp, whatsapp));
        }

        channels
    }
}
