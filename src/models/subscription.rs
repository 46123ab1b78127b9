use std::fmt::{Display, Formatter, Result};

use anyhow::{Error, anyhow};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::channel::ChannelRecipients;

/// Notification frequency tier. Each tier has its own cron schedule and
/// subscriber set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    Daily,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
        }
    }

    pub fn parse(value: &str) -> std::result::Result<Self, Error> {
        match value {
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            other => Err(anyhow!("Unknown frequency tier: {}", other)),
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(self.as_str())
    }
}

/// An active, confirmed subscription as read by the producer. Created and
/// mutated elsewhere; read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub city: String,
    pub frequency: Frequency,
    pub recipients: ChannelRecipients,
}
