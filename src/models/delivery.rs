use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            DeliveryStatus::Delivered => write!(f, "DELIVERED"),
            DeliveryStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One audit record per send attempt. Append-only; never read back by the
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub subscription_id: String,
    pub status_code: DeliveryStatus,
    pub recipient: String,
    pub subject: String,
    pub error_message: Option<String>,
    pub message_id: Option<String>,
    pub response: Option<String>,
}

impl DeliveryLogEntry {
    pub fn new(
        subscription_id: String,
        recipient: String,
        subject: String,
        status_code: DeliveryStatus,
    ) -> Self {
        Self {
            subscription_id,
            status_code,
            recipient,
            subject,
            error_message: None,
            message_id: None,
            response: None,
        }
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error_message = Some(error);
        self
    }

    pub fn with_receipt(mut self, message_id: Option<String>, response: Option<String>) -> Self {
        self.message_id = message_id;
        self.response = response;
        self
    }
}
