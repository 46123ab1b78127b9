use std::sync::Arc;

use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    time::{Duration, Instant, sleep},
};

/// Global minimum-interval gate over a channel's sends. The last-send
/// instant is the one piece of mutable shared state in a consumer process;
/// the owned guard keeps its check-and-update atomic across concurrently
/// running handlers.
pub struct RateLimiter {
    min_interval: Duration,
    last_send: Arc<Mutex<Option<Instant>>>,
}

/// Exclusive permission to perform one send. Holding the slot serializes
/// sends; dropping it without recording leaves the rate window unchanged,
/// so a failed send does not delay the next one.
pub struct SendSlot {
    guard: OwnedMutexGuard<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_send: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    /// Waits until at least the minimum interval has elapsed since the last
    /// recorded send, then hands out the send slot.
    pub async fn acquire(&self) -> SendSlot {
        let guard = Arc::clone(&self.last_send).lock_owned().await;

        if let Some(last) = *guard {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }

        SendSlot { guard }
    }
}

impl SendSlot {
    /// Records a successful send; the next acquire waits relative to now.
    pub fn record_send(mut self) {
        *self.guard = Some(Instant::now());
    }
}
