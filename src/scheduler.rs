use std::{
    collections::HashMap,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use tokio::{
    sync::watch,
    time::{Duration, sleep},
};
use tracing::{error, info, warn};

use crate::{
    clients::weather::WeatherClient,
    config::Config,
    models::{
        message::{NotificationMessage, WeatherReport},
        subscription::{Frequency, Subscription},
    },
};

/// Read side of the subscription CRUD subsystem.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn fetch_eligible(&self, frequency: Frequency) -> Result<Vec<Subscription>, Error>;
}

/// Publish side of the broker, behind a seam so producer runs are testable
/// without a live broker.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, message: &NotificationMessage) -> Result<(), Error>;
}

#[async_trait]
impl<P: NotificationPublisher + ?Sized> NotificationPublisher for Arc<P> {
    async fn publish(&self, message: &NotificationMessage) -> Result<(), Error> {
        (**self).publish(message).await
    }
}

#[async_trait]
impl<S: SubscriptionStore + ?Sized> SubscriptionStore for Arc<S> {
    async fn fetch_eligible(&self, frequency: Frequency) -> Result<Vec<Subscription>, Error> {
        (**self).fetch_eligible(frequency).await
    }
}

/// Lookup key for one city: case-folded, trimmed, inner whitespace
/// collapsed to single underscores.
pub fn normalize_city(city: &str) -> String {
    city.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Groups subscriptions by normalized city so each run issues exactly one
/// weather lookup per distinct city.
pub fn group_by_city(subscriptions: Vec<Subscription>) -> HashMap<String, Vec<Subscription>> {
    let mut groups: HashMap<String, Vec<Subscription>> = HashMap::new();

    for subscription in subscriptions {
        groups
            .entry(normalize_city(&subscription.city))
            .or_default()
            .push(subscription);
    }

    groups
}

/// Counts of one tier run. Timers discard it; tests consume it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub subscriptions: usize,
    pub cities: usize,
    pub failed_cities: usize,
    pub published: usize,
    pub failed_publishes: usize,
}

pub struct WeatherScheduler<S, P> {
    store: S,
    weather: WeatherClient,
    publisher: P,
}

impl<S, P> WeatherScheduler<S, P>
where
    S: SubscriptionStore,
    P: NotificationPublisher,
{
    pub fn new(store: S, weather: WeatherClient, publisher: P) -> Self {
        Self {
            store,
            weather,
            publisher,
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// One tier run: probe the weather service, fan subscriptions out by
    /// city, publish one message per (subscription, active channel). A
    /// failing city or publish never aborts the rest of the run.
    pub async fn process_tier(&self, frequency: Frequency) -> RunSummary {
        let mut summary = RunSummary::default();

        if let Err(e) = self.weather.health_check().await {
            error!(
                error = %e,
                tier = %frequency,
                "Weather service is not available, skipping this run"
            );
            return summary;
        }

        let subscriptions = match self.store.fetch_eligible(frequency).await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!(error = %e, tier = %frequency, "Failed to fetch subscriptions");
                return summary;
            }
        };

        info!(
            count = subscriptions.len(),
            tier = %frequency,
            "Found confirmed subscriptions"
        );
        summary.subscriptions = subscriptions.len();

        if subscriptions.is_empty() {
            info!("No confirmed subscriptions found for processing");
            return summary;
        }

        let by_city = group_by_city(subscriptions);

        info!(cities = by_city.len(), "Processing unique cities");
        summary.cities = by_city.len();

        for (city_key, city_subscriptions) in by_city {
            let weather = match self.weather.get_weather(&city_key).await {
                Ok(data) => WeatherReport::from(data),
                Err(e) => {
                    summary.failed_cities += 1;
                    error!(error = %e, city = %city_key, "Error processing city");
                    continue;
                }
            };

            for subscription in &city_subscriptions {
                for (channel, recipient) in subscription.recipients.active_channels() {
                    let message =
                        NotificationMessage::weather(subscription, channel, recipient, weather.clone());

                    match self.publisher.publish(&message).await {
                        Ok(()) => summary.published += 1,
                        Err(e) => {
                            summary.failed_publishes += 1;
                            error!(
                                error = %e,
                                channel = %channel,
                                recipient,
                                city = %subscription.city,
                                "Failed to queue notification"
                            );
                        }
                    }
                }
            }
        }

        info!(
            tier = %frequency,
            subscriptions = summary.subscriptions,
            cities = summary.cities,
            published = summary.published,
            "Completed weather processing"
        );

        summary
    }
}

impl<S, P> WeatherScheduler<S, P>
where
    S: SubscriptionStore + 'static,
    P: NotificationPublisher + 'static,
{
    /// Spawns one timer task per frequency tier. Tasks stop when the
    /// shutdown signal flips.
    pub fn start_timers(
        self: Arc<Self>,
        config: &Config,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<tokio::task::JoinHandle<()>>, Error> {
        let mut handles = Vec::new();

        for frequency in [Frequency::Hourly, Frequency::Daily] {
            let tier = parse_tier_schedule(frequency, config.cron_for(frequency))?;
            handles.push(tokio::spawn(run_tier_timer(
                Arc::clone(&self),
                tier,
                shutdown.clone(),
            )));
        }

        Ok(handles)
    }
}

pub struct TierSchedule {
    pub frequency: Frequency,
    pub schedule: Schedule,
}

pub fn parse_tier_schedule(frequency: Frequency, expression: &str) -> Result<TierSchedule, Error> {
    let schedule = Schedule::from_str(&normalize_cron(expression)).map_err(|e| {
        anyhow!(
            "Invalid cron expression {:?} for {} tier: {}",
            expression,
            frequency,
            e
        )
    })?;

    Ok(TierSchedule {
        frequency,
        schedule,
    })
}

/// Tier schedules are configured in the classic 5-field form; the cron
/// crate wants a seconds field.
fn normalize_cron(expression: &str) -> String {
    if expression.split_whitespace().count() == 5 {
        format!("0 {}", expression)
    } else {
        expression.to_string()
    }
}

/// Fires `process_tier` on the tier's schedule. A tick is fire-and-forget:
/// the run is spawned so a slow run never blocks the timer, and a
/// skip-if-busy guard keeps runs of the same tier from overlapping.
async fn run_tier_timer<S, P>(
    scheduler: Arc<WeatherScheduler<S, P>>,
    tier: TierSchedule,
    mut shutdown: watch::Receiver<bool>,
) where
    S: SubscriptionStore + 'static,
    P: NotificationPublisher + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    info!(tier = %tier.frequency, "Tier timer started");

    loop {
        let now = Utc::now();
        let Some(next) = tier.schedule.after(&now).next() else {
            warn!(tier = %tier.frequency, "Schedule has no upcoming fire time, stopping timer");
            return;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = sleep(wait) => {}
            _ = shutdown.changed() => {
                info!(tier = %tier.frequency, "Tier timer stopped");
                return;
            }
        }

        if running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(tier = %tier.frequency, "Previous run still in flight, skipping tick");
            continue;
        }

        let scheduler = Arc::clone(&scheduler);
        let running = Arc::clone(&running);
        let frequency = tier.frequency;

        tokio::spawn(async move {
            info!(tier = %frequency, "Running scheduled weather check");
            scheduler.process_tier(frequency).await;
            running.store(false, Ordering::SeqCst);
        });
    }
}
