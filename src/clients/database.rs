use anyhow::{Error, Result, anyhow};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    consumer::DeliveryLog,
    models::{
        channel::ChannelRecipients,
        delivery::DeliveryLogEntry,
        subscription::{Frequency, Subscription},
    },
    scheduler::SubscriptionStore,
};

pub struct DatabaseClient {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    city: String,
    email: Option<String>,
    telegram_chat_id: Option<String>,
    whatsapp_phone: Option<String>,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        info!("PostgreSQL connection established");

        Ok(Self { pool })
    }

    /// Active, confirmed subscriptions for one frequency tier. Everything
    /// else about subscriptions belongs to the CRUD subsystem.
    pub async fn fetch_subscriptions(&self, frequency: Frequency) -> Result<Vec<Subscription>, Error> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, city, email, telegram_chat_id, whatsapp_phone
            FROM subscriptions
            WHERE active = TRUE
              AND confirmed = TRUE
              AND frequency = $1
            "#,
        )
        .bind(frequency.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch {} subscriptions: {}", frequency, e))?;

        Ok(rows
            .into_iter()
            .map(|row| Subscription {
                id: row.id,
                city: row.city,
                frequency,
                recipients: ChannelRecipients {
                    email: row.email,
                    telegram: row.telegram_chat_id,
                    whatsapp: row.whatsapp_phone,
                },
            })
            .collect())
    }

    pub async fn insert_delivery_log(&self, entry: &DeliveryLogEntry) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO delivery_logs (
                subscription_id,
                status_code,
                recipient,
                subject,
                error_message,
                message_id,
                response
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&entry.subscription_id)
        .bind(entry.status_code.to_string())
        .bind(&entry.recipient)
        .bind(&entry.subject)
        .bind(&entry.error_message)
        .bind(&entry.message_id)
        .bind(&entry.response)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                error = %e,
                subscription_id = %entry.subscription_id,
                "Failed to write delivery log to database"
            );
            anyhow!("Database write failed: {}", e)
        })?;

        debug!(
            subscription_id = %entry.subscription_id,
            status = %entry.status_code,
            "Delivery log written to database"
        );

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for DatabaseClient {
    async fn fetch_eligible(&self, frequency: Frequency) -> Result<Vec<Subscription>, Error> {
        self.fetch_subscriptions(frequency).await
    }
}

#[async_trait::async_trait]
impl DeliveryLog for DatabaseClient {
    async fn record(&self, entry: &DeliveryLogEntry) -> Result<(), Error> {
        self.insert_delivery_log(entry).await
    }
}
