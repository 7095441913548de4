use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Worker-side configuration (spec §6, §4.F, §4.G, §4.J). A deliberate subset
/// of the API's `Config`: only the knobs the reminder scheduler, recurring
/// generator, and DLQ consumer actually read.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub kafka_brokers: String,
    pub reminder: ReminderConfig,
    pub recurring: RecurringConfig,
    pub dlq: DlqConfig,
    pub health_port: u16,
    pub admin_token: String,
}

/// §4.G: `CHECK_INTERVAL` default 10 minutes, overdue alerts default on.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub check_interval: Duration,
    pub enable_overdue: bool,
}

/// §4.F: consumer group + the topic/DLQ pair it watches.
#[derive(Debug, Clone)]
pub struct RecurringConfig {
    pub consumer_group: String,
    pub topic: String,
}

/// §4.F DLQ policy: base 5s, factor 2, max 60s, max 3 attempts (literal
/// constants from `original_source`'s `dlq_consumer.py`, overridable by the
/// same env var names the original reads).
#[derive(Debug, Clone)]
pub struct DlqConfig {
    pub topic: String,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: u32,
    pub max_backoff: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let check_interval_minutes: i64 = env::var("REMINDER_CHECK_INTERVAL")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("REMINDER_CHECK_INTERVAL must be a number")?;

        let recurring_topic =
            env::var("RECURRING_TOPIC").unwrap_or_else(|_| "task-operations".to_string());
        let dlq_topic = taskflow_core::events::dlq_topic(&recurring_topic);

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a number")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            kafka_brokers: env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            reminder: ReminderConfig {
                check_interval: Duration::from_secs((check_interval_minutes.max(1) as u64) * 60),
                enable_overdue: env::var("REMINDER_ENABLE_OVERDUE")
                    .map(|v| v.to_lowercase() == "true")
                    .unwrap_or(true),
            },
            recurring: RecurringConfig {
                consumer_group: env::var("RECURRING_CONSUMER_GROUP")
                    .unwrap_or_else(|_| "recurring-task-service-group".to_string()),
                topic: recurring_topic,
            },
            dlq: DlqConfig {
                topic: dlq_topic,
                max_attempts: env::var("DLQ_MAX_RETRY_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .context("DLQ_MAX_RETRY_ATTEMPTS must be a number")?,
                initial_backoff: Duration::from_secs(
                    env::var("DLQ_INITIAL_BACKOFF_SECONDS")
                        .unwrap_or_else(|_| "5".to_string())
                        .parse()
                        .context("DLQ_INITIAL_BACKOFF_SECONDS must be a number")?,
                ),
                backoff_multiplier: env::var("DLQ_BACKOFF_MULTIPLIER")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .context("DLQ_BACKOFF_MULTIPLIER must be a number")?,
                max_backoff: Duration::from_secs(
                    env::var("DLQ_MAX_BACKOFF_SECONDS")
                        .unwrap_or_else(|_| "60".to_string())
                        .parse()
                        .context("DLQ_MAX_BACKOFF_SECONDS must be a number")?,
                ),
            },
            health_port: env::var("HEALTH_PORT")
                .unwrap_or_else(|_| "8081".to_string())
                .parse()
                .context("HEALTH_PORT must be a valid u16")?,
            admin_token: env::var("ADMIN_TOKEN").context("ADMIN_TOKEN must be set")?,
        })
    }
}
