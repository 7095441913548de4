//! Taskflow Worker: the Reminder Service (spec §4.J) wrapping the Deadline
//! Reminder Scheduler (§4.G), plus the Recurring Generator (§4.F) and its
//! DLQ consumer, and the Conversation Store's daily retention cleanup
//! (§4.H). One process, several cooperative tasks — grounded in the
//! teacher's `main.rs` boot sequence (pool, then dependent services, then
//! serve) generalized from a single Redis job queue to several long-running
//! consumers.

use anyhow::Result;
use cron::Schedule;
use sqlx::postgres::PgPoolOptions;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod admin;
mod config;
mod dedup;
mod dlq;
mod health;
mod notifications;
mod recurring;
mod reminder;

use config::Config;
use dedup::DedupStore;
use health::LastTick;
use taskflow_api::cache::CacheClient;
use taskflow_api::services::{ConversationStore, EventPublisher, TaskStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,taskflow_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Taskflow Worker");

    let config = Config::from_env()?;

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Database connection pool established");

    let cache = CacheClient::new(&config.redis_url).await?;
    info!("Redis connection established");

    let task_store = TaskStore::new(db_pool.clone(), cache.clone());
    let event_publisher = EventPublisher::new(&config.kafka_brokers, db_pool.clone())?;
    let conversations = ConversationStore::new(db_pool.clone());
    let dedup = DedupStore::new(cache.clone(), db_pool.clone());

    let generator = recurring::RecurringGenerator::new(
        &config.kafka_brokers,
        &config.recurring.consumer_group,
        &config.recurring.topic,
        task_store,
        event_publisher,
        dedup,
    )?;

    let dlq_consumer = dlq::DlqConsumer::new(&config.kafka_brokers, config.dlq.clone())?;

    let last_tick = LastTick::new();
    let admin_router = admin::router(dlq_consumer.clone(), config.admin_token.clone());
    let health_router = health::router(last_tick.clone(), config.reminder.check_interval).merge(admin_router);
    let health_addr = format!("0.0.0.0:{}", config.health_port);
    let health_listener = tokio::net::TcpListener::bind(&health_addr).await?;
    info!(addr = %health_addr, "Health/readiness/admin endpoint listening");

    let reminder_db = db_pool.clone();
    let reminder_check_interval = config.reminder.check_interval;
    let reminder_enable_overdue = config.reminder.enable_overdue;

    let cleanup_schedule = Schedule::from_str("0 0 0 * * * *").expect("static cron expression is valid");

    let shutdown = shutdown_signal();

    tokio::select! {
        _ = generator.run() => {
            error!("recurring generator consumer exited unexpectedly");
        }
        _ = dlq_consumer.run() => {
            error!("DLQ consumer exited unexpectedly");
        }
        _ = reminder::run_forever(reminder_db, reminder_check_interval, reminder_enable_overdue, last_tick) => {
            error!("reminder scheduler exited unexpectedly");
        }
        _ = run_cleanup_forever(conversations, cleanup_schedule) => {
            error!("message retention cleanup exited unexpectedly");
        }
        result = axum::serve(health_listener, health_router) => {
            if let Err(e) = result {
                error!(error = %e, "health server exited unexpectedly");
            }
        }
        _ = shutdown => {
            info!("Shutdown signal received, stopping worker");
        }
    }

    info!("Taskflow Worker stopped");
    Ok(())
}

/// Conversation/message retention (spec §3, §4.H): "a daily job deletes rows
/// where `expires_at < now`." Driven by a cron schedule rather than a plain
/// interval since "once per day" is naturally a wall-clock cadence, not an
/// elapsed-duration one (unlike the reminder tick).
async fn run_cleanup_forever(conversations: ConversationStore, schedule: Schedule) {
    loop {
        let Some(next) = schedule.upcoming(chrono::Utc).next() else {
            error!("cleanup cron schedule produced no upcoming run, stopping cleanup loop");
            return;
        };
        let delay = (next - chrono::Utc::now()).to_std().unwrap_or(Duration::from_secs(60));
        tokio::time::sleep(delay).await;

        match conversations.cleanup_expired().await {
            Ok((deleted_count, timestamp)) => {
                info!(deleted_count, %timestamp, "message retention cleanup completed");
            }
            Err(e) => {
                error!(error = %e, "message retention cleanup failed");
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
