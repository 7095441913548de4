//! Reminder Service worker lifecycle contract (spec §4.J): liveness = process
//! is up, readiness = scheduler started and last tick within 2x the check
//! interval. `/dapr/subscribe` advertises the Recurring Generator's topic
//! binding in the shape a Dapr sidecar would expect (spec §6), even though
//! this consumer reads `task-operations` from Kafka directly rather than
//! through a sidecar — the route is kept as the documented subscription
//! contract in case a future deployment fronts it with one.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct LastTick(Arc<AtomicI64>);

impl LastTick {
    pub fn new() -> Self {
        Self(Arc::new(AtomicI64::new(Utc::now().timestamp())))
    }

    pub fn record(&self) {
        self.0.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    fn elapsed(&self) -> chrono::Duration {
        let last = DateTime::from_timestamp(self.0.load(Ordering::Relaxed), 0).unwrap_or_else(Utc::now);
        Utc::now() - last
    }
}

#[derive(Clone)]
struct HealthState {
    last_tick: LastTick,
    check_interval: Duration,
}

pub fn router(last_tick: LastTick, check_interval: Duration) -> Router {
    let state = HealthState { last_tick, check_interval };

    Router::new()
        .route("/health", get(liveness))
        .route("/ready", get(readiness))
        .route("/dapr/subscribe", get(dapr_subscribe))
        .with_state(state)
}

async fn liveness() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy", "service": "taskflow-worker"}))
}

async fn readiness(State(state): State<HealthState>) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    let staleness = state.last_tick.elapsed();
    let budget = chrono::Duration::from_std(state.check_interval * 2).unwrap_or(chrono::Duration::hours(1));

    if staleness <= budget {
        (
            axum::http::StatusCode::OK,
            Json(json!({"status": "ready", "last_tick_seconds_ago": staleness.num_seconds()})),
        )
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not_ready", "last_tick_seconds_ago": staleness.num_seconds()})),
        )
    }
}

async fn dapr_subscribe() -> Json<serde_json::Value> {
    Json(json!([
        {
            "pubsubname": "kafka-pubsub",
            "topic": taskflow_core::events::TOPIC_TASK_OPERATIONS,
            "route": "/task-completed-handler",
        }
    ]))
}
