//! Deadline Reminder Scheduler (spec §4.G), grounded in the original
//! `reminder_service.py` / `reminder_scheduler.py`: a single cooperative
//! timer task, `max_instances=1` and `coalesce=true` enforced simply by being
//! one task with `MissedTickBehavior::Skip` rather than a thread pool.

use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::notifications::{eligible_tasks, insert_if_absent, prune};

/// 6h, 3h, 1h, 30m, 15m — spec §4.G step 4, in descending order so the first
/// matching threshold wins (a task can only be in one window at a time).
const THRESHOLDS_HOURS: [f64; 5] = [6.0, 3.0, 1.0, 0.5, 0.25];

/// The literal constant from the original `settings.py` (`REMINDER_THRESHOLD_WINDOW
/// = 0.17`), not `1/6` — wide enough to catch a task even if the tick itself
/// runs slightly late.
const THRESHOLD_WINDOW_HOURS: f64 = 0.17;

fn threshold_message(title: &str, threshold_hours: f64) -> String {
    match threshold_hours {
        h if h == 6.0 => format!("⏰ Task '{title}' due in 6 hours"),
        h if h == 3.0 => format!("⚠️ Task '{title}' due in 3 hours"),
        h if h == 1.0 => format!("🚨 URGENT Task '{title}' due in 1 hour"),
        h if h == 0.5 => format!("🔴 CRITICAL Task '{title}' due in 30 minutes"),
        h if h == 0.25 => format!("🚨🚨 FINAL WARNING Task '{title}' due in 15 minutes"),
        other => format!("⏰ Task '{title}' due in {other} hours"),
    }
}

fn overdue_message(title: &str) -> String {
    format!("❌ OVERDUE: Task '{title}' is now overdue!")
}

pub struct TickResult {
    pub tasks_checked: usize,
    pub notifications_created: usize,
}

/// One reminder tick (spec §4.G algorithm). Scans eligible tasks, synthesizes
/// candidate notifications, relies on the `(task_id, message)` unique
/// constraint for duplicate suppression, then prunes each touched user.
pub async fn run_tick(db: &PgPool, enable_overdue: bool) -> Result<TickResult, sqlx::Error> {
    let tasks = eligible_tasks(db).await?;
    let now = Utc::now();
    let mut notifications_created = 0;
    let mut touched_users: HashSet<String> = HashSet::new();

    for task in &tasks {
        let hours_remaining = (task.due_date - now).num_milliseconds() as f64 / 3_600_000.0;

        if hours_remaining < 0.0 {
            if enable_overdue {
                let message = overdue_message(&task.title);
                if insert_if_absent(db, task.id, &task.user_id, &message, taskflow_core::model::Priority::VeryImportant).await? {
                    notifications_created += 1;
                    touched_users.insert(task.user_id.clone());
                }
            }
            continue;
        }

        for threshold in THRESHOLDS_HOURS {
            // Strict lower bound: spec §8's boundary scenario has
            // hours_remaining == threshold - WINDOW (5.83 for the 6h rung)
            // NOT qualify, only 5.9 (comfortably inside the window) does.
            let min = threshold - THRESHOLD_WINDOW_HOURS;
            if hours_remaining > min && hours_remaining < threshold {
                let message = threshold_message(&task.title, threshold);
                if insert_if_absent(db, task.id, &task.user_id, &message, taskflow_core::model::Priority::VeryImportant).await? {
                    notifications_created += 1;
                    touched_users.insert(task.user_id.clone());
                }
                break;
            }
        }
    }

    for user_id in &touched_users {
        let pruned = prune(db, user_id).await?;
        if pruned > 0 {
            info!(user_id, pruned, "pruned old read notifications");
        }
    }

    Ok(TickResult { tasks_checked: tasks.len(), notifications_created })
}

/// Runs [`run_tick`] on `check_interval`, skipping missed ticks instead of
/// bursting through a backlog (spec §4.G: "coalesces missed runs, skips runs
/// more than 5 minutes late" — `MissedTickBehavior::Skip` gives us the
/// former for free; lateness beyond 5 minutes is not distinguishable from an
/// on-time tick at this granularity and is accepted as a documented
/// simplification, see DESIGN.md).
pub async fn run_forever(db: PgPool, check_interval: Duration, enable_overdue: bool, last_tick: crate::health::LastTick) {
    let mut interval = tokio::time::interval(check_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        let start = std::time::Instant::now();

        match run_tick(&db, enable_overdue).await {
            Ok(result) => {
                info!(
                    tasks_checked = result.tasks_checked,
                    notifications_created = result.notifications_created,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "reminder tick completed"
                );
            }
            Err(e) => {
                warn!(error = %e, "reminder tick failed");
            }
        }

        last_tick.record();
    }
}
