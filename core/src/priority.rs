//! Automatic priority classification, grounded in the original `priority_classifier`
//! service: urgency keywords only matter when no due date is set, otherwise
//! classification is purely a function of time remaining until the due date.

use crate::model::Priority;
use chrono::{DateTime, Duration, Utc};

const URGENCY_KEYWORDS: [&str; 5] = ["urgent", "asap", "critical", "important", "emergency"];

fn has_urgency_keyword(title: &str) -> bool {
    let lower = title.to_lowercase();
    URGENCY_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// `classify(title, due_date, now) → priority` — see spec §4.A.
pub fn classify(title: &str, due_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Priority {
    let Some(due_date) = due_date else {
        return if has_urgency_keyword(title) {
            Priority::VeryImportant
        } else {
            Priority::Low
        };
    };

    let delta = due_date - now;
    if delta <= Duration::hours(6) {
        Priority::VeryImportant
    } else if delta <= Duration::hours(24) {
        Priority::High
    } else if delta <= Duration::days(7) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Re-classify on update. `new_title`/`new_due_date` are `None` when the patch
/// didn't touch that field — absence never clears the current value. A due
/// date that the patch explicitly clears must be passed as `Some(None)` by
/// the caller's patch-diffing logic, not as plain `None`.
pub fn reclassify_on_update(
    new_title: Option<&str>,
    new_due_date: Option<Option<DateTime<Utc>>>,
    current_title: &str,
    current_due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Priority {
    let effective_title = new_title.unwrap_or(current_title);
    let effective_due_date = match new_due_date {
        Some(due_date) => due_date,
        None => current_due_date,
    };
    classify(effective_title, effective_due_date, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn urgent_keyword_without_due_date_is_very_important() {
        let p = classify("Urgent: fix production bug", None, now());
        assert_eq!(p, Priority::VeryImportant);
    }

    #[test]
    fn plain_title_without_due_date_is_low() {
        let p = classify("Buy groceries", None, now());
        assert_eq!(p, Priority::Low);
    }

    #[test]
    fn keyword_is_ignored_once_a_due_date_is_present() {
        let n = now();
        let due = n + Duration::days(30);
        let p = classify("Urgent: read later", Some(due), n);
        assert_eq!(p, Priority::Low);
    }

    #[test]
    fn boundary_exactly_six_hours_is_very_important() {
        let n = now();
        let due = n + Duration::hours(6);
        assert_eq!(classify("task", Some(due), n), Priority::VeryImportant);
    }

    #[test]
    fn just_over_six_hours_is_high() {
        let n = now();
        let due = n + Duration::hours(6) + Duration::seconds(1);
        assert_eq!(classify("task", Some(due), n), Priority::High);
    }

    #[test]
    fn boundary_exactly_24_hours_is_high() {
        let n = now();
        let due = n + Duration::hours(24);
        assert_eq!(classify("task", Some(due), n), Priority::High);
    }

    #[test]
    fn boundary_exactly_seven_days_is_medium() {
        let n = now();
        let due = n + Duration::days(7);
        assert_eq!(classify("task", Some(due), n), Priority::Medium);
    }

    #[test]
    fn beyond_seven_days_is_low() {
        let n = now();
        let due = n + Duration::days(7) + Duration::seconds(1);
        assert_eq!(classify("task", Some(due), n), Priority::Low);
    }

    #[test]
    fn update_without_new_values_keeps_current_classification_inputs() {
        let n = now();
        let current_due = n + Duration::hours(3);
        let p = reclassify_on_update(None, None, "old title", Some(current_due), n);
        assert_eq!(p, Priority::VeryImportant);
    }

    #[test]
    fn update_explicitly_clearing_due_date_is_honored() {
        let n = now();
        let current_due = n + Duration::hours(3);
        let p = reclassify_on_update(None, Some(None), "old title", Some(current_due), n);
        assert_eq!(p, Priority::Low);
    }
}
