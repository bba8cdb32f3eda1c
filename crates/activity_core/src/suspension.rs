//! Overdue detection and the supervisor creation restriction.
//!
//! Everything here is a pure function of `(activities, now)`. Callers own
//! persistence and scheduling; see [`crate::activity_api`] and
//! [`crate::monitor`].

use crate::model::{Activity, ActivityStatus};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Days an activity may stay overdue before supervisors are blocked.
pub const THRESHOLD_DAYS: u32 = 3;

const SECONDS_PER_DAY: i64 = 86_400;
const OVERDUE_REASON: &str = "scheduled time passed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspensionStats {
    pub total_pending: usize,
    pub total_resolved: usize,
    pub exceeded_threshold: usize,
    pub pending: Vec<Activity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspensionEngine {
    threshold_days: u32,
}

impl Default for SuspensionEngine {
    fn default() -> Self {
        Self::new(THRESHOLD_DAYS)
    }
}

impl SuspensionEngine {
    pub fn new(threshold_days: u32) -> Self {
        Self { threshold_days }
    }

    pub fn threshold_days(&self) -> u32 {
        self.threshold_days
    }

    /// Moves every due `in_progress` activity to `overdue` and stamps
    /// `pending_since`. Returns the activities that changed.
    pub fn check_overdue(&self, activities: &mut [Activity], now: OffsetDateTime) -> Vec<Activity> {
        let mut transitioned = Vec::new();

        for activity in activities.iter_mut() {
            if activity.status != ActivityStatus::InProgress || !is_overdue(activity, now) {
                continue;
            }

            let Some(stamp) = timestamp(now) else {
                tracing::warn!(
                    activity_id = %activity.id,
                    "cannot stamp pending_since, leaving activity in progress"
                );
                continue;
            };

            activity.status = ActivityStatus::Overdue;
            if activity.pending_since.is_none() {
                activity.pending_since = Some(stamp);
            }

            tracing::info!(
                activity_id = %activity.id,
                title = %activity.title,
                suspended_at = activity.pending_since.as_deref().unwrap_or_default(),
                reason = OVERDUE_REASON,
                "activity marked overdue"
            );
            transitioned.push(activity.clone());
        }

        transitioned
    }

    pub fn is_escalated(&self, activity: &Activity, now: OffsetDateTime) -> bool {
        if activity.status != ActivityStatus::Overdue {
            return false;
        }

        days_pending(activity, now).is_some_and(|days| days >= i64::from(self.threshold_days))
    }

    /// Overdue activities whose pending duration reached the threshold.
    pub fn escalated(&self, activities: &[Activity], now: OffsetDateTime) -> Vec<Activity> {
        activities
            .iter()
            .filter(|activity| self.is_escalated(activity, now))
            .cloned()
            .collect()
    }

    pub fn is_creation_blocked(&self, activities: &[Activity], now: OffsetDateTime) -> bool {
        activities
            .iter()
            .any(|activity| self.is_escalated(activity, now))
    }

    /// Resolves an overdue activity. Unknown ids and other states are a no-op.
    pub fn resolve(&self, activities: &mut [Activity], id: &str, now: OffsetDateTime) -> bool {
        let Some(activity) = activities.iter_mut().find(|activity| activity.id == id) else {
            return false;
        };

        if activity.status != ActivityStatus::Overdue {
            return false;
        }

        let Some(stamp) = timestamp(now) else {
            return false;
        };

        activity.status = ActivityStatus::Resolved;
        activity.resolved_at = Some(stamp);
        tracing::info!(activity_id = %activity.id, "overdue activity resolved");
        true
    }

    pub fn stats(&self, activities: &[Activity], now: OffsetDateTime) -> SuspensionStats {
        let pending: Vec<Activity> = activities
            .iter()
            .filter(|activity| activity.status == ActivityStatus::Overdue)
            .cloned()
            .collect();
        let total_resolved = activities
            .iter()
            .filter(|activity| activity.status == ActivityStatus::Resolved)
            .count();
        let exceeded_threshold = pending
            .iter()
            .filter(|activity| self.is_escalated(activity, now))
            .count();

        SuspensionStats {
            total_pending: pending.len(),
            total_resolved,
            exceeded_threshold,
            pending,
        }
    }
}

/// Whether the activity's due point has passed at `now`.
///
/// A past calendar day is overdue regardless of time. On the scheduled day
/// itself only a timed activity can be overdue; an untimed one is due at the
/// end of the day and is never flagged here. Records whose date or time does
/// not parse are never overdue.
pub fn is_overdue(activity: &Activity, now: OffsetDateTime) -> bool {
    let Some(due_date) = activity.due_date() else {
        return false;
    };
    let today = now.date();

    if due_date < today {
        return true;
    }

    if due_date > today {
        return false;
    }

    match activity.due_time() {
        Some(due_time) => {
            let due = PrimitiveDateTime::new(due_date, due_time).assume_offset(now.offset());
            now > due
        }
        None => false,
    }
}

/// Whole days since `pending_since`, floored. `None` when never overdue or
/// when the stamp does not parse.
pub fn days_pending(activity: &Activity, now: OffsetDateTime) -> Option<i64> {
    let since = activity.pending_since_at()?;
    Some((now - since).whole_seconds().div_euclid(SECONDS_PER_DAY))
}

fn timestamp(now: OffsetDateTime) -> Option<String> {
    now.to_offset(UtcOffset::UTC).format(&Rfc3339).ok()
}
