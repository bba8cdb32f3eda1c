use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::AppError;
use crate::model::{
    Activity, ActivityStatus, Importance, Principal, format_date, format_time, parse_date,
    parse_time,
};
use crate::policy::AccessPolicy;
use crate::stats::{ActivityStats, Period, PeriodReport, activity_stats, period_report};
use crate::storage::{ActivityStore, JsonStore};
use crate::suspension::{SuspensionEngine, SuspensionStats};
use std::sync::{Mutex, MutexGuard};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub title: String,
    pub notes: Option<String>,
    /// Defaults to the assignee's unit.
    pub assigned_unit: Option<String>,
    pub assigned_user: String,
    pub scheduled_date: String,
    pub scheduled_time: Option<String>,
    pub importance: Importance,
}

/// Field edits. For `notes` and `scheduled_time` an empty string clears the value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActivityPatch {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub assigned_unit: Option<String>,
    pub assigned_user: Option<String>,
    pub scheduled_date: Option<String>,
    pub scheduled_time: Option<String>,
    pub importance: Option<Importance>,
}

impl ActivityPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityView {
    /// Scheduled today and still active.
    Today,
    /// Scheduled after today and still active.
    Upcoming,
    Archived,
    Unit(String),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restriction {
    pub blocked: bool,
    pub escalated: Vec<Activity>,
}

pub type DefaultTracker = ActivityTracker<JsonStore, SystemClock>;

/// Host-facing facade over the store, clock, access policy and suspension
/// engine. Each read-modify-write of the activity list holds `guard`.
pub struct ActivityTracker<S, C> {
    store: S,
    clock: C,
    policy: AccessPolicy,
    engine: SuspensionEngine,
    guard: Mutex<()>,
}

impl DefaultTracker {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Ok(Self::new(
            JsonStore::from_env(&config.store_key)?,
            SystemClock,
            AccessPolicy::new(config.users.clone()),
            SuspensionEngine::new(config.threshold_days),
        ))
    }
}

impl<S: ActivityStore, C: Clock> ActivityTracker<S, C> {
    pub fn new(store: S, clock: C, policy: AccessPolicy, engine: SuspensionEngine) -> Self {
        Self {
            store,
            clock,
            policy,
            engine,
            guard: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn engine(&self) -> &SuspensionEngine {
        &self.engine
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs the overdue check and persists when anything transitioned.
    pub fn check_overdue(&self) -> Result<Vec<Activity>, AppError> {
        let _guard = self.lock();
        self.check_overdue_locked()
    }

    fn check_overdue_locked(&self) -> Result<Vec<Activity>, AppError> {
        let mut activities = self.store.load()?;
        let transitioned = self.engine.check_overdue(&mut activities, self.clock.now());
        if !transitioned.is_empty() {
            self.store.save(&activities)?;
        }
        Ok(transitioned)
    }

    /// Recomputed from stored data on every call.
    pub fn restriction(&self) -> Result<Restriction, AppError> {
        let activities = self.store.load()?;
        let escalated = self.engine.escalated(&activities, self.clock.now());
        Ok(Restriction {
            blocked: !escalated.is_empty(),
            escalated,
        })
    }

    pub fn suspension_stats(&self) -> Result<SuspensionStats, AppError> {
        let activities = self.store.load()?;
        Ok(self.engine.stats(&activities, self.clock.now()))
    }

    pub fn add_activity(&self, actor: &str, new: NewActivity) -> Result<Activity, AppError> {
        let user = self.policy.require_principal(actor)?;
        if !self.policy.can_create(user) {
            return Err(AppError::forbidden("only supervisors can add activities"));
        }

        let title = required(&new.title, "title is required")?;
        let scheduled_date = normalize_date(&new.scheduled_date)?;
        let scheduled_time = normalize_time(new.scheduled_time.as_deref())?;
        let assignee = self.policy.require_principal(&new.assigned_user)?;
        let assigned_unit = match new.assigned_unit.as_deref().map(str::trim) {
            Some(unit) if !unit.is_empty() => unit.to_string(),
            _ => assignee.unit.clone(),
        };
        let notes = optional_text(new.notes.as_deref());

        let _guard = self.lock();
        let mut activities = self.store.load()?;
        let now = self.clock.now();

        let transitioned = self.engine.check_overdue(&mut activities, now);
        let escalated = self.engine.escalated(&activities, now);
        if !escalated.is_empty() {
            if !transitioned.is_empty() {
                self.store.save(&activities)?;
            }
            tracing::warn!(
                actor = %user.username,
                escalated = escalated.len(),
                "activity creation blocked by overdue activities"
            );
            return Err(AppError::creation_blocked(escalated));
        }

        let activity = Activity {
            id: next_id(&activities, now),
            title,
            notes,
            assigned_unit,
            assigned_user: assignee.username.clone(),
            scheduled_date: Some(scheduled_date),
            scheduled_time,
            importance: new.importance,
            status: ActivityStatus::InProgress,
            pending_since: None,
            resolved_at: None,
            created_by: Some(user.username.clone()),
            created_at: Some(stamp(now)?),
            updated_at: None,
        };

        activities.push(activity.clone());
        self.store.save(&activities)?;
        tracing::debug!(activity_id = %activity.id, actor = %user.username, "activity added");

        Ok(activity)
    }

    pub fn update_activity(
        &self,
        actor: &str,
        id: &str,
        patch: ActivityPatch,
    ) -> Result<Option<Activity>, AppError> {
        let user = self.policy.require_principal(actor)?.clone();
        if patch.is_empty() {
            return Err(AppError::invalid_input("nothing to update"));
        }

        let title = patch
            .title
            .as_deref()
            .map(|value| required(value, "title is required"))
            .transpose()?;
        let scheduled_date = patch.scheduled_date.as_deref().map(normalize_date).transpose()?;
        let scheduled_time = patch
            .scheduled_time
            .as_deref()
            .map(|value| normalize_time(Some(value)))
            .transpose()?;
        let reassigned = patch
            .assigned_user
            .as_deref()
            .map(|username| self.policy.require_principal(username).cloned())
            .transpose()?;

        self.modify(&user, id, |activity, now| {
            if (reassigned.is_some() || patch.assigned_unit.is_some()) && !user.is_supervisor() {
                return Err(AppError::forbidden(
                    "only supervisors can reassign activities",
                ));
            }

            if let Some(title) = title {
                activity.title = title;
            }
            if let Some(notes) = patch.notes.as_deref() {
                activity.notes = optional_text(Some(notes));
            }
            if let Some(unit) = patch.assigned_unit.as_deref() {
                activity.assigned_unit = required(unit, "unit is required")?;
            }
            if let Some(assignee) = reassigned {
                activity.assigned_user = assignee.username;
            }
            if let Some(date) = scheduled_date {
                activity.scheduled_date = Some(date);
            }
            if let Some(time) = scheduled_time {
                activity.scheduled_time = time;
            }
            if let Some(importance) = patch.importance {
                activity.importance = importance;
            }
            activity.updated_at = Some(stamp(now)?);
            Ok(())
        })
    }

    /// `in_progress` → `completed`.
    pub fn complete_activity(&self, actor: &str, id: &str) -> Result<Option<Activity>, AppError> {
        let user = self.policy.require_principal(actor)?.clone();
        self.modify(&user, id, |activity, now| {
            if activity.status != ActivityStatus::InProgress {
                return Err(AppError::invalid_input(format!(
                    "activity is {}, only in_progress activities can be completed",
                    activity.status.label()
                )));
            }
            activity.status = ActivityStatus::Completed;
            activity.updated_at = Some(stamp(now)?);
            Ok(())
        })
    }

    pub fn archive_activity(&self, actor: &str, id: &str) -> Result<Option<Activity>, AppError> {
        self.close(actor, id, ActivityStatus::Archived)
    }

    pub fn cancel_activity(&self, actor: &str, id: &str) -> Result<Option<Activity>, AppError> {
        self.close(actor, id, ActivityStatus::Cancelled)
    }

    fn close(
        &self,
        actor: &str,
        id: &str,
        target: ActivityStatus,
    ) -> Result<Option<Activity>, AppError> {
        let user = self.policy.require_principal(actor)?.clone();
        if !self.policy.can_manage(&user) {
            return Err(AppError::forbidden(format!(
                "only supervisors can mark activities {}",
                target.label()
            )));
        }

        self.modify(&user, id, |activity, now| {
            activity.status = target;
            activity.updated_at = Some(stamp(now)?);
            Ok(())
        })
    }

    /// `overdue` → `resolved`. `false` when the id is unknown or the activity
    /// is not overdue.
    pub fn resolve_activity(&self, actor: &str, id: &str) -> Result<bool, AppError> {
        let user = self.policy.require_principal(actor)?;
        let id = id.trim();

        let _guard = self.lock();
        let mut activities = self.store.load()?;
        let Some(activity) = activities.iter().find(|activity| activity.id == id) else {
            return Ok(false);
        };
        if !self.policy.can_modify(user, activity) {
            return Err(AppError::forbidden(
                "activity is assigned to another user",
            ));
        }

        let resolved = self.engine.resolve(&mut activities, id, self.clock.now());
        if resolved {
            self.store.save(&activities)?;
        }
        Ok(resolved)
    }

    pub fn delete_activity(&self, actor: &str, id: &str) -> Result<Option<Activity>, AppError> {
        let user = self.policy.require_principal(actor)?;
        if !self.policy.can_manage(user) {
            return Err(AppError::forbidden("only supervisors can delete activities"));
        }
        let id = id.trim();

        let _guard = self.lock();
        let mut activities = self.store.load()?;
        let Some(index) = activities.iter().position(|activity| activity.id == id) else {
            return Ok(None);
        };

        let removed = activities.remove(index);
        self.store.save(&activities)?;
        Ok(Some(removed))
    }

    pub fn get_activity(&self, actor: &str, id: &str) -> Result<Option<Activity>, AppError> {
        let user = self.policy.require_principal(actor)?;
        let id = id.trim();
        let found = self
            .store
            .load_where(&|activity: &Activity| activity.id == id)?
            .into_iter()
            .next();

        match found {
            Some(activity) if !self.policy.visible(user, &activity) => Err(AppError::forbidden(
                "activity is assigned to another user",
            )),
            other => Ok(other),
        }
    }

    /// Runs the overdue check, then returns the actor's visible activities
    /// for `view` in stored order.
    pub fn list(&self, actor: &str, view: &ActivityView) -> Result<Vec<Activity>, AppError> {
        let user = self.policy.require_principal(actor)?;
        {
            let _guard = self.lock();
            self.check_overdue_locked()?;
        }

        let today = self.clock.now().date();
        self.store.load_where(&|activity: &Activity| {
            self.policy.visible(user, activity) && in_view(activity, view, today)
        })
    }

    pub fn stats(&self, actor: &str) -> Result<ActivityStats, AppError> {
        let visible = self.visible_to(actor)?;
        Ok(activity_stats(&visible, self.clock.now().date()))
    }

    pub fn report(&self, actor: &str, period: Period) -> Result<PeriodReport, AppError> {
        let visible = self.visible_to(actor)?;
        period_report(&visible, period, self.clock.now())
    }

    fn visible_to(&self, actor: &str) -> Result<Vec<Activity>, AppError> {
        let user = self.policy.require_principal(actor)?;
        self.store
            .load_where(&|activity: &Activity| self.policy.visible(user, activity))
    }

    /// Applies `change` to one non-terminal activity the user may modify.
    fn modify<F>(&self, user: &Principal, id: &str, change: F) -> Result<Option<Activity>, AppError>
    where
        F: FnOnce(&mut Activity, OffsetDateTime) -> Result<(), AppError>,
    {
        let id = id.trim();
        if id.is_empty() {
            return Err(AppError::invalid_input("id is required"));
        }

        let _guard = self.lock();
        let mut activities = self.store.load()?;
        let Some(activity) = activities.iter_mut().find(|activity| activity.id == id) else {
            return Ok(None);
        };

        if !self.policy.can_modify(user, activity) {
            return Err(AppError::forbidden(
                "activity is assigned to another user",
            ));
        }
        if activity.is_terminal() {
            return Err(AppError::invalid_input(format!(
                "activity is {}",
                activity.status.label()
            )));
        }

        change(activity, self.clock.now())?;
        let updated = activity.clone();
        self.store.save(&activities)?;

        Ok(Some(updated))
    }
}

fn in_view(activity: &Activity, view: &ActivityView, today: time::Date) -> bool {
    match view {
        ActivityView::Today => {
            !activity.is_terminal() && activity.due_date().is_some_and(|date| date == today)
        }
        ActivityView::Upcoming => {
            !activity.is_terminal() && activity.due_date().is_some_and(|date| date > today)
        }
        ActivityView::Archived => activity.is_terminal(),
        ActivityView::Unit(unit) => activity.assigned_unit == unit.trim(),
        ActivityView::All => true,
    }
}

fn required(value: &str, message: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input(message));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn normalize_date(raw: &str) -> Result<String, AppError> {
    parse_date(raw)
        .map(format_date)
        .ok_or_else(|| AppError::invalid_input("scheduled_date must be YYYY-MM-DD"))
}

fn normalize_time(raw: Option<&str>) -> Result<Option<String>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_time(value)
            .map(|parsed| Some(format_time(parsed)))
            .ok_or_else(|| AppError::invalid_input("scheduled_time must be HH:MM")),
    }
}

fn stamp(now: OffsetDateTime) -> Result<String, AppError> {
    now.to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

fn next_id(activities: &[Activity], now: OffsetDateTime) -> String {
    let base = format!("activity-{}", now.unix_timestamp_nanos());
    let mut candidate = base.clone();
    let mut suffix = 1;
    while activities.iter().any(|activity| activity.id == candidate) {
        suffix += 1;
        candidate = format!("{base}-{suffix}");
    }
    candidate
}
