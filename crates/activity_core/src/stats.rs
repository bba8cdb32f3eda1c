use crate::error::AppError;
use crate::model::{Activity, ActivityStatus, Importance};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityStats {
    pub total: usize,
    pub today: usize,
    pub upcoming: usize,
    pub archived: usize,
    pub by_importance: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub units: Vec<String>,
}

pub fn activity_stats(activities: &[Activity], today: Date) -> ActivityStats {
    let mut by_importance: BTreeMap<String, usize> = Importance::ALL
        .iter()
        .map(|importance| (importance.label().to_string(), 0))
        .collect();
    let mut by_status: BTreeMap<String, usize> = ActivityStatus::ALL
        .iter()
        .map(|status| (status.label().to_string(), 0))
        .collect();
    let mut units = BTreeSet::new();
    let mut today_count = 0;
    let mut upcoming = 0;
    let mut archived = 0;

    for activity in activities {
        *by_importance
            .entry(activity.importance.label().to_string())
            .or_default() += 1;
        *by_status
            .entry(activity.status.label().to_string())
            .or_default() += 1;
        if !activity.assigned_unit.is_empty() {
            units.insert(activity.assigned_unit.clone());
        }

        if activity.is_terminal() {
            archived += 1;
        }

        match activity.due_date() {
            Some(date) if date == today => today_count += 1,
            Some(date) if date > today && !activity.is_terminal() => upcoming += 1,
            _ => {}
        }
    }

    ActivityStats {
        total: activities.len(),
        today: today_count,
        upcoming,
        archived,
        by_importance,
        by_status,
        units: units.into_iter().collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    All,
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(Self::Daily),
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            "all" => Ok(Self::All),
            other => Err(AppError::invalid_input(format!(
                "unknown period '{other}' (expected daily, weekly, monthly or all)"
            ))),
        }
    }
}

impl Period {
    /// Earliest creation time included in the period, `None` for everything.
    pub fn start(self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        match self {
            Self::Daily => Some(now - Duration::days(1)),
            Self::Weekly => Some(now - Duration::days(7)),
            Self::Monthly => Some(one_month_before(now)),
            Self::All => None,
        }
    }
}

fn one_month_before(now: OffsetDateTime) -> OffsetDateTime {
    let date = now.date();
    let (year, month) = match date.month().previous() {
        time::Month::December => (date.year() - 1, time::Month::December),
        previous => (date.year(), previous),
    };
    let day = date.day().min(month.length(year));
    match Date::from_calendar_date(year, month, day) {
        Ok(target) => now.replace_date(target),
        Err(_) => now - Duration::days(30),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodReport {
    pub period: Period,
    pub generated_at: String,
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub overdue: usize,
    pub completion_rate: u32,
    pub activities: Vec<Activity>,
}

pub fn period_report(
    activities: &[Activity],
    period: Period,
    now: OffsetDateTime,
) -> Result<PeriodReport, AppError> {
    let start = period.start(now);
    let filtered: Vec<Activity> = activities
        .iter()
        .filter(|activity| match start {
            Some(start) => activity
                .created_at_time()
                .is_some_and(|created_at| created_at >= start),
            None => true,
        })
        .cloned()
        .collect();

    let count = |status: ActivityStatus| {
        filtered
            .iter()
            .filter(|activity| activity.status == status)
            .count()
    };
    let completed = count(ActivityStatus::Completed);
    let completion_rate = if filtered.is_empty() {
        0
    } else {
        ((completed as f64 / filtered.len() as f64) * 100.0).round() as u32
    };
    let generated_at = now
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;

    Ok(PeriodReport {
        period,
        generated_at,
        total: filtered.len(),
        completed,
        in_progress: count(ActivityStatus::InProgress),
        overdue: count(ActivityStatus::Overdue),
        completion_rate,
        activities: filtered,
    })
}

#[cfg(test)]
mod tests {
    use super::{Period, activity_stats, period_report};
    use crate::model::{Activity, ActivityStatus, Importance};
    use time::macros::{date, datetime};

    fn activity(id: &str, date: &str, status: ActivityStatus, created_at: &str) -> Activity {
        Activity {
            id: id.to_string(),
            title: id.to_string(),
            notes: None,
            assigned_unit: if id.starts_with('t') {
                "technology".to_string()
            } else {
                "finance".to_string()
            },
            assigned_user: "user1".to_string(),
            scheduled_date: Some(date.to_string()),
            scheduled_time: None,
            importance: Importance::Medium,
            status,
            pending_since: None,
            resolved_at: None,
            created_by: None,
            created_at: Some(created_at.to_string()),
            updated_at: None,
        }
    }

    #[test]
    fn activity_stats_counts_views_and_groups() {
        let activities = vec![
            activity("a", "2025-03-10", ActivityStatus::InProgress, "2025-03-01T00:00:00Z"),
            activity("b", "2025-03-12", ActivityStatus::InProgress, "2025-03-01T00:00:00Z"),
            activity("t1", "2025-03-12", ActivityStatus::Archived, "2025-03-01T00:00:00Z"),
            activity("t2", "2025-03-02", ActivityStatus::Cancelled, "2025-03-01T00:00:00Z"),
        ];

        let stats = activity_stats(&activities, date!(2025-03-10));

        assert_eq!(stats.total, 4);
        assert_eq!(stats.today, 1);
        assert_eq!(stats.upcoming, 1);
        assert_eq!(stats.archived, 2);
        assert_eq!(stats.by_importance["medium"], 4);
        assert_eq!(stats.by_importance["urgent"], 0);
        assert_eq!(stats.by_status["in_progress"], 2);
        assert_eq!(stats.by_status["overdue"], 0);
        assert_eq!(stats.units, vec!["finance", "technology"]);
    }

    #[test]
    fn period_report_filters_by_creation_time() {
        let now = datetime!(2025-03-10 12:00 UTC);
        let activities = vec![
            activity("a", "2025-03-10", ActivityStatus::Completed, "2025-03-10T08:00:00Z"),
            activity("b", "2025-03-10", ActivityStatus::InProgress, "2025-03-08T08:00:00Z"),
            activity("c", "2025-03-10", ActivityStatus::Overdue, "2025-02-20T08:00:00Z"),
        ];

        let daily = period_report(&activities, Period::Daily, now).unwrap();
        assert_eq!(daily.total, 1);
        assert_eq!(daily.completion_rate, 100);

        let weekly = period_report(&activities, Period::Weekly, now).unwrap();
        assert_eq!(weekly.total, 2);
        assert_eq!(weekly.completed, 1);
        assert_eq!(weekly.in_progress, 1);
        assert_eq!(weekly.completion_rate, 50);

        let monthly = period_report(&activities, Period::Monthly, now).unwrap();
        assert_eq!(monthly.total, 3);
        assert_eq!(monthly.overdue, 1);
        assert_eq!(monthly.completion_rate, 33);
    }

    #[test]
    fn period_report_of_nothing_has_zero_rate() {
        let report = period_report(&[], Period::All, datetime!(2025-03-10 12:00 UTC)).unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.completion_rate, 0);
        assert_eq!(report.generated_at, "2025-03-10T12:00:00Z");
    }

    #[test]
    fn monthly_start_clamps_to_month_end() {
        let start = Period::Monthly
            .start(datetime!(2025-03-31 10:00 UTC))
            .unwrap();
        assert_eq!(start, datetime!(2025-02-28 10:00 UTC));

        let january = Period::Monthly
            .start(datetime!(2025-01-15 10:00 UTC))
            .unwrap();
        assert_eq!(january, datetime!(2024-12-15 10:00 UTC));
    }

    #[test]
    fn period_parses_aliases() {
        assert_eq!("Weekly".parse::<Period>().unwrap(), Period::Weekly);
        assert_eq!("month".parse::<Period>().unwrap(), Period::Monthly);
        assert_eq!("yearly".parse::<Period>().unwrap_err().code(), "invalid_input");
    }
}
