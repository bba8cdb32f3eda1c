use crate::error::AppError;
use crate::model::Activity;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxNotifier;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsNotifier;

const APP_NAME: &str = "activity tracker";

/// Desktop alert sink for overdue transitions and the supervisor restriction.
pub trait Notifier {
    fn notify(&self, activity: &Activity) -> Result<(), AppError>;

    fn notify_restriction(&self, escalated: &[Activity]) -> Result<(), AppError> {
        let _ = escalated;
        Ok(())
    }
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _activity: &Activity) -> Result<(), AppError> {
        Ok(())
    }
}

pub fn notifier_from_env() -> Result<Box<dyn Notifier + Send + Sync>, AppError> {
    if std::env::var("ACTIVITY_DISABLE_NOTIFICATIONS").is_ok() {
        return Ok(Box::new(NoopNotifier));
    }

    match platform_notifier() {
        Ok(notifier) => Ok(notifier),
        Err(err) => match err {
            AppError::InvalidData(_) => Ok(Box::new(NoopNotifier)),
            other => Err(other),
        },
    }
}

pub fn overdue_body(activity: &Activity) -> String {
    format!(
        "Overdue: {} ({}, {})",
        activity.title, activity.assigned_unit, activity.id
    )
}

pub fn restriction_body(escalated: &[Activity]) -> String {
    let titles = escalated
        .iter()
        .map(|activity| format!("- {}", activity.title))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{} overdue activit{} exceeded the allowed delay. Resolve them before adding new activities:\n{}",
        escalated.len(),
        if escalated.len() == 1 { "y" } else { "ies" },
        titles
    )
}

#[cfg(target_os = "linux")]
pub fn platform_notifier() -> Result<Box<dyn Notifier + Send + Sync>, AppError> {
    Ok(Box::new(LinuxNotifier))
}

#[cfg(windows)]
pub fn platform_notifier() -> Result<Box<dyn Notifier + Send + Sync>, AppError> {
    Ok(Box::new(WindowsNotifier))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_notifier() -> Result<Box<dyn Notifier + Send + Sync>, AppError> {
    Err(AppError::invalid_data(
        "notifications are not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::{overdue_body, restriction_body};
    use crate::model::{Activity, ActivityStatus, Importance};

    fn activity(title: &str) -> Activity {
        Activity {
            id: "activity-1".to_string(),
            title: title.to_string(),
            notes: None,
            assigned_unit: "finance".to_string(),
            assigned_user: "user1".to_string(),
            scheduled_date: Some("2025-03-09".to_string()),
            scheduled_time: None,
            importance: Importance::Urgent,
            status: ActivityStatus::Overdue,
            pending_since: Some("2025-03-10T08:00:00Z".to_string()),
            resolved_at: None,
            created_by: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn overdue_body_names_activity_and_unit() {
        let body = overdue_body(&activity("audit"));
        assert_eq!(body, "Overdue: audit (finance, activity-1)");
    }

    #[test]
    fn restriction_body_lists_every_escalated_title() {
        let body = restriction_body(&[activity("audit"), activity("payroll")]);
        assert!(body.starts_with("2 overdue activities"));
        assert!(body.contains("- audit\n- payroll"));

        let single = restriction_body(&[activity("audit")]);
        assert!(single.starts_with("1 overdue activity exceeded"));
    }
}
