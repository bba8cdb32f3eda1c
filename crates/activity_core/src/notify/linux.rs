use crate::error::AppError;
use crate::model::Activity;
use crate::notify::{APP_NAME, Notifier, overdue_body, restriction_body};
use notify_rust::{Notification, Urgency};

pub struct LinuxNotifier;

impl Notifier for LinuxNotifier {
    fn notify(&self, activity: &Activity) -> Result<(), AppError> {
        Notification::new()
            .summary(APP_NAME)
            .body(&overdue_body(activity))
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }

    fn notify_restriction(&self, escalated: &[Activity]) -> Result<(), AppError> {
        if escalated.is_empty() {
            return Ok(());
        }

        Notification::new()
            .summary("Overdue activities need attention")
            .body(&restriction_body(escalated))
            .urgency(Urgency::Critical)
            .timeout(10_000)
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }
}
