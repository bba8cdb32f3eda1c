use crate::error::AppError;
use crate::model::Activity;
use crate::notify::{APP_NAME, Notifier, overdue_body, restriction_body};
use tauri_winrt_notification::Toast;

pub struct WindowsNotifier;

impl Notifier for WindowsNotifier {
    fn notify(&self, activity: &Activity) -> Result<(), AppError> {
        Toast::new(Toast::POWERSHELL_APP_ID)
            .title(APP_NAME)
            .text1(&overdue_body(activity))
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }

    fn notify_restriction(&self, escalated: &[Activity]) -> Result<(), AppError> {
        if escalated.is_empty() {
            return Ok(());
        }

        Toast::new(Toast::POWERSHELL_APP_ID)
            .title("Overdue activities need attention")
            .text1(&restriction_body(escalated))
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }
}
