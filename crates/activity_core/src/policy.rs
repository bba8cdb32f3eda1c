use crate::error::AppError;
use crate::model::{Activity, Principal};

/// Role-based answers over a fixed principal directory.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    principals: Vec<Principal>,
}

impl AccessPolicy {
    pub fn new(principals: Vec<Principal>) -> Self {
        Self { principals }
    }

    pub fn principals(&self) -> &[Principal] {
        &self.principals
    }

    pub fn principal(&self, username: &str) -> Option<&Principal> {
        let trimmed = username.trim();
        self.principals
            .iter()
            .find(|principal| principal.username == trimmed)
    }

    pub fn require_principal(&self, username: &str) -> Result<&Principal, AppError> {
        if username.trim().is_empty() {
            return Err(AppError::invalid_input("user is required"));
        }
        self.principal(username)
            .ok_or_else(|| AppError::invalid_input(format!("unknown user '{}'", username.trim())))
    }

    pub fn can_create(&self, user: &Principal) -> bool {
        user.is_supervisor()
    }

    pub fn can_modify(&self, user: &Principal, activity: &Activity) -> bool {
        user.is_supervisor() || activity.assigned_user == user.username
    }

    /// Archive, cancel and delete.
    pub fn can_manage(&self, user: &Principal) -> bool {
        user.is_supervisor()
    }

    pub fn visible(&self, user: &Principal, activity: &Activity) -> bool {
        self.can_modify(user, activity)
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(crate::model::default_principals())
    }
}

#[cfg(test)]
mod tests {
    use super::AccessPolicy;
    use crate::model::{Activity, ActivityStatus, Importance};

    fn assigned_to(user: &str) -> Activity {
        Activity {
            id: "1".to_string(),
            title: "demo".to_string(),
            notes: None,
            assigned_unit: "finance".to_string(),
            assigned_user: user.to_string(),
            scheduled_date: Some("2025-03-10".to_string()),
            scheduled_time: None,
            importance: Importance::Normal,
            status: ActivityStatus::InProgress,
            pending_since: None,
            resolved_at: None,
            created_by: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn supervisors_create_and_modify_everything() {
        let policy = AccessPolicy::default();
        let admin = policy.principal("admin").unwrap();

        assert!(policy.can_create(admin));
        assert!(policy.can_manage(admin));
        assert!(policy.can_modify(admin, &assigned_to("user1")));
        assert!(policy.visible(admin, &assigned_to("user2")));
    }

    #[test]
    fn employees_only_touch_their_own_activities() {
        let policy = AccessPolicy::default();
        let employee = policy.principal("user1").unwrap();

        assert!(!policy.can_create(employee));
        assert!(!policy.can_manage(employee));
        assert!(policy.can_modify(employee, &assigned_to("user1")));
        assert!(!policy.can_modify(employee, &assigned_to("user2")));
        assert!(!policy.visible(employee, &assigned_to("admin")));
    }

    #[test]
    fn require_principal_rejects_blank_and_unknown_users() {
        let policy = AccessPolicy::default();
        assert_eq!(
            policy.require_principal("  ").unwrap_err().code(),
            "invalid_input"
        );
        assert!(
            policy
                .require_principal("ghost")
                .unwrap_err()
                .message()
                .contains("unknown user")
        );
        assert_eq!(policy.require_principal(" user2 ").unwrap().unit, "technology");
    }
}
