use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Supervisor,
    Employee,
}

/// A user the access policy knows about. Credentials live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub unit: String,
}

impl Principal {
    pub fn new(username: &str, role: Role, unit: &str) -> Self {
        Self {
            username: username.to_string(),
            role,
            unit: unit.to_string(),
        }
    }

    pub fn is_supervisor(&self) -> bool {
        self.role == Role::Supervisor
    }
}

pub fn default_principals() -> Vec<Principal> {
    vec![
        Principal::new("admin", Role::Supervisor, "all"),
        Principal::new("user1", Role::Employee, "finance"),
        Principal::new("user2", Role::Employee, "technology"),
    ]
}
