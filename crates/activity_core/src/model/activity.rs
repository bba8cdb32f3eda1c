use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub assigned_unit: String,
    #[serde(default)]
    pub assigned_user: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub scheduled_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub importance: Importance,
    pub status: ActivityStatus,
    #[serde(default, deserialize_with = "lenient_text")]
    pub pending_since: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub resolved_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub updated_at: Option<String>,
}

impl Activity {
    /// Calendar day the activity is due, if the stored value parses.
    pub fn due_date(&self) -> Option<Date> {
        self.scheduled_date.as_deref().and_then(parse_date)
    }

    /// Time of day the activity is due; `None` means end of day.
    pub fn due_time(&self) -> Option<Time> {
        self.scheduled_time.as_deref().and_then(parse_time)
    }

    pub fn pending_since_at(&self) -> Option<OffsetDateTime> {
        self.pending_since.as_deref().and_then(parse_timestamp)
    }

    pub fn created_at_time(&self) -> Option<OffsetDateTime> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    InProgress,
    Overdue,
    Resolved,
    Completed,
    Archived,
    Cancelled,
}

impl ActivityStatus {
    pub const ALL: [ActivityStatus; 6] = [
        ActivityStatus::InProgress,
        ActivityStatus::Overdue,
        ActivityStatus::Resolved,
        ActivityStatus::Completed,
        ActivityStatus::Archived,
        ActivityStatus::Cancelled,
    ];

    /// Archived and cancelled activities accept no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Archived | Self::Cancelled)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Overdue => "overdue",
            Self::Resolved => "resolved",
            Self::Completed => "completed",
            Self::Archived => "archived",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Urgent,
    Medium,
    #[default]
    Normal,
}

impl Importance {
    pub const ALL: [Importance; 3] = [Importance::Urgent, Importance::Medium, Importance::Normal];

    pub fn label(self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Medium => "medium",
            Self::Normal => "normal",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "urgent" => Some(Self::Urgent),
            "medium" => Some(Self::Medium),
            "normal" => Some(Self::Normal),
            _ => None,
        }
    }
}

/// Non-string values read as absent so one bad record cannot fail the whole load.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(text)) => Ok(Some(text)),
        _ => Ok(None),
    }
}

pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Option<Time> {
    let trimmed = raw.trim();
    Time::parse(trimmed, format_description!("[hour]:[minute]"))
        .or_else(|_| Time::parse(trimmed, format_description!("[hour]:[minute]:[second]")))
        .ok()
}

pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).ok()
}

pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn format_time(value: Time) -> String {
    format!("{:02}:{:02}", value.hour(), value.minute())
}
