use crate::model::Activity;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    InvalidInput(String),
    InvalidData(String),
    Io(String),
    Forbidden(String),
    /// A supervisor tried to add work while escalated overdue activities exist.
    CreationBlocked {
        message: String,
        escalated: Vec<Activity>,
    },
}

impl AppError {
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn forbidden<M: Into<String>>(message: M) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn creation_blocked(escalated: Vec<Activity>) -> Self {
        let titles = escalated
            .iter()
            .map(|activity| activity.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self::CreationBlocked {
            message: format!(
                "{} overdue activit{} must be resolved before adding new work: {}",
                escalated.len(),
                if escalated.len() == 1 { "y" } else { "ies" },
                titles
            ),
            escalated,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
            Self::Forbidden(_) => "forbidden",
            Self::CreationBlocked { .. } => "creation_blocked",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(message) => message,
            Self::InvalidData(message) => message,
            Self::Io(message) => message,
            Self::Forbidden(message) => message,
            Self::CreationBlocked { message, .. } => message,
        }
    }

    /// Activities that caused a creation refusal; empty for other errors.
    pub fn escalated(&self) -> &[Activity] {
        match self {
            Self::CreationBlocked { escalated, .. } => escalated,
            _ => &[],
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code(), self.message())
    }
}

impl std::error::Error for AppError {}
