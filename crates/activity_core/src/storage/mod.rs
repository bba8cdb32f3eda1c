use crate::error::AppError;
use crate::model::Activity;
use std::sync::Mutex;

pub mod json_store;

pub use json_store::JsonStore;

/// Ordered persistence for the full activity list.
pub trait ActivityStore {
    fn load(&self) -> Result<Vec<Activity>, AppError>;

    fn save(&self, activities: &[Activity]) -> Result<(), AppError>;

    fn load_where(&self, predicate: &dyn Fn(&Activity) -> bool) -> Result<Vec<Activity>, AppError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|activity| predicate(activity))
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    activities: Mutex<Vec<Activity>>,
}

impl MemoryStore {
    pub fn new(activities: Vec<Activity>) -> Self {
        Self {
            activities: Mutex::new(activities),
        }
    }
}

impl ActivityStore for MemoryStore {
    fn load(&self) -> Result<Vec<Activity>, AppError> {
        let guard = self
            .activities
            .lock()
            .map_err(|_| AppError::io("memory store lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, activities: &[Activity]) -> Result<(), AppError> {
        let mut guard = self
            .activities
            .lock()
            .map_err(|_| AppError::io("memory store lock poisoned"))?;
        *guard = activities.to_vec();
        Ok(())
    }
}
