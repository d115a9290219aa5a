use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub uuid: Uuid,

    pub title: String,

    #[serde(default)]
    pub due: Option<DateTime<Utc>>,

    #[serde(default)]
    pub scheduled: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(title: impl Into<String>, due: Option<DateTime<Utc>>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: title.into(),
            due,
            scheduled: None,
            completed: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed.is_some()
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.completed = Some(now);
    }

    /// The instant this task sits on in a calendar; due wins over
    /// scheduled. A task with neither has no calendar placement.
    pub fn calendar_instant(&self) -> Option<DateTime<Utc>> {
        self.due.or(self.scheduled)
    }
}
