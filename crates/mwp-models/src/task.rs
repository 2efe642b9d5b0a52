//! Task model and its enumerations
//!
//! Table: tasks

use chrono::{DateTime, Utc};
use mwp_core::traits::Id;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::calendar::Day;

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "priority", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

text_enum!(Priority, "priority", {
    High => "HIGH",
    Medium => "MEDIUM",
    Low => "LOW",
});

impl Priority {
    /// Sort rank, HIGH first
    pub fn rank(&self) -> i32 {
        *self as i32 + 1
    }
}

/// Progress of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

text_enum!(TaskStatus, "status", {
    Pending => "PENDING",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
});

impl TaskStatus {
    pub fn rank(&self) -> i32 {
        *self as i32 + 1
    }
}

/// Outcome assessment of a task, independent of its status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "completion", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Completion {
    Yes,
    No,
}

text_enum!(Completion, "completed", {
    Yes => "YES",
    No => "NO",
});

/// One day's planned work item under a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Id,
    pub plan_id: Id,
    pub day: Day,
    /// Always `day.order()`
    pub day_order: i32,
    pub title: String,
    pub notes: String,
    pub tools: Option<String>,
    pub priority: Priority,
    /// Free-text slot, e.g. "09:00-11:00"
    pub time: String,
    pub status: TaskStatus,
    pub constraints: Option<String>,
    pub completed: Option<Completion>,
    pub reason: Option<String>,
    /// Calendar date the task applies to (YYYY-MM-DD)
    pub date: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Task, "tasks", "Task");

impl Task {
    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Task creation parameters
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTask {
    pub plan_id: Id,
    pub day: Day,

    #[validate(length(min = 1, max = 255))]
    pub title: String,

    pub notes: String,

    pub tools: Option<String>,

    pub priority: Priority,

    #[validate(length(min = 1, max = 64))]
    pub time: String,

    #[serde(default)]
    pub status: TaskStatus,

    pub constraints: Option<String>,

    pub completed: Option<Completion>,

    pub reason: Option<String>,

    #[validate(length(min = 1, max = 32))]
    pub date: String,
}

impl NewTask {
    pub fn new(
        plan_id: Id,
        day: Day,
        title: impl Into<String>,
        priority: Priority,
        time: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            plan_id,
            day,
            title: title.into(),
            notes: String::new(),
            tools: None,
            priority,
            time: time.into(),
            status: TaskStatus::Pending,
            constraints: None,
            completed: None,
            reason: None,
            date: date.into(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_tools(mut self, tools: impl Into<String>) -> Self {
        self.tools = Some(tools.into());
        self
    }

    pub fn with_constraints(mut self, constraints: impl Into<String>) -> Self {
        self.constraints = Some(constraints.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }
}

/// Task update parameters; `Some(None)` clears a nullable column
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTask {
    pub day: Option<Day>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub tools: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub time: Option<String>,
    pub date: Option<String>,
    pub constraints: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub completed: Option<Option<Completion>>,
    pub reason: Option<Option<String>>,
}

impl UpdateTask {
    /// Progress-only update
    pub fn progress(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Outcome assessment with an optional justification
    pub fn outcome(completed: Completion, reason: Option<String>) -> Self {
        Self {
            completed: Some(Some(completed)),
            reason: Some(reason),
            ..Default::default()
        }
    }

    /// Names of the planning fields this update writes
    pub fn planning_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.day.is_some() {
            fields.push("day");
        }
        if self.title.is_some() {
            fields.push("title");
        }
        if self.notes.is_some() {
            fields.push("notes");
        }
        if self.tools.is_some() {
            fields.push("tools");
        }
        if self.priority.is_some() {
            fields.push("priority");
        }
        if self.time.is_some() {
            fields.push("time");
        }
        if self.date.is_some() {
            fields.push("date");
        }
        if self.constraints.is_some() {
            fields.push("constraints");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(TaskStatus::InProgress.as_str(), "IN_PROGRESS");
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::default(), TaskStatus::Pending);
    }

    #[test]
    fn test_invalid_values_name_their_field() {
        let err = "URGENT".parse::<Priority>().unwrap_err();
        assert!(err.to_string().contains("priority"));
        assert!("MAYBE".parse::<Completion>().unwrap_err().is_validation());
    }

    #[test]
    fn test_priority_rank() {
        assert!(Priority::High.rank() < Priority::Low.rank());
    }

    #[test]
    fn test_planning_fields() {
        let progress = UpdateTask::progress(TaskStatus::Completed);
        assert!(progress.planning_fields().is_empty());

        let outcome = UpdateTask::outcome(Completion::No, Some("Power outage".into()));
        assert!(outcome.planning_fields().is_empty());

        let edit = UpdateTask {
            title: Some("New title".into()),
            day: Some(Day::Tuesday),
            ..Default::default()
        };
        assert_eq!(edit.planning_fields(), vec!["day", "title"]);
    }

    #[test]
    fn test_new_task_validation() {
        let task = NewTask::new(1, Day::Monday, "Draft report", Priority::High, "09:00-11:00", "2025-01-06");
        assert!(task.validate().is_ok());

        let untitled = NewTask::new(1, Day::Monday, "", Priority::High, "09:00", "2025-01-06");
        assert!(untitled.validate().is_err());
    }
}
