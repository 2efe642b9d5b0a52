//! Task contracts

use chrono::NaiveDate;
use mwp_core::error::ValidationErrors;
use mwp_models::{Completion, NewTask, Plan, Task, UpdateTask};
use validator::Validate;

use crate::base::{merge_derived, validate_max_length, validate_present, Contract, ValidationResult};

const TEXT_MAX: usize = 4000;

/// `YYYY-MM-DD`, zero padded
fn validate_date(date: &str, errors: &mut ValidationErrors) {
    if errors.has_error("date") {
        return;
    }
    let well_formed = date.len() == 10 && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok();
    if !well_formed {
        errors.add("date", "must be a calendar date formatted as YYYY-MM-DD");
    }
}

/// A NO outcome has to be explained
fn validate_outcome(completed: Option<Completion>, reason: Option<&str>, errors: &mut ValidationErrors) {
    if completed == Some(Completion::No) && reason.map_or(true, |r| r.trim().is_empty()) {
        errors.add("reason", "can't be blank when the task was not completed");
    }
}

fn validate_free_text(field: &str, value: Option<&str>, errors: &mut ValidationErrors) {
    if let Some(value) = value {
        validate_max_length(field, value, TEXT_MAX, errors);
    }
}

fn locked_message(plan: &Plan) -> String {
    format!("Plan {} is approved", plan.period())
}

/// Contract for adding a task to a plan
pub struct CreateTaskContract<'a> {
    plan: &'a Plan,
}

impl<'a> CreateTaskContract<'a> {
    pub fn new(plan: &'a Plan) -> Self {
        Self { plan }
    }
}

impl Contract<NewTask> for CreateTaskContract<'_> {
    fn validate(&self, entity: &NewTask) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        if self.plan.is_locked() {
            errors.add_base(format!("{}; tasks cannot be added", locked_message(self.plan)));
        }
        if entity.plan_id != self.plan.id {
            errors.add("plan_id", "does not match the plan");
        }

        merge_derived(&mut errors, entity.validate());
        validate_present("title", &entity.title, &mut errors);
        validate_present("time", &entity.time, &mut errors);
        validate_date(&entity.date, &mut errors);
        validate_free_text("notes", Some(entity.notes.as_str()), &mut errors);
        validate_free_text("tools", entity.tools.as_deref(), &mut errors);
        validate_free_text("constraints", entity.constraints.as_deref(), &mut errors);
        validate_free_text("reason", entity.reason.as_deref(), &mut errors);
        validate_outcome(entity.completed, entity.reason.as_deref(), &mut errors);

        errors.into_result()
    }
}

/// Contract for editing an existing task
///
/// The outcome rule is checked against the task as it will be after the
/// update, so clearing the reason of a NO task is rejected too.
pub struct UpdateTaskContract<'a> {
    plan: &'a Plan,
    task: &'a Task,
}

impl<'a> UpdateTaskContract<'a> {
    pub fn new(plan: &'a Plan, task: &'a Task) -> Self {
        Self { plan, task }
    }
}

impl Contract<UpdateTask> for UpdateTaskContract<'_> {
    fn validate(&self, entity: &UpdateTask) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        if self.plan.is_locked() {
            for field in entity.planning_fields() {
                errors.add(field, format!("can't be changed. {}", locked_message(self.plan)));
            }
        }

        if let Some(title) = &entity.title {
            validate_present("title", title, &mut errors);
            validate_max_length("title", title, 255, &mut errors);
        }
        if let Some(time) = &entity.time {
            validate_present("time", time, &mut errors);
            validate_max_length("time", time, 64, &mut errors);
        }
        if let Some(date) = &entity.date {
            validate_date(date, &mut errors);
        }
        validate_free_text("notes", entity.notes.as_deref(), &mut errors);
        validate_free_text("tools", entity.tools.as_ref().and_then(|t| t.as_deref()), &mut errors);
        validate_free_text(
            "constraints",
            entity.constraints.as_ref().and_then(|c| c.as_deref()),
            &mut errors,
        );

        let completed = entity.completed.unwrap_or(self.task.completed);
        let reason = match &entity.reason {
            Some(reason) => reason.as_deref(),
            None => self.task.reason.as_deref(),
        };
        validate_free_text("reason", reason, &mut errors);
        validate_outcome(completed, reason, &mut errors);

        errors.into_result()
    }
}

/// Contract for removing a task
pub struct DeleteTaskContract<'a> {
    plan: &'a Plan,
}

impl<'a> DeleteTaskContract<'a> {
    pub fn new(plan: &'a Plan) -> Self {
        Self { plan }
    }
}

impl Contract<Task> for DeleteTaskContract<'_> {
    fn validate(&self, _entity: &Task) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        if self.plan.is_locked() {
            errors.add_base(format!("{}; tasks cannot be removed", locked_message(self.plan)));
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mwp_models::{Day, Month, Priority, TaskStatus, Week};

    fn plan(approved: bool) -> Plan {
        let now = Utc::now();
        Plan {
            id: 1,
            user_id: 10,
            month: Month::January,
            month_order: 1,
            week: Week::Week1,
            week_order: 1,
            approved,
            created_at: now,
            updated_at: now,
        }
    }

    fn new_task() -> NewTask {
        NewTask::new(1, Day::Monday, "Draft report", Priority::High, "09:00-11:00", "2025-01-06")
    }

    fn task() -> Task {
        let now = Utc::now();
        Task {
            id: 5,
            plan_id: 1,
            day: Day::Monday,
            day_order: 1,
            title: "Draft report".into(),
            notes: String::new(),
            tools: None,
            priority: Priority::High,
            time: "09:00-11:00".into(),
            status: TaskStatus::Pending,
            constraints: None,
            completed: None,
            reason: None,
            date: "2025-01-06".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_valid_new_task() {
        let plan = plan(false);
        assert!(CreateTaskContract::new(&plan).validate(&new_task()).is_ok());
    }

    #[test]
    fn test_new_task_on_approved_plan() {
        let plan = plan(true);
        let errors = CreateTaskContract::new(&plan).validate(&new_task()).unwrap_err();
        assert_eq!(errors.base_errors.len(), 1);
    }

    #[test]
    fn test_bad_dates() {
        let plan = plan(false);
        let contract = CreateTaskContract::new(&plan);
        for bad in ["2025-1-6", "06/01/2025", "2025-02-30", "tomorrow"] {
            let mut t = new_task();
            t.date = bad.to_string();
            assert!(contract.validate(&t).unwrap_err().has_error("date"), "{bad} accepted");
        }
    }

    #[test]
    fn test_not_completed_needs_reason() {
        let plan = plan(false);
        let contract = CreateTaskContract::new(&plan);

        let mut t = new_task();
        t.completed = Some(Completion::No);
        assert!(contract.validate(&t).unwrap_err().has_error("reason"));

        t.reason = Some("Vendor missed delivery".into());
        assert!(contract.validate(&t).is_ok());
    }

    #[test]
    fn test_locked_plan_freezes_planning_fields() {
        let plan = plan(true);
        let task = task();
        let contract = UpdateTaskContract::new(&plan, &task);

        let edit = UpdateTask {
            title: Some("Other".into()),
            priority: Some(Priority::Low),
            ..Default::default()
        };
        let errors = contract.validate(&edit).unwrap_err();
        assert!(errors.has_error("title"));
        assert!(errors.has_error("priority"));

        assert!(contract.validate(&UpdateTask::progress(TaskStatus::Completed)).is_ok());
        assert!(contract
            .validate(&UpdateTask::outcome(Completion::Yes, None))
            .is_ok());
    }

    #[test]
    fn test_update_outcome_uses_stored_reason() {
        let plan = plan(false);
        let mut task = task();
        task.completed = Some(Completion::No);
        task.reason = Some("Power outage".into());
        let contract = UpdateTaskContract::new(&plan, &task);

        assert!(contract.validate(&UpdateTask::progress(TaskStatus::InProgress)).is_ok());

        let clear_reason = UpdateTask {
            reason: Some(None),
            ..Default::default()
        };
        assert!(contract.validate(&clear_reason).unwrap_err().has_error("reason"));
    }

    #[test]
    fn test_delete_from_locked_plan() {
        let contract_plan = plan(true);
        assert!(DeleteTaskContract::new(&contract_plan).validate(&task()).is_err());
        let open_plan = plan(false);
        assert!(DeleteTaskContract::new(&open_plan).validate(&task()).is_ok());
    }
}
