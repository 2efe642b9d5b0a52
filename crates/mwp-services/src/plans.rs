//! Plan services
//!
//! Approval is a separate operation from editing: `update` may move a plan
//! that is not yet approved, while `approve`/`revoke` flip the lock and need
//! a supervisor other than the owner.

use std::collections::BTreeMap;

use mwp_contracts::{Actor, ApprovePlanContract, UpdatePlanContract};
use mwp_core::error::{MwpError, ValidationErrors};
use mwp_core::pagination::{PaginatedResult, Pagination};
use mwp_core::result::MwpResult;
use mwp_core::traits::Id;
use mwp_db::{FindMany, PlanFilter, PlanRepository, Repositories, Repository, TaskFilter};
use mwp_models::{Completion, Month, NewPlan, Plan, Task, TaskStatus, UpdatePlan, Week};
use serde::Serialize;

use crate::base::validate;

/// A plan with its tasks in day order
#[derive(Debug, Clone, Serialize)]
pub struct PlanWithTasks {
    pub plan: Plan,
    pub tasks: Vec<Task>,
}

/// Task totals of one plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanProgress {
    pub plan_id: Id,
    pub total: i64,
    /// Every status is present, zero when no task has it
    pub by_status: BTreeMap<TaskStatus, i64>,
    pub completed_yes: i64,
    pub completed_no: i64,
    pub unassessed: i64,
    /// Share of tasks with status COMPLETED, 0.0 for an empty plan
    pub completion_ratio: f64,
}

impl PlanProgress {
    fn from_tasks(plan_id: Id, tasks: &[Task]) -> Self {
        let mut by_status: BTreeMap<TaskStatus, i64> = TaskStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let (mut completed_yes, mut completed_no, mut unassessed) = (0, 0, 0);

        for task in tasks {
            *by_status.entry(task.status).or_insert(0) += 1;
            match task.completed {
                Some(Completion::Yes) => completed_yes += 1,
                Some(Completion::No) => completed_no += 1,
                None => unassessed += 1,
            }
        }

        let total = tasks.len() as i64;
        let done = by_status.get(&TaskStatus::Completed).copied().unwrap_or(0);
        let completion_ratio = if total == 0 { 0.0 } else { done as f64 / total as f64 };

        Self {
            plan_id,
            total,
            by_status,
            completed_yes,
            completed_no,
            unassessed,
            completion_ratio,
        }
    }
}

/// Service for work plans
#[derive(Clone)]
pub struct PlanService {
    repos: Repositories,
}

impl PlanService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn create(&self, dto: NewPlan) -> MwpResult<Plan> {
        let plan = self.repos.plans.create(dto).await?;
        tracing::info!(plan_id = plan.id, user_id = plan.user_id, period = %plan.period(), "Created plan");
        Ok(plan)
    }

    /// Move a plan to another week; approval goes through `approve`/`revoke`
    pub async fn update(&self, id: Id, dto: UpdatePlan) -> MwpResult<Plan> {
        let plan = self.repos.plans.get(id).await?;

        if dto.approved.is_some() {
            let mut errors = ValidationErrors::new();
            errors.add("approved", "can only be changed by approving or revoking the plan");
            return Err(MwpError::Validation(errors));
        }
        validate(&UpdatePlanContract::new(&plan), &dto)?;

        Ok(self.repos.plans.update_open(id, dto).await?)
    }

    pub async fn approve<A: Actor>(&self, id: Id, approver: &A) -> MwpResult<Plan> {
        self.set_approval(id, approver, true).await
    }

    pub async fn revoke<A: Actor>(&self, id: Id, approver: &A) -> MwpResult<Plan> {
        self.set_approval(id, approver, false).await
    }

    async fn set_approval<A: Actor>(&self, id: Id, approver: &A, approved: bool) -> MwpResult<Plan> {
        let plan = self.repos.plans.get(id).await?;
        let dto = UpdatePlan::approval(approved);
        validate(&ApprovePlanContract::new(&plan, approver), &dto)?;

        let plan = self.repos.plans.update(id, dto).await?;
        tracing::info!(plan_id = id, approver_id = approver.id(), approved, "Changed plan approval");
        Ok(plan)
    }

    /// Delete a plan; an approved plan keeps its tasks and cannot be removed
    pub async fn delete(&self, id: Id) -> MwpResult<()> {
        let plan = self.repos.plans.get(id).await?;
        if plan.is_locked() {
            let mut errors = ValidationErrors::new();
            errors.add_base(format!("Plan {} is approved and cannot be deleted", plan.period()));
            return Err(MwpError::Validation(errors));
        }

        self.repos.plans.delete_open(id).await?;
        tracing::info!(plan_id = id, "Deleted plan");
        Ok(())
    }

    /// Plans of a user in calendar order
    pub async fn list_for_user(&self, user_id: Id, pagination: Pagination) -> MwpResult<PaginatedResult<Plan>> {
        let query = FindMany::new(PlanFilter::for_user(user_id)).paginate(pagination);
        Ok(self.repos.plans.find_many(&query).await?)
    }

    /// Every plan of a user in calendar order
    pub async fn all_for_user(&self, user_id: Id) -> MwpResult<Vec<Plan>> {
        Ok(self.repos.plans.find_all(&PlanFilter::for_user(user_id)).await?)
    }

    /// The user's plans for one week of one month
    pub async fn find_by_period(&self, user_id: Id, month: Month, week: Week) -> MwpResult<Vec<Plan>> {
        Ok(self.repos.plans.find_by_period(user_id, month, week).await?)
    }

    pub async fn with_tasks(&self, id: Id) -> MwpResult<PlanWithTasks> {
        let plan = self.repos.plans.get(id).await?;
        let tasks = self.tasks_of(id).await?;
        Ok(PlanWithTasks { plan, tasks })
    }

    pub async fn progress(&self, id: Id) -> MwpResult<PlanProgress> {
        if !self.repos.plans.exists(id).await? {
            return Err(MwpError::not_found("Plan", "id", id));
        }
        let tasks = self.tasks_of(id).await?;
        Ok(PlanProgress::from_tasks(id, &tasks))
    }

    async fn tasks_of(&self, plan_id: Id) -> MwpResult<Vec<Task>> {
        Ok(self.repos.tasks.find_all(&TaskFilter::for_plan(plan_id)).await?)
    }
}
