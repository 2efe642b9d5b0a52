//! Task services
//!
//! Contracts run against the owning plan as loaded. The repository repeats
//! the approval check atomically with the write, so a plan approved in
//! between still rejects it.

use mwp_contracts::{CreateTaskContract, DeleteTaskContract, UpdateTaskContract};
use mwp_core::pagination::{PaginatedResult, Pagination};
use mwp_core::result::MwpResult;
use mwp_core::traits::Id;
use mwp_db::{FindMany, Repositories, Repository, TaskFilter, TaskRepository};
use mwp_models::{Completion, NewTask, Plan, Task, TaskStatus, UpdateTask};

use crate::base::validate;

/// Service for plan tasks
#[derive(Clone)]
pub struct TaskService {
    repos: Repositories,
}

impl TaskService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn create(&self, dto: NewTask) -> MwpResult<Task> {
        let plan = self.repos.plans.get(dto.plan_id).await?;
        validate(&CreateTaskContract::new(&plan), &dto)?;

        let task = self.repos.tasks.create_in_open_plan(dto).await?;
        tracing::info!(task_id = task.id, plan_id = task.plan_id, day = %task.day, "Created task");
        Ok(task)
    }

    pub async fn update(&self, id: Id, dto: UpdateTask) -> MwpResult<Task> {
        let (plan, task) = self.load(id).await?;
        validate(&UpdateTaskContract::new(&plan, &task), &dto)?;

        // Progress and outcome stay writable on approved plans
        let task = if dto.planning_fields().is_empty() {
            self.repos.tasks.update(id, dto).await?
        } else {
            self.repos.tasks.update_in_open_plan(id, dto).await?
        };
        Ok(task)
    }

    /// Progress update, allowed on approved plans
    pub async fn set_status(&self, id: Id, status: TaskStatus) -> MwpResult<Task> {
        let task = self.update(id, UpdateTask::progress(status)).await?;
        tracing::debug!(task_id = id, %status, "Task status changed");
        Ok(task)
    }

    /// Record whether the task was done; a NO needs a reason
    pub async fn record_outcome(&self, id: Id, completed: Completion, reason: Option<String>) -> MwpResult<Task> {
        self.update(id, UpdateTask::outcome(completed, reason)).await
    }

    pub async fn delete(&self, id: Id) -> MwpResult<()> {
        let (plan, task) = self.load(id).await?;
        validate(&DeleteTaskContract::new(&plan), &task)?;

        self.repos.tasks.delete_in_open_plan(id).await?;
        tracing::info!(task_id = id, plan_id = plan.id, "Deleted task");
        Ok(())
    }

    /// Tasks of a plan, Monday first
    pub async fn list_for_plan(&self, plan_id: Id, pagination: Pagination) -> MwpResult<PaginatedResult<Task>> {
        self.search(FindMany::new(TaskFilter::for_plan(plan_id)).paginate(pagination))
            .await
    }

    pub async fn search(&self, query: FindMany<Task>) -> MwpResult<PaginatedResult<Task>> {
        Ok(self.repos.tasks.find_many(&query).await?)
    }

    async fn load(&self, id: Id) -> MwpResult<(Plan, Task)> {
        let task = self.repos.tasks.get(id).await?;
        let plan = self.repos.plans.get(task.plan_id).await?;
        Ok((plan, task))
    }
}
