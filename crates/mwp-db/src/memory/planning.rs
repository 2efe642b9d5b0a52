//! In-memory plans and tasks
//!
//! Guarded writes check approval under the same write lock as the change.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use mwp_models::{Month, NewPlan, NewTask, Plan, Task, TaskStatus, UpdatePlan, UpdateTask, User, Week};

use super::{MemoryDatabase, MemoryState};
use crate::plans::{PlanFilter, PlanRepository};
use crate::repository::{FindMany, RecordFilter, Repository, RepositoryError, RepositoryResult};
use crate::tasks::{TaskFilter, TaskRepository};

/// In-memory plan repository
#[derive(Clone)]
pub struct MemoryPlanRepository {
    db: MemoryDatabase,
}

impl MemoryPlanRepository {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Repository<Plan> for MemoryPlanRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Plan>> {
        Ok(self.db.find_by_id(id))
    }

    async fn find_many(&self, query: &FindMany<Plan>) -> RepositoryResult<PaginatedResult<Plan>> {
        Ok(self.db.find_many(query))
    }

    async fn find_all(&self, filter: &PlanFilter) -> RepositoryResult<Vec<Plan>> {
        Ok(self.db.find_all(filter))
    }

    async fn count(&self, filter: &PlanFilter) -> RepositoryResult<i64> {
        Ok(self.db.count::<Plan>(filter))
    }

    async fn create(&self, dto: NewPlan) -> RepositoryResult<Plan> {
        self.db.write(|state| {
            state.require::<User>("Plan", "user_id", dto.user_id)?;
            let now = Utc::now();
            Ok(state.plans.insert_with(|id| Plan {
                id,
                user_id: dto.user_id,
                month: dto.month,
                month_order: dto.month.order(),
                week: dto.week,
                week_order: dto.week.order(),
                approved: false,
                created_at: now,
                updated_at: now,
            }))
        })
    }

    async fn update(&self, id: Id, dto: UpdatePlan) -> RepositoryResult<Plan> {
        self.db.write(|state| update_plan(state, id, dto))
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        self.db.transaction(|state, policy| {
            if !state.plans.contains(id) {
                return Err(RepositoryError::not_found::<Plan>(id));
            }
            state.delete_plans(policy, &[id])
        })
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        Ok(self.db.exists::<Plan>(id))
    }
}

#[async_trait]
impl PlanRepository for MemoryPlanRepository {
    async fn update_open(&self, id: Id, dto: UpdatePlan) -> RepositoryResult<Plan> {
        self.db.write(|state| {
            if !state.plans.contains(id) {
                return Err(RepositoryError::not_found::<Plan>(id));
            }
            check_open(state, id)?;
            update_plan(state, id, dto)
        })
    }

    async fn delete_open(&self, id: Id) -> RepositoryResult<()> {
        self.db.transaction(|state, policy| {
            if !state.plans.contains(id) {
                return Err(RepositoryError::not_found::<Plan>(id));
            }
            check_open(state, id)?;
            state.delete_plans(policy, &[id])
        })
    }

    async fn find_by_period(&self, user_id: Id, month: Month, week: Week) -> RepositoryResult<Vec<Plan>> {
        Ok(self.db.read(|state| {
            state
                .plans
                .iter()
                .filter(|p| p.user_id == user_id && p.month == month && p.week == week)
                .cloned()
                .collect()
        }))
    }
}

/// In-memory task repository
#[derive(Clone)]
pub struct MemoryTaskRepository {
    db: MemoryDatabase,
}

impl MemoryTaskRepository {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Repository<Task> for MemoryTaskRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Task>> {
        Ok(self.db.find_by_id(id))
    }

    async fn find_many(&self, query: &FindMany<Task>) -> RepositoryResult<PaginatedResult<Task>> {
        Ok(self.db.find_many(query))
    }

    async fn find_all(&self, filter: &TaskFilter) -> RepositoryResult<Vec<Task>> {
        Ok(self.db.find_all(filter))
    }

    async fn count(&self, filter: &TaskFilter) -> RepositoryResult<i64> {
        Ok(self.db.count::<Task>(filter))
    }

    async fn create(&self, dto: NewTask) -> RepositoryResult<Task> {
        self.db.write(|state| insert_task(state, dto))
    }

    async fn update(&self, id: Id, dto: UpdateTask) -> RepositoryResult<Task> {
        self.db.write(|state| update_task(state, id, dto))
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        self.db.delete_leaf::<Task>(id)
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        Ok(self.db.exists::<Task>(id))
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn create_in_open_plan(&self, dto: NewTask) -> RepositoryResult<Task> {
        self.db.write(|state| {
            check_open(state, dto.plan_id)?;
            insert_task(state, dto)
        })
    }

    async fn update_in_open_plan(&self, id: Id, dto: UpdateTask) -> RepositoryResult<Task> {
        self.db.write(|state| {
            check_open(state, plan_of(state, id)?)?;
            update_task(state, id, dto)
        })
    }

    async fn delete_in_open_plan(&self, id: Id) -> RepositoryResult<()> {
        self.db.write(|state| {
            check_open(state, plan_of(state, id)?)?;
            state.tasks.remove(id);
            Ok(())
        })
    }

    async fn status_counts(&self, filter: &TaskFilter) -> RepositoryResult<BTreeMap<TaskStatus, i64>> {
        Ok(self.db.read(|state| {
            let mut counts = BTreeMap::new();
            for task in state.tasks.iter().filter(|t| filter.matches(t)) {
                *counts.entry(task.status).or_insert(0) += 1;
            }
            counts
        }))
    }
}

/// Fail with `Locked` when the plan is approved
fn check_open(state: &MemoryState, plan_id: Id) -> RepositoryResult<()> {
    match state.plans.get(plan_id) {
        Some(plan) if plan.approved => Err(RepositoryError::locked::<Plan>(plan_id)),
        _ => Ok(()),
    }
}

fn plan_of(state: &MemoryState, task_id: Id) -> RepositoryResult<Id> {
    state
        .tasks
        .get(task_id)
        .map(|task| task.plan_id)
        .ok_or_else(|| RepositoryError::not_found::<Task>(task_id))
}

fn update_plan(state: &mut MemoryState, id: Id, dto: UpdatePlan) -> RepositoryResult<Plan> {
    let plan = state
        .plans
        .get_mut(id)
        .ok_or_else(|| RepositoryError::not_found::<Plan>(id))?;
    if let Some(month) = dto.month {
        plan.month = month;
        plan.month_order = month.order();
    }
    if let Some(week) = dto.week {
        plan.week = week;
        plan.week_order = week.order();
    }
    if let Some(approved) = dto.approved {
        plan.approved = approved;
    }
    plan.updated_at = Utc::now();
    Ok(plan.clone())
}

fn insert_task(state: &mut MemoryState, dto: NewTask) -> RepositoryResult<Task> {
    state.require::<Plan>("Task", "plan_id", dto.plan_id)?;
    let now = Utc::now();
    Ok(state.tasks.insert_with(|id| Task {
        id,
        plan_id: dto.plan_id,
        day: dto.day,
        day_order: dto.day.order(),
        title: dto.title,
        notes: dto.notes,
        tools: dto.tools,
        priority: dto.priority,
        time: dto.time,
        status: dto.status,
        constraints: dto.constraints,
        completed: dto.completed,
        reason: dto.reason,
        date: dto.date,
        created_at: now,
        updated_at: now,
    }))
}

fn update_task(state: &mut MemoryState, id: Id, dto: UpdateTask) -> RepositoryResult<Task> {
    let task = state
        .tasks
        .get_mut(id)
        .ok_or_else(|| RepositoryError::not_found::<Task>(id))?;
    if let Some(day) = dto.day {
        task.day = day;
        task.day_order = day.order();
    }
    if let Some(title) = dto.title {
        task.title = title;
    }
    if let Some(notes) = dto.notes {
        task.notes = notes;
    }
    if let Some(tools) = dto.tools {
        task.tools = tools;
    }
    if let Some(priority) = dto.priority {
        task.priority = priority;
    }
    if let Some(time) = dto.time {
        task.time = time;
    }
    if let Some(date) = dto.date {
        task.date = date;
    }
    if let Some(constraints) = dto.constraints {
        task.constraints = constraints;
    }
    if let Some(status) = dto.status {
        task.status = status;
    }
    if let Some(completed) = dto.completed {
        task.completed = completed;
    }
    if let Some(reason) = dto.reason {
        task.reason = reason;
    }
    task.updated_at = Utc::now();
    Ok(task.clone())
}
