//! Task repository
//!
//! `day_order` is written from `day`. Status counts are the one aggregate
//! beyond `count`.
//!
//! The `*_in_open_plan` writes share-lock the owning plan for the length of
//! their transaction and fail with `RepositoryError::Locked` once it is
//! approved.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mwp_core::error::ConstraintViolation;
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use mwp_models::{Completion, Day, NewTask, Plan, Priority, Task, TaskStatus, UpdateTask};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::cascade::{self, RowLock};
use crate::repository::{
    contains_ignore_case, FindMany, Record, RecordFilter, Repository, RepositoryError, RepositoryResult, Sort,
    SortField, SortKey,
};
use crate::sql::{self, Conditions, UpdateSet};

/// Task query filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub plan_id: Option<Id>,
    pub plan_ids: Option<Vec<Id>>,
    pub day: Option<Day>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    /// `Some(None)` selects tasks with no outcome recorded
    pub completed: Option<Option<Completion>>,
    pub date: Option<String>,
    pub title_contains: Option<String>,
}

impl TaskFilter {
    pub fn for_plan(plan_id: Id) -> Self {
        Self {
            plan_id: Some(plan_id),
            ..Default::default()
        }
    }
}

impl RecordFilter<Task> for TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        self.plan_id.map_or(true, |id| task.plan_id == id)
            && self.plan_ids.as_ref().map_or(true, |ids| ids.contains(&task.plan_id))
            && self.day.map_or(true, |day| task.day == day)
            && self.priority.map_or(true, |priority| task.priority == priority)
            && self.status.map_or(true, |status| task.status == status)
            && self.completed.map_or(true, |completed| task.completed == completed)
            && self.date.as_ref().map_or(true, |date| &task.date == date)
            && self
                .title_contains
                .as_ref()
                .map_or(true, |needle| contains_ignore_case(&task.title, needle))
    }

    fn push_conditions(&self, conditions: &mut Conditions<'_, '_>) {
        if let Some(plan_id) = self.plan_id {
            conditions.eq("plan_id", plan_id);
        }
        if let Some(plan_ids) = &self.plan_ids {
            conditions.any_of("plan_id", plan_ids.clone());
        }
        if let Some(day) = self.day {
            conditions.eq("day", day);
        }
        if let Some(priority) = self.priority {
            conditions.eq("priority", priority);
        }
        if let Some(status) = self.status {
            conditions.eq("status", status);
        }
        match self.completed {
            Some(Some(completed)) => conditions.eq("completed", completed),
            Some(None) => conditions.is_null("completed", true),
            None => {}
        }
        if let Some(date) = &self.date {
            conditions.eq("date", date.clone());
        }
        if let Some(needle) = &self.title_contains {
            conditions.contains("title", needle);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSortField {
    Id,
    DayOrder,
    Priority,
    Status,
    Date,
    CreatedAt,
}

impl SortField<Task> for TaskSortField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::DayOrder => "day_order",
            Self::Priority => "priority",
            Self::Status => "status",
            Self::Date => "date",
            Self::CreatedAt => "created_at",
        }
    }

    /// Enum columns sort in declaration order, as PostgreSQL enums do
    fn key(&self, task: &Task) -> SortKey {
        match self {
            Self::Id => SortKey::Int(task.id),
            Self::DayOrder => SortKey::Int(task.day_order.into()),
            Self::Priority => SortKey::Int(task.priority.rank().into()),
            Self::Status => SortKey::Int(task.status.rank().into()),
            Self::Date => SortKey::Text(task.date.clone()),
            Self::CreatedAt => SortKey::Time(task.created_at),
        }
    }
}

impl Record for Task {
    type Create = NewTask;
    type Update = UpdateTask;
    type Filter = TaskFilter;
    type SortField = TaskSortField;

    const COLUMNS: &'static str = "id, plan_id, day, day_order, title, notes, tools, priority, time, status, \
        constraints, completed, reason, date, created_at, updated_at";

    fn default_sort() -> Vec<Sort<TaskSortField>> {
        vec![Sort::asc(TaskSortField::DayOrder)]
    }
}

/// Task writes guarded by the plan lock, and aggregates
#[async_trait]
pub trait TaskRepository: Repository<Task> {
    /// Create a task unless its plan is approved, checked atomically with the insert
    async fn create_in_open_plan(&self, dto: NewTask) -> RepositoryResult<Task>;

    /// Update a task unless its plan is approved
    async fn update_in_open_plan(&self, id: Id, dto: UpdateTask) -> RepositoryResult<Task>;

    /// Delete a task unless its plan is approved
    async fn delete_in_open_plan(&self, id: Id) -> RepositoryResult<()>;

    /// Number of matching tasks per status; statuses with no task are absent
    async fn status_counts(&self, filter: &TaskFilter) -> RepositoryResult<BTreeMap<TaskStatus, i64>>;
}

/// PostgreSQL task repository
pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Task> for PgTaskRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Task>> {
        sql::find_by_id(&self.pool, id).await
    }

    async fn find_many(&self, query: &FindMany<Task>) -> RepositoryResult<PaginatedResult<Task>> {
        sql::find_many(&self.pool, query).await
    }

    async fn find_all(&self, filter: &TaskFilter) -> RepositoryResult<Vec<Task>> {
        sql::find_all(&self.pool, filter).await
    }

    async fn count(&self, filter: &TaskFilter) -> RepositoryResult<i64> {
        sql::count::<Task>(&self.pool, filter).await
    }

    async fn create(&self, dto: NewTask) -> RepositoryResult<Task> {
        let mut conn = self.pool.acquire().await?;
        insert_task(&mut conn, dto).await
    }

    async fn update(&self, id: Id, dto: UpdateTask) -> RepositoryResult<Task> {
        let mut conn = self.pool.acquire().await?;
        update_task(&mut conn, id, dto).await
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        let mut conn = self.pool.acquire().await?;
        delete_task(&mut conn, id).await
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        sql::exists::<Task>(&self.pool, id).await
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn create_in_open_plan(&self, dto: NewTask) -> RepositoryResult<Task> {
        let mut tx = self.pool.begin().await?;
        match cascade::lock_plan(&mut tx, dto.plan_id, RowLock::Share).await? {
            None => return Err(ConstraintViolation::missing_reference("Task", "plan_id", dto.plan_id).into()),
            Some(true) => return Err(RepositoryError::locked::<Plan>(dto.plan_id)),
            Some(false) => {}
        }
        let task = insert_task(&mut tx, dto).await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn update_in_open_plan(&self, id: Id, dto: UpdateTask) -> RepositoryResult<Task> {
        let mut tx = self.pool.begin().await?;
        lock_open_plan_of(&mut tx, id).await?;
        let task = update_task(&mut tx, id, dto).await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn delete_in_open_plan(&self, id: Id) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_open_plan_of(&mut tx, id).await?;
        delete_task(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn status_counts(&self, filter: &TaskFilter) -> RepositoryResult<BTreeMap<TaskStatus, i64>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT status, COUNT(*) FROM tasks");
        filter.push_conditions(&mut Conditions::new(&mut builder));
        builder.push(" GROUP BY status");

        let rows = builder
            .build_query_as::<(TaskStatus, i64)>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }
}

async fn insert_task(conn: &mut PgConnection, dto: NewTask) -> RepositoryResult<Task> {
    let task = sqlx::query_as::<_, Task>(&format!(
        r#"
        INSERT INTO tasks (plan_id, day, day_order, title, notes, tools, priority, time,
                           status, constraints, completed, reason, date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {}
        "#,
        Task::COLUMNS
    ))
    .bind(dto.plan_id)
    .bind(dto.day)
    .bind(dto.day.order())
    .bind(dto.title)
    .bind(dto.notes)
    .bind(dto.tools)
    .bind(dto.priority)
    .bind(dto.time)
    .bind(dto.status)
    .bind(dto.constraints)
    .bind(dto.completed)
    .bind(dto.reason)
    .bind(dto.date)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(task_id = task.id, plan_id = task.plan_id, day = %task.day, "Created task");
    Ok(task)
}

async fn update_task(conn: &mut PgConnection, id: Id, dto: UpdateTask) -> RepositoryResult<Task> {
    let mut set = UpdateSet::new("tasks");
    if let Some(day) = dto.day {
        set.set("day", day).set("day_order", day.order());
    }
    set.set_opt("title", dto.title)
        .set_opt("notes", dto.notes)
        .set_opt("tools", dto.tools)
        .set_opt("priority", dto.priority)
        .set_opt("time", dto.time)
        .set_opt("date", dto.date)
        .set_opt("constraints", dto.constraints)
        .set_opt("status", dto.status)
        .set_opt("completed", dto.completed)
        .set_opt("reason", dto.reason);

    set.returning(id, Task::COLUMNS)
        .build_query_as::<Task>()
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| RepositoryError::not_found::<Task>(id))
}

async fn delete_task(conn: &mut PgConnection, id: Id) -> RepositoryResult<()> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::not_found::<Task>(id));
    }
    Ok(())
}

/// Share-lock the plan owning a task; fails when the task is gone or the plan approved
async fn lock_open_plan_of(conn: &mut PgConnection, task_id: Id) -> RepositoryResult<()> {
    let plan_id: Option<Id> = sqlx::query_scalar("SELECT plan_id FROM tasks WHERE id = $1")
        .bind(task_id)
        .fetch_optional(&mut *conn)
        .await?;
    let plan_id = plan_id.ok_or_else(|| RepositoryError::not_found::<Task>(task_id))?;

    match cascade::lock_plan(&mut *conn, plan_id, RowLock::Share).await? {
        None => Err(RepositoryError::not_found::<Task>(task_id)),
        Some(true) => Err(RepositoryError::locked::<Plan>(plan_id)),
        Some(false) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_filter() {
        let unset = TaskFilter {
            completed: Some(None),
            ..Default::default()
        };
        let builder = sql::count_query::<Task>(&unset);
        assert_eq!(builder.sql(), "SELECT COUNT(*) FROM tasks WHERE completed IS NULL");
    }

    #[test]
    fn test_default_sort() {
        assert_eq!(Task::default_sort()[0].field.column(), "day_order");
    }
}
