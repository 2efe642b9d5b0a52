//! Plan repository
//!
//! `month_order` and `week_order` are written from the enums on every create
//! and every update that touches the period. `update_open` and `delete_open`
//! hold the plan row lock while they check approval.

use async_trait::async_trait;
use mwp_core::config::DeletePolicy;
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use mwp_models::{Month, NewPlan, Plan, UpdatePlan, Week};
use sqlx::{PgConnection, PgPool};

use crate::cascade::{self, RowLock};
use crate::repository::{
    FindMany, Record, RecordFilter, Repository, RepositoryError, RepositoryResult, Sort, SortField, SortKey,
};
use crate::sql::{self, Conditions, UpdateSet};

/// Plan query filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanFilter {
    pub user_id: Option<Id>,
    pub user_ids: Option<Vec<Id>>,
    pub month: Option<Month>,
    pub week: Option<Week>,
    pub approved: Option<bool>,
}

impl PlanFilter {
    pub fn for_user(user_id: Id) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }
}

impl RecordFilter<Plan> for PlanFilter {
    fn matches(&self, plan: &Plan) -> bool {
        self.user_id.map_or(true, |id| plan.user_id == id)
            && self.user_ids.as_ref().map_or(true, |ids| ids.contains(&plan.user_id))
            && self.month.map_or(true, |month| plan.month == month)
            && self.week.map_or(true, |week| plan.week == week)
            && self.approved.map_or(true, |approved| plan.approved == approved)
    }

    fn push_conditions(&self, conditions: &mut Conditions<'_, '_>) {
        if let Some(user_id) = self.user_id {
            conditions.eq("user_id", user_id);
        }
        if let Some(user_ids) = &self.user_ids {
            conditions.any_of("user_id", user_ids.clone());
        }
        if let Some(month) = self.month {
            conditions.eq("month", month);
        }
        if let Some(week) = self.week {
            conditions.eq("week", week);
        }
        if let Some(approved) = self.approved {
            conditions.eq("approved", approved);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSortField {
    Id,
    UserId,
    MonthOrder,
    WeekOrder,
    Approved,
    CreatedAt,
}

impl SortField<Plan> for PlanSortField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::UserId => "user_id",
            Self::MonthOrder => "month_order",
            Self::WeekOrder => "week_order",
            Self::Approved => "approved",
            Self::CreatedAt => "created_at",
        }
    }

    fn key(&self, plan: &Plan) -> SortKey {
        match self {
            Self::Id => SortKey::Int(plan.id),
            Self::UserId => SortKey::Int(plan.user_id),
            Self::MonthOrder => SortKey::Int(plan.month_order.into()),
            Self::WeekOrder => SortKey::Int(plan.week_order.into()),
            Self::Approved => SortKey::Bool(plan.approved),
            Self::CreatedAt => SortKey::Time(plan.created_at),
        }
    }
}

impl Record for Plan {
    type Create = NewPlan;
    type Update = UpdatePlan;
    type Filter = PlanFilter;
    type SortField = PlanSortField;

    const COLUMNS: &'static str =
        "id, user_id, month, month_order, week, week_order, approved, created_at, updated_at";

    /// Calendar order
    fn default_sort() -> Vec<Sort<PlanSortField>> {
        vec![Sort::asc(PlanSortField::MonthOrder), Sort::asc(PlanSortField::WeekOrder)]
    }
}

/// Plan lookups and writes guarded by approval
#[async_trait]
pub trait PlanRepository: Repository<Plan> {
    /// Update a plan unless it is approved, checked atomically with the write
    async fn update_open(&self, id: Id, dto: UpdatePlan) -> RepositoryResult<Plan>;

    /// Delete a plan unless it is approved
    async fn delete_open(&self, id: Id) -> RepositoryResult<()>;

    /// Plans a user declared for one week of one month
    async fn find_by_period(&self, user_id: Id, month: Month, week: Week) -> RepositoryResult<Vec<Plan>>;
}

/// PostgreSQL plan repository
pub struct PgPlanRepository {
    pool: PgPool,
    policy: DeletePolicy,
}

impl PgPlanRepository {
    pub fn new(pool: PgPool, policy: DeletePolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl Repository<Plan> for PgPlanRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Plan>> {
        sql::find_by_id(&self.pool, id).await
    }

    async fn find_many(&self, query: &FindMany<Plan>) -> RepositoryResult<PaginatedResult<Plan>> {
        sql::find_many(&self.pool, query).await
    }

    async fn find_all(&self, filter: &PlanFilter) -> RepositoryResult<Vec<Plan>> {
        sql::find_all(&self.pool, filter).await
    }

    async fn count(&self, filter: &PlanFilter) -> RepositoryResult<i64> {
        sql::count::<Plan>(&self.pool, filter).await
    }

    async fn create(&self, dto: NewPlan) -> RepositoryResult<Plan> {
        let plan = sqlx::query_as::<_, Plan>(&format!(
            "INSERT INTO plans (user_id, month, month_order, week, week_order) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            Plan::COLUMNS
        ))
        .bind(dto.user_id)
        .bind(dto.month)
        .bind(dto.month.order())
        .bind(dto.week)
        .bind(dto.week.order())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(plan_id = plan.id, user_id = plan.user_id, period = %plan.period(), "Created plan");
        Ok(plan)
    }

    async fn update(&self, id: Id, dto: UpdatePlan) -> RepositoryResult<Plan> {
        let mut conn = self.pool.acquire().await?;
        update_plan(&mut conn, id, dto).await
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;
        if !cascade::lock_row(&mut tx, "plans", id).await? {
            return Err(RepositoryError::not_found::<Plan>(id));
        }
        cascade::delete_plans(&mut tx, &self.policy, &[id]).await?;
        tx.commit().await?;

        tracing::info!(plan_id = id, "Deleted plan");
        Ok(())
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        sql::exists::<Plan>(&self.pool, id).await
    }
}

#[async_trait]
impl PlanRepository for PgPlanRepository {
    async fn update_open(&self, id: Id, dto: UpdatePlan) -> RepositoryResult<Plan> {
        let mut tx = self.pool.begin().await?;
        lock_open_plan(&mut tx, id).await?;
        let plan = update_plan(&mut tx, id, dto).await?;
        tx.commit().await?;
        Ok(plan)
    }

    async fn delete_open(&self, id: Id) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_open_plan(&mut tx, id).await?;
        cascade::delete_plans(&mut tx, &self.policy, &[id]).await?;
        tx.commit().await?;

        tracing::info!(plan_id = id, "Deleted plan");
        Ok(())
    }

    async fn find_by_period(&self, user_id: Id, month: Month, week: Week) -> RepositoryResult<Vec<Plan>> {
        let rows = sqlx::query_as::<_, Plan>(&format!(
            "SELECT {} FROM plans WHERE user_id = $1 AND month = $2 AND week = $3 ORDER BY id",
            Plan::COLUMNS
        ))
        .bind(user_id)
        .bind(month)
        .bind(week)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

async fn update_plan(conn: &mut PgConnection, id: Id, dto: UpdatePlan) -> RepositoryResult<Plan> {
    let mut set = UpdateSet::new("plans");
    if let Some(month) = dto.month {
        set.set("month", month).set("month_order", month.order());
    }
    if let Some(week) = dto.week {
        set.set("week", week).set("week_order", week.order());
    }
    set.set_opt("approved", dto.approved);

    set.returning(id, Plan::COLUMNS)
        .build_query_as::<Plan>()
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| RepositoryError::not_found::<Plan>(id))
}

/// Lock a plan row for update; fails when it is missing or approved
async fn lock_open_plan(conn: &mut PgConnection, id: Id) -> RepositoryResult<()> {
    match cascade::lock_plan(conn, id, RowLock::Update).await? {
        None => Err(RepositoryError::not_found::<Plan>(id)),
        Some(true) => Err(RepositoryError::locked::<Plan>(id)),
        Some(false) => Ok(()),
    }
}
