//! Unit repository
//!
//! A unit's `ministry_id` is never taken from the caller: it is read from the
//! department on create and whenever the unit changes department.

use async_trait::async_trait;
use mwp_core::config::DeletePolicy;
use mwp_core::error::ConstraintViolation;
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use mwp_models::{NewUnit, Unit, UpdateUnit};
use sqlx::PgPool;

use crate::cascade;
use crate::repository::{
    contains_ignore_case, FindMany, Record, RecordFilter, Repository, RepositoryError, RepositoryResult, Sort,
    SortField, SortKey,
};
use crate::sql::{self, Conditions, UpdateSet};

/// Unit query filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitFilter {
    pub ministry_id: Option<Id>,
    pub department_id: Option<Id>,
    pub name: Option<String>,
    pub name_contains: Option<String>,
}

impl UnitFilter {
    pub fn in_department(department_id: Id) -> Self {
        Self {
            department_id: Some(department_id),
            ..Default::default()
        }
    }

    pub fn in_ministry(ministry_id: Id) -> Self {
        Self {
            ministry_id: Some(ministry_id),
            ..Default::default()
        }
    }
}

impl RecordFilter<Unit> for UnitFilter {
    fn matches(&self, unit: &Unit) -> bool {
        self.ministry_id.map_or(true, |id| unit.ministry_id == id)
            && self.department_id.map_or(true, |id| unit.department_id == id)
            && self.name.as_ref().map_or(true, |name| &unit.name == name)
            && self
                .name_contains
                .as_ref()
                .map_or(true, |needle| contains_ignore_case(&unit.name, needle))
    }

    fn push_conditions(&self, conditions: &mut Conditions<'_, '_>) {
        if let Some(ministry_id) = self.ministry_id {
            conditions.eq("ministry_id", ministry_id);
        }
        if let Some(department_id) = self.department_id {
            conditions.eq("department_id", department_id);
        }
        if let Some(name) = &self.name {
            conditions.eq("name", name.clone());
        }
        if let Some(needle) = &self.name_contains {
            conditions.contains("name", needle);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSortField {
    Id,
    Name,
    DepartmentId,
    CreatedAt,
}

impl SortField<Unit> for UnitSortField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::DepartmentId => "department_id",
            Self::CreatedAt => "created_at",
        }
    }

    fn key(&self, unit: &Unit) -> SortKey {
        match self {
            Self::Id => SortKey::Int(unit.id),
            Self::Name => SortKey::Text(unit.name.clone()),
            Self::DepartmentId => SortKey::Int(unit.department_id),
            Self::CreatedAt => SortKey::Time(unit.created_at),
        }
    }
}

impl Record for Unit {
    type Create = NewUnit;
    type Update = UpdateUnit;
    type Filter = UnitFilter;
    type SortField = UnitSortField;

    const COLUMNS: &'static str = "id, name, description, department_id, ministry_id, created_at, updated_at";

    fn default_sort() -> Vec<Sort<UnitSortField>> {
        vec![Sort::asc(UnitSortField::Id)]
    }
}

/// Unit lookups beyond the generic repository
#[async_trait]
pub trait UnitRepository: Repository<Unit> {
    /// Find a unit by its name, unique within a department
    async fn find_by_name(&self, department_id: Id, name: &str) -> RepositoryResult<Option<Unit>>;
}

/// PostgreSQL unit repository
pub struct PgUnitRepository {
    pool: PgPool,
    policy: DeletePolicy,
}

impl PgUnitRepository {
    pub fn new(pool: PgPool, policy: DeletePolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl Repository<Unit> for PgUnitRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Unit>> {
        sql::find_by_id(&self.pool, id).await
    }

    async fn find_many(&self, query: &FindMany<Unit>) -> RepositoryResult<PaginatedResult<Unit>> {
        sql::find_many(&self.pool, query).await
    }

    async fn find_all(&self, filter: &UnitFilter) -> RepositoryResult<Vec<Unit>> {
        sql::find_all(&self.pool, filter).await
    }

    async fn count(&self, filter: &UnitFilter) -> RepositoryResult<i64> {
        sql::count::<Unit>(&self.pool, filter).await
    }

    async fn create(&self, dto: NewUnit) -> RepositoryResult<Unit> {
        let department_id = dto.department_id;
        let unit = sqlx::query_as::<_, Unit>(&format!(
            "INSERT INTO units (name, description, department_id, ministry_id) \
             SELECT $1, $2, d.id, d.ministry_id FROM departments d WHERE d.id = $3 \
             RETURNING {}",
            Unit::COLUMNS
        ))
        .bind(dto.name)
        .bind(dto.description)
        .bind(department_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ConstraintViolation::missing_reference("Unit", "department_id", department_id))?;

        tracing::info!(
            unit_id = unit.id,
            department_id = unit.department_id,
            ministry_id = unit.ministry_id,
            "Created unit"
        );
        Ok(unit)
    }

    async fn update(&self, id: Id, dto: UpdateUnit) -> RepositoryResult<Unit> {
        let mut tx = self.pool.begin().await?;

        let mut set = UpdateSet::new("units");
        set.set_opt("name", dto.name)
            .set_opt("description", dto.description);

        if let Some(department_id) = dto.department_id {
            let ministry_id: Id = sqlx::query_scalar("SELECT ministry_id FROM departments WHERE id = $1")
                .bind(department_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ConstraintViolation::missing_reference("Unit", "department_id", department_id))?;

            set.set("department_id", department_id).set("ministry_id", ministry_id);
        }

        let unit = set
            .returning(id, Unit::COLUMNS)
            .build_query_as::<Unit>()
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::not_found::<Unit>(id))?;

        tx.commit().await?;
        Ok(unit)
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        cascade::delete_org_node::<Unit>(&self.pool, &self.policy, id).await?;
        tracing::info!(unit_id = id, "Deleted unit");
        Ok(())
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        sql::exists::<Unit>(&self.pool, id).await
    }
}

#[async_trait]
impl UnitRepository for PgUnitRepository {
    async fn find_by_name(&self, department_id: Id, name: &str) -> RepositoryResult<Option<Unit>> {
        let row = sqlx::query_as::<_, Unit>(&format!(
            "SELECT {} FROM units WHERE department_id = $1 AND name = $2",
            Unit::COLUMNS
        ))
        .bind(department_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
