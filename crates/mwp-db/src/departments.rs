//! Department repository
//!
//! Database operations for departments. Moving a department to another
//! ministry carries its units along through the composite foreign key on
//! `units (department_id, ministry_id)`.

use async_trait::async_trait;
use mwp_core::config::DeletePolicy;
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use mwp_models::{Department, NewDepartment, UpdateDepartment};
use sqlx::PgPool;

use crate::cascade;
use crate::repository::{
    contains_ignore_case, FindMany, Record, RecordFilter, Repository, RepositoryError, RepositoryResult, Sort,
    SortField, SortKey,
};
use crate::sql::{self, Conditions, UpdateSet};

/// Department query filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartmentFilter {
    pub ministry_id: Option<Id>,
    pub name: Option<String>,
    pub name_contains: Option<String>,
}

impl DepartmentFilter {
    pub fn in_ministry(ministry_id: Id) -> Self {
        Self {
            ministry_id: Some(ministry_id),
            ..Default::default()
        }
    }
}

impl RecordFilter<Department> for DepartmentFilter {
    fn matches(&self, department: &Department) -> bool {
        self.ministry_id.map_or(true, |id| department.ministry_id == id)
            && self.name.as_ref().map_or(true, |name| &department.name == name)
            && self
                .name_contains
                .as_ref()
                .map_or(true, |needle| contains_ignore_case(&department.name, needle))
    }

    fn push_conditions(&self, conditions: &mut Conditions<'_, '_>) {
        if let Some(ministry_id) = self.ministry_id {
            conditions.eq("ministry_id", ministry_id);
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
pub enum DepartmentSortField {
    Id,
    Name,
    MinistryId,
    CreatedAt,
}

impl SortField<Department> for DepartmentSortField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::MinistryId => "ministry_id",
            Self::CreatedAt => "created_at",
        }
    }

    fn key(&self, department: &Department) -> SortKey {
        match self {
            Self::Id => SortKey::Int(department.id),
            Self::Name => SortKey::Text(department.name.clone()),
            Self::MinistryId => SortKey::Int(department.ministry_id),
            Self::CreatedAt => SortKey::Time(department.created_at),
        }
    }
}

impl Record for Department {
    type Create = NewDepartment;
    type Update = UpdateDepartment;
    type Filter = DepartmentFilter;
    type SortField = DepartmentSortField;

    const COLUMNS: &'static str = "id, name, description, ministry_id, created_at, updated_at";

    fn default_sort() -> Vec<Sort<DepartmentSortField>> {
        vec![Sort::asc(DepartmentSortField::Id)]
    }
}

/// Department lookups beyond the generic repository
#[async_trait]
pub trait DepartmentRepository: Repository<Department> {
    /// Find a department by its name, unique within a ministry
    async fn find_by_name(&self, ministry_id: Id, name: &str) -> RepositoryResult<Option<Department>>;
}

/// PostgreSQL department repository
pub struct PgDepartmentRepository {
    pool: PgPool,
    policy: DeletePolicy,
}

impl PgDepartmentRepository {
    pub fn new(pool: PgPool, policy: DeletePolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl Repository<Department> for PgDepartmentRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Department>> {
        sql::find_by_id(&self.pool, id).await
    }

    async fn find_many(&self, query: &FindMany<Department>) -> RepositoryResult<PaginatedResult<Department>> {
        sql::find_many(&self.pool, query).await
    }

    async fn find_all(&self, filter: &DepartmentFilter) -> RepositoryResult<Vec<Department>> {
        sql::find_all(&self.pool, filter).await
    }

    async fn count(&self, filter: &DepartmentFilter) -> RepositoryResult<i64> {
        sql::count::<Department>(&self.pool, filter).await
    }

    async fn create(&self, dto: NewDepartment) -> RepositoryResult<Department> {
        let department = sqlx::query_as::<_, Department>(&format!(
            "INSERT INTO departments (name, description, ministry_id) VALUES ($1, $2, $3) RETURNING {}",
            Department::COLUMNS
        ))
        .bind(dto.name)
        .bind(dto.description)
        .bind(dto.ministry_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            department_id = department.id,
            ministry_id = department.ministry_id,
            name = %department.name,
            "Created department"
        );
        Ok(department)
    }

    async fn update(&self, id: Id, dto: UpdateDepartment) -> RepositoryResult<Department> {
        let moved = dto.ministry_id;

        let mut set = UpdateSet::new("departments");
        set.set_opt("name", dto.name)
            .set_opt("description", dto.description)
            .set_opt("ministry_id", dto.ministry_id);

        let department = set
            .returning(id, Department::COLUMNS)
            .build_query_as::<Department>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::not_found::<Department>(id))?;

        if let Some(ministry_id) = moved {
            tracing::info!(department_id = id, ministry_id, "Moved department with its units");
        }
        Ok(department)
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        cascade::delete_org_node::<Department>(&self.pool, &self.policy, id).await?;
        tracing::info!(department_id = id, "Deleted department");
        Ok(())
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        sql::exists::<Department>(&self.pool, id).await
    }
}

#[async_trait]
impl DepartmentRepository for PgDepartmentRepository {
    async fn find_by_name(&self, ministry_id: Id, name: &str) -> RepositoryResult<Option<Department>> {
        let row = sqlx::query_as::<_, Department>(&format!(
            "SELECT {} FROM departments WHERE ministry_id = $1 AND name = $2",
            Department::COLUMNS
        ))
        .bind(ministry_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
