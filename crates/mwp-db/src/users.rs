//! User repository
//!
//! Database operations for users.

use async_trait::async_trait;
use mwp_core::config::DeletePolicy;
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use mwp_models::{NewUser, UpdateUser, User};
use sqlx::PgPool;

use crate::cascade;
use crate::repository::{
    FindMany, Record, RecordFilter, Repository, RepositoryError, RepositoryResult, Sort, SortField, SortKey,
};
use crate::sql::{self, Conditions, UpdateSet};

const SUPERVISOR_SQL: &str = "head_of_unit OR head_of_department OR head_of_service OR permanent_secretary";

/// User query filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub ids: Option<Vec<Id>>,
    pub employee_id: Option<String>,
    pub role: Option<String>,
    pub ministry_id: Option<Id>,
    pub department_id: Option<Id>,
    pub unit_id: Option<Id>,
    pub staff: Option<bool>,
    /// Holds any head flag or is permanent secretary
    pub supervisor: Option<bool>,
    /// Placed nowhere in the hierarchy
    pub unassigned: Option<bool>,
}

impl UserFilter {
    pub fn in_unit(unit_id: Id) -> Self {
        Self {
            unit_id: Some(unit_id),
            ..Default::default()
        }
    }
}

impl RecordFilter<User> for UserFilter {
    fn matches(&self, user: &User) -> bool {
        self.ids.as_ref().map_or(true, |ids| ids.contains(&user.id))
            && self.employee_id.as_ref().map_or(true, |e| &user.employee_id == e)
            && self.role.as_ref().map_or(true, |r| user.role.as_ref() == Some(r))
            && self.ministry_id.map_or(true, |id| user.ministry_id == Some(id))
            && self.department_id.map_or(true, |id| user.department_id == Some(id))
            && self.unit_id.map_or(true, |id| user.unit_id == Some(id))
            && self.staff.map_or(true, |staff| user.staff == staff)
            && self.supervisor.map_or(true, |s| user.is_supervisor() == s)
            && self.unassigned.map_or(true, |u| user.is_unassigned() == u)
    }

    fn push_conditions(&self, conditions: &mut Conditions<'_, '_>) {
        if let Some(ids) = &self.ids {
            conditions.any_of("id", ids.clone());
        }
        if let Some(employee_id) = &self.employee_id {
            conditions.eq("employee_id", employee_id.clone());
        }
        if let Some(role) = &self.role {
            conditions.eq("role", role.clone());
        }
        if let Some(ministry_id) = self.ministry_id {
            conditions.eq("ministry_id", ministry_id);
        }
        if let Some(department_id) = self.department_id {
            conditions.eq("department_id", department_id);
        }
        if let Some(unit_id) = self.unit_id {
            conditions.eq("unit_id", unit_id);
        }
        if let Some(staff) = self.staff {
            conditions.eq("staff", staff);
        }
        match self.supervisor {
            Some(true) => conditions.raw(SUPERVISOR_SQL),
            Some(false) => conditions.raw(&format!("NOT ({})", SUPERVISOR_SQL)),
            None => {}
        }
        match self.unassigned {
            Some(true) => conditions.raw("ministry_id IS NULL AND department_id IS NULL AND unit_id IS NULL"),
            Some(false) => {
                conditions.raw("ministry_id IS NOT NULL OR department_id IS NOT NULL OR unit_id IS NOT NULL")
            }
            None => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSortField {
    Id,
    EmployeeId,
    Role,
    CreatedAt,
}

impl SortField<User> for UserSortField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::EmployeeId => "employee_id",
            Self::Role => "role",
            Self::CreatedAt => "created_at",
        }
    }

    fn key(&self, user: &User) -> SortKey {
        match self {
            Self::Id => SortKey::Int(user.id),
            Self::EmployeeId => SortKey::Text(user.employee_id.clone()),
            Self::Role => SortKey::from(user.role.clone()),
            Self::CreatedAt => SortKey::Time(user.created_at),
        }
    }
}

impl Record for User {
    type Create = NewUser;
    type Update = UpdateUser;
    type Filter = UserFilter;
    type SortField = UserSortField;

    const COLUMNS: &'static str = "id, employee_id, password, role, head_of_department, head_of_service, \
        head_of_unit, permanent_secretary, staff, avatar, ministry_id, department_id, unit_id, \
        created_at, updated_at";

    fn default_sort() -> Vec<Sort<UserSortField>> {
        vec![Sort::asc(UserSortField::Id)]
    }
}

/// User lookups beyond the generic repository
#[async_trait]
pub trait UserRepository: Repository<User> {
    /// Find a user by employee number
    async fn find_by_employee_id(&self, employee_id: &str) -> RepositoryResult<Option<User>>;
}

/// PostgreSQL user repository
pub struct PgUserRepository {
    pool: PgPool,
    policy: DeletePolicy,
}

impl PgUserRepository {
    pub fn new(pool: PgPool, policy: DeletePolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl Repository<User> for PgUserRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<User>> {
        sql::find_by_id(&self.pool, id).await
    }

    async fn find_many(&self, query: &FindMany<User>) -> RepositoryResult<PaginatedResult<User>> {
        sql::find_many(&self.pool, query).await
    }

    async fn find_all(&self, filter: &UserFilter) -> RepositoryResult<Vec<User>> {
        sql::find_all(&self.pool, filter).await
    }

    async fn count(&self, filter: &UserFilter) -> RepositoryResult<i64> {
        sql::count::<User>(&self.pool, filter).await
    }

    async fn create(&self, dto: NewUser) -> RepositoryResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (employee_id, password, role, head_of_department, head_of_service,
                               head_of_unit, permanent_secretary, staff, avatar,
                               ministry_id, department_id, unit_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            User::COLUMNS
        ))
        .bind(dto.employee_id)
        .bind(dto.password)
        .bind(dto.role)
        .bind(dto.head_of_department)
        .bind(dto.head_of_service)
        .bind(dto.head_of_unit)
        .bind(dto.permanent_secretary)
        .bind(dto.staff)
        .bind(dto.avatar)
        .bind(dto.ministry_id)
        .bind(dto.department_id)
        .bind(dto.unit_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = user.id, employee_id = %user.employee_id, "Created user");
        Ok(user)
    }

    async fn update(&self, id: Id, dto: UpdateUser) -> RepositoryResult<User> {
        let mut set = UpdateSet::new("users");
        set.set_opt("employee_id", dto.employee_id)
            .set_opt("password", dto.password)
            .set_opt("role", dto.role)
            .set_opt("head_of_department", dto.head_of_department)
            .set_opt("head_of_service", dto.head_of_service)
            .set_opt("head_of_unit", dto.head_of_unit)
            .set_opt("permanent_secretary", dto.permanent_secretary)
            .set_opt("staff", dto.staff)
            .set_opt("avatar", dto.avatar)
            .set_opt("ministry_id", dto.ministry_id)
            .set_opt("department_id", dto.department_id)
            .set_opt("unit_id", dto.unit_id);

        set.returning(id, User::COLUMNS)
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::not_found::<User>(id))
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;
        if !cascade::lock_row(&mut tx, "users", id).await? {
            return Err(RepositoryError::not_found::<User>(id));
        }
        cascade::delete_users(&mut tx, &self.policy, &[id]).await?;
        tx.commit().await?;

        tracing::info!(user_id = id, "Deleted user");
        Ok(())
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        sql::exists::<User>(&self.pool, id).await
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_employee_id(&self, employee_id: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE employee_id = $1",
            User::COLUMNS
        ))
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
