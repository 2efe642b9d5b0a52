//! SQL building blocks shared by the PostgreSQL repositories

use mwp_core::error::{ConstraintKind, ConstraintViolation};
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use sqlx::error::ErrorKind;
use sqlx::{Encode, PgPool, Postgres, QueryBuilder, Type};

use crate::repository::{FindMany, Record, RecordFilter, RepositoryResult, SortField};

/// WHERE clause under construction; conditions are joined with AND
pub struct Conditions<'q, 'args> {
    builder: &'q mut QueryBuilder<'args, Postgres>,
    count: usize,
}

impl<'q, 'args> Conditions<'q, 'args> {
    pub fn new(builder: &'q mut QueryBuilder<'args, Postgres>) -> Self {
        Self { builder, count: 0 }
    }

    fn next(&mut self) -> &mut QueryBuilder<'args, Postgres> {
        self.builder.push(if self.count == 0 { " WHERE " } else { " AND " });
        self.count += 1;
        &mut *self.builder
    }

    pub fn eq<V>(&mut self, column: &str, value: V)
    where
        V: 'args + Encode<'args, Postgres> + Type<Postgres> + Send,
    {
        self.next().push(column).push(" = ").push_bind(value);
    }

    /// `column <op> value` for a fixed comparison operator
    pub fn compare<V>(&mut self, column: &str, op: &'static str, value: V)
    where
        V: 'args + Encode<'args, Postgres> + Type<Postgres> + Send,
    {
        self.next().push(column).push(" ").push(op).push(" ").push_bind(value);
    }

    pub fn any_of(&mut self, column: &str, ids: Vec<Id>) {
        self.next().push(column).push(" = ANY(").push_bind(ids).push(")");
    }

    pub fn is_null(&mut self, column: &str, null: bool) {
        self.next()
            .push(column)
            .push(if null { " IS NULL" } else { " IS NOT NULL" });
    }

    /// Case-insensitive substring match
    pub fn contains(&mut self, column: &str, needle: &str) {
        let pattern = format!("%{}%", escape_like(needle));
        self.next().push(column).push(" ILIKE ").push_bind(pattern).push(" ESCAPE '\\'");
    }

    /// Raw predicate without bound values
    pub fn raw(&mut self, predicate: &str) {
        self.next().push("(").push(predicate).push(")");
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `UPDATE <table> SET ...` with only the supplied columns
pub struct UpdateSet<'args> {
    builder: QueryBuilder<'args, Postgres>,
}

impl<'args> UpdateSet<'args> {
    /// Always refreshes `updated_at`
    pub fn new(table: &str) -> Self {
        let mut builder = QueryBuilder::new("UPDATE ");
        builder.push(table).push(" SET updated_at = NOW()");
        Self { builder }
    }

    pub fn set<V>(&mut self, column: &str, value: V) -> &mut Self
    where
        V: 'args + Encode<'args, Postgres> + Type<Postgres> + Send,
    {
        self.builder.push(", ").push(column).push(" = ").push_bind(value);
        self
    }

    pub fn set_opt<V>(&mut self, column: &str, value: Option<V>) -> &mut Self
    where
        V: 'args + Encode<'args, Postgres> + Type<Postgres> + Send,
    {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    /// Finish with `WHERE id = $n RETURNING <columns>`
    pub fn returning(mut self, id: Id, columns: &str) -> QueryBuilder<'args, Postgres> {
        self.builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(columns);
        self.builder
    }
}

fn push_filtered<'args, T: Record>(builder: &mut QueryBuilder<'args, Postgres>, filter: &T::Filter) {
    let mut conditions = Conditions::new(builder);
    filter.push_conditions(&mut conditions);
}

/// Filtered SELECT in the query's sort order, without a LIMIT
pub fn select_all_query<T: Record>(query: &FindMany<T>) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {} FROM {}", T::COLUMNS, T::TABLE_NAME));
    push_filtered::<T>(&mut builder, &query.filter);

    builder.push(" ORDER BY ");
    for sort in query.effective_sort() {
        builder
            .push(sort.field.column())
            .push(" ")
            .push(sort.direction.as_sql())
            .push(", ");
    }
    builder.push("id ASC");
    builder
}

/// SELECT for `find_many`, including ORDER BY and LIMIT/OFFSET
pub fn select_query<T: Record>(query: &FindMany<T>) -> QueryBuilder<'static, Postgres> {
    let mut builder = select_all_query(query);
    builder
        .push(" LIMIT ")
        .push_bind(query.pagination.limit)
        .push(" OFFSET ")
        .push_bind(query.pagination.offset);
    builder
}

pub fn count_query<T: Record>(filter: &T::Filter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", T::TABLE_NAME));
    push_filtered::<T>(&mut builder, filter);
    builder
}

pub async fn find_many<T: Record>(pool: &PgPool, query: &FindMany<T>) -> RepositoryResult<PaginatedResult<T>> {
    let items = select_query(query).build_query_as::<T>().fetch_all(pool).await?;
    let total = count::<T>(pool, &query.filter).await?;
    Ok(PaginatedResult::new(items, total, query.pagination))
}

pub async fn find_all<T: Record>(pool: &PgPool, filter: &T::Filter) -> RepositoryResult<Vec<T>> {
    let query = FindMany::<T>::new(filter.clone());
    let rows = select_all_query(&query).build_query_as::<T>().fetch_all(pool).await?;
    Ok(rows)
}

pub async fn count<T: Record>(pool: &PgPool, filter: &T::Filter) -> RepositoryResult<i64> {
    let total = count_query::<T>(filter)
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;
    Ok(total)
}

pub async fn find_by_id<T: Record>(pool: &PgPool, id: Id) -> RepositoryResult<Option<T>> {
    let row = sqlx::query_as::<_, T>(&format!(
        "SELECT {} FROM {} WHERE id = $1",
        T::COLUMNS,
        T::TABLE_NAME
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn exists<T: Record>(pool: &PgPool, id: Id) -> RepositoryResult<bool> {
    let found = sqlx::query_scalar::<_, bool>(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
        T::TABLE_NAME
    ))
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(found)
}

/// Translate a unique or foreign key failure into the violated rule
pub fn constraint_violation(err: &sqlx::Error) -> Option<ConstraintViolation> {
    let db_err = err.as_database_error()?;
    let name = db_err.constraint()?;
    let mut violation = match db_err.kind() {
        ErrorKind::UniqueViolation | ErrorKind::ForeignKeyViolation => describe_constraint(name)?,
        _ => return None,
    };

    // A foreign key failing on the referenced side means dependents block a delete
    if violation.kind == ConstraintKind::MissingReference && db_err.message().starts_with("update or delete") {
        violation.kind = ConstraintKind::Restricted;
        violation.message = format!("{} still reference this record", dependent_relation(name));
    }
    Some(violation)
}

fn describe_constraint(name: &str) -> Option<ConstraintViolation> {
    let violation = match name {
        "ministries_name_key" => ConstraintViolation::unique("Ministry", &["name"]),
        "departments_name_ministry_key" => ConstraintViolation::unique("Department", &["name", "ministry_id"]),
        "departments_ministry_fkey" => ConstraintViolation::dangling("Department", "ministry_id"),
        "units_name_department_ministry_key" => {
            ConstraintViolation::unique("Unit", &["name", "department_id", "ministry_id"])
        }
        "units_ministry_fkey" => ConstraintViolation::dangling("Unit", "ministry_id"),
        "units_department_fkey" => ConstraintViolation::dangling("Unit", "department_id"),
        "users_employee_id_key" => ConstraintViolation::unique("User", &["employee_id"]),
        "users_ministry_fkey" => ConstraintViolation::dangling("User", "ministry_id"),
        "users_department_fkey" => ConstraintViolation::dangling("User", "department_id"),
        "users_unit_fkey" => ConstraintViolation::dangling("User", "unit_id"),
        "plans_user_fkey" => ConstraintViolation::dangling("Plan", "user_id"),
        "tasks_plan_fkey" => ConstraintViolation::dangling("Task", "plan_id"),
        "sessions_session_id_key" => ConstraintViolation::unique("Session", &["session_id"]),
        "sessions_token_key" => ConstraintViolation::unique("Session", &["token"]),
        "sessions_user_fkey" => ConstraintViolation::dangling("Session", "user_id"),
        _ => return None,
    };
    Some(violation)
}

fn dependent_relation(fkey: &str) -> &str {
    fkey.split('_').next().unwrap_or(fkey)
}
