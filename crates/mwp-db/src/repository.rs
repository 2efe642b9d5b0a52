//! Repository traits and shared query types
//!
//! Every entity is reached through the same generic `Repository<T>`. The
//! `Record` trait binds an entity to its create/update parameters, its filter
//! and the fields it can be sorted by, so a single trait covers all tables.

use std::cmp::Ordering;
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mwp_core::error::{ConstraintViolation, MwpError, ValidationErrors};
use mwp_core::pagination::{PaginatedResult, Pagination, SortDirection, MAX_LIMIT};
use mwp_core::traits::{Entity, Id};
use sqlx::postgres::PgRow;

use crate::sql::Conditions;

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{entity} not found with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Constraint violation: {0}")]
    Constraint(ConstraintViolation),

    /// The write needs an unapproved plan and found an approved one
    #[error("{entity} {id} is approved and locked")]
    Locked { entity: &'static str, id: Id },

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl RepositoryError {
    pub fn not_found<T: Entity>(id: Id) -> Self {
        RepositoryError::NotFound {
            entity: T::TYPE_NAME,
            field: "id",
            value: id.to_string(),
        }
    }

    pub fn locked<T: Entity>(id: Id) -> Self {
        RepositoryError::Locked {
            entity: T::TYPE_NAME,
            id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, RepositoryError::Locked { .. })
    }

    pub fn constraint(&self) -> Option<&ConstraintViolation> {
        match self {
            RepositoryError::Constraint(violation) => Some(violation),
            _ => None,
        }
    }
}

impl From<ConstraintViolation> for RepositoryError {
    fn from(violation: ConstraintViolation) -> Self {
        RepositoryError::Constraint(violation)
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match crate::sql::constraint_violation(&err) {
            Some(violation) => RepositoryError::Constraint(violation),
            None => RepositoryError::Database(err),
        }
    }
}

impl From<RepositoryError> for MwpError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, field, value } => MwpError::NotFound { entity, field, value },
            RepositoryError::Constraint(violation) => MwpError::Constraint(violation),
            RepositoryError::Locked { entity, id } => {
                let mut errors = ValidationErrors::new();
                errors.add_base(format!("{entity} {id} is approved; it and its tasks can no longer be changed"));
                MwpError::Validation(errors)
            }
            RepositoryError::Database(e) => MwpError::Database(e.to_string()),
        }
    }
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// An entity stored in its own table
pub trait Record:
    Entity + Debug + Clone + Unpin + for<'r> sqlx::FromRow<'r, PgRow> + 'static
{
    /// Creation parameters
    type Create: Debug + Send + Sync + 'static;
    /// Update parameters; absent fields are left untouched
    type Update: Debug + Send + Sync + 'static;
    type Filter: RecordFilter<Self>;
    type SortField: SortField<Self>;

    /// Column list selected for this record
    const COLUMNS: &'static str;

    /// Ordering used when a query does not ask for one
    fn default_sort() -> Vec<Sort<Self::SortField>>;
}

/// Filter over one record type, usable by both backends
pub trait RecordFilter<T>: Debug + Default + Clone + Send + Sync + 'static {
    /// In-memory evaluation
    fn matches(&self, record: &T) -> bool;

    /// SQL evaluation; must select the same rows as `matches`
    fn push_conditions(&self, conditions: &mut Conditions<'_, '_>);
}

/// Sortable column of a record type
pub trait SortField<T>: Debug + Copy + Send + Sync + 'static {
    fn column(&self) -> &'static str;

    /// Value compared when sorting in memory
    fn key(&self, record: &T) -> SortKey;
}

/// Comparable sort value
///
/// `Null` sorts after every value, matching PostgreSQL's default of NULLS LAST
/// for ascending order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Bool(bool),
    Int(i64),
    Time(DateTime<Utc>),
    Text(String),
    Null,
}

impl From<Option<String>> for SortKey {
    fn from(value: Option<String>) -> Self {
        value.map_or(SortKey::Null, SortKey::Text)
    }
}

/// In-memory counterpart of `Conditions::contains`
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// One ORDER BY term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<F> {
    pub field: F,
    pub direction: SortDirection,
}

impl<F> Sort<F> {
    pub fn asc(field: F) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: F) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// Query for `Repository::find_many`
#[derive(Debug, Clone)]
pub struct FindMany<T: Record> {
    pub filter: T::Filter,
    /// Empty means `T::default_sort()`
    pub sort: Vec<Sort<T::SortField>>,
    pub pagination: Pagination,
}

impl<T: Record> Default for FindMany<T> {
    fn default() -> Self {
        Self {
            filter: T::Filter::default(),
            sort: Vec::new(),
            pagination: Pagination::default(),
        }
    }
}

impl<T: Record> FindMany<T> {
    pub fn new(filter: T::Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sorted_by(mut self, field: T::SortField, direction: SortDirection) -> Self {
        self.sort.push(Sort { field, direction });
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn effective_sort(&self) -> Vec<Sort<T::SortField>> {
        if self.sort.is_empty() {
            T::default_sort()
        } else {
            self.sort.clone()
        }
    }

    /// Compare two records by the effective sort, ties broken by id
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        self.effective_sort()
            .iter()
            .map(|s| s.direction.apply(s.field.key(a).cmp(&s.field.key(b))))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.id().cmp(&b.id()))
    }
}

/// Base repository trait for CRUD operations
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Find an entity by ID
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<T>>;

    /// Find an entity by ID, failing with not-found when it is missing
    async fn get(&self, id: Id) -> RepositoryResult<T> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found::<T>(id))
    }

    /// Filtered, sorted, paginated listing
    async fn find_many(&self, query: &FindMany<T>) -> RepositoryResult<PaginatedResult<T>>;

    /// Every matching row in default sort order, with no page limit
    ///
    /// Walks `find_many` pages of `MAX_LIMIT` rows; backends that can read
    /// the whole set in one query override it.
    async fn find_all(&self, filter: &T::Filter) -> RepositoryResult<Vec<T>> {
        let mut rows = Vec::new();
        loop {
            let page = Pagination::new(MAX_LIMIT, rows.len() as i64);
            let query = FindMany::<T>::new(filter.clone()).paginate(page);
            let result = self.find_many(&query).await?;
            let fetched = result.items.len();
            rows.extend(result.items);
            if fetched < MAX_LIMIT as usize || rows.len() as i64 >= result.total {
                return Ok(rows);
            }
        }
    }

    /// Count entities matching a filter
    async fn count(&self, filter: &T::Filter) -> RepositoryResult<i64>;

    /// Create a new entity
    async fn create(&self, dto: T::Create) -> RepositoryResult<T>;

    /// Update an existing entity
    async fn update(&self, id: Id, dto: T::Update) -> RepositoryResult<T>;

    /// Delete an entity by ID, applying the delete policy to its dependents
    async fn delete(&self, id: Id) -> RepositoryResult<()>;

    /// Check if an entity exists
    async fn exists(&self, id: Id) -> RepositoryResult<bool>;
}
