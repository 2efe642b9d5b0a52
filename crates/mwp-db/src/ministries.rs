//! Ministry repository
//!
//! Database operations for ministries.

use async_trait::async_trait;
use mwp_core::config::DeletePolicy;
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use mwp_models::{Ministry, NewMinistry, UpdateMinistry};
use sqlx::PgPool;

use crate::cascade;
use crate::repository::{
    contains_ignore_case, FindMany, Record, RecordFilter, Repository, RepositoryError, RepositoryResult, Sort,
    SortField, SortKey,
};
use crate::sql::{self, Conditions, UpdateSet};

/// Ministry query filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinistryFilter {
    pub name: Option<String>,
    pub name_contains: Option<String>,
}

impl RecordFilter<Ministry> for MinistryFilter {
    fn matches(&self, ministry: &Ministry) -> bool {
        self.name.as_ref().map_or(true, |name| &ministry.name == name)
            && self
                .name_contains
                .as_ref()
                .map_or(true, |needle| contains_ignore_case(&ministry.name, needle))
    }

    fn push_conditions(&self, conditions: &mut Conditions<'_, '_>) {
        if let Some(name) = &self.name {
            conditions.eq("name", name.clone());
        }
        if let Some(needle) = &self.name_contains {
            conditions.contains("name", needle);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinistrySortField {
    Id,
    Name,
    CreatedAt,
}

impl SortField<Ministry> for MinistrySortField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::CreatedAt => "created_at",
        }
    }

    fn key(&self, ministry: &Ministry) -> SortKey {
        match self {
            Self::Id => SortKey::Int(ministry.id),
            Self::Name => SortKey::Text(ministry.name.clone()),
            Self::CreatedAt => SortKey::Time(ministry.created_at),
        }
    }
}

impl Record for Ministry {
    type Create = NewMinistry;
    type Update = UpdateMinistry;
    type Filter = MinistryFilter;
    type SortField = MinistrySortField;

    const COLUMNS: &'static str = "id, name, description, created_at, updated_at";

    fn default_sort() -> Vec<Sort<MinistrySortField>> {
        vec![Sort::asc(MinistrySortField::Id)]
    }
}

/// Ministry lookups beyond the generic repository
#[async_trait]
pub trait MinistryRepository: Repository<Ministry> {
    /// Find a ministry by its unique name
    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Ministry>>;
}

/// PostgreSQL ministry repository
pub struct PgMinistryRepository {
    pool: PgPool,
    policy: DeletePolicy,
}

impl PgMinistryRepository {
    pub fn new(pool: PgPool, policy: DeletePolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl Repository<Ministry> for PgMinistryRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Ministry>> {
        sql::find_by_id(&self.pool, id).await
    }

    async fn find_many(&self, query: &FindMany<Ministry>) -> RepositoryResult<PaginatedResult<Ministry>> {
        sql::find_many(&self.pool, query).await
    }

    async fn find_all(&self, filter: &MinistryFilter) -> RepositoryResult<Vec<Ministry>> {
        sql::find_all(&self.pool, filter).await
    }

    async fn count(&self, filter: &MinistryFilter) -> RepositoryResult<i64> {
        sql::count::<Ministry>(&self.pool, filter).await
    }

    async fn create(&self, dto: NewMinistry) -> RepositoryResult<Ministry> {
        let ministry = sqlx::query_as::<_, Ministry>(&format!(
            "INSERT INTO ministries (name, description) VALUES ($1, $2) RETURNING {}",
            Ministry::COLUMNS
        ))
        .bind(dto.name)
        .bind(dto.description)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(ministry_id = ministry.id, name = %ministry.name, "Created ministry");
        Ok(ministry)
    }

    async fn update(&self, id: Id, dto: UpdateMinistry) -> RepositoryResult<Ministry> {
        let mut set = UpdateSet::new("ministries");
        set.set_opt("name", dto.name)
            .set_opt("description", dto.description);

        set.returning(id, Ministry::COLUMNS)
            .build_query_as::<Ministry>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::not_found::<Ministry>(id))
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        cascade::delete_org_node::<Ministry>(&self.pool, &self.policy, id).await?;
        tracing::info!(ministry_id = id, "Deleted ministry");
        Ok(())
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        sql::exists::<Ministry>(&self.pool, id).await
    }
}

#[async_trait]
impl MinistryRepository for PgMinistryRepository {
    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Ministry>> {
        let row = sqlx::query_as::<_, Ministry>(&format!(
            "SELECT {} FROM ministries WHERE name = $1",
            Ministry::COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ministry(id: Id, name: &str) -> Ministry {
        let now = Utc::now();
        Ministry {
            id,
            name: name.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_filter_matches() {
        let filter = MinistryFilter {
            name_contains: Some("heal".into()),
            ..Default::default()
        };
        assert!(filter.matches(&ministry(1, "Ministry of Health")));
        assert!(!filter.matches(&ministry(2, "Ministry of Finance")));
        assert!(MinistryFilter::default().matches(&ministry(3, "Anything")));
    }

    #[test]
    fn test_sort_by_name() {
        let query = FindMany::<Ministry>::default()
            .sorted_by(MinistrySortField::Name, mwp_core::pagination::SortDirection::Asc);
        let a = ministry(2, "Agriculture");
        let b = ministry(1, "Health");
        assert!(query.compare(&a, &b).is_lt());
        assert!(FindMany::<Ministry>::default().compare(&a, &b).is_gt());
    }
}
