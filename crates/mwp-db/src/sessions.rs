//! Session repository
//!
//! Database operations for login sessions. `token` holds a digest of the
//! bearer token, never the token itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use mwp_models::{NewSession, Session, UpdateSession};
use sqlx::PgPool;

use crate::repository::{
    FindMany, Record, RecordFilter, Repository, RepositoryError, RepositoryResult, Sort, SortField, SortKey,
};
use crate::sql::{self, Conditions, UpdateSet};

/// Session query filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub user_id: Option<Id>,
    /// Last activity at or after this instant
    pub active_since: Option<DateTime<Utc>>,
    /// Last activity strictly before this instant
    pub inactive_since: Option<DateTime<Utc>>,
}

impl SessionFilter {
    pub fn for_user(user_id: Id) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }
}

impl RecordFilter<Session> for SessionFilter {
    fn matches(&self, session: &Session) -> bool {
        self.user_id.map_or(true, |id| session.user_id == id)
            && self.active_since.map_or(true, |at| session.last_activity >= at)
            && self.inactive_since.map_or(true, |at| session.last_activity < at)
    }

    fn push_conditions(&self, conditions: &mut Conditions<'_, '_>) {
        if let Some(user_id) = self.user_id {
            conditions.eq("user_id", user_id);
        }
        if let Some(at) = self.active_since {
            conditions.compare("last_activity", ">=", at);
        }
        if let Some(at) = self.inactive_since {
            conditions.compare("last_activity", "<", at);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSortField {
    Id,
    LastActivity,
    CreatedAt,
}

impl SortField<Session> for SessionSortField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::LastActivity => "last_activity",
            Self::CreatedAt => "created_at",
        }
    }

    fn key(&self, session: &Session) -> SortKey {
        match self {
            Self::Id => SortKey::Int(session.id),
            Self::LastActivity => SortKey::Time(session.last_activity),
            Self::CreatedAt => SortKey::Time(session.created_at),
        }
    }
}

impl Record for Session {
    type Create = NewSession;
    type Update = UpdateSession;
    type Filter = SessionFilter;
    type SortField = SessionSortField;

    const COLUMNS: &'static str =
        "id, session_id, user_id, token, ip_address, user_agent, last_activity, created_at, updated_at";

    fn default_sort() -> Vec<Sort<SessionSortField>> {
        vec![Sort::asc(SessionSortField::Id)]
    }
}

/// Session lookups and maintenance beyond the generic repository
#[async_trait]
pub trait SessionRepository: Repository<Session> {
    /// Find a session by token digest
    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<Session>>;

    /// Find a session by its public identifier
    async fn find_by_session_id(&self, session_id: &str) -> RepositoryResult<Option<Session>>;

    /// Record activity on a session
    async fn touch(&self, id: Id, at: DateTime<Utc>) -> RepositoryResult<()>;

    /// Delete every session of a user, returning how many were removed
    async fn delete_for_user(&self, user_id: Id) -> RepositoryResult<u64>;

    /// Delete sessions whose last activity is before `cutoff`
    async fn delete_inactive_since(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64>;
}

/// PostgreSQL session repository
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_column(&self, column: &str, value: &str) -> RepositoryResult<Option<Session>> {
        let row = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE {} = $1",
            Session::COLUMNS,
            column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl Repository<Session> for PgSessionRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Session>> {
        sql::find_by_id(&self.pool, id).await
    }

    async fn find_many(&self, query: &FindMany<Session>) -> RepositoryResult<PaginatedResult<Session>> {
        sql::find_many(&self.pool, query).await
    }

    async fn find_all(&self, filter: &SessionFilter) -> RepositoryResult<Vec<Session>> {
        sql::find_all(&self.pool, filter).await
    }

    async fn count(&self, filter: &SessionFilter) -> RepositoryResult<i64> {
        sql::count::<Session>(&self.pool, filter).await
    }

    async fn create(&self, dto: NewSession) -> RepositoryResult<Session> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "INSERT INTO sessions (session_id, user_id, token, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            Session::COLUMNS
        ))
        .bind(dto.session_id)
        .bind(dto.user_id)
        .bind(dto.token)
        .bind(dto.ip_address)
        .bind(dto.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn update(&self, id: Id, dto: UpdateSession) -> RepositoryResult<Session> {
        let mut set = UpdateSet::new("sessions");
        set.set_opt("last_activity", dto.last_activity)
            .set_opt("ip_address", dto.ip_address)
            .set_opt("user_agent", dto.user_agent);

        set.returning(id, Session::COLUMNS)
            .build_query_as::<Session>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::not_found::<Session>(id))
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found::<Session>(id));
        }
        Ok(())
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        sql::exists::<Session>(&self.pool, id).await
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<Session>> {
        self.find_by_column("token", token).await
    }

    async fn find_by_session_id(&self, session_id: &str) -> RepositoryResult<Option<Session>> {
        self.find_by_column("session_id", session_id).await
    }

    async fn touch(&self, id: Id, at: DateTime<Utc>) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE sessions SET last_activity = $1, updated_at = NOW() WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found::<Session>(id));
        }
        Ok(())
    }

    async fn delete_for_user(&self, user_id: Id) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_inactive_since(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_activity < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        tracing::debug!(removed = result.rows_affected(), %cutoff, "Purged inactive sessions");
        Ok(result.rows_affected())
    }
}
