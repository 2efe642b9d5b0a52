//! In-memory users and sessions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mwp_core::error::ConstraintViolation;
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use mwp_models::{Department, Ministry, NewSession, NewUser, Session, Unit, UpdateSession, UpdateUser, User};

use super::{MemoryDatabase, MemoryState};
use crate::repository::{FindMany, Repository, RepositoryError, RepositoryResult};
use crate::sessions::{SessionFilter, SessionRepository};
use crate::users::{UserFilter, UserRepository};

fn check_user(state: &MemoryState, user: &User, except: Option<Id>) -> RepositoryResult<()> {
    if state
        .users
        .iter()
        .any(|u| u.employee_id == user.employee_id && Some(u.id) != except)
    {
        return Err(ConstraintViolation::unique("User", &["employee_id"]).into());
    }
    if let Some(id) = user.ministry_id {
        state.require::<Ministry>("User", "ministry_id", id)?;
    }
    if let Some(id) = user.department_id {
        state.require::<Department>("User", "department_id", id)?;
    }
    if let Some(id) = user.unit_id {
        state.require::<Unit>("User", "unit_id", id)?;
    }
    Ok(())
}

/// In-memory user repository
#[derive(Clone)]
pub struct MemoryUserRepository {
    db: MemoryDatabase,
}

impl MemoryUserRepository {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Repository<User> for MemoryUserRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<User>> {
        Ok(self.db.find_by_id(id))
    }

    async fn find_many(&self, query: &FindMany<User>) -> RepositoryResult<PaginatedResult<User>> {
        Ok(self.db.find_many(query))
    }

    async fn find_all(&self, filter: &UserFilter) -> RepositoryResult<Vec<User>> {
        Ok(self.db.find_all(filter))
    }

    async fn count(&self, filter: &UserFilter) -> RepositoryResult<i64> {
        Ok(self.db.count::<User>(filter))
    }

    async fn create(&self, dto: NewUser) -> RepositoryResult<User> {
        self.db.write(|state| {
            let now = Utc::now();
            let user = User {
                id: 0,
                employee_id: dto.employee_id,
                password: dto.password,
                role: dto.role,
                head_of_department: dto.head_of_department,
                head_of_service: dto.head_of_service,
                head_of_unit: dto.head_of_unit,
                permanent_secretary: dto.permanent_secretary,
                staff: dto.staff,
                avatar: dto.avatar,
                ministry_id: dto.ministry_id,
                department_id: dto.department_id,
                unit_id: dto.unit_id,
                created_at: now,
                updated_at: now,
            };
            check_user(state, &user, None)?;
            Ok(state.users.insert_with(|id| User { id, ..user }))
        })
    }

    async fn update(&self, id: Id, dto: UpdateUser) -> RepositoryResult<User> {
        self.db.write(|state| {
            let mut user = state
                .users
                .get(id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found::<User>(id))?;

            if let Some(employee_id) = dto.employee_id {
                user.employee_id = employee_id;
            }
            if let Some(password) = dto.password {
                user.password = password;
            }
            if let Some(role) = dto.role {
                user.role = role;
            }
            if let Some(flag) = dto.head_of_department {
                user.head_of_department = flag;
            }
            if let Some(flag) = dto.head_of_service {
                user.head_of_service = flag;
            }
            if let Some(flag) = dto.head_of_unit {
                user.head_of_unit = flag;
            }
            if let Some(flag) = dto.permanent_secretary {
                user.permanent_secretary = flag;
            }
            if let Some(flag) = dto.staff {
                user.staff = flag;
            }
            if let Some(avatar) = dto.avatar {
                user.avatar = avatar;
            }
            if let Some(ministry_id) = dto.ministry_id {
                user.ministry_id = ministry_id;
            }
            if let Some(department_id) = dto.department_id {
                user.department_id = department_id;
            }
            if let Some(unit_id) = dto.unit_id {
                user.unit_id = unit_id;
            }
            user.updated_at = Utc::now();

            check_user(state, &user, Some(id))?;
            if let Some(stored) = state.users.get_mut(id) {
                *stored = user.clone();
            }
            Ok(user)
        })
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        self.db.transaction(|state, policy| {
            if !state.users.contains(id) {
                return Err(RepositoryError::not_found::<User>(id));
            }
            state.delete_users(policy, &[id])
        })
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        Ok(self.db.exists::<User>(id))
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_employee_id(&self, employee_id: &str) -> RepositoryResult<Option<User>> {
        Ok(self
            .db
            .read(|state| state.users.iter().find(|u| u.employee_id == employee_id).cloned()))
    }
}

/// In-memory session repository
#[derive(Clone)]
pub struct MemorySessionRepository {
    db: MemoryDatabase,
}

impl MemorySessionRepository {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }

    fn find_where(&self, predicate: impl Fn(&Session) -> bool) -> Option<Session> {
        self.db
            .read(|state| state.sessions.iter().find(|&s| predicate(s)).cloned())
    }
}

#[async_trait]
impl Repository<Session> for MemorySessionRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Session>> {
        Ok(self.db.find_by_id(id))
    }

    async fn find_many(&self, query: &FindMany<Session>) -> RepositoryResult<PaginatedResult<Session>> {
        Ok(self.db.find_many(query))
    }

    async fn find_all(&self, filter: &SessionFilter) -> RepositoryResult<Vec<Session>> {
        Ok(self.db.find_all(filter))
    }

    async fn count(&self, filter: &SessionFilter) -> RepositoryResult<i64> {
        Ok(self.db.count::<Session>(filter))
    }

    async fn create(&self, dto: NewSession) -> RepositoryResult<Session> {
        self.db.write(|state| {
            if state.sessions.iter().any(|s| s.session_id == dto.session_id) {
                return Err(ConstraintViolation::unique("Session", &["session_id"]).into());
            }
            if state.sessions.iter().any(|s| s.token == dto.token) {
                return Err(ConstraintViolation::unique("Session", &["token"]).into());
            }
            state.require::<User>("Session", "user_id", dto.user_id)?;

            let now = Utc::now();
            Ok(state.sessions.insert_with(|id| Session {
                id,
                session_id: dto.session_id,
                user_id: dto.user_id,
                token: dto.token,
                ip_address: dto.ip_address,
                user_agent: dto.user_agent,
                last_activity: now,
                created_at: now,
                updated_at: now,
            }))
        })
    }

    async fn update(&self, id: Id, dto: UpdateSession) -> RepositoryResult<Session> {
        self.db.write(|state| {
            let session = state
                .sessions
                .get_mut(id)
                .ok_or_else(|| RepositoryError::not_found::<Session>(id))?;
            if let Some(at) = dto.last_activity {
                session.last_activity = at;
            }
            if let Some(ip_address) = dto.ip_address {
                session.ip_address = ip_address;
            }
            if let Some(user_agent) = dto.user_agent {
                session.user_agent = user_agent;
            }
            session.updated_at = Utc::now();
            Ok(session.clone())
        })
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        self.db.delete_leaf::<Session>(id)
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        Ok(self.db.exists::<Session>(id))
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<Session>> {
        Ok(self.find_where(|s| s.token == token))
    }

    async fn find_by_session_id(&self, session_id: &str) -> RepositoryResult<Option<Session>> {
        Ok(self.find_where(|s| s.session_id == session_id))
    }

    async fn touch(&self, id: Id, at: DateTime<Utc>) -> RepositoryResult<()> {
        self.db.write(|state| {
            let session = state
                .sessions
                .get_mut(id)
                .ok_or_else(|| RepositoryError::not_found::<Session>(id))?;
            session.last_activity = at;
            session.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn delete_for_user(&self, user_id: Id) -> RepositoryResult<u64> {
        self.db
            .write(|state| Ok(state.sessions.remove_where(|s| s.user_id == user_id) as u64))
    }

    async fn delete_inactive_since(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let removed = self
            .db
            .write(|state| Ok(state.sessions.remove_where(|s| s.last_activity < cutoff) as u64))?;
        tracing::debug!(removed, %cutoff, "Purged inactive sessions");
        Ok(removed)
    }
}
