//! User services
//!
//! Registration validates the plain password, then stores only its argon2
//! hash. Relation loading assembles a user with everything it points at and
//! everything pointing at it.

use mwp_auth::hash_password;
use mwp_contracts::{Contract, UserContract};
use mwp_core::error::MwpError;
use mwp_core::result::MwpResult;
use mwp_core::traits::Id;
use mwp_db::{PlanFilter, Repositories, Repository, SessionFilter, UserRepository};
use mwp_models::{Department, Ministry, NewUser, Plan, Session, Unit, UpdateUser, User};
use serde::Serialize;

use crate::base::validate;

/// A user with its placement, plans and sessions
#[derive(Debug, Clone, Serialize)]
pub struct UserWithRelations {
    pub user: User,
    pub ministry: Option<Ministry>,
    pub department: Option<Department>,
    pub unit: Option<Unit>,
    pub plans: Vec<Plan>,
    pub sessions: Vec<Session>,
}

/// Service for user accounts
#[derive(Clone)]
pub struct UserService {
    repos: Repositories,
    contract: UserContract,
}

impl UserService {
    pub fn new(repos: Repositories, contract: UserContract) -> Self {
        Self { repos, contract }
    }

    /// Create a user; `dto.password` holds the plain password
    pub async fn register(&self, mut dto: NewUser) -> MwpResult<User> {
        validate(&self.contract, &dto)?;
        dto.password = hash_password(&dto.password)?;

        let user = self.repos.users.create(dto).await?;
        tracing::info!(user_id = user.id, employee_id = %user.employee_id, "Registered user");
        Ok(user)
    }

    /// Update a user; a given password is plain and gets hashed
    pub async fn update(&self, id: Id, mut dto: UpdateUser) -> MwpResult<User> {
        let mut errors = self.contract.validate(&dto).err().unwrap_or_default();
        if let Some(password) = &dto.password {
            self.contract.validate_password(password, &mut errors);
        }
        errors.into_result().map_err(MwpError::Validation)?;

        if let Some(password) = dto.password.take() {
            dto.password = Some(hash_password(&password)?);
        }
        Ok(self.repos.users.update(id, dto).await?)
    }

    pub async fn change_password(&self, id: Id, password: &str) -> MwpResult<()> {
        self.update(
            id,
            UpdateUser {
                password: Some(password.to_string()),
                ..Default::default()
            },
        )
        .await?;
        tracing::info!(user_id = id, "Changed password");
        Ok(())
    }

    /// Move a user in the hierarchy; `None` clears a level
    pub async fn place(
        &self,
        id: Id,
        ministry_id: Option<Id>,
        department_id: Option<Id>,
        unit_id: Option<Id>,
    ) -> MwpResult<User> {
        let user = self
            .repos
            .users
            .update(id, UpdateUser::placement(ministry_id, department_id, unit_id))
            .await?;
        tracing::info!(user_id = id, ?ministry_id, ?department_id, ?unit_id, "Placed user");
        Ok(user)
    }

    pub async fn delete(&self, id: Id) -> MwpResult<()> {
        self.repos.users.delete(id).await?;
        tracing::info!(user_id = id, "Deleted user");
        Ok(())
    }

    pub async fn find_by_employee_id(&self, employee_id: &str) -> MwpResult<User> {
        self.repos
            .users
            .find_by_employee_id(employee_id)
            .await?
            .ok_or_else(|| MwpError::not_found("User", "employee_id", employee_id))
    }

    /// Load a user with placement, plans (calendar order) and sessions
    pub async fn with_relations(&self, id: Id) -> MwpResult<UserWithRelations> {
        let user = self.repos.users.get(id).await?;

        let ministry = match user.ministry_id {
            Some(ministry_id) => self.repos.ministries.find_by_id(ministry_id).await?,
            None => None,
        };
        let department = match user.department_id {
            Some(department_id) => self.repos.departments.find_by_id(department_id).await?,
            None => None,
        };
        let unit = match user.unit_id {
            Some(unit_id) => self.repos.units.find_by_id(unit_id).await?,
            None => None,
        };
        let plans = self.repos.plans.find_all(&PlanFilter::for_user(id)).await?;
        let sessions = self.repos.sessions.find_all(&SessionFilter::for_user(id)).await?;

        Ok(UserWithRelations {
            user,
            ministry,
            department,
            unit,
            plans,
            sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{employee_id, repos};
    use mwp_auth::verify_password;
    use mwp_models::{Month, NewMinistry, NewPlan, Week};

    fn service() -> UserService {
        UserService::new(repos(), UserContract::default())
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let service = service();
        let user = service
            .register(NewUser::new(employee_id(), "long-enough"))
            .await
            .unwrap();
        assert_ne!(user.password, "long-enough");
        assert!(verify_password("long-enough", &user.password));
    }

    #[tokio::test]
    async fn test_register_validates() {
        let service = service();
        let err = service.register(NewUser::new("!", "short")).await.unwrap_err();
        match err {
            MwpError::Validation(errors) => {
                assert!(errors.has_error("employee_id"));
                assert!(errors.has_error("password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_password_is_checked_and_hashed() {
        let service = service();
        let user = service
            .register(NewUser::new(employee_id(), "long-enough"))
            .await
            .unwrap();

        let err = service.change_password(user.id, "short").await.unwrap_err();
        assert!(err.is_validation());

        service.change_password(user.id, "another-long-one").await.unwrap();
        let stored = service.find_by_employee_id(&user.employee_id).await.unwrap();
        assert!(verify_password("another-long-one", &stored.password));
    }

    #[tokio::test]
    async fn test_unassigned_user_relations() {
        let service = service();
        let user = service
            .register(NewUser::new("EMP001", "long-enough"))
            .await
            .unwrap();

        let loaded = service.with_relations(user.id).await.unwrap();
        assert!(loaded.ministry.is_none());
        assert!(loaded.department.is_none());
        assert!(loaded.unit.is_none());
        assert!(loaded.plans.is_empty());
        assert!(loaded.sessions.is_empty());

        let json = serde_json::to_value(&loaded).unwrap();
        assert!(json["ministry"].is_null());
        assert!(json["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_placed_user_relations() {
        let repos = repos();
        let service = UserService::new(repos.clone(), UserContract::default());
        let ministry = repos.ministries.create(NewMinistry::new("Health")).await.unwrap();
        let user = service
            .register(NewUser::new("EMP001", "long-enough"))
            .await
            .unwrap();
        service.place(user.id, Some(ministry.id), None, None).await.unwrap();
        repos
            .plans
            .create(NewPlan::new(user.id, Month::February, Week::Week2))
            .await
            .unwrap();
        repos
            .plans
            .create(NewPlan::new(user.id, Month::January, Week::Week4))
            .await
            .unwrap();

        let loaded = service.with_relations(user.id).await.unwrap();
        assert_eq!(loaded.ministry.map(|m| m.name), Some("Health".to_string()));
        let months: Vec<Month> = loaded.plans.iter().map(|p| p.month).collect();
        assert_eq!(months, vec![Month::January, Month::February]);
    }

    #[tokio::test]
    async fn test_unknown_employee_id() {
        let err = service().find_by_employee_id("EMP404").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
