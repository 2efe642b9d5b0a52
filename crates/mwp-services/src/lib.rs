//! # mwp-services
//!
//! Business logic services for the ministry work planner.
//!
//! Services run contracts against the current state of the records a write
//! touches, then hand the write to the repositories. Relation loading and
//! plan progress live here too.

pub mod base;
pub mod organization;
pub mod plans;
pub mod tasks;
pub mod users;

use mwp_auth::SessionManager;
use mwp_contracts::UserContract;
use mwp_core::config::AppConfig;
use mwp_db::Repositories;

pub use organization::{DepartmentTree, MinistryTree, OrganizationService};
pub use plans::{PlanProgress, PlanService, PlanWithTasks};
pub use tasks::TaskService;
pub use users::{UserService, UserWithRelations};

/// Every service over one set of repositories
#[derive(Clone)]
pub struct Services {
    pub organization: OrganizationService,
    pub users: UserService,
    pub plans: PlanService,
    pub tasks: TaskService,
    pub sessions: SessionManager,
}

impl Services {
    pub fn new(repos: Repositories, config: &AppConfig) -> Self {
        Self {
            organization: OrganizationService::new(repos.clone()),
            users: UserService::new(repos.clone(), UserContract::new(config.auth.password_min_length)),
            plans: PlanService::new(repos.clone()),
            tasks: TaskService::new(repos.clone()),
            sessions: SessionManager::new(repos.users, repos.sessions, &config.auth),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use fake::Fake;
    use mwp_core::config::DeletePolicy;
    use mwp_core::pagination::PaginatedResult;
    use mwp_core::traits::Id;
    use mwp_db::{FindMany, PlanFilter, PlanRepository, Repositories, Repository, RepositoryResult};
    use mwp_models::{Day, Month, NewPlan, NewTask, NewUser, Plan, Priority, UpdatePlan, User, Week};

    pub fn repos() -> Repositories {
        repos_with(DeletePolicy::default())
    }

    pub fn repos_with(policy: DeletePolicy) -> Repositories {
        Repositories::in_memory(policy)
    }

    /// A random employee number such as `EMP4821`
    pub fn employee_id() -> String {
        format!("EMP{}", (1000..10000).fake::<u32>())
    }

    /// Staff member stored straight through the repository
    pub async fn seed_user(repos: &Repositories, employee_id: &str) -> User {
        repos
            .users
            .create(NewUser::new(employee_id, "not-a-real-hash").as_staff())
            .await
            .unwrap()
    }

    pub async fn supervisor(repos: &Repositories, employee_id: &str) -> User {
        repos
            .users
            .create(NewUser::new(employee_id, "not-a-real-hash").as_head_of_unit())
            .await
            .unwrap()
    }

    pub fn sample_task(plan_id: i64, day: Day) -> NewTask {
        NewTask::new(plan_id, day, "Draft report", Priority::High, "09:00-11:00", "2025-01-06")
    }

    /// Plans that always read as unapproved, as a caller sees them when an
    /// approval commits right after its read
    pub struct StalePlans(pub Arc<dyn PlanRepository>);

    /// `repos` with plan reads that miss approvals
    pub fn with_stale_plans(repos: &Repositories) -> Repositories {
        Repositories {
            plans: Arc::new(StalePlans(repos.plans.clone())),
            ..repos.clone()
        }
    }

    #[async_trait]
    impl Repository<Plan> for StalePlans {
        async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Plan>> {
            let plan = self.0.find_by_id(id).await?;
            Ok(plan.map(|plan| Plan {
                approved: false,
                ..plan
            }))
        }

        async fn find_many(&self, query: &FindMany<Plan>) -> RepositoryResult<PaginatedResult<Plan>> {
            self.0.find_many(query).await
        }

        async fn count(&self, filter: &PlanFilter) -> RepositoryResult<i64> {
            self.0.count(filter).await
        }

        async fn create(&self, dto: NewPlan) -> RepositoryResult<Plan> {
            self.0.create(dto).await
        }

        async fn update(&self, id: Id, dto: UpdatePlan) -> RepositoryResult<Plan> {
            self.0.update(id, dto).await
        }

        async fn delete(&self, id: Id) -> RepositoryResult<()> {
            self.0.delete(id).await
        }

        async fn exists(&self, id: Id) -> RepositoryResult<bool> {
            self.0.exists(id).await
        }
    }

    #[async_trait]
    impl PlanRepository for StalePlans {
        async fn update_open(&self, id: Id, dto: UpdatePlan) -> RepositoryResult<Plan> {
            self.0.update_open(id, dto).await
        }

        async fn delete_open(&self, id: Id) -> RepositoryResult<()> {
            self.0.delete_open(id).await
        }

        async fn find_by_period(&self, user_id: Id, month: Month, week: Week) -> RepositoryResult<Vec<Plan>> {
            self.0.find_by_period(user_id, month, week).await
        }
    }

    #[test]
    fn test_employee_id_shape() {
        let id = employee_id();
        assert!(id.starts_with("EMP"));
        assert_eq!(id.len(), 7);
    }
}
