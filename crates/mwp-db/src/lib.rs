//! # mwp-db
//!
//! Persistence layer for the ministry work planner.
//!
//! This crate provides:
//!
//! - Connection pool management and the embedded schema migrations
//! - A generic repository contract with filtering, sorting and pagination
//! - PostgreSQL repositories for every table
//! - An in-memory backend enforcing the same keys and delete policy
//!
//! ## Example
//!
//! ```ignore
//! use mwp_db::{Database, Repositories};
//!
//! let db = Database::connect(&config.database).await?;
//! db.migrate().await?;
//!
//! let repos = Repositories::postgres(db.pool().clone(), config.deletion);
//! let ministry = repos.ministries.find_by_name("Ministry of Works").await?;
//! ```

pub mod cascade;
pub mod departments;
pub mod memory;
pub mod ministries;
pub mod plans;
pub mod pool;
pub mod repository;
pub mod sessions;
pub mod sql;
pub mod tasks;
pub mod units;
pub mod users;

#[cfg(all(test, feature = "postgres-tests"))]
mod pg_tests;

use std::sync::Arc;

use mwp_core::config::DeletePolicy;
use sqlx::PgPool;

// Re-exports
pub use departments::{DepartmentFilter, DepartmentRepository, DepartmentSortField, PgDepartmentRepository};
pub use memory::{
    MemoryDatabase, MemoryDepartmentRepository, MemoryMinistryRepository, MemoryPlanRepository,
    MemorySessionRepository, MemoryTaskRepository, MemoryUnitRepository, MemoryUserRepository,
};
pub use ministries::{MinistryFilter, MinistryRepository, MinistrySortField, PgMinistryRepository};
pub use plans::{PgPlanRepository, PlanFilter, PlanRepository, PlanSortField};
pub use pool::{Database, PoolStats, MIGRATOR};
pub use repository::{FindMany, Record, RecordFilter, Repository, RepositoryError, RepositoryResult, Sort};
pub use sessions::{PgSessionRepository, SessionFilter, SessionRepository, SessionSortField};
pub use tasks::{PgTaskRepository, TaskFilter, TaskRepository, TaskSortField};
pub use units::{PgUnitRepository, UnitFilter, UnitRepository, UnitSortField};
pub use users::{PgUserRepository, UserFilter, UserRepository, UserSortField};

/// One repository per table, all on the same backend
#[derive(Clone)]
pub struct Repositories {
    pub ministries: Arc<dyn MinistryRepository>,
    pub departments: Arc<dyn DepartmentRepository>,
    pub units: Arc<dyn UnitRepository>,
    pub users: Arc<dyn UserRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Repositories {
    /// Repositories over a PostgreSQL pool
    pub fn postgres(pool: PgPool, policy: DeletePolicy) -> Self {
        Self {
            ministries: Arc::new(PgMinistryRepository::new(pool.clone(), policy)),
            departments: Arc::new(PgDepartmentRepository::new(pool.clone(), policy)),
            units: Arc::new(PgUnitRepository::new(pool.clone(), policy)),
            users: Arc::new(PgUserRepository::new(pool.clone(), policy)),
            plans: Arc::new(PgPlanRepository::new(pool.clone(), policy)),
            tasks: Arc::new(PgTaskRepository::new(pool.clone())),
            sessions: Arc::new(PgSessionRepository::new(pool)),
        }
    }

    /// Repositories over a fresh in-memory store
    pub fn in_memory(policy: DeletePolicy) -> Self {
        Self::memory(MemoryDatabase::new(policy))
    }

    /// Repositories sharing an existing in-memory store
    pub fn memory(db: MemoryDatabase) -> Self {
        Self {
            ministries: Arc::new(MemoryMinistryRepository::new(db.clone())),
            departments: Arc::new(MemoryDepartmentRepository::new(db.clone())),
            units: Arc::new(MemoryUnitRepository::new(db.clone())),
            users: Arc::new(MemoryUserRepository::new(db.clone())),
            plans: Arc::new(MemoryPlanRepository::new(db.clone())),
            tasks: Arc::new(MemoryTaskRepository::new(db.clone())),
            sessions: Arc::new(MemorySessionRepository::new(db)),
        }
    }
}
