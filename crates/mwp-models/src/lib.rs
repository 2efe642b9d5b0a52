//! # mwp-models
//!
//! Domain models for the ministry work planner.
//!
//! This crate contains the entity structs that map to the planner's tables,
//! the closed enumerations stored in them, and the create/update parameter
//! types consumed by repositories. Each model implements the core traits from
//! `mwp-core` (Entity, Identifiable, Timestamped).

pub use mwp_core::traits::{Entity, Id, Identifiable, Timestamped};

#[macro_use]
mod macros;

pub mod calendar;
pub mod organization;
pub mod plan;
pub mod session;
pub mod task;
pub mod user;

// Re-exports for convenience
pub use calendar::{Day, Month, Week};
pub use organization::{
    Department, Ministry, NewDepartment, NewMinistry, NewUnit, Unit, UpdateDepartment,
    UpdateMinistry, UpdateUnit,
};
pub use plan::{NewPlan, Plan, UpdatePlan};
pub use session::{NewSession, Session, UpdateSession};
pub use task::{Completion, NewTask, Priority, Task, TaskStatus, UpdateTask};
pub use user::{NewUser, UpdateUser, User};
