//! # mwp-contracts
//!
//! Write-time validation for the ministry work planner.
//!
//! Contracts check what a single write may do given the current state of the
//! records it touches: text formats, the approval lock on plans, and who may
//! approve. Integrity rules that need the whole table (uniqueness, references)
//! belong to the repositories.

pub mod base;
pub mod organization;
pub mod plans;
pub mod tasks;
pub mod users;

pub use base::*;
pub use organization::OrganizationContract;
pub use plans::{ApprovePlanContract, UpdatePlanContract};
pub use tasks::{CreateTaskContract, DeleteTaskContract, UpdateTaskContract};
pub use users::{CreateUserData, UserContract, UserData};
