//! # mwp-core
//!
//! Core types, traits, and utilities for the ministry work planner.
//!
//! This crate provides the foundational building blocks used across all other crates:
//! - Common error types (not-found, constraint-violation, validation)
//! - Result type aliases
//! - Core traits (Entity, Identifiable, Timestamped)
//! - Pagination and sort types
//! - Configuration types, including the delete policy

pub mod config;
pub mod error;
pub mod pagination;
pub mod result;
pub mod traits;

pub use config::{AppConfig, ConfigError, DeletePolicy, ReferentialAction};
pub use error::*;
pub use pagination::*;
pub use result::*;
pub use traits::*;
