//! Organizational hierarchy: ministries, departments and units
//!
//! Tables: ministries, departments, units

use chrono::{DateTime, Utc};
use mwp_core::traits::Id;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Ministry entity, the top of the hierarchy
///
/// Owns departments, units (directly) and users placed directly under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ministry {
    pub id: Id,

    /// Ministry name (globally unique)
    pub name: String,

    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Ministry, "ministries", "Ministry");

/// Department entity
///
/// The name is unique within its ministry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Department {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub ministry_id: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Department, "departments", "Department");

/// Unit entity
///
/// `ministry_id` is a copy of the department's ministry, kept for direct
/// lookups. It is never written by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Unit {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub department_id: Id,
    pub ministry_id: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Unit, "units", "Unit");

/// Ministry creation parameters
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMinistry {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

impl NewMinistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ministry update parameters; `Some(None)` clears a nullable column
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMinistry {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

/// Department creation parameters
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewDepartment {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    pub ministry_id: Id,
}

impl NewDepartment {
    pub fn new(name: impl Into<String>, ministry_id: Id) -> Self {
        Self {
            name: name.into(),
            description: None,
            ministry_id,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Department update parameters
///
/// Moving a department to another ministry moves its units with it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDepartment {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub ministry_id: Option<Id>,
}

/// Unit creation parameters; the ministry is taken from the department
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUnit {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    pub department_id: Id,
}

impl NewUnit {
    pub fn new(name: impl Into<String>, department_id: Id) -> Self {
        Self {
            name: name.into(),
            description: None,
            department_id,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Unit update parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUnit {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub department_id: Option<Id>,
}
