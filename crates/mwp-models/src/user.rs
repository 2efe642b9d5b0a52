//! User model
//!
//! Table: users

use chrono::{DateTime, Utc};
use mwp_core::traits::Id;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User entity
///
/// An employee account. Placement in the hierarchy is optional and the three
/// placement keys are independent of one another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Id,

    /// Employee number (unique)
    pub employee_id: String,

    /// Argon2 PHC hash, never the plain password
    #[serde(skip_serializing)]
    pub password: String,

    pub role: Option<String>,

    pub head_of_department: bool,
    pub head_of_service: bool,
    pub head_of_unit: bool,
    pub permanent_secretary: bool,
    pub staff: bool,

    pub avatar: Option<String>,

    pub ministry_id: Option<Id>,
    pub department_id: Option<Id>,
    pub unit_id: Option<Id>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(User, "users", "User");

impl User {
    /// Holds any head flag or is the permanent secretary
    pub fn is_supervisor(&self) -> bool {
        self.head_of_unit || self.head_of_department || self.head_of_service || self.permanent_secretary
    }

    /// Not placed anywhere in the hierarchy
    pub fn is_unassigned(&self) -> bool {
        self.ministry_id.is_none() && self.department_id.is_none() && self.unit_id.is_none()
    }
}

/// New user creation parameters
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 64))]
    pub employee_id: String,

    /// Plain for `UserService::register`, an argon2 hash once it reaches a repository
    #[validate(length(min = 1))]
    pub password: String,

    #[validate(length(max = 100))]
    pub role: Option<String>,

    #[serde(default)]
    pub head_of_department: bool,
    #[serde(default)]
    pub head_of_service: bool,
    #[serde(default)]
    pub head_of_unit: bool,
    #[serde(default)]
    pub permanent_secretary: bool,
    #[serde(default)]
    pub staff: bool,

    pub avatar: Option<String>,

    pub ministry_id: Option<Id>,
    pub department_id: Option<Id>,
    pub unit_id: Option<Id>,
}

impl NewUser {
    pub fn new(employee_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            employee_id: employee_id.into(),
            password: password.into(),
            role: None,
            head_of_department: false,
            head_of_service: false,
            head_of_unit: false,
            permanent_secretary: false,
            staff: false,
            avatar: None,
            ministry_id: None,
            department_id: None,
            unit_id: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn in_ministry(mut self, ministry_id: Id) -> Self {
        self.ministry_id = Some(ministry_id);
        self
    }

    pub fn in_department(mut self, department_id: Id) -> Self {
        self.department_id = Some(department_id);
        self
    }

    pub fn in_unit(mut self, unit_id: Id) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    pub fn as_staff(mut self) -> Self {
        self.staff = true;
        self
    }

    pub fn as_head_of_unit(mut self) -> Self {
        self.head_of_unit = true;
        self
    }

    pub fn as_head_of_department(mut self) -> Self {
        self.head_of_department = true;
        self
    }
}

/// User update parameters; `Some(None)` clears a nullable column
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub employee_id: Option<String>,
    /// Already hashed
    pub password: Option<String>,
    pub role: Option<Option<String>>,
    pub head_of_department: Option<bool>,
    pub head_of_service: Option<bool>,
    pub head_of_unit: Option<bool>,
    pub permanent_secretary: Option<bool>,
    pub staff: Option<bool>,
    pub avatar: Option<Option<String>>,
    pub ministry_id: Option<Option<Id>>,
    pub department_id: Option<Option<Id>>,
    pub unit_id: Option<Option<Id>>,
}

impl UpdateUser {
    /// Move the user to a new placement, clearing levels given as `None`
    pub fn placement(ministry_id: Option<Id>, department_id: Option<Id>, unit_id: Option<Id>) -> Self {
        Self {
            ministry_id: Some(ministry_id),
            department_id: Some(department_id),
            unit_id: Some(unit_id),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 1,
            employee_id: "EMP001".to_string(),
            password: "$argon2id$hash".to_string(),
            role: None,
            head_of_department: false,
            head_of_service: false,
            head_of_unit: false,
            permanent_secretary: false,
            staff: true,
            avatar: None,
            ministry_id: None,
            department_id: None,
            unit_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_supervisor_flags() {
        let mut u = user();
        assert!(!u.is_supervisor());
        u.permanent_secretary = true;
        assert!(u.is_supervisor());
    }

    #[test]
    fn test_password_is_not_serialized() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["employee_id"], "EMP001");
    }

    #[test]
    fn test_new_user_defaults() {
        let new = NewUser::new("EMP002", "hash");
        assert!(!new.staff && !new.head_of_unit && !new.permanent_secretary);
        assert!(new.ministry_id.is_none());
        assert!(new.validate().is_ok());
        assert!(NewUser::new("", "hash").validate().is_err());
    }
}
