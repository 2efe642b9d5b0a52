//! User contracts

use std::sync::LazyLock;

use mwp_core::error::ValidationErrors;
use mwp_models::{NewUser, UpdateUser};
use regex::Regex;

use crate::base::{validate_max_length, Contract, ValidationResult};

/// Valid employee number: starts alphanumeric, 2 to 64 characters
static EMPLOYEE_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_./\-]{1,63}$").expect("employee id pattern")
});

const ROLE_MAX: usize = 100;
const AVATAR_MAX: usize = 2048;
const PASSWORD_MAX: usize = 128;

/// User data for validation
pub trait UserData: Send + Sync {
    fn employee_id(&self) -> &str;
    fn role(&self) -> Option<&str>;
    fn avatar(&self) -> Option<&str>;
}

/// Extended user data for registration, carrying the plain password
pub trait CreateUserData: UserData {
    fn password(&self) -> &str;
}

/// A registration, before its password is hashed
impl UserData for NewUser {
    fn employee_id(&self) -> &str {
        &self.employee_id
    }

    fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }
}

impl CreateUserData for NewUser {
    fn password(&self) -> &str {
        &self.password
    }
}

/// Contract for creating and updating users
#[derive(Debug, Clone, Copy)]
pub struct UserContract {
    password_min_length: usize,
}

impl Default for UserContract {
    fn default() -> Self {
        Self::new(8)
    }
}

impl UserContract {
    pub fn new(password_min_length: usize) -> Self {
        Self { password_min_length }
    }

    /// Validate employee number format
    pub fn validate_employee_id(&self, employee_id: &str, errors: &mut ValidationErrors) {
        if employee_id.trim().is_empty() {
            errors.add("employee_id", "can't be blank");
            return;
        }

        if !EMPLOYEE_ID_PATTERN.is_match(employee_id) {
            errors.add(
                "employee_id",
                "is invalid. Use 2 to 64 letters, digits, underscores, periods, slashes or dashes",
            );
        }
    }

    /// Validate a plain password before it is hashed
    pub fn validate_password(&self, password: &str, errors: &mut ValidationErrors) {
        let length = password.chars().count();
        if length < self.password_min_length {
            errors.add(
                "password",
                format!("is too short (minimum is {} characters)", self.password_min_length),
            );
        }
        if length > PASSWORD_MAX {
            errors.add(
                "password",
                format!("is too long (maximum is {} characters)", PASSWORD_MAX),
            );
        }
    }

    fn validate_profile(&self, role: Option<&str>, avatar: Option<&str>, errors: &mut ValidationErrors) {
        if let Some(role) = role {
            validate_max_length("role", role, ROLE_MAX, errors);
        }
        if let Some(avatar) = avatar {
            validate_max_length("avatar", avatar, AVATAR_MAX, errors);
        }
    }
}

impl<T: CreateUserData> Contract<T> for UserContract {
    fn validate(&self, entity: &T) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        self.validate_employee_id(entity.employee_id(), &mut errors);
        self.validate_password(entity.password(), &mut errors);
        self.validate_profile(entity.role(), entity.avatar(), &mut errors);

        errors.into_result()
    }
}

impl Contract<UpdateUser> for UserContract {
    fn validate(&self, entity: &UpdateUser) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        if let Some(employee_id) = &entity.employee_id {
            self.validate_employee_id(employee_id, &mut errors);
        }
        self.validate_profile(
            entity.role.as_ref().and_then(|r| r.as_deref()),
            entity.avatar.as_ref().and_then(|a| a.as_deref()),
            &mut errors,
        );

        errors.into_result()
    }
}
