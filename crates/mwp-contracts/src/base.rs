//! Base contract system

use mwp_core::error::ValidationErrors;
use mwp_core::traits::Id;
use mwp_models::User;

/// Result of contract validation
pub type ValidationResult = Result<(), ValidationErrors>;

/// The user on whose behalf a write is performed
pub trait Actor: Send + Sync {
    fn id(&self) -> Id;

    /// May approve plans of other users
    fn is_supervisor(&self) -> bool;
}

impl Actor for User {
    fn id(&self) -> Id {
        self.id
    }

    fn is_supervisor(&self) -> bool {
        User::is_supervisor(self)
    }
}

/// Base contract trait
pub trait Contract<T>: Send + Sync {
    /// Validate the entity
    fn validate(&self, entity: &T) -> ValidationResult;
}

/// Copy the errors of a `validator` derive into the contract's error set
pub fn merge_derived(errors: &mut ValidationErrors, derived: Result<(), validator::ValidationErrors>) {
    if let Err(derived) = derived {
        for (field, field_errors) in derived.field_errors() {
            for error in field_errors.iter() {
                let message = match &error.message {
                    Some(message) => message.to_string(),
                    None => format!("is invalid ({})", error.code),
                };
                errors.add(field, message);
            }
        }
    }
}

/// Blank after trimming; skipped when the field already carries an error
pub fn validate_present(field: &str, value: &str, errors: &mut ValidationErrors) {
    if !errors.has_error(field) && value.trim().is_empty() {
        errors.add(field, "can't be blank");
    }
}

/// Length ceiling for fields the derive does not cover
pub fn validate_max_length(field: &str, value: &str, max: usize, errors: &mut ValidationErrors) {
    if value.chars().count() > max {
        errors.add(field, format!("is too long (maximum is {} characters)", max));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Named {
        #[validate(length(min = 1, max = 5))]
        name: String,
    }

    #[test]
    fn test_merge_derived() {
        let mut errors = ValidationErrors::new();
        merge_derived(&mut errors, Named { name: "too long".into() }.validate());
        assert!(errors.has_error("name"));

        let mut errors = ValidationErrors::new();
        merge_derived(&mut errors, Named { name: "ok".into() }.validate());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_validate_present() {
        let mut errors = ValidationErrors::new();
        validate_present("title", "   ", &mut errors);
        assert_eq!(errors.get("title").unwrap(), &vec!["can't be blank".to_string()]);

        // A field already flagged is not reported twice
        validate_present("title", "", &mut errors);
        assert_eq!(errors.get("title").unwrap().len(), 1);
    }

    #[test]
    fn test_validate_max_length() {
        let mut errors = ValidationErrors::new();
        validate_max_length("notes", "abcdef", 5, &mut errors);
        assert!(errors.has_error("notes"));
    }
}
