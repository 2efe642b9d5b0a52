//! Core error types
//!
//! Every failure surfaced to callers is one of a small set of kinds. The three
//! domain kinds are not-found, constraint-violation and validation; the rest
//! describe infrastructure failures.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Core error type for all planner operations
#[derive(Error, Debug)]
pub enum MwpError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Constraint violation: {0}")]
    Constraint(#[from] ConstraintViolation),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MwpError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl ToString) -> Self {
        MwpError::NotFound {
            entity,
            field,
            value: value.to_string(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        MwpError::Unauthorized {
            message: message.into(),
        }
    }

    /// Single-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        MwpError::Validation(errors)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MwpError::NotFound { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, MwpError::Constraint(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, MwpError::Validation(_))
    }

    /// The constraint violation, if this is one
    pub fn constraint(&self) -> Option<&ConstraintViolation> {
        match self {
            MwpError::Constraint(violation) => Some(violation),
            _ => None,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            MwpError::NotFound { .. } => "not_found",
            MwpError::Constraint(violation) => match violation.kind {
                ConstraintKind::Unique => "unique_violation",
                ConstraintKind::MissingReference => "missing_reference",
                ConstraintKind::Restricted => "delete_restricted",
            },
            MwpError::Validation(_) => "validation_failed",
            MwpError::Unauthorized { .. } => "unauthorized",
            MwpError::Database(_) => "database_error",
            MwpError::Config(_) => "configuration_error",
            MwpError::Internal(_) => "internal_error",
        }
    }
}

/// What kind of integrity rule a write broke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// A unique (or compound unique) key is already taken
    Unique,
    /// A required foreign key points at a row that does not exist
    MissingReference,
    /// A delete is blocked by dependent rows under a restrict policy
    Restricted,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::MissingReference => "missing reference",
            ConstraintKind::Restricted => "restricted",
        };
        f.write_str(label)
    }
}

/// Integrity violation raised by a repository write
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{entity} ({kind}): {message}")]
pub struct ConstraintViolation {
    pub kind: ConstraintKind,
    /// Entity the write was addressed to
    pub entity: &'static str,
    /// Columns of the violated key, or the blocking relation name
    pub fields: Vec<&'static str>,
    pub message: String,
}

impl ConstraintViolation {
    pub fn unique(entity: &'static str, fields: &[&'static str]) -> Self {
        Self {
            kind: ConstraintKind::Unique,
            entity,
            fields: fields.to_vec(),
            message: format!("({}) has already been taken", fields.join(", ")),
        }
    }

    pub fn missing_reference(entity: &'static str, field: &'static str, id: impl fmt::Display) -> Self {
        Self {
            kind: ConstraintKind::MissingReference,
            entity,
            fields: vec![field],
            message: format!("{} {} does not reference an existing record", field, id),
        }
    }

    /// Missing reference reported by the database, which does not name the id
    pub fn dangling(entity: &'static str, field: &'static str) -> Self {
        Self {
            kind: ConstraintKind::MissingReference,
            entity,
            fields: vec![field],
            message: format!("{} does not reference an existing record", field),
        }
    }

    pub fn restricted(entity: &'static str, relation: &'static str, dependents: usize) -> Self {
        Self {
            kind: ConstraintKind::Restricted,
            entity,
            fields: vec![relation],
            message: format!("cannot delete while {} dependent {} exist", dependents, relation),
        }
    }

    pub fn involves(&self, field: &str) -> bool {
        self.fields.iter().any(|f| *f == field)
    }
}

/// Validation errors collection keyed by field name
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    /// Messages per field, in field order
    pub errors: BTreeMap<String, Vec<String>>,
    /// Messages about the record as a whole
    pub base_errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base_errors.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.base_errors.is_empty()
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.errors.get(field)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        self.base_errors.extend(other.base_errors);
    }

    pub fn full_messages(&self) -> Vec<String> {
        let mut messages = self.base_errors.clone();
        for (field, field_messages) in &self.errors {
            for msg in field_messages {
                messages.push(format!("{field} {msg}"));
            }
        }
        messages
    }

    /// `Ok(())` when empty, otherwise the collected errors
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_messages().join(", "))
    }
}

impl std::error::Error for ValidationErrors {}
