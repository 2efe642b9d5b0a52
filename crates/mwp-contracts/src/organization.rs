//! Contracts for ministries, departments and units
//!
//! Names must be present and at most 255 characters; descriptions at most
//! 2000. Uniqueness is left to the repositories, which own the indexes.

use mwp_core::error::ValidationErrors;
use mwp_models::{
    NewDepartment, NewMinistry, NewUnit, UpdateDepartment, UpdateMinistry, UpdateUnit,
};
use validator::Validate;

use crate::base::{merge_derived, validate_max_length, validate_present, Contract, ValidationResult};

const NAME_MAX: usize = 255;
const DESCRIPTION_MAX: usize = 2000;

/// Contract for writes to any organization node
#[derive(Debug, Default, Clone, Copy)]
pub struct OrganizationContract;

impl OrganizationContract {
    pub fn new() -> Self {
        Self
    }

    fn validate_name_change(&self, name: Option<&str>, errors: &mut ValidationErrors) {
        if let Some(name) = name {
            validate_present("name", name, errors);
            validate_max_length("name", name, NAME_MAX, errors);
        }
    }

    fn validate_description_change(&self, description: Option<&Option<String>>, errors: &mut ValidationErrors) {
        if let Some(Some(description)) = description {
            validate_max_length("description", description, DESCRIPTION_MAX, errors);
        }
    }
}

impl Contract<NewMinistry> for OrganizationContract {
    fn validate(&self, entity: &NewMinistry) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        merge_derived(&mut errors, entity.validate());
        validate_present("name", &entity.name, &mut errors);
        errors.into_result()
    }
}

impl Contract<UpdateMinistry> for OrganizationContract {
    fn validate(&self, entity: &UpdateMinistry) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        self.validate_name_change(entity.name.as_deref(), &mut errors);
        self.validate_description_change(entity.description.as_ref(), &mut errors);
        errors.into_result()
    }
}

impl Contract<NewDepartment> for OrganizationContract {
    fn validate(&self, entity: &NewDepartment) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        merge_derived(&mut errors, entity.validate());
        validate_present("name", &entity.name, &mut errors);
        errors.into_result()
    }
}

impl Contract<UpdateDepartment> for OrganizationContract {
    fn validate(&self, entity: &UpdateDepartment) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        self.validate_name_change(entity.name.as_deref(), &mut errors);
        self.validate_description_change(entity.description.as_ref(), &mut errors);
        errors.into_result()
    }
}

impl Contract<NewUnit> for OrganizationContract {
    fn validate(&self, entity: &NewUnit) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        merge_derived(&mut errors, entity.validate());
        validate_present("name", &entity.name, &mut errors);
        errors.into_result()
    }
}

impl Contract<UpdateUnit> for OrganizationContract {
    fn validate(&self, entity: &UpdateUnit) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        self.validate_name_change(entity.name.as_deref(), &mut errors);
        self.validate_description_change(entity.description.as_ref(), &mut errors);
        errors.into_result()
    }
}
