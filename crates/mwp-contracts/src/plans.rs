//! Plan contracts
//!
//! An approved plan is locked: it keeps its month and week, and only a
//! supervisor other than its owner may approve or revoke it.

use mwp_core::error::ValidationErrors;
use mwp_models::{Plan, UpdatePlan};

use crate::base::{Actor, Contract, ValidationResult};

/// Contract for editing a plan's period
pub struct UpdatePlanContract<'a> {
    plan: &'a Plan,
}

impl<'a> UpdatePlanContract<'a> {
    pub fn new(plan: &'a Plan) -> Self {
        Self { plan }
    }
}

impl Contract<UpdatePlan> for UpdatePlanContract<'_> {
    fn validate(&self, entity: &UpdatePlan) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        if self.plan.is_locked() && entity.moves_period() {
            errors.add_base(format!(
                "Plan {} is approved and cannot be moved to another week",
                self.plan.period()
            ));
        }

        errors.into_result()
    }
}

/// Contract for granting or revoking approval
pub struct ApprovePlanContract<'a, A: Actor> {
    plan: &'a Plan,
    approver: &'a A,
}

impl<'a, A: Actor> ApprovePlanContract<'a, A> {
    pub fn new(plan: &'a Plan, approver: &'a A) -> Self {
        Self { plan, approver }
    }

    fn validate_approver(&self, errors: &mut ValidationErrors) {
        if !self.approver.is_supervisor() {
            errors.add_base("Only a supervisor can approve or revoke a plan");
        }
        if self.approver.id() == self.plan.user_id {
            errors.add_base("A plan cannot be approved by its owner");
        }
    }
}

impl<A: Actor> Contract<UpdatePlan> for ApprovePlanContract<'_, A> {
    fn validate(&self, entity: &UpdatePlan) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        if entity.approved.is_none() {
            errors.add("approved", "must be given");
        }
        if entity.moves_period() {
            errors.add_base("Approval cannot change the plan's period");
        }
        self.validate_approver(&mut errors);

        errors.into_result()
    }
}
