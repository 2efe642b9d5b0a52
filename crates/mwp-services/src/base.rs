//! Shared service plumbing

use mwp_contracts::Contract;
use mwp_core::error::MwpError;
use mwp_core::result::MwpResult;

/// Run a contract, turning its errors into a validation failure
pub(crate) fn validate<T, C: Contract<T>>(contract: &C, entity: &T) -> MwpResult<()> {
    contract.validate(entity).map_err(MwpError::Validation)
}
