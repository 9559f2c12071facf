/// Stateless validation of transfers, run before the store is touched
use crate::crypto::validate_address;
use crate::error::ChainError;
use crate::transaction::types::Transfer;

impl Transfer {
    /// Checks the preconditions that do not depend on ledger state.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.amount == 0 {
            return Err(ChainError::InvalidAmount(
                "amount must be greater than zero".to_string(),
            ));
        }
        validate_address(&self.recipient)
    }
}

/// Converts a signed wire amount into a transfer amount.
pub fn parse_amount(amount: i64) -> Result<u64, ChainError> {
    if amount <= 0 {
        return Err(ChainError::InvalidAmount(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }
    Ok(amount as u64)
}
