/// Applies validated transfers against a store unit of work
use crate::error::ChainError;
use crate::persistence::StoreTxn;
use crate::transaction::types::{Transaction, Transfer};

/// Debits the sender, credits the recipient and records the transfer.
///
/// Must run inside [`crate::persistence::LedgerStore::atomically`]: an error
/// returned here discards every write made so far.
pub fn apply_transfer(
    txn: &mut dyn StoreTxn,
    transfer: &Transfer,
    time: i64,
) -> Result<Transaction, ChainError> {
    transfer.validate()?;

    let sender_balance = txn.get_balance(&transfer.sender)?;
    if sender_balance < transfer.amount {
        return Err(ChainError::InsufficientFunds {
            address: transfer.sender.clone(),
            balance: sender_balance,
            requested: transfer.amount,
        });
    }

    txn.set_balance(&transfer.sender, sender_balance - transfer.amount)?;
    txn.credit(&transfer.recipient, transfer.amount)?;
    txn.append_transaction(&transfer.sender, transfer.amount, &transfer.recipient, time)
}
