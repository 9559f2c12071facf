/// Transaction types for CoinLedger
use crate::crypto::derive_address;
use serde::{Deserialize, Serialize};

/// Sender recorded on the mint transaction created for every accepted block.
pub const MINT_SENDER: &str = "null";

/// An immutable record of one value movement.
///
/// `id` is assigned by the store at append time and only ever increases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub sender: String,
    pub amount: u64,
    pub recipient: String,
    /// Seconds since the Unix epoch
    pub time: i64,
}

impl Transaction {
    /// Whether this record is a block reward rather than a transfer.
    pub fn is_mint(&self) -> bool {
        self.sender == MINT_SENDER
    }

    /// Whether `address` is the sender or the recipient.
    pub fn touches(&self, address: &str) -> bool {
        self.sender == address || self.recipient == address
    }
}

/// A requested transfer with the sender already derived from its secret.
///
/// The secret itself never leaves [`Transfer::from_secret`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
}

impl Transfer {
    pub fn from_secret(secret: &str, recipient: &str, amount: u64) -> Self {
        Self {
            sender: derive_address(secret),
            recipient: recipient.to_string(),
            amount,
        }
    }
}

/// Body of `POST /transaction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Secret controlling the sending address
    pub pkey: String,
    /// Recipient address
    pub address: String,
    pub amount: i64,
}
