//! Error types for CoinLedger

/// Every way a ledger operation can fail.
///
/// Validation failures are detected before any mutation is attempted, so a
/// caller that receives one of them can rely on the ledger being unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient funds: {address} holds {balance}, needs {requested}")]
    InsufficientFunds {
        address: String,
        balance: u64,
        requested: u64,
    },

    #[error("previous block mismatch: chain tip is {expected:?}, proposal extends {got:?}")]
    ChainMismatch { expected: String, got: String },

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("store failure: {0}")]
    StoreFailure(String),
}

impl ChainError {
    /// True for rejections the caller can fix and retry; false for store failures.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ChainError::StoreFailure(_))
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::StoreFailure(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
