use serde::{Deserialize, Serialize};

/// A row of the accounts table. Created on first credit, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub address: String,
    pub balance: u64,
}

/// Balance lookup result; unknown addresses report zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub address: String,
    pub balance: u64,
}
