use crate::crypto::block_content_hash;
use crate::error::ChainError;
use crate::persistence::StoreTxn;
use crate::transaction::MINT_SENDER;
use serde::{Deserialize, Serialize};

use super::validation::validate_proposal;

/// Units credited to the miner of every accepted block.
pub const BLOCK_REWARD: u64 = 1;

// Genesis sentinels. The genesis block has no real predecessor, miner or nonce.
pub const GENESIS_HASH: &str = "0";
pub const GENESIS_PREV_HASH: &str = "0";
pub const GENESIS_ADDRESS: &str = "address";
pub const GENESIS_NONCE: &str = "nonce";

/// An accepted block as stored in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: u64,
    #[serde(rename = "block")]
    pub content_hash: String,
    #[serde(rename = "prevBlock")]
    pub prev_hash: String,
    #[serde(rename = "address")]
    pub miner_address: String,
    pub nonce: String,
    /// Seconds since the Unix epoch
    pub time: i64,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.prev_hash == GENESIS_PREV_HASH
            && self.content_hash == GENESIS_HASH
            && self.miner_address == GENESIS_ADDRESS
    }
}

/// A block as submitted by a miner, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedBlock {
    #[serde(rename = "block")]
    pub content_hash: String,
    #[serde(rename = "prevBlock")]
    pub prev_hash: String,
    #[serde(rename = "address")]
    pub miner_address: String,
    pub nonce: String,
}

impl ProposedBlock {
    /// Builds a candidate extending `tip` whose content hash is correct.
    ///
    /// There is no difficulty target, so any nonce yields an acceptable block.
    pub fn mine(tip: &str, miner_address: &str, nonce: &str) -> Self {
        Self {
            content_hash: block_content_hash(tip, miner_address, nonce),
            prev_hash: tip.to_string(),
            miner_address: miner_address.to_string(),
            nonce: nonce.to_string(),
        }
    }

    /// The sentinel block seeded into an empty chain.
    pub fn genesis() -> Self {
        Self {
            content_hash: GENESIS_HASH.to_string(),
            prev_hash: GENESIS_PREV_HASH.to_string(),
            miner_address: GENESIS_ADDRESS.to_string(),
            nonce: GENESIS_NONCE.to_string(),
        }
    }
}

/// Validates `proposed` against the current tip, appends it and mints the reward.
///
/// Runs inside one store unit of work; any error leaves the chain untouched.
pub fn apply_block(
    txn: &mut dyn StoreTxn,
    proposed: &ProposedBlock,
    time: i64,
) -> Result<Block, ChainError> {
    let tip = txn.chain_tip_hash()?;
    validate_proposal(proposed, &tip)?;

    let block = txn.append_block(proposed, time)?;
    txn.credit(&proposed.miner_address, BLOCK_REWARD)?;
    txn.append_transaction(MINT_SENDER, BLOCK_REWARD, &proposed.miner_address, time)?;

    Ok(block)
}
