use crate::crypto::{block_content_hash, validate_address};
use crate::error::ChainError;

use super::chain::{Block, ProposedBlock};

/// Checks a proposed block against the current chain tip.
///
/// Order matters to callers: a stale proposal reports `ChainMismatch` even if
/// its content hash is also wrong.
pub fn validate_proposal(proposed: &ProposedBlock, tip: &str) -> Result<(), ChainError> {
    validate_address(&proposed.miner_address)?;

    if proposed.prev_hash != tip {
        return Err(ChainError::ChainMismatch {
            expected: tip.to_string(),
            got: proposed.prev_hash.clone(),
        });
    }

    let expected = block_content_hash(
        &proposed.prev_hash,
        &proposed.miner_address,
        &proposed.nonce,
    );
    if expected != proposed.content_hash {
        return Err(ChainError::InvalidBlock(format!(
            "content hash mismatch: expected {}, got {}",
            expected, proposed.content_hash
        )));
    }

    Ok(())
}

/// Walks a stored chain and reports the first broken link or hash.
///
/// The genesis block is exempt from hash recomputation.
pub fn verify_links(blocks: &[Block]) -> Result<(), ChainError> {
    for (i, block) in blocks.iter().enumerate() {
        if i == 0 && block.is_genesis() {
            continue;
        }

        if let Some(prev) = i.checked_sub(1).map(|p| &blocks[p]) {
            if block.prev_hash != prev.content_hash {
                return Err(ChainError::InvalidBlock(format!(
                    "block {} links to {}, but block {} has hash {}",
                    block.id, block.prev_hash, prev.id, prev.content_hash
                )));
            }
        }

        let expected = block_content_hash(&block.prev_hash, &block.miner_address, &block.nonce);
        if expected != block.content_hash {
            return Err(ChainError::InvalidBlock(format!(
                "block {} has hash {}, expected {}",
                block.id, block.content_hash, expected
            )));
        }
    }
    Ok(())
}
