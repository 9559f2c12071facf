//! Identity derivation and content hashing for CoinLedger
//!
//! Addresses are not backed by key pairs. An address is the SHA-256 digest of
//! a private secret, hex encoded and truncated to [`ADDRESS_HEX_LEN`]
//! characters. Whoever knows the secret controls the address.

use crate::error::ChainError;
use sha2::{Digest, Sha256};

/// Number of lowercase hex characters in an address.
pub const ADDRESS_HEX_LEN: usize = 12;

/// Lowercase hex SHA-256 of arbitrary bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Derives the public address controlled by `secret`.
///
/// Truncation to 48 bits means distinct secrets can collide in principle;
/// the address space is small enough that this is a known trade-off.
pub fn derive_address(secret: &str) -> String {
    let mut address = sha256_hex(secret.as_bytes());
    address.truncate(ADDRESS_HEX_LEN);
    address
}

/// True iff `address` is exactly [`ADDRESS_HEX_LEN`] lowercase hex characters.
pub fn is_well_formed_address(address: &str) -> bool {
    address.len() == ADDRESS_HEX_LEN
        && address
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Rejects malformed addresses with [`ChainError::InvalidAddress`].
pub fn validate_address(address: &str) -> Result<(), ChainError> {
    if is_well_formed_address(address) {
        Ok(())
    } else {
        Err(ChainError::InvalidAddress(address.to_string()))
    }
}

/// Content hash of a block: SHA-256 over `prev_hash ‖ miner_address ‖ nonce`.
///
/// Miners and the validator must agree on this exact concatenation.
pub fn block_content_hash(prev_hash: &str, miner_address: &str, nonce: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(miner_address.as_bytes());
    hasher.update(nonce.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_derivation_is_deterministic() {
        let first = derive_address("correct horse battery staple");
        let second = derive_address("correct horse battery staple");
        assert_eq!(first, second);
        assert_eq!(first.len(), ADDRESS_HEX_LEN);
        assert!(is_well_formed_address(&first));
    }

    #[test]
    fn test_address_is_prefix_of_digest() {
        // sha256("abc") = ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad
        assert_eq!(derive_address("abc"), "ba7816bf8f01");
    }

    #[test]
    fn test_distinct_secrets_give_distinct_addresses() {
        assert_ne!(derive_address("alice"), derive_address("bob"));
    }

    #[test]
    fn test_malformed_addresses_are_rejected() {
        assert!(!is_well_formed_address(""));
        assert!(!is_well_formed_address("abc"));
        assert!(!is_well_formed_address("ba7816bf8f01cf"));
        assert!(!is_well_formed_address("BA7816BF8F01"));
        assert!(!is_well_formed_address("zz7816bf8f01"));
        assert!(!is_well_formed_address("ba7816bf8f0 "));
        assert!(matches!(
            validate_address("nope"),
            Err(ChainError::InvalidAddress(a)) if a == "nope"
        ));
    }

    #[test]
    fn test_block_hash_matches_concatenation() {
        let hash = block_content_hash("0", "ba7816bf8f01", "nonce");
        assert_eq!(hash, sha256_hex(b"0ba7816bf8f01nonce"));
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, block_content_hash("0", "ba7816bf8f01", "nonce2"));
    }
}
