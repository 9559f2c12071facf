//! Integration tests for the ledger engine against both store backends

use coinledger::blockchain::{ProposedBlock, BLOCK_REWARD, GENESIS_HASH};
use coinledger::crypto::derive_address;
use coinledger::error::ChainError;
use coinledger::ledger::Ledger;
use coinledger::persistence::{Database, InMemoryPersistence, LedgerStore};
use std::sync::Arc;
use tempfile::TempDir;

/// A seeded ledger on an on-disk SQLite file. Keep the `TempDir` alive.
fn sqlite_ledger() -> Result<(Ledger, TempDir), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let db = Database::open(dir.path().join("ledger.db"))?;
    let ledger = Ledger::new(Box::new(db));
    ledger.seed_genesis()?;
    Ok((ledger, dir))
}

fn memory_ledger() -> Ledger {
    let ledger = Ledger::new(Box::new(InMemoryPersistence::new()));
    ledger.seed_genesis().unwrap();
    ledger
}

fn mine_one(ledger: &Ledger, miner: &str, nonce: &str) -> Result<(), ChainError> {
    let tip = ledger.latest_block_hash()?;
    ledger.submit_block(&ProposedBlock::mine(&tip, miner, nonce))
}

/// Gives `secret`'s address `amount` units by mining blocks to it.
fn fund(ledger: &Ledger, secret: &str, amount: u64) {
    let address = derive_address(secret);
    for i in 0..amount {
        mine_one(ledger, &address, &format!("fund-{}-{}", secret, i)).unwrap();
    }
}

#[test]
fn test_first_block_mints_one_unit() -> Result<(), Box<dyn std::error::Error>> {
    let (ledger, _dir) = sqlite_ledger()?;
    let miner = derive_address("miner-secret");
    assert_eq!(ledger.total_supply()?, 0);

    mine_one(&ledger, &miner, "first")?;

    assert_eq!(ledger.balance(&miner)?, BLOCK_REWARD);
    assert_eq!(ledger.total_supply()?, 1);
    let txs = ledger.list_transactions()?;
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].sender, "null");
    assert_eq!(txs[0].recipient, miner);
    Ok(())
}

#[test]
fn test_transfer_to_new_address() -> Result<(), Box<dyn std::error::Error>> {
    let (ledger, _dir) = sqlite_ledger()?;
    fund(&ledger, "alice", 10);
    let alice = derive_address("alice");
    let newcomer = derive_address("newcomer");
    let before = ledger.list_transactions()?.len();

    let tx = ledger.create_transaction("alice", &newcomer, 5)?;

    assert_eq!(ledger.balance(&alice)?, 5);
    assert_eq!(ledger.balance(&newcomer)?, 5);
    assert_eq!(ledger.list_transactions()?.len(), before + 1);
    assert_eq!(ledger.get_transaction(tx.id)?, Some(tx));
    assert_eq!(ledger.total_supply()?, 10);
    Ok(())
}

#[test]
fn test_overdraft_is_rejected_without_side_effects() -> Result<(), Box<dyn std::error::Error>> {
    let (ledger, _dir) = sqlite_ledger()?;
    fund(&ledger, "alice", 3);
    let alice = derive_address("alice");
    let bob = derive_address("bob");
    let before = ledger.list_transactions()?;

    let result = ledger.create_transaction("alice", &bob, 4);

    assert!(matches!(
        result,
        Err(ChainError::InsufficientFunds {
            balance: 3,
            requested: 4,
            ..
        })
    ));
    assert_eq!(ledger.balance(&alice)?, 3);
    assert_eq!(ledger.balance(&bob)?, 0);
    assert_eq!(ledger.list_transactions()?, before);
    Ok(())
}

#[test]
fn test_stale_block_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let (ledger, _dir) = sqlite_ledger()?;
    let miner = derive_address("miner");
    mine_one(&ledger, &miner, "a")?;
    let length = ledger.list_blocks()?.len();

    let stale = ProposedBlock::mine(GENESIS_HASH, &miner, "b");
    let result = ledger.submit_block(&stale);

    assert!(matches!(result, Err(ChainError::ChainMismatch { .. })));
    assert_eq!(ledger.list_blocks()?.len(), length);
    assert_eq!(ledger.balance(&miner)?, 1);
    Ok(())
}

#[test]
fn test_unseen_address_has_zero_balance() {
    let ledger = memory_ledger();
    let ghost = derive_address("never-used");
    assert_eq!(ledger.balance(&ghost).unwrap(), 0);
    assert!(ledger.list_address_transactions(&ghost).unwrap().is_empty());
}

#[test]
fn test_duplicate_block_accepted_once() {
    let ledger = memory_ledger();
    let miner = derive_address("miner");
    let block = ProposedBlock::mine(GENESIS_HASH, &miner, "dup");

    ledger.submit_block(&block).unwrap();
    assert!(matches!(
        ledger.submit_block(&block),
        Err(ChainError::ChainMismatch { .. })
    ));
    assert_eq!(ledger.list_blocks().unwrap().len(), 2);
    assert_eq!(ledger.total_supply().unwrap(), 1);
}

#[test]
fn test_forged_hash_is_invalid_block() {
    let ledger = memory_ledger();
    let miner = derive_address("miner");
    let mut block = ProposedBlock::mine(GENESIS_HASH, &miner, "x");
    block.content_hash = "f".repeat(64);

    assert!(matches!(
        ledger.submit_block(&block),
        Err(ChainError::InvalidBlock(_))
    ));
    assert_eq!(ledger.latest_block_hash().unwrap(), GENESIS_HASH);
}

#[test]
fn test_invalid_inputs_touch_nothing() {
    let ledger = memory_ledger();
    fund(&ledger, "alice", 2);
    let before = ledger.list_transactions().unwrap();

    assert!(matches!(
        ledger.create_transaction("alice", &derive_address("bob"), 0),
        Err(ChainError::InvalidAmount(_))
    ));
    assert!(matches!(
        ledger.create_transaction("alice", "not-an-address", 1),
        Err(ChainError::InvalidAddress(_))
    ));
    assert_eq!(ledger.list_transactions().unwrap(), before);
    assert_eq!(ledger.total_supply().unwrap(), 2);
}

#[test]
fn test_chain_links_and_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("ledger.db");
    let miner = derive_address("miner");

    {
        let ledger = Ledger::new(Box::new(Database::open(&path)?));
        assert!(ledger.seed_genesis()?);
        for i in 0..4 {
            mine_one(&ledger, &miner, &i.to_string())?;
        }
    }

    let ledger = Ledger::new(Box::new(Database::open(&path)?));
    assert!(!ledger.seed_genesis()?);
    ledger.verify_chain()?;

    let blocks = ledger.list_blocks()?;
    assert_eq!(blocks.len(), 5);
    assert_eq!(blocks[0].prev_hash, "0");
    for pair in blocks.windows(2) {
        assert_eq!(pair[1].prev_hash, pair[0].content_hash);
    }
    assert_eq!(ledger.balance(&miner)?, 4);
    Ok(())
}

#[test]
fn test_concurrent_spends_never_overdraw() {
    for store in [
        Box::new(Database::open_in_memory().unwrap()) as Box<dyn LedgerStore>,
        Box::new(InMemoryPersistence::new()),
    ] {
        let ledger = Arc::new(Ledger::new(store));
        ledger.seed_genesis().unwrap();
        fund(&ledger, "spender", 10);
        let spender = derive_address("spender");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    let recipient = derive_address(&format!("recipient-{}", i));
                    (0..5)
                        .filter(|_| ledger.create_transaction("spender", &recipient, 1).is_ok())
                        .count()
                })
            })
            .collect();

        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(accepted, 10);
        assert_eq!(ledger.balance(&spender).unwrap(), 0);
        assert_eq!(ledger.total_supply().unwrap(), 10);
        let transfers = ledger
            .list_transactions()
            .unwrap()
            .into_iter()
            .filter(|tx| !tx.is_mint())
            .count();
        assert_eq!(transfers, 10);
    }
}
