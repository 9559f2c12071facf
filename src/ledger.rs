//! The ledger engine: the only entry point for reading and mutating ledger state.
//!
//! A [`Ledger`] owns an injected [`LedgerStore`]. Mutations are serialized by
//! a write gate and run inside a single store unit of work, so the balance
//! check, the balance updates and the appended records commit together or not
//! at all. Reads go straight to committed state.

use crate::blockchain::{apply_block, verify_links, Account, AddressBalance, Block, ProposedBlock};
use crate::crypto::validate_address;
use crate::error::{ChainError, Result};
use crate::persistence::{LedgerStore, StoreTxn};
use crate::transaction::{apply_transfer, Transaction, Transfer};
use parking_lot::Mutex;
use tracing::{debug, info};

pub struct Ledger {
    store: Box<dyn LedgerStore>,
    write_gate: Mutex<()>,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Ledger {
    pub fn new(store: Box<dyn LedgerStore>) -> Self {
        Ledger {
            store,
            write_gate: Mutex::new(()),
        }
    }

    /// Runs `work` under the write gate inside one store unit of work.
    fn transact<T>(
        &self,
        mut work: impl FnMut(&mut dyn StoreTxn) -> Result<T>,
    ) -> Result<T> {
        let _gate = self.write_gate.lock();
        let mut output = None;
        self.store.atomically(&mut |txn| {
            output = Some(work(txn)?);
            Ok(())
        })?;
        output.ok_or_else(|| {
            ChainError::StoreFailure("unit of work produced no result".to_string())
        })
    }

    /// Appends the genesis block when the chain is empty. Returns whether it did.
    pub fn seed_genesis(&self) -> Result<bool> {
        let seeded = self.transact(|txn| {
            if !txn.chain_tip_hash()?.is_empty() {
                return Ok(false);
            }
            txn.append_block(&ProposedBlock::genesis(), now())?;
            Ok(true)
        })?;
        if seeded {
            info!("Seeded genesis block");
        }
        Ok(seeded)
    }

    /// Balance of a well-formed address; unknown addresses report zero.
    pub fn get_address(&self, address: &str) -> Result<AddressBalance> {
        validate_address(address)?;
        Ok(AddressBalance {
            address: address.to_string(),
            balance: self.store.get_balance(address)?,
        })
    }

    pub fn balance(&self, address: &str) -> Result<u64> {
        Ok(self.get_address(address)?.balance)
    }

    pub fn list_addresses(&self) -> Result<Vec<Account>> {
        self.store.list_accounts()
    }

    /// Moves `amount` from the address controlled by `secret` to `recipient`.
    pub fn create_transaction(
        &self,
        secret: &str,
        recipient: &str,
        amount: u64,
    ) -> Result<Transaction> {
        let transfer = Transfer::from_secret(secret, recipient, amount);
        // Rejects malformed input before the write gate; apply_transfer checks again.
        transfer.validate()?;

        match self.transact(|txn| apply_transfer(txn, &transfer, now())) {
            Ok(tx) => {
                info!(
                    "Accepted transaction {}: {} -> {} ({})",
                    tx.id, tx.sender, tx.recipient, tx.amount
                );
                Ok(tx)
            }
            Err(e) => {
                debug!("Rejected transaction from {}: {}", transfer.sender, e);
                Err(e)
            }
        }
    }

    pub fn get_transaction(&self, id: u64) -> Result<Option<Transaction>> {
        self.store.get_transaction_by_id(id)
    }

    pub fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.store.list_transactions()
    }

    /// Every transaction where `address` is the sender or the recipient.
    pub fn list_address_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
        validate_address(address)?;
        self.store.list_transactions_for_address(address)
    }

    /// Accepts a proposed block onto the tip and mints the reward to its miner.
    pub fn submit_block(&self, proposed: &ProposedBlock) -> Result<()> {
        // Rejects a bad miner address before the write gate; validate_proposal checks again.
        validate_address(&proposed.miner_address)?;

        match self.transact(|txn| apply_block(txn, proposed, now())) {
            Ok(block) => {
                info!(
                    "Accepted block {} ({}) mined by {}",
                    block.id, block.content_hash, block.miner_address
                );
                Ok(())
            }
            Err(e) => {
                debug!("Rejected block {}: {}", proposed.content_hash, e);
                Err(e)
            }
        }
    }

    /// Content hash of the newest block, or an empty string for an empty chain.
    pub fn latest_block_hash(&self) -> Result<String> {
        self.store.chain_tip_hash()
    }

    pub fn list_blocks(&self) -> Result<Vec<Block>> {
        self.store.list_blocks()
    }

    pub fn total_supply(&self) -> Result<u64> {
        self.store.sum_all_balances()
    }

    /// Re-checks linkage and content hashes of every stored block.
    pub fn verify_chain(&self) -> Result<()> {
        verify_links(&self.store.list_blocks()?)
    }
}
