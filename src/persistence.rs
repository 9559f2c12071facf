//! Database persistence layer for CoinLedger
//!
//! The engine only ever talks to the store through the traits in this
//! module. Every mutation runs inside [`LedgerStore::atomically`], which
//! either commits all of its writes or none of them.

use crate::blockchain::{Account, Block, ProposedBlock};
use crate::error::ChainError;
use crate::transaction::Transaction;
use rusqlite::{params, Connection, OptionalExtension, Params, Row, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Point reads needed while validating a mutation.
pub trait LedgerReader {
    /// Balance of `address`; zero when the account does not exist.
    fn get_balance(&self, address: &str) -> Result<u64, ChainError>;
    fn account_exists(&self, address: &str) -> Result<bool, ChainError>;
    /// Content hash of the newest block; empty when the chain has no blocks.
    fn chain_tip_hash(&self) -> Result<String, ChainError>;
}

/// Row-level writes available inside one atomic unit of work.
pub trait StoreTxn: LedgerReader {
    /// Sets the balance, creating the account if needed.
    fn set_balance(&mut self, address: &str, balance: u64) -> Result<(), ChainError>;
    /// Adds `amount` to the balance, creating the account if needed. Returns the new balance.
    fn credit(&mut self, address: &str, amount: u64) -> Result<u64, ChainError>;
    fn append_transaction(
        &mut self,
        sender: &str,
        amount: u64,
        recipient: &str,
        time: i64,
    ) -> Result<Transaction, ChainError>;
    fn append_block(&mut self, block: &ProposedBlock, time: i64) -> Result<Block, ChainError>;
}

/// Abstraction for persistence backends.
pub trait LedgerStore: LedgerReader + Send + Sync {
    /// Runs `work` as one serialized unit. Writes are committed only if it returns `Ok`.
    fn atomically(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTxn) -> Result<(), ChainError>,
    ) -> Result<(), ChainError>;

    fn list_accounts(&self) -> Result<Vec<Account>, ChainError>;
    fn get_transaction_by_id(&self, id: u64) -> Result<Option<Transaction>, ChainError>;
    fn list_transactions(&self) -> Result<Vec<Transaction>, ChainError>;
    fn list_transactions_for_address(&self, address: &str)
        -> Result<Vec<Transaction>, ChainError>;
    fn list_blocks(&self) -> Result<Vec<Block>, ChainError>;
    fn sum_all_balances(&self) -> Result<u64, ChainError>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS addresses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        address TEXT NOT NULL UNIQUE,
        balance INTEGER NOT NULL CHECK (balance >= 0)
    );
    CREATE TABLE IF NOT EXISTS transactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sender TEXT NOT NULL,
        amount INTEGER NOT NULL CHECK (amount > 0),
        recipient TEXT NOT NULL,
        time INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_sender ON transactions (sender);
    CREATE INDEX IF NOT EXISTS idx_transactions_recipient ON transactions (recipient);
    CREATE TABLE IF NOT EXISTS blocks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        block TEXT NOT NULL,
        prev_block TEXT NOT NULL,
        address TEXT NOT NULL,
        nonce TEXT NOT NULL,
        time INTEGER NOT NULL
    );
";

const TRANSACTION_COLUMNS: &str = "id, sender, amount, recipient, time";
const BLOCK_COLUMNS: &str = "id, block, prev_block, address, nonce, time";

fn to_sql_int(value: u64, what: &str) -> Result<i64, ChainError> {
    i64::try_from(value).map_err(|_| {
        ChainError::StoreFailure(format!("{} {} does not fit in an SQLite integer", what, value))
    })
}

fn column_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: column_u64(row, 0)?,
        address: row.get(1)?,
        balance: column_u64(row, 2)?,
    })
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: column_u64(row, 0)?,
        sender: row.get(1)?,
        amount: column_u64(row, 2)?,
        recipient: row.get(3)?,
        time: row.get(4)?,
    })
}

fn row_to_block(row: &Row<'_>) -> rusqlite::Result<Block> {
    Ok(Block {
        id: column_u64(row, 0)?,
        content_hash: row.get(1)?,
        prev_hash: row.get(2)?,
        miner_address: row.get(3)?,
        nonce: row.get(4)?,
        time: row.get(5)?,
    })
}

fn query_balance(conn: &Connection, address: &str) -> Result<Option<u64>, ChainError> {
    conn.query_row(
        "SELECT balance FROM addresses WHERE address = ?1",
        params![address],
        |row| column_u64(row, 0),
    )
    .optional()
    .map_err(|e| ChainError::StoreFailure(format!("Failed to read balance of {}: {}", address, e)))
}

fn query_tip(conn: &Connection) -> Result<String, ChainError> {
    let tip: Option<String> = conn
        .query_row("SELECT block FROM blocks ORDER BY id DESC LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| ChainError::StoreFailure(format!("Failed to read chain tip: {}", e)))?;
    Ok(tip.unwrap_or_default())
}

fn query_all<T, P>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, ChainError>
where
    P: Params,
{
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| ChainError::StoreFailure(format!("Failed to prepare query: {}", e)))?;
    let rows = stmt
        .query_map(params, map)
        .map_err(|e| ChainError::StoreFailure(format!("Failed to run query: {}", e)))?;
    rows.collect::<rusqlite::Result<Vec<T>>>()
        .map_err(|e| ChainError::StoreFailure(format!("Failed to read row: {}", e)))
}

/// SQLite-backed store. One connection, serialized behind a mutex.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) the database file and ensures the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            ChainError::StoreFailure(format!("Failed to open database {}: {}", path.display(), e))
        })?;
        Self::with_connection(conn)
    }

    /// Deletes any existing database file, then opens a new one.
    pub fn create_fresh(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref();
        match std::fs::remove_file(path) {
            Ok(()) => tracing::info!(path = %path.display(), "removed existing database"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ChainError::StoreFailure(format!(
                    "Failed to remove database {}: {}",
                    path.display(),
                    e
                )))
            }
        }
        Self::open(path)
    }

    pub fn open_in_memory() -> Result<Self, ChainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ChainError::StoreFailure(format!("Failed to open in-memory database: {}", e))
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, ChainError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| ChainError::StoreFailure(format!("Failed to create tables: {}", e)))?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ChainError> {
        self.conn
            .lock()
            .map_err(|_| ChainError::StoreFailure("Mutex poisoned".to_string()))
    }
}

/// Unit of work over an open SQLite transaction. Dropping it without commit rolls back.
struct SqliteTxn<'c> {
    tx: rusqlite::Transaction<'c>,
}

impl LedgerReader for SqliteTxn<'_> {
    fn get_balance(&self, address: &str) -> Result<u64, ChainError> {
        Ok(query_balance(&self.tx, address)?.unwrap_or(0))
    }

    fn account_exists(&self, address: &str) -> Result<bool, ChainError> {
        Ok(query_balance(&self.tx, address)?.is_some())
    }

    fn chain_tip_hash(&self) -> Result<String, ChainError> {
        query_tip(&self.tx)
    }
}

impl StoreTxn for SqliteTxn<'_> {
    fn set_balance(&mut self, address: &str, balance: u64) -> Result<(), ChainError> {
        self.tx
            .execute(
                "INSERT INTO addresses (address, balance) VALUES (?1, ?2)
                 ON CONFLICT (address) DO UPDATE SET balance = excluded.balance",
                params![address, to_sql_int(balance, "balance")?],
            )
            .map_err(|e| {
                ChainError::StoreFailure(format!("Failed to set balance of {}: {}", address, e))
            })?;
        Ok(())
    }

    fn credit(&mut self, address: &str, amount: u64) -> Result<u64, ChainError> {
        self.tx
            .query_row(
                "INSERT INTO addresses (address, balance) VALUES (?1, ?2)
                 ON CONFLICT (address) DO UPDATE SET balance = balance + excluded.balance
                 RETURNING balance",
                params![address, to_sql_int(amount, "amount")?],
                |row| column_u64(row, 0),
            )
            .map_err(|e| ChainError::StoreFailure(format!("Failed to credit {}: {}", address, e)))
    }

    fn append_transaction(
        &mut self,
        sender: &str,
        amount: u64,
        recipient: &str,
        time: i64,
    ) -> Result<Transaction, ChainError> {
        self.tx
            .execute(
                "INSERT INTO transactions (sender, amount, recipient, time) VALUES (?1, ?2, ?3, ?4)",
                params![sender, to_sql_int(amount, "amount")?, recipient, time],
            )
            .map_err(|e| ChainError::StoreFailure(format!("Failed to save transaction: {}", e)))?;

        Ok(Transaction {
            id: self.tx.last_insert_rowid() as u64,
            sender: sender.to_string(),
            amount,
            recipient: recipient.to_string(),
            time,
        })
    }

    fn append_block(&mut self, block: &ProposedBlock, time: i64) -> Result<Block, ChainError> {
        self.tx
            .execute(
                "INSERT INTO blocks (block, prev_block, address, nonce, time) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    block.content_hash,
                    block.prev_hash,
                    block.miner_address,
                    block.nonce,
                    time
                ],
            )
            .map_err(|e| ChainError::StoreFailure(format!("Failed to save block: {}", e)))?;

        Ok(Block {
            id: self.tx.last_insert_rowid() as u64,
            content_hash: block.content_hash.clone(),
            prev_hash: block.prev_hash.clone(),
            miner_address: block.miner_address.clone(),
            nonce: block.nonce.clone(),
            time,
        })
    }
}

impl LedgerReader for Database {
    fn get_balance(&self, address: &str) -> Result<u64, ChainError> {
        Ok(query_balance(&*self.lock()?, address)?.unwrap_or(0))
    }

    fn account_exists(&self, address: &str) -> Result<bool, ChainError> {
        Ok(query_balance(&*self.lock()?, address)?.is_some())
    }

    fn chain_tip_hash(&self) -> Result<String, ChainError> {
        query_tip(&*self.lock()?)
    }
}

impl LedgerStore for Database {
    fn atomically(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTxn) -> Result<(), ChainError>,
    ) -> Result<(), ChainError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| ChainError::StoreFailure(format!("Failed to start transaction: {}", e)))?;

        let mut unit = SqliteTxn { tx };
        work(&mut unit)?;

        unit.tx
            .commit()
            .map_err(|e| ChainError::StoreFailure(format!("Failed to commit transaction: {}", e)))
    }

    fn list_accounts(&self) -> Result<Vec<Account>, ChainError> {
        query_all(
            &*self.lock()?,
            "SELECT id, address, balance FROM addresses ORDER BY id",
            [],
            row_to_account,
        )
    }

    fn get_transaction_by_id(&self, id: u64) -> Result<Option<Transaction>, ChainError> {
        // Ids beyond i64::MAX can never have been assigned.
        let Ok(id) = i64::try_from(id) else {
            return Ok(None);
        };
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS),
            params![id],
            row_to_transaction,
        )
        .optional()
        .map_err(|e| ChainError::StoreFailure(format!("Failed to read transaction {}: {}", id, e)))
    }

    fn list_transactions(&self) -> Result<Vec<Transaction>, ChainError> {
        query_all(
            &*self.lock()?,
            &format!("SELECT {} FROM transactions ORDER BY id", TRANSACTION_COLUMNS),
            [],
            row_to_transaction,
        )
    }

    fn list_transactions_for_address(
        &self,
        address: &str,
    ) -> Result<Vec<Transaction>, ChainError> {
        query_all(
            &*self.lock()?,
            &format!(
                "SELECT {} FROM transactions WHERE sender = ?1 OR recipient = ?1 ORDER BY id",
                TRANSACTION_COLUMNS
            ),
            params![address],
            row_to_transaction,
        )
    }

    fn list_blocks(&self) -> Result<Vec<Block>, ChainError> {
        query_all(
            &*self.lock()?,
            &format!("SELECT {} FROM blocks ORDER BY id", BLOCK_COLUMNS),
            [],
            row_to_block,
        )
    }

    fn sum_all_balances(&self) -> Result<u64, ChainError> {
        self.lock()?
            .query_row("SELECT COALESCE(SUM(balance), 0) FROM addresses", [], |row| {
                column_u64(row, 0)
            })
            .map_err(|e| ChainError::StoreFailure(format!("Failed to sum balances: {}", e)))
    }
}

/// Ledger state held by [`InMemoryPersistence`].
#[derive(Debug, Default)]
struct MemoryState {
    accounts: Vec<Account>,
    index: HashMap<String, usize>,
    transactions: Vec<Transaction>,
    blocks: Vec<Block>,
}

impl LedgerReader for MemoryState {
    fn get_balance(&self, address: &str) -> Result<u64, ChainError> {
        Ok(self
            .index
            .get(address)
            .map(|&i| self.accounts[i].balance)
            .unwrap_or(0))
    }

    fn account_exists(&self, address: &str) -> Result<bool, ChainError> {
        Ok(self.index.contains_key(address))
    }

    fn chain_tip_hash(&self) -> Result<String, ChainError> {
        Ok(self
            .blocks
            .last()
            .map(|b| b.content_hash.clone())
            .unwrap_or_default())
    }
}

impl StoreTxn for MemoryState {
    fn set_balance(&mut self, address: &str, balance: u64) -> Result<(), ChainError> {
        match self.index.get(address) {
            Some(&i) => self.accounts[i].balance = balance,
            None => {
                self.index.insert(address.to_string(), self.accounts.len());
                self.accounts.push(Account {
                    id: self.accounts.len() as u64 + 1,
                    address: address.to_string(),
                    balance,
                });
            }
        }
        Ok(())
    }

    fn credit(&mut self, address: &str, amount: u64) -> Result<u64, ChainError> {
        let balance = self
            .get_balance(address)?
            .checked_add(amount)
            .ok_or_else(|| ChainError::StoreFailure(format!("Balance overflow for {}", address)))?;
        self.set_balance(address, balance)?;
        Ok(balance)
    }

    fn append_transaction(
        &mut self,
        sender: &str,
        amount: u64,
        recipient: &str,
        time: i64,
    ) -> Result<Transaction, ChainError> {
        let tx = Transaction {
            id: self.transactions.len() as u64 + 1,
            sender: sender.to_string(),
            amount,
            recipient: recipient.to_string(),
            time,
        };
        self.transactions.push(tx.clone());
        Ok(tx)
    }

    fn append_block(&mut self, block: &ProposedBlock, time: i64) -> Result<Block, ChainError> {
        let stored = Block {
            id: self.blocks.len() as u64 + 1,
            content_hash: block.content_hash.clone(),
            prev_hash: block.prev_hash.clone(),
            miner_address: block.miner_address.clone(),
            nonce: block.nonce.clone(),
            time,
        };
        self.blocks.push(stored.clone());
        Ok(stored)
    }
}

/// One reversible write made by a [`MemoryTxn`].
enum Undo {
    Balance { index: usize, previous: u64 },
    AccountCreated { address: String },
    TransactionAppended,
    BlockAppended,
}

/// Unit of work over the in-memory state. Writes go straight to the state and
/// are journaled so a failed unit can be reverted.
struct MemoryTxn<'s> {
    state: &'s mut MemoryState,
    journal: Vec<Undo>,
}

impl MemoryTxn<'_> {
    fn rollback(self) {
        let state = self.state;
        for undo in self.journal.into_iter().rev() {
            match undo {
                Undo::Balance { index, previous } => state.accounts[index].balance = previous,
                Undo::AccountCreated { address } => {
                    state.index.remove(&address);
                    state.accounts.pop();
                }
                Undo::TransactionAppended => {
                    state.transactions.pop();
                }
                Undo::BlockAppended => {
                    state.blocks.pop();
                }
            }
        }
    }
}

impl LedgerReader for MemoryTxn<'_> {
    fn get_balance(&self, address: &str) -> Result<u64, ChainError> {
        self.state.get_balance(address)
    }

    fn account_exists(&self, address: &str) -> Result<bool, ChainError> {
        self.state.account_exists(address)
    }

    fn chain_tip_hash(&self) -> Result<String, ChainError> {
        self.state.chain_tip_hash()
    }
}

impl StoreTxn for MemoryTxn<'_> {
    fn set_balance(&mut self, address: &str, balance: u64) -> Result<(), ChainError> {
        match self.state.index.get(address) {
            Some(&index) => self.journal.push(Undo::Balance {
                index,
                previous: self.state.accounts[index].balance,
            }),
            None => self.journal.push(Undo::AccountCreated {
                address: address.to_string(),
            }),
        }
        self.state.set_balance(address, balance)
    }

    fn credit(&mut self, address: &str, amount: u64) -> Result<u64, ChainError> {
        let balance = self
            .get_balance(address)?
            .checked_add(amount)
            .ok_or_else(|| ChainError::StoreFailure(format!("Balance overflow for {}", address)))?;
        self.set_balance(address, balance)?;
        Ok(balance)
    }

    fn append_transaction(
        &mut self,
        sender: &str,
        amount: u64,
        recipient: &str,
        time: i64,
    ) -> Result<Transaction, ChainError> {
        let tx = self.state.append_transaction(sender, amount, recipient, time)?;
        self.journal.push(Undo::TransactionAppended);
        Ok(tx)
    }

    fn append_block(&mut self, block: &ProposedBlock, time: i64) -> Result<Block, ChainError> {
        let stored = self.state.append_block(block, time)?;
        self.journal.push(Undo::BlockAppended);
        Ok(stored)
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
///
/// Clones share the same state. A failed unit of work is reverted from its journal.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, ChainError> {
        self.state
            .lock()
            .map_err(|_| ChainError::StoreFailure("Mutex poisoned".to_string()))
    }
}

impl LedgerReader for InMemoryPersistence {
    fn get_balance(&self, address: &str) -> Result<u64, ChainError> {
        self.lock()?.get_balance(address)
    }

    fn account_exists(&self, address: &str) -> Result<bool, ChainError> {
        self.lock()?.account_exists(address)
    }

    fn chain_tip_hash(&self) -> Result<String, ChainError> {
        self.lock()?.chain_tip_hash()
    }
}

impl LedgerStore for InMemoryPersistence {
    fn atomically(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTxn) -> Result<(), ChainError>,
    ) -> Result<(), ChainError> {
        let mut state = self.lock()?;
        let mut unit = MemoryTxn {
            state: &mut *state,
            journal: Vec::new(),
        };
        match work(&mut unit) {
            Ok(()) => Ok(()),
            Err(e) => {
                unit.rollback();
                Err(e)
            }
        }
    }

    fn list_accounts(&self) -> Result<Vec<Account>, ChainError> {
        Ok(self.lock()?.accounts.clone())
    }

    fn get_transaction_by_id(&self, id: u64) -> Result<Option<Transaction>, ChainError> {
        let state = self.lock()?;
        Ok(id
            .checked_sub(1)
            .and_then(|i| state.transactions.get(i as usize))
            .cloned())
    }

    fn list_transactions(&self) -> Result<Vec<Transaction>, ChainError> {
        Ok(self.lock()?.transactions.clone())
    }

    fn list_transactions_for_address(
        &self,
        address: &str,
    ) -> Result<Vec<Transaction>, ChainError> {
        Ok(self
            .lock()?
            .transactions
            .iter()
            .filter(|tx| tx.touches(address))
            .cloned()
            .collect())
    }

    fn list_blocks(&self) -> Result<Vec<Block>, ChainError> {
        Ok(self.lock()?.blocks.clone())
    }

    fn sum_all_balances(&self) -> Result<u64, ChainError> {
        let state = self.lock()?;
        state
            .accounts
            .iter()
            .try_fold(0u64, |sum, account| sum.checked_add(account.balance))
            .ok_or_else(|| ChainError::StoreFailure("Total supply overflow".to_string()))
    }
}
