pub mod cache;

use std::collections::HashMap;

use ethereum_types::{Address, H256, U256};

use crate::account::{Account, AccountInfo};

/// The only boundary between the interpreter and persistent world state.
/// Implementors back this with whatever trie/storage engine the embedder
/// uses; the core only ever reads through it and never mutates it directly —
/// all writes land in the in-memory [`cache::CacheDB`] journal instead.
pub trait Database {
    fn get_account_info(&self, address: Address) -> AccountInfo;
    fn get_storage_slot(&self, address: Address, key: H256) -> U256;
    fn get_block_hash(&self, block_number: u64) -> Option<H256>;
}

/// A trivial in-memory [`Database`], useful for tests and for embedders that
/// do not need persistence (e.g. a one-shot bytecode runner).
#[derive(Debug, Default)]
pub struct Db {
    pub accounts: HashMap<Address, Account>,
    pub block_hashes: HashMap<u64, H256>,
}

impl Db {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            block_hashes: HashMap::new(),
        }
    }

    pub fn add_accounts(&mut self, accounts: Vec<(Address, Account)>) {
        self.accounts.extend(accounts);
    }

    pub fn add_block_hashes(&mut self, block_hashes: Vec<(u64, H256)>) {
        self.block_hashes.extend(block_hashes);
    }

    pub fn with_accounts(mut self, accounts: HashMap<Address, Account>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_block_hashes(mut self, block_hashes: HashMap<u64, H256>) -> Self {
        self.block_hashes = block_hashes;
        self
    }
}

impl Database for Db {
    fn get_account_info(&self, address: Address) -> AccountInfo {
        self.accounts
            .get(&address)
            .cloned()
            .unwrap_or_default()
            .info
    }

    fn get_storage_slot(&self, address: Address, key: H256) -> U256 {
        self.accounts
            .get(&address)
            .and_then(|account| account.storage.get(&key))
            .map(|slot| slot.original_value)
            .unwrap_or_else(U256::zero)
    }

    fn get_block_hash(&self, block_number: u64) -> Option<H256> {
        self.block_hashes.get(&block_number).copied()
    }
}

