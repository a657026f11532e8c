use std::collections::HashMap;

use ethereum_types::{Address, H256};

use crate::account::{Account, StorageSlot};

/// The interpreter's write journal: every account touched during a
/// transaction is copied in here on first access and mutated in place
/// afterward. Snapshot/restore for calls and reverts is just cloning and
/// replacing this map — the underlying [`crate::db::Database`] is never
/// written to directly.
pub type CacheDB = HashMap<Address, Account>;

pub fn get_account(cache: &CacheDB, address: Address) -> Option<&Account> {
    cache.get(&address)
}

pub fn get_account_mut(cache: &mut CacheDB, address: Address) -> Option<&mut Account> {
    cache.get_mut(&address)
}

pub fn insert_account(cache: &mut CacheDB, address: Address, account: Account) {
    cache.insert(address, account);
}

pub fn is_account_cached(cache: &CacheDB, address: &Address) -> bool {
    cache.contains_key(address)
}

pub fn get_account_storage_slot(cache: &CacheDB, address: Address, key: H256) -> Option<StorageSlot> {
    cache.get(&address)?.storage.get(&key).cloned()
}

pub fn is_slot_cached(cache: &CacheDB, address: &Address, key: &H256) -> bool {
    cache
        .get(address)
        .map(|account| account.storage.contains_key(key))
        .unwrap_or(false)
}

pub fn write_account_storage(cache: &mut CacheDB, address: Address, key: H256, slot: StorageSlot) {
    cache.entry(address).or_default().storage.insert(key, slot);
}

pub fn remove_account(cache: &mut CacheDB, address: &Address) {
    cache.remove(address);
}
