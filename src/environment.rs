use ethereum_types::{Address, H256, U256};

use crate::revision::Revision;

/// Per-transaction, per-block context visible to opcodes like ORIGIN,
/// GASPRICE, COINBASE, TIMESTAMP, NUMBER, CHAINID, BASEFEE, BLOBHASH and
/// BLOBBASEFEE. Constructed once per transaction by the embedder and handed
/// to [`crate::vm::VM::new`].
#[derive(Debug, Clone)]
pub struct Environment {
    pub origin: Address,
    pub gas_price: U256,
    pub block_number: U256,
    pub coinbase: Address,
    pub timestamp: U256,
    pub prev_randao: Option<H256>,
    pub block_gas_limit: u64,
    pub chain_id: u64,
    pub base_fee_per_gas: U256,
    pub gas_limit: u64,
    pub block_excess_blob_gas: Option<U256>,
    pub block_blob_gas_used: Option<U256>,
    pub tx_blob_hashes: Vec<H256>,
    pub tx_max_priority_fee_per_gas: Option<U256>,
    pub tx_max_fee_per_gas: Option<U256>,
    pub tx_max_fee_per_blob_gas: Option<U256>,
    pub tx_nonce: u64,
    pub block_hashes: std::collections::HashMap<u64, H256>,
    pub revision: Revision,
}

impl Environment {
    pub fn default_from_address(origin: Address) -> Self {
        Self {
            origin,
            gas_price: U256::zero(),
            block_number: U256::zero(),
            coinbase: Address::zero(),
            timestamp: U256::zero(),
            prev_randao: None,
            block_gas_limit: crate::constants::MAX_BLOCK_GAS_LIMIT,
            chain_id: 1,
            base_fee_per_gas: U256::zero(),
            gas_limit: u64::MAX,
            block_excess_blob_gas: None,
            block_blob_gas_used: None,
            tx_blob_hashes: Vec::new(),
            tx_max_priority_fee_per_gas: None,
            tx_max_fee_per_gas: None,
            tx_max_fee_per_blob_gas: None,
            tx_nonce: 0,
            block_hashes: std::collections::HashMap::new(),
            revision: Revision::default(),
        }
    }
}
