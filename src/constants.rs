use ethereum_types::U256;

pub const STACK_LIMIT: usize = 1024;
pub const MAX_CALL_DEPTH: usize = 1024;

pub const WORD_SIZE: usize = 32;

pub const TX_BASE_COST: u64 = 21_000;
pub const TX_CREATE_GAS_COST: u64 = 32_000;
pub const TX_DATA_COST_PER_NON_ZERO: u64 = 16;
pub const TX_DATA_COST_PER_ZERO: u64 = 4;
pub const TX_ACCESS_LIST_ADDRESS_COST: u64 = 2_400;
pub const TX_ACCESS_LIST_STORAGE_KEY_COST: u64 = 1_900;

pub const MAX_CODE_SIZE: usize = 0x6000;
pub const MAX_INIT_CODE_SIZE: usize = 2 * MAX_CODE_SIZE;
pub const INVALID_CONTRACT_PREFIX: u8 = 0xef;

pub const CODE_DEPOSIT_COST_PER_BYTE: u64 = 200;

pub const GAS_REFUND_DENOMINATOR_LONDON: u64 = 5;
pub const GAS_REFUND_DENOMINATOR_PRE_LONDON: u64 = 2;

pub const CREATE_DEPOSIT_SIZE: usize = 32;

pub const SELFDESTRUCT_REFUND: u64 = 24_000;

pub const COLD_ACCOUNT_ACCESS_COST: u64 = 2_600;
pub const WARM_ACCESS_COST: u64 = 100;
pub const COLD_STORAGE_ACCESS_COST: u64 = 2_100;

pub const SLOAD_COST_PRE_BERLIN: u64 = 800;
pub const SSTORE_STIPEND: u64 = 2_300;

pub const SSTORE_SET_GAS_COST: u64 = 20_000;
pub const SSTORE_RESET_GAS_COST_PRE_BERLIN: u64 = 5_000;
pub const SSTORE_RESET_GAS_COST_BERLIN: u64 = 2_900;
pub const SSTORE_CLEARS_SCHEDULE_PRE_LONDON: u64 = 15_000;
pub const SSTORE_CLEARS_SCHEDULE_LONDON: u64 = 4_800;

pub const CALL_STIPEND: u64 = 2_300;
pub const CALL_VALUE_COST: u64 = 9_000;
pub const CALL_NEW_ACCOUNT_COST: u64 = 25_000;

pub const MAX_BLOCK_GAS_LIMIT: u64 = 30_000_000;

pub const BLOB_GAS_PER_BLOB: u64 = 131_072;
pub const MAX_BLOB_NUMBER_PER_BLOCK: u64 = 6;
pub const MIN_BASE_FEE_PER_BLOB_GAS: u64 = 1;
pub const BLOB_BASE_FEE_UPDATE_FRACTION: u64 = 3_338_477;
pub const TARGET_BLOB_GAS_PER_BLOCK: u64 = BLOB_GAS_PER_BLOB * 3;

pub const EMPTY_CODE_HASH_STR: &str =
    "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a47";

pub fn u256_gas(value: u64) -> U256 {
    U256::from(value)
}
