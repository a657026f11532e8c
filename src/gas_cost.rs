use ethereum_types::U256;

use crate::{
    constants::*,
    errors::{InternalError, OutOfGasError, VMError},
    revision::Revision,
    storage_status::{self, StorageStatus},
};

pub const ADD: U256 = U256([3, 0, 0, 0]);
pub const SUB: U256 = U256([3, 0, 0, 0]);
pub const MUL: U256 = U256([5, 0, 0, 0]);
pub const DIV: U256 = U256([5, 0, 0, 0]);
pub const SDIV: U256 = U256([5, 0, 0, 0]);
pub const MOD: U256 = U256([5, 0, 0, 0]);
pub const SMOD: U256 = U256([5, 0, 0, 0]);
pub const ADDMOD: U256 = U256([8, 0, 0, 0]);
pub const MULMOD: U256 = U256([8, 0, 0, 0]);
pub const SIGNEXTEND: U256 = U256([5, 0, 0, 0]);
pub const LT: U256 = U256([3, 0, 0, 0]);
pub const GT: U256 = U256([3, 0, 0, 0]);
pub const SLT: U256 = U256([3, 0, 0, 0]);
pub const SGT: U256 = U256([3, 0, 0, 0]);
pub const EQ: U256 = U256([3, 0, 0, 0]);
pub const ISZERO: U256 = U256([3, 0, 0, 0]);
pub const AND: U256 = U256([3, 0, 0, 0]);
pub const OR: U256 = U256([3, 0, 0, 0]);
pub const XOR: U256 = U256([3, 0, 0, 0]);
pub const NOT: U256 = U256([3, 0, 0, 0]);
pub const BYTE: U256 = U256([3, 0, 0, 0]);
pub const SHL: U256 = U256([3, 0, 0, 0]);
pub const SHR: U256 = U256([3, 0, 0, 0]);
pub const SAR: U256 = U256([3, 0, 0, 0]);

pub const POP: U256 = U256([2, 0, 0, 0]);
pub const PC: U256 = U256([2, 0, 0, 0]);
pub const MSIZE: U256 = U256([2, 0, 0, 0]);
pub const GAS: U256 = U256([2, 0, 0, 0]);
pub const JUMPDEST: U256 = U256([1, 0, 0, 0]);
pub const JUMP: U256 = U256([8, 0, 0, 0]);
pub const JUMPI: U256 = U256([10, 0, 0, 0]);
pub const PUSH0: U256 = U256([2, 0, 0, 0]);
pub const PUSHN: U256 = U256([3, 0, 0, 0]);
pub const DUPN: U256 = U256([3, 0, 0, 0]);
pub const SWAPN: U256 = U256([3, 0, 0, 0]);

pub const STOP: U256 = U256([0, 0, 0, 0]);
pub const RETURN: U256 = U256([0, 0, 0, 0]);
pub const REVERT: U256 = U256([0, 0, 0, 0]);

pub const ADDRESS: U256 = U256([2, 0, 0, 0]);
pub const ORIGIN: U256 = U256([2, 0, 0, 0]);
pub const CALLER: U256 = U256([2, 0, 0, 0]);
pub const CALLVALUE: U256 = U256([2, 0, 0, 0]);
pub const CALLDATALOAD: U256 = U256([3, 0, 0, 0]);
pub const CALLDATASIZE: U256 = U256([2, 0, 0, 0]);
pub const CODESIZE: U256 = U256([2, 0, 0, 0]);
pub const GASPRICE: U256 = U256([2, 0, 0, 0]);
pub const RETURNDATASIZE: U256 = U256([2, 0, 0, 0]);
pub const SELFBALANCE: U256 = U256([5, 0, 0, 0]);
pub const CHAINID: U256 = U256([2, 0, 0, 0]);
pub const BASEFEE: U256 = U256([2, 0, 0, 0]);
pub const BLOBHASH: U256 = U256([3, 0, 0, 0]);
pub const BLOBBASEFEE: U256 = U256([2, 0, 0, 0]);

pub const BLOCKHASH: U256 = U256([20, 0, 0, 0]);
pub const COINBASE: U256 = U256([2, 0, 0, 0]);
pub const TIMESTAMP: U256 = U256([2, 0, 0, 0]);
pub const NUMBER: U256 = U256([2, 0, 0, 0]);
pub const PREVRANDAO: U256 = U256([2, 0, 0, 0]);
pub const GASLIMIT: U256 = U256([2, 0, 0, 0]);

pub const KECCAK256_STATIC: u64 = 30;
pub const KECCAK256_DYNAMIC_BASE: u64 = 6;

pub const LOG_STATIC: u64 = 375;
pub const LOG_DATA_COST: u64 = 8;
pub const LOG_TOPIC_COST: u64 = 375;

pub const CREATE_STATIC: u64 = 32_000;

fn checked_add(a: u64, b: u64) -> Result<u64, VMError> {
    a.checked_add(b)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))
}

fn checked_mul(a: u64, b: u64) -> Result<u64, VMError> {
    a.checked_mul(b)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))
}

fn word_count_u64(len: usize) -> Result<u64, VMError> {
    let len = u64::try_from(len).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
    len.checked_add(31)
        .map(|padded| padded / 32)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))
}

/// Cost of a copy-family opcode (CALLDATACOPY/CODECOPY/RETURNDATACOPY):
/// a static base plus 3 gas per whole/partial 32-byte word copied, on top of
/// whatever memory expansion the destination requires.
pub fn copy_gas_cost(static_cost: u64, size: usize, memory_expansion_cost: U256) -> Result<U256, VMError> {
    let words = word_count_u64(size)?;
    let dynamic = checked_mul(words, 3)?;
    let total = checked_add(static_cost, dynamic)?;
    U256::from(total)
        .checked_add(memory_expansion_cost)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))
}

/// EXTCODECOPY's base cost depends on whether the target address is warm or
/// cold (EIP-2929) from Berlin onward, or a flat historical price before.
pub fn extcodecopy_gas_cost(
    size: usize,
    memory_expansion_cost: U256,
    is_warm: bool,
    revision: Revision,
) -> Result<U256, VMError> {
    let base = if revision.has_access_lists() {
        if is_warm { WARM_ACCESS_COST } else { COLD_ACCOUNT_ACCESS_COST }
    } else {
        700
    };
    copy_gas_cost(base, size, memory_expansion_cost)
}

/// KECCAK256's dynamic cost: 6 gas per whole/partial 32-byte word hashed.
pub fn keccak256_gas_cost(size: usize, memory_expansion_cost: U256) -> Result<U256, VMError> {
    let words = word_count_u64(size)?;
    let dynamic = checked_mul(words, KECCAK256_DYNAMIC_BASE)?;
    let total = checked_add(KECCAK256_STATIC, dynamic)?;
    U256::from(total)
        .checked_add(memory_expansion_cost)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))
}

/// EXP's dynamic cost: 50 gas (10 pre-Berlin... historically 10, raised to 50
/// by EIP-160) per byte of the exponent's big-endian encoding, beyond the
/// static cost paid by the opcode handler itself.
pub fn exp_gas_cost(exponent: U256) -> Result<U256, VMError> {
    if exponent.is_zero() {
        return Ok(U256::from(10u64));
    }
    let byte_len = (256 - exponent.leading_zeros() as u64).div_ceil(8);
    let dynamic = checked_mul(byte_len, 50)?;
    let total = checked_add(10, dynamic)?;
    Ok(U256::from(total))
}

/// LOGn cost: a static base, 8 gas per byte of data, plus 375 gas per topic.
pub fn log_gas_cost(size: usize, topic_count: u64, memory_expansion_cost: U256) -> Result<U256, VMError> {
    let size_u64 = u64::try_from(size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
    let data_cost = checked_mul(size_u64, LOG_DATA_COST)?;
    let topics_cost = checked_mul(topic_count, LOG_TOPIC_COST)?;
    let total = checked_add(checked_add(LOG_STATIC, data_cost)?, topics_cost)?;
    U256::from(total)
        .checked_add(memory_expansion_cost)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))
}

/// BALANCE/EXTCODESIZE/EXTCODEHASH: warm/cold pricing from Berlin, flat 700
/// before.
pub fn account_access_gas_cost(is_warm: bool, revision: Revision) -> u64 {
    if revision.has_access_lists() {
        if is_warm { WARM_ACCESS_COST } else { COLD_ACCOUNT_ACCESS_COST }
    } else {
        700
    }
}

/// SLOAD: warm/cold pricing from Berlin, flat 800 before.
pub fn sload_gas_cost(is_warm: bool, revision: Revision) -> u64 {
    if revision.has_access_lists() {
        if is_warm { WARM_ACCESS_COST } else { COLD_STORAGE_ACCESS_COST }
    } else {
        SLOAD_COST_PRE_BERLIN
    }
}

pub struct SstoreCost {
    pub gas: u64,
    pub refund_delta: i64,
}

/// SSTORE gas and refund, following EIP-2200's nested case analysis via the
/// [`StorageStatus`] classifier (spec.md §3's table), generalized over the
/// active revision's reset cost / clears-schedule refund and whether the
/// access list applies a cold-slot surcharge.
pub fn sstore_gas_cost(
    original: U256,
    current: U256,
    new: U256,
    is_warm: bool,
    revision: Revision,
) -> Result<SstoreCost, VMError> {
    let reset_cost = if revision.has_access_lists() {
        SSTORE_RESET_GAS_COST_BERLIN
    } else {
        SSTORE_RESET_GAS_COST_PRE_BERLIN
    };
    let clears_refund = if revision.reduced_refunds() {
        SSTORE_CLEARS_SCHEDULE_LONDON as i64
    } else {
        SSTORE_CLEARS_SCHEDULE_PRE_LONDON as i64
    };
    let sload_cost = sload_gas_cost(true, revision) as i64;

    let cold_surcharge = if revision.has_access_lists() && !is_warm {
        COLD_STORAGE_ACCESS_COST
    } else {
        0
    };

    let mut refund_delta: i64 = 0;
    let status = storage_status::classify(original, current, new);

    let base_gas = match status {
        // The warm-read price only: `cold_surcharge` below supplies the
        // cold-access component once, so folding `is_warm` in here as well
        // would double-charge a cold no-op SSTORE.
        StorageStatus::Assigned => sload_gas_cost(true, revision),
        StorageStatus::Added => SSTORE_SET_GAS_COST,
        StorageStatus::Deleted => {
            refund_delta = checked_add_i64(refund_delta, clears_refund)?;
            reset_cost
        }
        StorageStatus::Modified => reset_cost,
        StorageStatus::DeletedAdded => {
            refund_delta = checked_add_i64(refund_delta, -clears_refund)?;
            sload_gas_cost(is_warm, revision)
        }
        StorageStatus::ModifiedDeleted => {
            refund_delta = checked_add_i64(refund_delta, clears_refund)?;
            sload_gas_cost(is_warm, revision)
        }
        StorageStatus::DeletedRestored => {
            refund_delta = checked_add_i64(refund_delta, -clears_refund)?;
            refund_delta = checked_add_i64(refund_delta, reset_cost as i64 - sload_cost)?;
            sload_gas_cost(is_warm, revision)
        }
        StorageStatus::AddedDeleted => {
            refund_delta = checked_add_i64(refund_delta, SSTORE_SET_GAS_COST as i64 - sload_cost)?;
            sload_gas_cost(is_warm, revision)
        }
        StorageStatus::ModifiedRestored => {
            refund_delta = checked_add_i64(refund_delta, reset_cost as i64 - sload_cost)?;
            sload_gas_cost(is_warm, revision)
        }
    };

    let gas = base_gas
        .checked_add(cold_surcharge)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;

    Ok(SstoreCost { gas, refund_delta })
}

fn checked_add_i64(a: i64, b: i64) -> Result<i64, VMError> {
    a.checked_add(b)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))
}

/// CALL-family dynamic cost: access cost for the target address, the 9000
/// gas value-transfer surcharge, and the 25000 gas new-account surcharge
/// when the call both transfers value and targets an empty account
/// (CALL only — CALLCODE/DELEGATECALL/STATICCALL never pay the new-account
/// surcharge since they cannot create accounts).
pub fn call_gas_cost(
    is_warm: bool,
    value_is_zero: bool,
    target_is_empty: bool,
    is_call_opcode: bool,
    memory_expansion_cost: U256,
    revision: Revision,
) -> Result<U256, VMError> {
    let access_cost = account_access_gas_cost(is_warm, revision);
    let mut total = access_cost;
    if !value_is_zero {
        total = checked_add(total, CALL_VALUE_COST)?;
        if is_call_opcode && target_is_empty {
            total = checked_add(total, CALL_NEW_ACCOUNT_COST)?;
        }
    }
    U256::from(total)
        .checked_add(memory_expansion_cost)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))
}

/// The 63/64ths rule (EIP-150): the amount of gas forwarded to a sub-call is
/// capped at `gas_left - gas_left/64` after the opcode's own cost is paid.
pub fn max_message_call_gas(gas_left: u64) -> u64 {
    gas_left.saturating_sub(gas_left / 64)
}

/// CREATE/CREATE2 static cost plus, for CREATE2, 6 gas per 32-byte word of
/// init code hashed for the salted address derivation.
pub fn create_gas_cost(
    init_code_size: usize,
    memory_expansion_cost: U256,
    is_create2: bool,
) -> Result<U256, VMError> {
    let mut total = CREATE_STATIC;
    if is_create2 {
        let words = word_count_u64(init_code_size)?;
        total = checked_add(total, checked_mul(words, 6)?)?;
    }
    U256::from(total)
        .checked_add(memory_expansion_cost)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))
}

/// Cost of persisting a successfully deployed contract's runtime code: 200
/// gas per byte.
pub fn code_deposit_gas_cost(code_len: usize) -> Result<u64, VMError> {
    let len = u64::try_from(code_len).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
    checked_mul(len, CODE_DEPOSIT_COST_PER_BYTE)
}

/// SELFDESTRUCT: flat 5000 pre-Berlin; from Berlin, adds the cold-account
/// surcharge for the beneficiary and, if the beneficiary is a previously
/// empty account receiving a non-zero balance, the 25000 new-account
/// surcharge.
pub fn selfdestruct_gas_cost(
    beneficiary_is_warm: bool,
    beneficiary_is_empty: bool,
    value_is_zero: bool,
    revision: Revision,
) -> Result<u64, VMError> {
    let mut total = 5_000u64;
    if revision.has_access_lists() && !beneficiary_is_warm {
        total = checked_add(total, COLD_ACCOUNT_ACCESS_COST)?;
    }
    if beneficiary_is_empty && !value_is_zero {
        total = checked_add(total, CALL_NEW_ACCOUNT_COST)?;
    }
    Ok(total)
}
