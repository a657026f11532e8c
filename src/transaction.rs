use ethereum_types::{Address, H256};

use crate::{
    constants::{
        TX_ACCESS_LIST_ADDRESS_COST, TX_ACCESS_LIST_STORAGE_KEY_COST, TX_BASE_COST,
        TX_CREATE_GAS_COST, TX_DATA_COST_PER_NON_ZERO, TX_DATA_COST_PER_ZERO,
    },
    errors::{OutOfGasError, VMError},
    revision::Revision,
};

/// Whether a transaction targets an existing account (a message call) or
/// has no `to` and deploys new code (a contract creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Call(Address),
    Create,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<H256>,
}

/// Sums the flat 21000 base cost, the per-byte calldata cost (4 for a zero
/// byte, 16 otherwise), the 32000 surcharge for contract creation, and the
/// pre-warming cost of any EIP-2930 access list entries.
pub fn intrinsic_gas(
    kind: TxKind,
    calldata: &[u8],
    access_list: &[AccessListItem],
    revision: Revision,
) -> Result<u64, VMError> {
    let mut gas = TX_BASE_COST;

    if matches!(kind, TxKind::Create) {
        gas = gas
            .checked_add(TX_CREATE_GAS_COST)
            .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
    }

    for &byte in calldata {
        let cost = if byte == 0 {
            TX_DATA_COST_PER_ZERO
        } else {
            TX_DATA_COST_PER_NON_ZERO
        };
        gas = gas
            .checked_add(cost)
            .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
    }

    if revision.has_access_lists() {
        for item in access_list {
            gas = gas
                .checked_add(TX_ACCESS_LIST_ADDRESS_COST)
                .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
            let keys = u64::try_from(item.storage_keys.len())
                .map_err(|_| VMError::Internal(crate::errors::InternalError::ConversionError))?;
            let keys_cost = keys
                .checked_mul(TX_ACCESS_LIST_STORAGE_KEY_COST)
                .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
            gas = gas
                .checked_add(keys_cost)
                .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
        }
    }

    Ok(gas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_call_with_no_calldata() {
        let gas = intrinsic_gas(
            TxKind::Call(Address::zero()),
            &[],
            &[],
            Revision::Cancun,
        )
        .unwrap();
        assert_eq!(gas, TX_BASE_COST);
    }

    #[test]
    fn create_adds_surcharge() {
        let gas = intrinsic_gas(TxKind::Create, &[], &[], Revision::Cancun).unwrap();
        assert_eq!(gas, TX_BASE_COST + TX_CREATE_GAS_COST);
    }

    #[test]
    fn calldata_bytes_are_priced_individually() {
        let gas = intrinsic_gas(
            TxKind::Call(Address::zero()),
            &[0, 1, 2],
            &[],
            Revision::Cancun,
        )
        .unwrap();
        assert_eq!(gas, TX_BASE_COST + TX_DATA_COST_PER_ZERO + 2 * TX_DATA_COST_PER_NON_ZERO);
    }
}
