use crate::{
    call_frame::CallFrame,
    errors::{InternalError, OpcodeSuccess, VMError},
    gas_cost,
    vm::VM,
};
use ethereum_types::U256;

// Block Information (11)
// Opcodes: BLOCKHASH, COINBASE, TIMESTAMP, NUMBER, PREVRANDAO, GASLIMIT,
// CHAINID, SELFBALANCE, BASEFEE, BLOBHASH, BLOBBASEFEE

impl VM {
    pub fn op_blockhash(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::BLOCKHASH)?;
        let block_number = current_call_frame.stack.pop()?;

        let hash = u64::try_from(block_number)
            .ok()
            .and_then(|number| self.env.block_hashes.get(&number).copied());

        let word = match hash {
            Some(hash) => U256::from_big_endian(hash.as_bytes()),
            None => U256::zero(),
        };
        current_call_frame.stack.push(word)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_coinbase(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::COINBASE)?;
        current_call_frame
            .stack
            .push(address_to_word(self.env.coinbase))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_timestamp(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::TIMESTAMP)?;
        current_call_frame.stack.push(self.env.timestamp)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_number(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::NUMBER)?;
        current_call_frame.stack.push(self.env.block_number)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_prevrandao(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::PREVRANDAO)?;
        let value = self
            .env
            .prev_randao
            .map(|hash| U256::from_big_endian(hash.as_bytes()))
            .unwrap_or_default();
        current_call_frame.stack.push(value)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_gaslimit(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::GASLIMIT)?;
        current_call_frame
            .stack
            .push(U256::from(self.env.block_gas_limit))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_chainid(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::CHAINID)?;
        current_call_frame.stack.push(U256::from(self.env.chain_id))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_selfbalance(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SELFBALANCE)?;
        let balance = self.get_balance(current_call_frame.to)?;
        current_call_frame.stack.push(balance)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_basefee(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::BASEFEE)?;
        current_call_frame.stack.push(self.env.base_fee_per_gas)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_blobhash(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        if !self.env.revision.has_blob_opcodes() {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::BLOBHASH)?;
        let index = current_call_frame.stack.pop()?;
        let index = usize::try_from(index).unwrap_or(usize::MAX);

        let value = self
            .env
            .tx_blob_hashes
            .get(index)
            .map(|hash| U256::from_big_endian(hash.as_bytes()))
            .unwrap_or_default();
        current_call_frame.stack.push(value)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_blobbasefee(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        if !self.env.revision.has_blob_opcodes() {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::BLOBBASEFEE)?;
        let fee = self.get_base_fee_per_blob_gas()?;
        current_call_frame.stack.push(fee)?;
        Ok(OpcodeSuccess::Continue)
    }
}

pub fn address_to_word(address: ethereum_types::Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

/// Truncates a 256-bit word to its low 20 bytes, the way CALL-family opcodes
/// interpret an oversized address argument from the stack.
pub fn word_to_address(word: U256) -> Result<ethereum_types::Address, VMError> {
    let mut bytes = [0u8; 32];
    word.to_big_endian(&mut bytes);
    let low20 = bytes
        .get(12..32)
        .ok_or(VMError::Internal(InternalError::ConversionError))?;
    Ok(ethereum_types::Address::from_slice(low20))
}
