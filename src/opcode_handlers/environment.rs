use crate::{
    call_frame::CallFrame,
    errors::{InternalError, OpcodeSuccess, VMError},
    gas_cost,
    opcode_handlers::block::address_to_word,
    vm::VM,
};
use ethereum_types::U256;

// Environmental Information (16)
// Opcodes: ADDRESS, BALANCE, ORIGIN, CALLER, CALLVALUE, CALLDATALOAD,
// CALLDATASIZE, CALLDATACOPY, CODESIZE, CODECOPY, GASPRICE, EXTCODESIZE,
// EXTCODECOPY, RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH

impl VM {
    pub fn op_address(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::ADDRESS)?;
        current_call_frame
            .stack
            .push(address_to_word(current_call_frame.to))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_balance(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let address_word = current_call_frame.stack.pop()?;
        let address = crate::opcode_handlers::block::word_to_address(address_word)?;
        let is_warm = self.access_account(address);
        let gas_cost = gas_cost::account_access_gas_cost(is_warm, self.env.revision);
        self.increase_consumed_gas(current_call_frame, U256::from(gas_cost))?;

        let balance = self.get_balance(address)?;
        current_call_frame.stack.push(balance)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_origin(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::ORIGIN)?;
        current_call_frame
            .stack
            .push(address_to_word(self.env.origin))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_caller(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::CALLER)?;
        current_call_frame
            .stack
            .push(address_to_word(current_call_frame.msg_sender))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_callvalue(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::CALLVALUE)?;
        current_call_frame.stack.push(current_call_frame.value)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_calldataload(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::CALLDATALOAD)?;
        let offset = current_call_frame.stack.pop()?;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);

        let mut bytes = [0u8; 32];
        let calldata = &current_call_frame.calldata;
        if offset < calldata.len() {
            let end = offset.saturating_add(32).min(calldata.len());
            if let Some(src) = calldata.get(offset..end) {
                if let Some(dst) = bytes.get_mut(0..src.len()) {
                    dst.copy_from_slice(src);
                }
            }
        }
        current_call_frame.stack.push(U256::from_big_endian(&bytes))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_calldatasize(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::CALLDATASIZE)?;
        current_call_frame
            .stack
            .push(U256::from(current_call_frame.calldata.len()))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_calldatacopy(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let dest_offset = current_call_frame.stack.pop()?;
        let data_offset = current_call_frame.stack.pop()?;
        let size = current_call_frame.stack.pop()?;

        let dest_offset = usize::try_from(dest_offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let size = usize::try_from(size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let data_offset = usize::try_from(data_offset).unwrap_or(usize::MAX);

        let expansion_cost = current_call_frame.memory.expansion_cost(dest_offset, size)?;
        let gas_cost = gas_cost::copy_gas_cost(3, size, expansion_cost)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let data = read_padded_slice(&current_call_frame.calldata, data_offset, size);
        current_call_frame.memory.store_bytes(dest_offset, &data)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_codesize(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::CODESIZE)?;
        current_call_frame
            .stack
            .push(U256::from(current_call_frame.bytecode.len()))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_codecopy(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let dest_offset = current_call_frame.stack.pop()?;
        let code_offset = current_call_frame.stack.pop()?;
        let size = current_call_frame.stack.pop()?;

        let dest_offset = usize::try_from(dest_offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let size = usize::try_from(size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let code_offset = usize::try_from(code_offset).unwrap_or(usize::MAX);

        let expansion_cost = current_call_frame.memory.expansion_cost(dest_offset, size)?;
        let gas_cost = gas_cost::copy_gas_cost(3, size, expansion_cost)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let data = read_padded_slice(&current_call_frame.bytecode, code_offset, size);
        current_call_frame.memory.store_bytes(dest_offset, &data)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_gasprice(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::GASPRICE)?;
        current_call_frame.stack.push(self.env.gas_price)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_extcodesize(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let address_word = current_call_frame.stack.pop()?;
        let address = crate::opcode_handlers::block::word_to_address(address_word)?;
        let is_warm = self.access_account(address);
        let gas_cost = gas_cost::account_access_gas_cost(is_warm, self.env.revision);
        self.increase_consumed_gas(current_call_frame, U256::from(gas_cost))?;

        let code = self.get_bytecode(address)?;
        current_call_frame.stack.push(U256::from(code.len()))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_extcodecopy(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let address_word = current_call_frame.stack.pop()?;
        let dest_offset = current_call_frame.stack.pop()?;
        let code_offset = current_call_frame.stack.pop()?;
        let size = current_call_frame.stack.pop()?;

        let address = crate::opcode_handlers::block::word_to_address(address_word)?;
        let dest_offset = usize::try_from(dest_offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let size = usize::try_from(size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let code_offset = usize::try_from(code_offset).unwrap_or(usize::MAX);

        let is_warm = self.access_account(address);
        let expansion_cost = current_call_frame.memory.expansion_cost(dest_offset, size)?;
        let gas_cost =
            gas_cost::extcodecopy_gas_cost(size, expansion_cost, is_warm, self.env.revision)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let code = self.get_bytecode(address)?;
        let data = read_padded_slice(&code, code_offset, size);
        current_call_frame.memory.store_bytes(dest_offset, &data)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_returndatasize(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::RETURNDATASIZE)?;
        current_call_frame
            .stack
            .push(U256::from(current_call_frame.return_data.len()))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_returndatacopy(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let dest_offset = current_call_frame.stack.pop()?;
        let data_offset = current_call_frame.stack.pop()?;
        let size = current_call_frame.stack.pop()?;

        let dest_offset = usize::try_from(dest_offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let size = usize::try_from(size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let data_offset = usize::try_from(data_offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;

        let end = data_offset
            .checked_add(size)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        if end > current_call_frame.return_data.len() {
            return Err(VMError::ReturnDataOutOfBounds);
        }

        let expansion_cost = current_call_frame.memory.expansion_cost(dest_offset, size)?;
        let gas_cost = gas_cost::copy_gas_cost(3, size, expansion_cost)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let data = current_call_frame
            .return_data
            .get(data_offset..end)
            .ok_or(VMError::ReturnDataOutOfBounds)?
            .to_vec();
        current_call_frame.memory.store_bytes(dest_offset, &data)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_extcodehash(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let address_word = current_call_frame.stack.pop()?;
        let address = crate::opcode_handlers::block::word_to_address(address_word)?;
        let is_warm = self.access_account(address);
        let gas_cost = gas_cost::account_access_gas_cost(is_warm, self.env.revision);
        self.increase_consumed_gas(current_call_frame, U256::from(gas_cost))?;

        let account_info = self.get_account_info(address)?;
        if account_info.is_empty() {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        let hash = keccak_hash::keccak(account_info.bytecode.as_ref());
        current_call_frame
            .stack
            .push(U256::from_big_endian(hash.as_bytes()))?;
        Ok(OpcodeSuccess::Continue)
    }
}

fn read_padded_slice(data: &[u8], offset: usize, size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    if offset >= data.len() {
        return out;
    }
    let end = offset.saturating_add(size).min(data.len());
    if let Some(src) = data.get(offset..end) {
        if let Some(dst) = out.get_mut(0..src.len()) {
            dst.copy_from_slice(src);
        }
    }
    out
}
