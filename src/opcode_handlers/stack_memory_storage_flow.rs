use crate::{
    call_frame::CallFrame,
    constants::SSTORE_STIPEND,
    errors::{InternalError, OpcodeSuccess, ResultReason, VMError},
    gas_cost,
    vm::VM,
};
use ethereum_types::U256;

// Stack, Memory, Storage and Flow Operations
// Opcodes: POP, MLOAD, MSTORE, MSTORE8, SLOAD, SSTORE, JUMP, JUMPI, PC,
// MSIZE, GAS, JUMPDEST, TLOAD, TSTORE, MCOPY

impl VM {
    pub fn op_pop(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::POP)?;
        current_call_frame.stack.pop()?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_mload(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let offset = current_call_frame.stack.pop()?;
        let offset = usize::try_from(offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;

        let expansion_cost = current_call_frame.memory.expansion_cost(offset, 32)?;
        let gas_cost = U256::from(3u64)
            .checked_add(expansion_cost)
            .ok_or(VMError::OutOfGas(crate::errors::OutOfGasError::GasCostOverflow))?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let value = current_call_frame.memory.load_word(offset)?;
        current_call_frame.stack.push(value)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_mstore(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let offset = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;
        let offset = usize::try_from(offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;

        let expansion_cost = current_call_frame.memory.expansion_cost(offset, 32)?;
        let gas_cost = U256::from(3u64)
            .checked_add(expansion_cost)
            .ok_or(VMError::OutOfGas(crate::errors::OutOfGasError::GasCostOverflow))?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        current_call_frame.memory.store_bytes(offset, &bytes)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_mstore8(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let offset = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;
        let offset = usize::try_from(offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;

        let expansion_cost = current_call_frame.memory.expansion_cost(offset, 1)?;
        let gas_cost = U256::from(3u64)
            .checked_add(expansion_cost)
            .ok_or(VMError::OutOfGas(crate::errors::OutOfGasError::GasCostOverflow))?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let byte = value.byte(0);
        current_call_frame.memory.store_byte(offset, byte)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_sload(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let key = current_call_frame.stack.pop()?;
        let address = current_call_frame.to;

        let is_warm = self.access_storage_slot(address, key);
        let gas_cost = gas_cost::sload_gas_cost(is_warm, self.env.revision);
        self.increase_consumed_gas(current_call_frame, U256::from(gas_cost))?;

        let value = self.get_storage_slot_value(address, key)?;
        current_call_frame.stack.push(value)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_sstore(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        if current_call_frame.is_static {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }

        // EIP-1706: SSTORE is forbidden whenever less than the 2300 gas
        // stipend remains, regardless of the actual dynamic cost computed
        // below.
        let gas_remaining = current_call_frame
            .gas_limit
            .checked_sub(current_call_frame.gas_used)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationUnderflow))?;
        if gas_remaining <= SSTORE_STIPEND {
            return Err(VMError::OutOfGas(
                crate::errors::OutOfGasError::NotEnoughGasForDynamicCost,
            ));
        }

        let key = current_call_frame.stack.pop()?;
        let new_value = current_call_frame.stack.pop()?;
        let address = current_call_frame.to;

        let is_warm = self.access_storage_slot(address, key);
        let original_value = self.get_original_storage_slot_value(address, key)?;
        let current_value = self.get_storage_slot_value(address, key)?;

        let cost = gas_cost::sstore_gas_cost(original_value, current_value, new_value, is_warm, self.env.revision)?;
        self.increase_consumed_gas(current_call_frame, U256::from(cost.gas))?;
        self.apply_refund_delta(cost.refund_delta)?;

        self.set_storage_slot_value(address, key, new_value)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_jump(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::JUMP)?;
        let target = current_call_frame.stack.pop()?;
        self.jump(current_call_frame, target)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_jumpi(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::JUMPI)?;
        let target = current_call_frame.stack.pop()?;
        let condition = current_call_frame.stack.pop()?;

        if condition.is_zero() {
            current_call_frame.increment_pc()?;
        } else {
            self.jump(current_call_frame, target)?;
        }
        Ok(OpcodeSuccess::Continue)
    }

    /// Shared by JUMP and JUMPI: validates `target` against the frame's
    /// precomputed jump-destination set before moving `pc` there.
    fn jump(&self, current_call_frame: &mut CallFrame, target: U256) -> Result<(), VMError> {
        let target = usize::try_from(target).map_err(|_| VMError::InvalidJump)?;
        if !current_call_frame.valid_jump_destinations.contains(&target) {
            return Err(VMError::InvalidJump);
        }
        current_call_frame.pc = target;
        Ok(())
    }

    pub fn op_pc(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::PC)?;
        current_call_frame.stack.push(U256::from(current_call_frame.pc()))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_msize(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::MSIZE)?;
        current_call_frame
            .stack
            .push(U256::from(current_call_frame.memory.len()))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_gas(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::GAS)?;
        let remaining = current_call_frame
            .gas_limit
            .checked_sub(current_call_frame.gas_used)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationUnderflow))?;
        current_call_frame.stack.push(U256::from(remaining))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_jumpdest(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::JUMPDEST)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_tload(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        if !self.env.revision.has_transient_storage() {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, U256::from(100u64))?;
        let key = current_call_frame.stack.pop()?;
        let value = self
            .transient_storage
            .get(&(current_call_frame.to, key))
            .copied()
            .unwrap_or_default();
        current_call_frame.stack.push(value)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_tstore(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        if !self.env.revision.has_transient_storage() {
            return Err(VMError::InvalidOpcode);
        }
        if current_call_frame.is_static {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }
        self.increase_consumed_gas(current_call_frame, U256::from(100u64))?;
        let key = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;
        self.transient_storage.insert((current_call_frame.to, key), value);
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_mcopy(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        if !self.env.revision.has_mcopy() {
            return Err(VMError::InvalidOpcode);
        }
        let dest_offset = current_call_frame.stack.pop()?;
        let src_offset = current_call_frame.stack.pop()?;
        let size = current_call_frame.stack.pop()?;

        let dest_offset = usize::try_from(dest_offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let src_offset = usize::try_from(src_offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let size = usize::try_from(size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;

        let reach = dest_offset.max(src_offset);
        let expansion_cost = current_call_frame.memory.expansion_cost(reach, size)?;
        let gas_cost = gas_cost::copy_gas_cost(3, size, expansion_cost)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        current_call_frame.memory.copy(src_offset, dest_offset, size)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_stop(&mut self, _current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        Ok(OpcodeSuccess::Result(ResultReason::Stop))
    }

    pub fn op_return(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let offset = current_call_frame.stack.pop()?;
        let size = current_call_frame.stack.pop()?;
        let offset = usize::try_from(offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let size = usize::try_from(size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;

        let expansion_cost = current_call_frame.memory.expansion_cost(offset, size)?;
        self.increase_consumed_gas(current_call_frame, expansion_cost)?;

        let data = current_call_frame.memory.load_range(offset, size)?;
        current_call_frame.output = bytes::Bytes::from(data);
        Ok(OpcodeSuccess::Result(ResultReason::Return))
    }

    pub fn op_revert(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let offset = current_call_frame.stack.pop()?;
        let size = current_call_frame.stack.pop()?;
        let offset = usize::try_from(offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let size = usize::try_from(size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;

        let expansion_cost = current_call_frame.memory.expansion_cost(offset, size)?;
        self.increase_consumed_gas(current_call_frame, expansion_cost)?;

        let data = current_call_frame.memory.load_range(offset, size)?;
        current_call_frame.output = bytes::Bytes::from(data);
        Err(VMError::RevertOpcode)
    }

    pub fn op_invalid(&mut self, _current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        Err(VMError::InvalidOpcode)
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::new_blank_call_frame;

    #[test]
    fn jump_to_a_jumpdest_succeeds() {
        let mut vm = crate::utils::new_vm_with_ops(&[]);
        let mut frame = new_blank_call_frame();
        frame.assign_bytecode(bytes::Bytes::copy_from_slice(&[0x5b, 0x00]));
        frame.stack.push(ethereum_types::U256::zero()).unwrap();
        vm.op_jump(&mut frame).unwrap();
        assert_eq!(frame.pc(), 0);
    }

    #[test]
    fn jump_to_a_non_jumpdest_is_rejected() {
        let mut vm = crate::utils::new_vm_with_ops(&[]);
        let mut frame = new_blank_call_frame();
        frame.assign_bytecode(bytes::Bytes::copy_from_slice(&[0x00, 0x00]));
        frame.stack.push(ethereum_types::U256::one()).unwrap();
        let result = vm.op_jump(&mut frame);
        assert!(matches!(result, Err(crate::errors::VMError::InvalidJump)));
    }
}
