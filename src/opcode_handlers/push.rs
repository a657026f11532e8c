use crate::{
    call_frame::CallFrame,
    errors::{OpcodeSuccess, VMError},
    gas_cost,
    vm::VM,
};
use ethereum_types::U256;

impl VM {
    /// PUSH0: pushes the constant zero (Shanghai onward).
    pub fn op_push0(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        if !self.env.revision.has_push0() {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::PUSH0)?;
        current_call_frame.stack.push(U256::zero())?;
        current_call_frame.increment_pc()?;
        Ok(OpcodeSuccess::Continue)
    }

    /// PUSH1..PUSH32: reads `byte_count` immediate bytes following the
    /// opcode (zero-padded if the bytecode runs out), pushes them as a
    /// big-endian word, and advances `pc` past both the opcode and its
    /// immediate data.
    pub fn op_push(
        &mut self,
        current_call_frame: &mut CallFrame,
        byte_count: usize,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::PUSHN)?;

        let start = current_call_frame
            .pc()
            .checked_add(1)
            .ok_or(VMError::Internal(crate::errors::InternalError::ArithmeticOperationOverflow))?;
        let end = start.saturating_add(byte_count).min(current_call_frame.bytecode.len());
        let available = current_call_frame.bytecode.get(start..end).unwrap_or(&[]);

        let mut word_bytes = [0u8; 32];
        let offset = 32usize.saturating_sub(byte_count);
        if let Some(dst) = word_bytes.get_mut(offset..offset.saturating_add(available.len())) {
            dst.copy_from_slice(available);
        }
        let value = U256::from_big_endian(&word_bytes);

        current_call_frame.stack.push(value)?;
        current_call_frame.increment_pc_by(byte_count.saturating_add(1))?;
        Ok(OpcodeSuccess::Continue)
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::new_blank_call_frame;
    use ethereum_types::U256;

    #[test]
    fn push1_reads_a_single_byte() {
        let mut vm = crate::utils::new_vm_with_ops(&[0x60, 0x2a]);
        let mut frame = new_blank_call_frame();
        frame.assign_bytecode(bytes::Bytes::copy_from_slice(&[0x60, 0x2a]));
        vm.op_push(&mut frame, 1).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), U256::from(0x2a));
        assert_eq!(frame.pc(), 2);
    }

    #[test]
    fn push_past_the_end_of_bytecode_is_zero_padded() {
        let mut vm = crate::utils::new_vm_with_ops(&[0x61, 0xff]);
        let mut frame = new_blank_call_frame();
        frame.assign_bytecode(bytes::Bytes::copy_from_slice(&[0x61, 0xff]));
        vm.op_push(&mut frame, 2).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), U256::from(0xff00u32));
    }
}
