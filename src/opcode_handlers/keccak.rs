use crate::{
    call_frame::CallFrame,
    errors::{InternalError, OpcodeSuccess, VMError},
    gas_cost,
    vm::VM,
};
use ethereum_types::U256;

impl VM {
    pub fn op_keccak256(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let offset = current_call_frame.stack.pop()?;
        let size = current_call_frame.stack.pop()?;

        let offset = usize::try_from(offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let size = usize::try_from(size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;

        let expansion_cost = current_call_frame.memory.expansion_cost(offset, size)?;
        let gas_cost = gas_cost::keccak256_gas_cost(size, expansion_cost)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let data = current_call_frame.memory.load_range(offset, size)?;
        let hash = keccak_hash::keccak(&data);
        current_call_frame
            .stack
            .push(U256::from_big_endian(hash.as_bytes()))?;

        Ok(OpcodeSuccess::Continue)
    }
}
