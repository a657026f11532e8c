use crate::{
    call_frame::CallFrame,
    errors::{OpcodeSuccess, VMError},
    gas_cost,
    vm::VM,
};

impl VM {
    /// SWAP1..SWAP16: swaps the top of the stack with the item `depth`
    /// slots below it (`depth` is 1-based: SWAP1 swaps with the second item).
    pub fn op_swap(
        &mut self,
        current_call_frame: &mut CallFrame,
        depth: usize,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SWAPN)?;
        current_call_frame.stack.swap(depth)?;
        Ok(OpcodeSuccess::Continue)
    }
}
