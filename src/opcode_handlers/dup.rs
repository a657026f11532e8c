use crate::{
    call_frame::CallFrame,
    errors::{OpcodeSuccess, VMError},
    gas_cost,
    vm::VM,
};

impl VM {
    /// DUP1..DUP16: pushes a copy of the stack item `depth` slots from the
    /// top (`depth` is 0-based: DUP1 duplicates the top item itself).
    pub fn op_dup(
        &mut self,
        current_call_frame: &mut CallFrame,
        depth: usize,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::DUPN)?;
        let value = current_call_frame.stack.get(depth)?;
        current_call_frame.stack.push(value)?;
        Ok(OpcodeSuccess::Continue)
    }
}
