use crate::{
    account::Log,
    call_frame::CallFrame,
    errors::{InternalError, OpcodeSuccess, VMError},
    gas_cost,
    vm::VM,
};
use ethereum_types::H256;

impl VM {
    /// LOG0..LOG4: pops `offset`, `size`, and `topic_count` topics, then
    /// appends a [`Log`] to the originating call frame. Forbidden inside a
    /// static context.
    pub fn op_log(
        &mut self,
        current_call_frame: &mut CallFrame,
        topic_count: u8,
    ) -> Result<OpcodeSuccess, VMError> {
        if current_call_frame.is_static {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }

        let offset = current_call_frame.stack.pop()?;
        let size = current_call_frame.stack.pop()?;

        let mut topics = Vec::with_capacity(topic_count as usize);
        for _ in 0..topic_count {
            let topic = current_call_frame.stack.pop()?;
            let mut bytes = [0u8; 32];
            topic.to_big_endian(&mut bytes);
            topics.push(H256::from(bytes));
        }

        let offset = usize::try_from(offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let size = usize::try_from(size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;

        let expansion_cost = current_call_frame.memory.expansion_cost(offset, size)?;
        let gas_cost = gas_cost::log_gas_cost(size, u64::from(topic_count), expansion_cost)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let data = current_call_frame.memory.load_range(offset, size)?;

        current_call_frame.logs.push(Log {
            address: current_call_frame.to,
            topics,
            data: bytes::Bytes::from(data),
        });

        tracing::trace!(address = ?current_call_frame.to, topic_count, size, "emitted log");

        Ok(OpcodeSuccess::Continue)
    }
}
