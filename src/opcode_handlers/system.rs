use crate::{
    call_frame::CallFrame,
    constants::SELFDESTRUCT_REFUND,
    errors::{InternalError, OpcodeSuccess, ResultReason, VMError},
    gas_cost,
    opcode_handlers::block::word_to_address,
    vm::{CallKind, VM},
};
use bytes::Bytes;
use ethereum_types::U256;

// System Operations
// Opcodes: CREATE, CALL, CALLCODE, RETURN, DELEGATECALL, CREATE2,
// STATICCALL, REVERT, INVALID, SELFDESTRUCT

impl VM {
    pub fn op_create(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.op_create_or_create2(current_call_frame, false)
    }

    pub fn op_create2(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.op_create_or_create2(current_call_frame, true)
    }

    fn op_create_or_create2(
        &mut self,
        current_call_frame: &mut CallFrame,
        is_create2: bool,
    ) -> Result<OpcodeSuccess, VMError> {
        if current_call_frame.is_static {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }

        let value = current_call_frame.stack.pop()?;
        let offset = current_call_frame.stack.pop()?;
        let size = current_call_frame.stack.pop()?;
        let salt = if is_create2 {
            Some(current_call_frame.stack.pop()?)
        } else {
            None
        };

        let offset = usize::try_from(offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let size = usize::try_from(size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;

        let expansion_cost = current_call_frame.memory.expansion_cost(offset, size)?;
        let gas_cost = gas_cost::create_gas_cost(size, expansion_cost, is_create2)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let init_code = current_call_frame.memory.load_range(offset, size)?;

        let remaining_gas = current_call_frame
            .gas_limit
            .checked_sub(current_call_frame.gas_used)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationUnderflow))?;
        let gas_for_call = gas_cost::max_message_call_gas(remaining_gas);
        self.increase_consumed_gas(current_call_frame, U256::from(gas_for_call))?;

        let outcome = self.create(
            current_call_frame,
            value,
            Bytes::from(init_code),
            salt,
            gas_for_call,
        )?;

        let unused = gas_for_call.saturating_sub(outcome.gas_used);
        current_call_frame.gas_used = current_call_frame.gas_used.saturating_sub(unused);

        current_call_frame.stack.push(outcome.address)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_call(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let gas_stack = current_call_frame.stack.pop()?;
        let address_word = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;
        let args_offset = current_call_frame.stack.pop()?;
        let args_size = current_call_frame.stack.pop()?;
        let ret_offset = current_call_frame.stack.pop()?;
        let ret_size = current_call_frame.stack.pop()?;

        if current_call_frame.is_static && !value.is_zero() {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }

        let address = word_to_address(address_word)?;
        self.dispatch_call(
            current_call_frame,
            CallKind::Call,
            address,
            address,
            value,
            gas_stack,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )
    }

    pub fn op_callcode(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let gas_stack = current_call_frame.stack.pop()?;
        let address_word = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;
        let args_offset = current_call_frame.stack.pop()?;
        let args_size = current_call_frame.stack.pop()?;
        let ret_offset = current_call_frame.stack.pop()?;
        let ret_size = current_call_frame.stack.pop()?;

        let address = word_to_address(address_word)?;
        self.dispatch_call(
            current_call_frame,
            CallKind::CallCode,
            address,
            current_call_frame.to,
            value,
            gas_stack,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )
    }

    pub fn op_delegatecall(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let gas_stack = current_call_frame.stack.pop()?;
        let address_word = current_call_frame.stack.pop()?;
        let args_offset = current_call_frame.stack.pop()?;
        let args_size = current_call_frame.stack.pop()?;
        let ret_offset = current_call_frame.stack.pop()?;
        let ret_size = current_call_frame.stack.pop()?;

        let address = word_to_address(address_word)?;
        self.dispatch_call(
            current_call_frame,
            CallKind::DelegateCall,
            address,
            current_call_frame.to,
            current_call_frame.value,
            gas_stack,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )
    }

    pub fn op_staticcall(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let gas_stack = current_call_frame.stack.pop()?;
        let address_word = current_call_frame.stack.pop()?;
        let args_offset = current_call_frame.stack.pop()?;
        let args_size = current_call_frame.stack.pop()?;
        let ret_offset = current_call_frame.stack.pop()?;
        let ret_size = current_call_frame.stack.pop()?;

        let address = word_to_address(address_word)?;
        self.dispatch_call(
            current_call_frame,
            CallKind::StaticCall,
            address,
            address,
            U256::zero(),
            gas_stack,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch_call(
        &mut self,
        current_call_frame: &mut CallFrame,
        kind: CallKind,
        code_address: ethereum_types::Address,
        storage_address: ethereum_types::Address,
        value: U256,
        gas_stack: U256,
        args_offset: U256,
        args_size: U256,
        ret_offset: U256,
        ret_size: U256,
    ) -> Result<OpcodeSuccess, VMError> {
        let args_offset = usize::try_from(args_offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let args_size = usize::try_from(args_size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let ret_offset = usize::try_from(ret_offset).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let ret_size = usize::try_from(ret_size).map_err(|_| VMError::Internal(InternalError::ConversionError))?;

        let is_warm = self.access_account(code_address);
        let target_is_empty = self.get_account_info(code_address)?.is_empty();

        let args_expansion = current_call_frame.memory.expansion_cost(args_offset, args_size)?;
        let ret_expansion = current_call_frame.memory.expansion_cost(ret_offset, ret_size)?;
        let memory_expansion_cost = args_expansion.max(ret_expansion);

        let gas_cost = gas_cost::call_gas_cost(
            is_warm,
            value.is_zero(),
            target_is_empty,
            matches!(kind, CallKind::Call),
            memory_expansion_cost,
            self.env.revision,
        )?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let remaining_gas = current_call_frame
            .gas_limit
            .checked_sub(current_call_frame.gas_used)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationUnderflow))?;
        let capped = gas_cost::max_message_call_gas(remaining_gas);
        let requested = u64::try_from(gas_stack).unwrap_or(u64::MAX);
        let forwarded_base = requested.min(capped);
        self.increase_consumed_gas(current_call_frame, U256::from(forwarded_base))?;

        let mut gas_for_call = forwarded_base;
        if !value.is_zero() {
            gas_for_call = gas_for_call.saturating_add(crate::constants::CALL_STIPEND);
        }

        let call_args = current_call_frame.memory.load_range(args_offset, args_size)?;

        let result = self.generic_call(
            current_call_frame,
            kind,
            code_address,
            storage_address,
            value,
            gas_for_call,
            Bytes::from(call_args),
        )?;

        current_call_frame.gas_used = current_call_frame.gas_used.saturating_sub(result.gas_left);

        if result.success {
            current_call_frame.logs.extend(result.logs);
        }

        let copy_len = result.output.len().min(ret_size);
        if copy_len > 0 {
            let data = result.output.get(0..copy_len).unwrap_or(&[]).to_vec();
            current_call_frame.memory.store_bytes(ret_offset, &data)?;
        }
        current_call_frame.return_data = result.output.clone();

        current_call_frame
            .stack
            .push(if result.success { U256::one() } else { U256::zero() })?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_selfdestruct(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        if current_call_frame.is_static {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }

        let beneficiary_word = current_call_frame.stack.pop()?;
        let beneficiary = word_to_address(beneficiary_word)?;

        let is_warm = self.access_account(beneficiary);
        let beneficiary_is_empty = self.get_account_info(beneficiary)?.is_empty();
        let balance = self.get_balance(current_call_frame.to)?;

        let gas_cost = gas_cost::selfdestruct_gas_cost(
            is_warm,
            beneficiary_is_empty,
            balance.is_zero(),
            self.env.revision,
        )?;
        self.increase_consumed_gas(current_call_frame, U256::from(gas_cost))?;

        self.transfer_balance_for_selfdestruct(current_call_frame.to, beneficiary, balance)?;

        let created_this_tx = self
            .accrued_substate
            .created_accounts
            .contains(&current_call_frame.to);
        let should_destroy = !self.env.revision.restricts_selfdestruct() || created_this_tx;

        if should_destroy {
            self.accrued_substate.self_destruct_set.insert(current_call_frame.to);
            if !self.env.revision.reduced_refunds() {
                self.apply_refund_delta(SELFDESTRUCT_REFUND as i64)?;
            }
        }

        Ok(OpcodeSuccess::Result(ResultReason::SelfDestruct))
    }
}
