use crate::{
    call_frame::CallFrame,
    errors::{InternalError, OpcodeSuccess, VMError},
    gas_cost,
    vm::VM,
};
use ethereum_types::U256;

// Comparison & Bitwise Logic Operations (14)
// Opcodes: LT, GT, SLT, SGT, EQ, ISZERO, AND, OR, XOR, NOT, BYTE, SHL, SHR, SAR

impl VM {
    pub fn op_lt(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::LT)?;
        let lho = current_call_frame.stack.pop()?;
        let rho = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(bool_to_word(lho < rho))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_gt(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::GT)?;
        let lho = current_call_frame.stack.pop()?;
        let rho = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(bool_to_word(lho > rho))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_slt(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SLT)?;
        let lho = current_call_frame.stack.pop()?;
        let rho = current_call_frame.stack.pop()?;
        current_call_frame
            .stack
            .push(bool_to_word(signed_cmp(lho, rho) == std::cmp::Ordering::Less))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_sgt(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SGT)?;
        let lho = current_call_frame.stack.pop()?;
        let rho = current_call_frame.stack.pop()?;
        current_call_frame
            .stack
            .push(bool_to_word(signed_cmp(lho, rho) == std::cmp::Ordering::Greater))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_eq(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::EQ)?;
        let lho = current_call_frame.stack.pop()?;
        let rho = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(bool_to_word(lho == rho))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_iszero(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::ISZERO)?;
        let value = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(bool_to_word(value.is_zero()))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_and(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::AND)?;
        let a = current_call_frame.stack.pop()?;
        let b = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(a & b)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_or(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::OR)?;
        let a = current_call_frame.stack.pop()?;
        let b = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(a | b)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_xor(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::XOR)?;
        let a = current_call_frame.stack.pop()?;
        let b = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(a ^ b)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_not(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::NOT)?;
        let value = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(!value)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_byte(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::BYTE)?;
        let byte_index = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;

        if byte_index >= U256::from(32) {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        let index = byte_index.as_usize();
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        let byte = bytes.get(index).copied().unwrap_or(0);
        current_call_frame.stack.push(U256::from(byte))?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_shl(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SHL)?;
        let shift = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(checked_shift_left(value, shift)?)?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_shr(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SHR)?;
        let shift = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;
        if shift >= U256::from(256) {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }
        current_call_frame.stack.push(value >> shift.as_usize())?;
        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_sar(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SAR)?;
        let shift = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;

        let is_negative = value.bit(255);
        if shift >= U256::from(256) {
            let result = if is_negative { U256::MAX } else { U256::zero() };
            current_call_frame.stack.push(result)?;
            return Ok(OpcodeSuccess::Continue);
        }

        let shifted = value >> shift.as_usize();
        let result = if is_negative {
            let remaining = U256::from(256)
                .checked_sub(shift)
                .ok_or(VMError::Internal(InternalError::ArithmeticOperationUnderflow))?;
            let mask = checked_shift_left(U256::MAX, remaining)?;
            shifted | mask
        } else {
            shifted
        };
        current_call_frame.stack.push(result)?;
        Ok(OpcodeSuccess::Continue)
    }
}

fn bool_to_word(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

fn signed_cmp(a: U256, b: U256) -> std::cmp::Ordering {
    let a_negative = a.bit(255);
    let b_negative = b.bit(255);
    match (a_negative, b_negative) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.cmp(&b),
    }
}

/// `value << shift`, saturating to zero once `shift >= 256` instead of
/// panicking (`U256`'s own `Shl` impl panics on an out-of-range shift).
pub fn checked_shift_left(value: U256, shift: U256) -> Result<U256, VMError> {
    if shift >= U256::from(256) {
        return Ok(U256::zero());
    }
    let shift = usize::try_from(shift).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
    Ok(value << shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_left_saturates_past_256() {
        let result = checked_shift_left(U256::one(), U256::from(256)).unwrap();
        assert_eq!(result, U256::zero());
    }

    #[test]
    fn signed_comparison_treats_high_bit_as_sign() {
        let negative_one = U256::MAX;
        assert_eq!(signed_cmp(negative_one, U256::one()), std::cmp::Ordering::Less);
    }
}
