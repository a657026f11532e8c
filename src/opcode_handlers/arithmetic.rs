use crate::{
    call_frame::CallFrame,
    errors::{InternalError, OpcodeSuccess, VMError},
    gas_cost,
    opcode_handlers::bitwise_comparison::checked_shift_left,
    vm::VM,
};
use ethereum_types::U256;

// Arithmetic Operations (11)
// Opcodes: ADD, SUB, MUL, DIV, SDIV, MOD, SMOD, ADDMOD, MULMOD, EXP, SIGNEXTEND

impl VM {
    pub fn op_add(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::ADD)?;

        let augend = current_call_frame.stack.pop()?;
        let addend = current_call_frame.stack.pop()?;
        let sum = augend.overflowing_add(addend).0;
        current_call_frame.stack.push(sum)?;

        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_sub(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SUB)?;

        let minuend = current_call_frame.stack.pop()?;
        let subtrahend = current_call_frame.stack.pop()?;
        let difference = minuend.overflowing_sub(subtrahend).0;
        current_call_frame.stack.push(difference)?;

        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_mul(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::MUL)?;

        let multiplicand = current_call_frame.stack.pop()?;
        let multiplier = current_call_frame.stack.pop()?;
        let product = multiplicand.overflowing_mul(multiplier).0;
        current_call_frame.stack.push(product)?;

        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_div(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::DIV)?;

        let dividend = current_call_frame.stack.pop()?;
        let divisor = current_call_frame.stack.pop()?;
        let Some(quotient) = dividend.checked_div(divisor) else {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        };
        current_call_frame.stack.push(quotient)?;

        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_sdiv(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SDIV)?;

        let dividend = current_call_frame.stack.pop()?;
        let divisor = current_call_frame.stack.pop()?;
        if divisor.is_zero() || dividend.is_zero() {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        let unsigned_dividend = abs(dividend);
        let unsigned_divisor = abs(divisor);

        let quotient = unsigned_dividend
            .checked_div(unsigned_divisor)
            .unwrap_or_default();

        let quotient = if is_negative(dividend) != is_negative(divisor) {
            negate(quotient)
        } else {
            quotient
        };

        current_call_frame.stack.push(quotient)?;

        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_mod(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::MOD)?;

        let dividend = current_call_frame.stack.pop()?;
        let divisor = current_call_frame.stack.pop()?;

        let remainder = dividend.checked_rem(divisor).unwrap_or_default();

        current_call_frame.stack.push(remainder)?;

        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_smod(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SMOD)?;

        let unchecked_dividend = current_call_frame.stack.pop()?;
        let unchecked_divisor = current_call_frame.stack.pop()?;

        if unchecked_divisor.is_zero() || unchecked_dividend.is_zero() {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        let divisor = abs(unchecked_divisor);
        let dividend = abs(unchecked_dividend);

        let unchecked_remainder = match dividend.checked_rem(divisor) {
            Some(remainder) => remainder,
            None => {
                current_call_frame.stack.push(U256::zero())?;
                return Ok(OpcodeSuccess::Continue);
            }
        };

        let remainder = if is_negative(unchecked_dividend) {
            negate(unchecked_remainder)
        } else {
            unchecked_remainder
        };

        current_call_frame.stack.push(remainder)?;

        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_addmod(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::ADDMOD)?;

        let augend = current_call_frame.stack.pop()?;
        let addend = current_call_frame.stack.pop()?;
        let modulus = current_call_frame.stack.pop()?;

        if modulus.is_zero() {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        let new_augend = augend.checked_rem(modulus).unwrap_or_default();
        let new_addend = addend.checked_rem(modulus).unwrap_or_default();

        let (sum, _overflowed) = new_augend.overflowing_add(new_addend);

        let sum_mod = sum.checked_rem(modulus).unwrap_or_default();

        current_call_frame.stack.push(sum_mod)?;

        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_mulmod(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::MULMOD)?;

        let multiplicand = current_call_frame.stack.pop()?;
        let multiplier = current_call_frame.stack.pop()?;
        let modulus = current_call_frame.stack.pop()?;

        if modulus.is_zero() || multiplicand.is_zero() || multiplier.is_zero() {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        let multiplicand = multiplicand.checked_rem(modulus).unwrap_or_default();
        let multiplier = multiplier.checked_rem(modulus).unwrap_or_default();

        let (product, _overflowed) = multiplicand.overflowing_mul(multiplier);
        let product_mod = product.checked_rem(modulus).unwrap_or_default();

        current_call_frame.stack.push(product_mod)?;

        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_exp(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        let base = current_call_frame.stack.pop()?;
        let exponent = current_call_frame.stack.pop()?;

        let gas_cost = gas_cost::exp_gas_cost(exponent)?;

        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let power = base.overflowing_pow(exponent).0;
        current_call_frame.stack.push(power)?;

        Ok(OpcodeSuccess::Continue)
    }

    pub fn op_signextend(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SIGNEXTEND)?;

        let byte_size = current_call_frame.stack.pop()?;
        let value_to_extend = current_call_frame.stack.pop()?;

        if byte_size >= U256::from(31) {
            current_call_frame.stack.push(value_to_extend)?;
            return Ok(OpcodeSuccess::Continue);
        }

        let bits_per_byte = U256::from(8);
        let sign_bit_position_on_byte = U256::from(7);

        let sign_bit_index = bits_per_byte
            .checked_mul(byte_size)
            .and_then(|total_bits| total_bits.checked_add(sign_bit_position_on_byte))
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;

        if sign_bit_index >= U256::from(256) {
            current_call_frame.stack.push(value_to_extend)?;
            return Ok(OpcodeSuccess::Continue);
        }

        let is_negative = value_to_extend.bit(sign_bit_index.as_usize());

        if !is_negative {
            current_call_frame.stack.push(value_to_extend)?;
            return Ok(OpcodeSuccess::Continue);
        };

        let sign_bit_mask = checked_shift_left(U256::one(), sign_bit_index)?
            .checked_sub(U256::one())
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationUnderflow))?;
        let result = value_to_extend | !sign_bit_mask;

        current_call_frame.stack.push(result)?;

        Ok(OpcodeSuccess::Continue)
    }
}

/// Shifts the value right by 255 bits and checks whether the sign bit is set.
fn is_negative(value: U256) -> bool {
    value.bit(255)
}

/// Negates a number in two's complement.
fn negate(value: U256) -> U256 {
    let (negated, _overflowed) = (!value).overflowing_add(U256::one());
    negated
}

fn abs(value: U256) -> U256 {
    if is_negative(value) {
        negate(value)
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::{new_blank_call_frame, new_vm_with_ops};
    use ethereum_types::U256;

    #[test]
    fn add_wraps_on_overflow() {
        let mut vm = new_vm_with_ops(&[]);
        let mut frame = new_blank_call_frame();
        frame.stack.push(U256::MAX).unwrap();
        frame.stack.push(U256::one()).unwrap();
        vm.op_add(&mut frame).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), U256::zero());
    }

    #[test]
    fn sdiv_of_negative_values_matches_twos_complement_semantics() {
        let mut vm = new_vm_with_ops(&[]);
        let mut frame = new_blank_call_frame();
        // -10 / 2 == -5
        let minus_ten = U256::MAX - U256::from(9);
        frame.stack.push(U256::from(2)).unwrap();
        frame.stack.push(minus_ten).unwrap();
        vm.op_sdiv(&mut frame).unwrap();
        let result = frame.stack.pop().unwrap();
        assert_eq!(result, U256::MAX - U256::from(4));
    }
}
