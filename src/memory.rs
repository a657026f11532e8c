use ethereum_types::U256;

use crate::errors::{InternalError, OutOfGasError, VMError};

pub const MEMORY_EXPANSION_QUOTIENT: u64 = 512;

/// Byte-addressable, word-aligned scratch memory for a single call frame.
///
/// Reads never fail: an out-of-bounds load implicitly expands and
/// zero-fills. Callers are expected to have already charged the expansion
/// cost via [`Memory::expansion_cost`] before reading or writing past the
/// current length, matching the gas-then-access ordering the gas model
/// requires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
}

fn word_count(len: usize) -> Result<u64, VMError> {
    let len = u64::try_from(len).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
    len.checked_add(31)
        .map(|padded| padded / 32)
        .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))
}

impl Memory {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Gas cost of expanding memory so that it is at least `offset + size`
    /// bytes long: `3w + w^2/512`, where `w` is the number of 32-byte words
    /// after expansion, minus the cost already paid for the current length.
    pub fn expansion_cost(&self, offset: usize, size: usize) -> Result<U256, VMError> {
        if size == 0 {
            return Ok(U256::zero());
        }
        let new_len = offset
            .checked_add(size)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        if new_len <= self.data.len() {
            return Ok(U256::zero());
        }
        let new_cost = Self::cost_for_len(new_len)?;
        let current_cost = Self::cost_for_len(self.data.len())?;
        Ok(new_cost.saturating_sub(current_cost))
    }

    fn cost_for_len(len: usize) -> Result<U256, VMError> {
        let words = word_count(len)?;
        let linear = words
            .checked_mul(3)
            .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
        let quadratic = words
            .checked_mul(words)
            .and_then(|sq| sq.checked_div(MEMORY_EXPANSION_QUOTIENT))
            .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
        let total = linear
            .checked_add(quadratic)
            .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
        Ok(U256::from(total))
    }

    pub fn resize(&mut self, offset: usize, size: usize) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }
        let new_len = offset
            .checked_add(size)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        if new_len > self.data.len() {
            let words = word_count(new_len)?;
            let padded_len = words
                .checked_mul(32)
                .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
            let padded_len =
                usize::try_from(padded_len).map_err(|_| VMError::Internal(InternalError::ConversionError))?;
            self.data.resize(padded_len, 0);
        }
        Ok(())
    }

    pub fn load_range(&mut self, offset: usize, size: usize) -> Result<Vec<u8>, VMError> {
        if size == 0 {
            return Ok(Vec::new());
        }
        self.resize(offset, size)?;
        let end = offset
            .checked_add(size)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        self.data
            .get(offset..end)
            .map(<[u8]>::to_vec)
            .ok_or(VMError::MemoryOutOfBounds)
    }

    pub fn load_word(&mut self, offset: usize) -> Result<U256, VMError> {
        let bytes = self.load_range(offset, 32)?;
        Ok(U256::from_big_endian(&bytes))
    }

    pub fn store_bytes(&mut self, offset: usize, value: &[u8]) -> Result<(), VMError> {
        if value.is_empty() {
            return Ok(());
        }
        self.resize(offset, value.len())?;
        let end = offset
            .checked_add(value.len())
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        let slice = self
            .data
            .get_mut(offset..end)
            .ok_or(VMError::MemoryOutOfBounds)?;
        slice.copy_from_slice(value);
        Ok(())
    }

    pub fn store_byte(&mut self, offset: usize, value: u8) -> Result<(), VMError> {
        self.resize(offset, 1)?;
        let slot = self.data.get_mut(offset).ok_or(VMError::MemoryOutOfBounds)?;
        *slot = value;
        Ok(())
    }

    /// Copies `size` bytes from `src_offset` to `dst_offset`, overlap-safe,
    /// expanding to cover whichever region is larger (used by MCOPY).
    pub fn copy(&mut self, src_offset: usize, dst_offset: usize, size: usize) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }
        let reach = src_offset.max(dst_offset);
        self.resize(reach, size)?;
        let data = self.load_range(src_offset, size)?;
        self.store_bytes(dst_offset, &data)
    }
}
