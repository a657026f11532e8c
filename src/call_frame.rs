use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use ethereum_types::{Address, U256};

use crate::{account::Log, constants::STACK_LIMIT, errors::VMError, memory::Memory};

pub type TransientStorage = HashMap<(Address, U256), U256>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    values: Vec<U256>,
}

impl Stack {
    pub fn push(&mut self, value: U256) -> Result<(), VMError> {
        if self.values.len() >= STACK_LIMIT {
            return Err(VMError::StackOverflow);
        }
        self.values.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<U256, VMError> {
        self.values.pop().ok_or(VMError::StackUnderflow)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Peeks the value `depth` slots from the top (0 is the top itself),
    /// used by the DUPn family.
    pub fn get(&self, depth: usize) -> Result<U256, VMError> {
        let len = self.values.len();
        let index = len.checked_sub(depth + 1).ok_or(VMError::StackUnderflow)?;
        self.values.get(index).copied().ok_or(VMError::StackUnderflow)
    }

    /// Swaps the top of the stack with the value `depth` slots below it,
    /// used by the SWAPn family.
    pub fn swap(&mut self, depth: usize) -> Result<(), VMError> {
        let len = self.values.len();
        let top = len.checked_sub(1).ok_or(VMError::StackUnderflow)?;
        let other = len.checked_sub(depth + 1).ok_or(VMError::StackUnderflow)?;
        self.values.swap(top, other);
        Ok(())
    }
}

/// A single activation record for the interpreter: one per top-level
/// transaction frame and one per nested CALL/CALLCODE/DELEGATECALL/
/// STATICCALL/CREATE/CREATE2.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub gas_limit: u64,
    pub gas_used: u64,
    pub pc: usize,
    pub msg_sender: Address,
    pub to: Address,
    pub code_address: Address,
    pub delegate: Option<Address>,
    pub bytecode: Bytes,
    pub valid_jump_destinations: HashSet<usize>,
    pub value: U256,
    pub calldata: Bytes,
    pub is_static: bool,
    pub depth: usize,
    pub stack: Stack,
    pub memory: Memory,
    pub return_data: Bytes,
    pub output: Bytes,
    pub logs: Vec<Log>,
    /// Whether this frame was entered to run a CREATE/CREATE2 init code.
    pub is_create: bool,
}

impl CallFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        delegate: Option<Address>,
        bytecode: Bytes,
        value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        depth: usize,
        is_create: bool,
    ) -> Self {
        let valid_jump_destinations = get_valid_jump_destinations(&bytecode);
        Self {
            gas_limit,
            gas_used: 0,
            pc: 0,
            msg_sender,
            to,
            code_address,
            delegate,
            bytecode,
            valid_jump_destinations,
            value,
            calldata,
            is_static,
            depth,
            stack: Stack::default(),
            memory: Memory::new(),
            return_data: Bytes::new(),
            output: Bytes::new(),
            logs: Vec::new(),
            is_create,
        }
    }

    pub fn assign_bytecode(&mut self, bytecode: Bytes) {
        self.valid_jump_destinations = get_valid_jump_destinations(&bytecode);
        self.bytecode = bytecode;
    }

    pub fn next_opcode(&self) -> Option<u8> {
        self.bytecode.get(self.pc).copied()
    }

    pub fn increment_pc_by(&mut self, count: usize) -> Result<(), VMError> {
        self.pc = self
            .pc
            .checked_add(count)
            .ok_or(VMError::Internal(crate::errors::InternalError::ArithmeticOperationOverflow))?;
        Ok(())
    }

    pub fn increment_pc(&mut self) -> Result<(), VMError> {
        self.increment_pc_by(1)
    }

    pub fn pc(&self) -> usize {
        self.pc
    }
}

/// Linear scan over the bytecode recording every offset that is a JUMPDEST
/// (0x5b) and is not itself the immediate-data byte of a preceding PUSH.
pub fn get_valid_jump_destinations(bytecode: &[u8]) -> HashSet<usize> {
    use crate::opcodes::Opcode;

    let mut destinations = HashSet::new();
    let mut i = 0usize;
    while i < bytecode.len() {
        let Some(&byte) = bytecode.get(i) else {
            break;
        };
        if byte == Opcode::JUMPDEST as u8 {
            destinations.insert(i);
            i = i.saturating_add(1);
        } else if (Opcode::PUSH1 as u8..=Opcode::PUSH32 as u8).contains(&byte) {
            let push_size = byte.saturating_sub(Opcode::PUSH1 as u8).saturating_add(1) as usize;
            i = i.saturating_add(1).saturating_add(push_size);
        } else {
            i = i.saturating_add(1);
        }
    }
    destinations
}
