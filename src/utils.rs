//! Construction helpers used by this crate's own tests and available to
//! embedders writing their own.

use bytes::Bytes;
use ethereum_types::{Address, U256};

use crate::{
    call_frame::CallFrame,
    db::{cache::CacheDB, Db},
    environment::Environment,
    revision::Revision,
    transaction::TxKind,
    vm::VM,
};

pub fn new_vm_with_bytecode(bytecode: Bytes) -> VM {
    new_vm_with_bytecode_and_revision(bytecode, Revision::Cancun)
}

pub fn new_vm_with_bytecode_and_revision(bytecode: Bytes, revision: Revision) -> VM {
    let sender = Address::from_low_u64_be(0x1000);
    let target = Address::from_low_u64_be(0x2000);

    let mut db = Db::new();
    db.add_accounts(vec![(
        target,
        crate::account::Account::new(U256::zero(), bytecode, 0, Default::default()),
    )]);
    db.add_accounts(vec![(
        sender,
        crate::account::Account::new(U256::from(10_000_000_000_000u64), Bytes::new(), 0, Default::default()),
    )]);

    let mut environment = Environment::default_from_address(sender);
    environment.revision = revision;
    environment.gas_limit = 1_000_000;

    VM::new(
        TxKind::Call(target),
        environment,
        U256::zero(),
        Bytes::new(),
        std::sync::Arc::new(db),
        CacheDB::new(),
        Vec::new(),
    )
}

pub fn new_vm_with_ops(ops: &[u8]) -> VM {
    new_vm_with_bytecode(Bytes::copy_from_slice(ops))
}

/// A standalone call frame with no bytecode, useful for unit-testing an
/// opcode handler directly without driving the whole dispatch loop.
pub fn new_blank_call_frame() -> CallFrame {
    CallFrame::new(
        Address::from_low_u64_be(0x1000),
        Address::from_low_u64_be(0x2000),
        Address::from_low_u64_be(0x2000),
        None,
        Bytes::new(),
        U256::zero(),
        Bytes::new(),
        false,
        1_000_000,
        0,
        false,
    )
}
