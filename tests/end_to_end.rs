use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use ethereum_types::{Address, U256};
use revme_levm::{
    account::Account,
    db::{cache::CacheDB, Db},
    environment::Environment,
    errors::VMError,
    revision::Revision,
    transaction::TxKind,
    vm::{TxResult, VM},
};

const SENDER: Address = Address::repeat_byte(0x01);
const RECIPIENT: Address = Address::repeat_byte(0x02);

fn build_vm(tx_kind: TxKind, value: U256, calldata: Bytes, gas_limit: u64, accounts: Vec<(Address, Account)>) -> VM {
    let _ = tracing_subscriber::fmt().with_env_filter("trace").try_init();

    let mut db = Db::new();
    db.add_accounts(accounts);

    let mut env = Environment::default_from_address(SENDER);
    env.revision = Revision::London;
    env.gas_limit = gas_limit;

    VM::new(tx_kind, env, value, calldata, Arc::new(db), CacheDB::new(), Vec::new())
}

fn eoa(balance: u64, nonce: u64) -> Account {
    Account::new(U256::from(balance), Bytes::new(), nonce, HashMap::new())
}

#[test]
fn plain_value_transfer_costs_exactly_the_intrinsic_gas() {
    let mut vm = build_vm(
        TxKind::Call(RECIPIENT),
        U256::from(3),
        Bytes::new(),
        21_000,
        vec![(SENDER, eoa(1_000, 0)), (RECIPIENT, eoa(0, 0))],
    );

    let report = vm.transact().unwrap();

    assert!(report.is_success());
    assert_eq!(report.gas_used, 21_000);
    assert_eq!(vm.get_balance(RECIPIENT).unwrap(), U256::from(3));
    assert_eq!(vm.get_balance(SENDER).unwrap(), U256::from(1_000 - 3));
    assert_eq!(vm.get_account_info(SENDER).unwrap().nonce, 1);
}

#[test]
fn call_into_empty_return_reports_empty_output() {
    // PUSH1 0 PUSH1 0 RETURN
    let code = Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0xf3]);
    let mut vm = build_vm(
        TxKind::Call(RECIPIENT),
        U256::zero(),
        Bytes::new(),
        21_010,
        vec![(SENDER, eoa(0, 0)), (RECIPIENT, Account::new(U256::zero(), code, 0, HashMap::new()))],
    );

    let report = vm.transact().unwrap();

    assert!(report.is_success());
    assert!(report.output.is_empty());
    // 21000 intrinsic + 3 + 3 (two PUSH1) + 0 (RETURN's own static cost is 0,
    // no memory expansion since size == 0).
    assert_eq!(report.gas_used, 21_006);
}

#[test]
fn revert_surfaces_output_and_consumes_only_gas_spent_so_far() {
    // PUSH1 0 PUSH1 0 REVERT
    let code = Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0xfd]);
    let mut vm = build_vm(
        TxKind::Call(RECIPIENT),
        U256::zero(),
        Bytes::new(),
        21_010,
        vec![(SENDER, eoa(0, 0)), (RECIPIENT, Account::new(U256::zero(), code, 0, HashMap::new()))],
    );

    let report = vm.transact().unwrap();

    assert!(!report.is_success());
    assert!(matches!(report.result, TxResult::Revert(VMError::RevertOpcode)));
    assert_eq!(report.gas_used, 21_006);
}

#[test]
fn contract_creation_derives_the_create_address_and_bumps_both_nonces() {
    let mut vm = build_vm(
        TxKind::Create,
        U256::zero(),
        Bytes::new(),
        53_000,
        vec![(SENDER, eoa(1_000_000, 4))],
    );
    vm.env.tx_nonce = 4;

    let expected_address = vm.calculate_create_address(SENDER, 4).unwrap();
    let report = vm.transact().unwrap();

    assert!(report.is_success());
    assert_eq!(report.new_contract_address, Some(expected_address));
    assert_eq!(vm.get_account_info(SENDER).unwrap().nonce, 5);
    assert_eq!(vm.get_account_info(expected_address).unwrap().nonce, 1);
    assert!(vm.get_bytecode(expected_address).unwrap().is_empty());
}

#[test]
fn static_call_rejects_inner_sstore_without_affecting_the_outer_call() {
    // Inner contract: PUSH1 1 PUSH1 0 SSTORE — forbidden in a static context.
    let callee_code = Bytes::from_static(&[0x60, 0x01, 0x60, 0x00, 0x55]);
    let callee = Address::from_low_u64_be(0x03);

    // Outer: STATICCALL(gas, callee, argsOffset=0, argsSize=0, retOffset=0, retSize=0), then STOP.
    let caller_code = Bytes::from_static(&[
        0x5f, 0x5f, 0x5f, 0x5f, // retSize retOffset argsSize argsOffset = 0 0 0 0
        0x73, // PUSH20 callee
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x03, 0x5a, // GAS
        0xfa, // STATICCALL
        0x00, // STOP
    ]);

    let mut vm = build_vm(
        TxKind::Call(RECIPIENT),
        U256::zero(),
        Bytes::new(),
        200_000,
        vec![
            (SENDER, eoa(0, 0)),
            (RECIPIENT, Account::new(U256::zero(), caller_code, 0, HashMap::new())),
            (callee, Account::new(U256::zero(), callee_code, 0, HashMap::new())),
        ],
    );

    let report = vm.transact().unwrap();

    assert!(report.is_success());
    assert_eq!(vm.get_storage_slot_value(callee, U256::zero()).unwrap(), U256::zero());
}

#[test]
fn create2_address_derivation_is_deterministic() {
    let mut vm = build_vm(TxKind::Call(RECIPIENT), U256::zero(), Bytes::new(), 21_000, vec![]);
    let init_code = Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0xf3]);
    let salt = U256::from(42);

    let a = vm.calculate_create2_address(SENDER, salt, &init_code).unwrap();
    let b = vm.calculate_create2_address(SENDER, salt, &init_code).unwrap();
    assert_eq!(a, b);
}
