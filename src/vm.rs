use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use crate::{
    account::{Account, AccountInfo, Log, StorageSlot},
    call_frame::{CallFrame, TransientStorage},
    constants::{
        GAS_REFUND_DENOMINATOR_LONDON, INVALID_CONTRACT_PREFIX, MAX_CALL_DEPTH, MAX_CODE_SIZE,
        MAX_INIT_CODE_SIZE,
    },
    db::{cache, cache::CacheDB, Database},
    environment::Environment,
    errors::{InternalError, OpcodeSuccess, OutOfGasError, ResultReason, TxValidationError, VMError},
    gas_cost,
    opcodes::Opcode,
    precompiles,
    transaction::{intrinsic_gas, AccessListItem, TxKind},
};

/// Which of the four CALL-family opcodes produced a sub-call, distinguishing
/// how `msg.sender`, `msg.value` and the storage context are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
}

/// Cross-call bookkeeping accrued over the whole transaction: which accounts
/// are marked for destruction, which accounts/slots have been touched
/// (warm), and which accounts were created in this very transaction (used by
/// the EIP-6780 SELFDESTRUCT restriction).
#[derive(Debug, Clone, Default)]
pub struct Substate {
    pub self_destruct_set: HashSet<Address>,
    pub touched_accounts: HashSet<Address>,
    pub touched_storage_slots: HashMap<Address, HashSet<H256>>,
    pub created_accounts: HashSet<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxResult {
    Success,
    Revert(VMError),
}

#[derive(Debug, Clone)]
pub struct TransactionReport {
    pub result: TxResult,
    pub gas_used: u64,
    pub gas_refunded: u64,
    pub output: Bytes,
    pub logs: Vec<Log>,
    pub new_contract_address: Option<Address>,
}

impl TransactionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}

#[derive(Debug, Clone)]
pub struct CallResult {
    pub success: bool,
    pub output: Bytes,
    pub gas_left: u64,
    pub logs: Vec<Log>,
}

/// Outcome of [`VM::create`]: `address` is zero on any failure (collision,
/// oversized init code, depth limit, reverted init code, unaffordable
/// deposit); `gas_used` is what the child actually burned, excluding
/// whatever of the caller-forwarded `gas_limit` went unspent.
#[derive(Debug, Clone, Copy)]
pub struct CreateOutcome {
    pub address: U256,
    pub gas_used: u64,
}

pub fn address_to_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

pub fn word_to_address(word: U256) -> Address {
    let mut bytes = [0u8; 32];
    word.to_big_endian(&mut bytes);
    Address::from_slice(&bytes[12..32])
}

fn u256_to_h256(value: U256) -> H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    H256::from(bytes)
}

/// The interpreter. One `VM` instance is constructed per transaction; nested
/// CALL/CREATE frames are handled by recursive calls into [`VM::execute`],
/// [`VM::generic_call`] and [`VM::create`], each snapshotting and restoring
/// `cache`/`accrued_substate`/`refunded_gas` around the nested frame.
pub struct VM {
    pub env: Environment,
    pub db: Arc<dyn Database>,
    pub cache: CacheDB,
    pub accrued_substate: Substate,
    pub refunded_gas: i64,
    pub transient_storage: TransientStorage,
    pub tx_kind: TxKind,
    pub value: U256,
    pub calldata: Bytes,
    pub access_list: Vec<AccessListItem>,
}

impl VM {
    pub fn new(
        tx_kind: TxKind,
        env: Environment,
        value: U256,
        calldata: Bytes,
        db: Arc<dyn Database>,
        cache: CacheDB,
        access_list: Vec<AccessListItem>,
    ) -> Self {
        Self {
            env,
            db,
            cache,
            accrued_substate: Substate::default(),
            refunded_gas: 0,
            transient_storage: HashMap::new(),
            tx_kind,
            value,
            calldata,
            access_list,
        }
    }

    // ---- account / storage bookkeeping -----------------------------------

    fn ensure_account_cached(&mut self, address: Address) -> &Account {
        if !cache::is_account_cached(&self.cache, &address) {
            let info = self.db.get_account_info(address);
            cache::insert_account(&mut self.cache, address, Account { info, storage: HashMap::new() });
        }
        cache::get_account(&self.cache, address).unwrap_or_else(|| {
            // unreachable: the branch above always inserts an entry first.
            static EMPTY: std::sync::OnceLock<Account> = std::sync::OnceLock::new();
            EMPTY.get_or_init(Account::default)
        })
    }

    pub fn get_account_info(&mut self, address: Address) -> Result<AccountInfo, VMError> {
        Ok(self.ensure_account_cached(address).info.clone())
    }

    pub fn get_bytecode(&mut self, address: Address) -> Result<Bytes, VMError> {
        Ok(self.ensure_account_cached(address).info.bytecode.clone())
    }

    pub fn get_balance(&mut self, address: Address) -> Result<U256, VMError> {
        Ok(self.ensure_account_cached(address).info.balance)
    }

    /// Marks `address` as touched and returns whether it was already warm
    /// (EIP-2929).
    pub fn access_account(&mut self, address: Address) -> bool {
        self.ensure_account_cached(address);
        !self.accrued_substate.touched_accounts.insert(address)
    }

    /// Marks `(address, key)` as touched and returns whether it was already
    /// warm.
    pub fn access_storage_slot(&mut self, address: Address, key: U256) -> bool {
        let key = u256_to_h256(key);
        let slots = self.accrued_substate.touched_storage_slots.entry(address).or_default();
        !slots.insert(key)
    }

    fn ensure_storage_slot_cached(&mut self, address: Address, key: H256) -> StorageSlot {
        self.ensure_account_cached(address);
        if let Some(slot) = cache::get_account_storage_slot(&self.cache, address, key) {
            return slot;
        }
        let value = self.db.get_storage_slot(address, key);
        let slot = StorageSlot { original_value: value, current_value: value };
        cache::write_account_storage(&mut self.cache, address, key, slot.clone());
        slot
    }

    pub fn get_storage_slot_value(&mut self, address: Address, key: U256) -> Result<U256, VMError> {
        let key = u256_to_h256(key);
        Ok(self.ensure_storage_slot_cached(address, key).current_value)
    }

    pub fn get_original_storage_slot_value(&mut self, address: Address, key: U256) -> Result<U256, VMError> {
        let key = u256_to_h256(key);
        Ok(self.ensure_storage_slot_cached(address, key).original_value)
    }

    pub fn set_storage_slot_value(&mut self, address: Address, key: U256, value: U256) -> Result<(), VMError> {
        let key = u256_to_h256(key);
        let mut slot = self.ensure_storage_slot_cached(address, key);
        slot.current_value = value;
        cache::write_account_storage(&mut self.cache, address, key, slot);
        Ok(())
    }

    pub fn apply_refund_delta(&mut self, delta: i64) -> Result<(), VMError> {
        self.refunded_gas = self
            .refunded_gas
            .checked_add(delta)
            .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
        Ok(())
    }

    fn increase_balance(&mut self, address: Address, amount: U256) -> Result<(), VMError> {
        self.ensure_account_cached(address);
        let account = cache::get_account_mut(&mut self.cache, address)
            .ok_or(VMError::Internal(InternalError::AccountNotFound))?;
        account.info.balance = account
            .info
            .balance
            .checked_add(amount)
            .ok_or(VMError::BalanceOverflow)?;
        Ok(())
    }

    fn decrease_balance(&mut self, address: Address, amount: U256) -> Result<(), VMError> {
        self.ensure_account_cached(address);
        let account = cache::get_account_mut(&mut self.cache, address)
            .ok_or(VMError::Internal(InternalError::AccountNotFound))?;
        account.info.balance = account
            .info
            .balance
            .checked_sub(amount)
            .ok_or(VMError::BalanceUnderflow)?;
        Ok(())
    }

    fn transfer_balance(&mut self, from: Address, to: Address, amount: U256) -> Result<(), VMError> {
        if amount.is_zero() || from == to {
            return Ok(());
        }
        self.decrease_balance(from, amount)?;
        self.increase_balance(to, amount)?;
        Ok(())
    }

    pub fn transfer_balance_for_selfdestruct(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), VMError> {
        self.ensure_account_cached(from);
        if from != to {
            self.increase_balance(to, amount)?;
        }
        let account = cache::get_account_mut(&mut self.cache, from)
            .ok_or(VMError::Internal(InternalError::AccountNotFound))?;
        account.info.balance = U256::zero();
        Ok(())
    }

    fn bump_nonce(&mut self, address: Address) -> Result<(), VMError> {
        self.ensure_account_cached(address);
        let account = cache::get_account_mut(&mut self.cache, address)
            .ok_or(VMError::Internal(InternalError::AccountNotFound))?;
        account.increment_nonce()
    }

    pub fn increase_consumed_gas(
        &self,
        current_call_frame: &mut CallFrame,
        gas_cost: U256,
    ) -> Result<(), VMError> {
        let gas_cost = u64::try_from(gas_cost).map_err(|_| VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
        let new_used = current_call_frame
            .gas_used
            .checked_add(gas_cost)
            .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
        if new_used > current_call_frame.gas_limit {
            return Err(VMError::OutOfGas(OutOfGasError::NotEnoughGasForDynamicCost));
        }
        current_call_frame.gas_used = new_used;
        Ok(())
    }

    // ---- address derivation ------------------------------------------------

    pub fn calculate_create_address(&self, sender: Address, nonce: u64) -> Result<Address, VMError> {
        let mut stream = rlp::RlpStream::new_list(2);
        stream.append(&sender.as_bytes());
        stream.append(&nonce);
        let hash = keccak_hash::keccak(stream.as_raw());
        Ok(Address::from_slice(
            hash.as_bytes().get(12..32).ok_or(VMError::Internal(InternalError::ConversionError))?,
        ))
    }

    pub fn calculate_create2_address(
        &self,
        sender: Address,
        salt: U256,
        init_code: &[u8],
    ) -> Result<Address, VMError> {
        let init_code_hash = keccak_hash::keccak(init_code);
        let mut buffer = Vec::with_capacity(1 + 20 + 32 + 32);
        buffer.push(0xffu8);
        buffer.extend_from_slice(sender.as_bytes());
        let mut salt_bytes = [0u8; 32];
        salt.to_big_endian(&mut salt_bytes);
        buffer.extend_from_slice(&salt_bytes);
        buffer.extend_from_slice(init_code_hash.as_bytes());
        let hash = keccak_hash::keccak(&buffer);
        Ok(Address::from_slice(
            hash.as_bytes().get(12..32).ok_or(VMError::Internal(InternalError::ConversionError))?,
        ))
    }

    // ---- blob gas ------------------------------------------------------------

    /// EIP-4844's `fake_exponential`, used to derive the blob base fee from
    /// the block's excess blob gas.
    fn fake_exponential(factor: u64, numerator: U256, denominator: u64) -> Result<U256, VMError> {
        let denominator = U256::from(denominator);
        let mut i = U256::one();
        let mut output = U256::zero();
        let mut numerator_accum = U256::from(factor)
            .checked_mul(denominator)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;

        while !numerator_accum.is_zero() {
            output = output
                .checked_add(numerator_accum)
                .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
            let product = numerator_accum
                .checked_mul(numerator)
                .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
            let divisor = denominator
                .checked_mul(i)
                .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
            numerator_accum = product.checked_div(divisor).unwrap_or_default();
            i = i
                .checked_add(U256::one())
                .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        }
        output.checked_div(denominator).ok_or(VMError::Internal(InternalError::DivisionByZero))
    }

    pub fn get_base_fee_per_blob_gas(&self) -> Result<U256, VMError> {
        let excess = self.env.block_excess_blob_gas.unwrap_or_default();
        Self::fake_exponential(
            crate::constants::MIN_BASE_FEE_PER_BLOB_GAS,
            excess,
            crate::constants::BLOB_BASE_FEE_UPDATE_FRACTION,
        )
    }

    pub fn get_max_blob_gas_cost(&self) -> Result<U256, VMError> {
        let blob_count = u64::try_from(self.env.tx_blob_hashes.len())
            .map_err(|_| VMError::Internal(InternalError::ConversionError))?;
        let blob_gas = blob_count
            .checked_mul(crate::constants::BLOB_GAS_PER_BLOB)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        let max_fee = self.env.tx_max_fee_per_blob_gas.unwrap_or_default();
        max_fee
            .checked_mul(U256::from(blob_gas))
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))
    }

    // ---- dispatch ------------------------------------------------------------

    fn opcode_moves_pc_itself(opcode: Opcode) -> bool {
        matches!(opcode, Opcode::JUMP | Opcode::JUMPI | Opcode::PUSH0)
            || ((Opcode::PUSH1 as u8)..=(Opcode::PUSH32 as u8)).contains(&(opcode as u8))
    }

    fn dispatch_opcode(
        &mut self,
        call_frame: &mut CallFrame,
        opcode: Opcode,
    ) -> Result<OpcodeSuccess, VMError> {
        match opcode {
            Opcode::STOP => self.op_stop(call_frame),
            Opcode::ADD => self.op_add(call_frame),
            Opcode::MUL => self.op_mul(call_frame),
            Opcode::SUB => self.op_sub(call_frame),
            Opcode::DIV => self.op_div(call_frame),
            Opcode::SDIV => self.op_sdiv(call_frame),
            Opcode::MOD => self.op_mod(call_frame),
            Opcode::SMOD => self.op_smod(call_frame),
            Opcode::ADDMOD => self.op_addmod(call_frame),
            Opcode::MULMOD => self.op_mulmod(call_frame),
            Opcode::EXP => self.op_exp(call_frame),
            Opcode::SIGNEXTEND => self.op_signextend(call_frame),
            Opcode::LT => self.op_lt(call_frame),
            Opcode::GT => self.op_gt(call_frame),
            Opcode::SLT => self.op_slt(call_frame),
            Opcode::SGT => self.op_sgt(call_frame),
            Opcode::EQ => self.op_eq(call_frame),
            Opcode::ISZERO => self.op_iszero(call_frame),
            Opcode::AND => self.op_and(call_frame),
            Opcode::OR => self.op_or(call_frame),
            Opcode::XOR => self.op_xor(call_frame),
            Opcode::NOT => self.op_not(call_frame),
            Opcode::BYTE => self.op_byte(call_frame),
            Opcode::SHL => self.op_shl(call_frame),
            Opcode::SHR => self.op_shr(call_frame),
            Opcode::SAR => self.op_sar(call_frame),
            Opcode::KECCAK256 => self.op_keccak256(call_frame),
            Opcode::ADDRESS => self.op_address(call_frame),
            Opcode::BALANCE => self.op_balance(call_frame),
            Opcode::ORIGIN => self.op_origin(call_frame),
            Opcode::CALLER => self.op_caller(call_frame),
            Opcode::CALLVALUE => self.op_callvalue(call_frame),
            Opcode::CALLDATALOAD => self.op_calldataload(call_frame),
            Opcode::CALLDATASIZE => self.op_calldatasize(call_frame),
            Opcode::CALLDATACOPY => self.op_calldatacopy(call_frame),
            Opcode::CODESIZE => self.op_codesize(call_frame),
            Opcode::CODECOPY => self.op_codecopy(call_frame),
            Opcode::GASPRICE => self.op_gasprice(call_frame),
            Opcode::EXTCODESIZE => self.op_extcodesize(call_frame),
            Opcode::EXTCODECOPY => self.op_extcodecopy(call_frame),
            Opcode::RETURNDATASIZE => self.op_returndatasize(call_frame),
            Opcode::RETURNDATACOPY => self.op_returndatacopy(call_frame),
            Opcode::EXTCODEHASH => self.op_extcodehash(call_frame),
            Opcode::BLOCKHASH => self.op_blockhash(call_frame),
            Opcode::COINBASE => self.op_coinbase(call_frame),
            Opcode::TIMESTAMP => self.op_timestamp(call_frame),
            Opcode::NUMBER => self.op_number(call_frame),
            Opcode::PREVRANDAO => self.op_prevrandao(call_frame),
            Opcode::GASLIMIT => self.op_gaslimit(call_frame),
            Opcode::CHAINID => self.op_chainid(call_frame),
            Opcode::SELFBALANCE => self.op_selfbalance(call_frame),
            Opcode::BASEFEE => self.op_basefee(call_frame),
            Opcode::BLOBHASH => self.op_blobhash(call_frame),
            Opcode::BLOBBASEFEE => self.op_blobbasefee(call_frame),
            Opcode::POP => self.op_pop(call_frame),
            Opcode::MLOAD => self.op_mload(call_frame),
            Opcode::MSTORE => self.op_mstore(call_frame),
            Opcode::MSTORE8 => self.op_mstore8(call_frame),
            Opcode::SLOAD => self.op_sload(call_frame),
            Opcode::SSTORE => self.op_sstore(call_frame),
            Opcode::JUMP => self.op_jump(call_frame),
            Opcode::JUMPI => self.op_jumpi(call_frame),
            Opcode::PC => self.op_pc(call_frame),
            Opcode::MSIZE => self.op_msize(call_frame),
            Opcode::GAS => self.op_gas(call_frame),
            Opcode::JUMPDEST => self.op_jumpdest(call_frame),
            Opcode::TLOAD => self.op_tload(call_frame),
            Opcode::TSTORE => self.op_tstore(call_frame),
            Opcode::MCOPY => self.op_mcopy(call_frame),
            Opcode::PUSH0 => self.op_push0(call_frame),
            op if ((Opcode::PUSH1 as u8)..=(Opcode::PUSH32 as u8)).contains(&(op as u8)) => {
                let byte_count = (op as u8).saturating_sub(Opcode::PUSH1 as u8).saturating_add(1) as usize;
                self.op_push(call_frame, byte_count)
            }
            op if ((Opcode::DUP1 as u8)..=(Opcode::DUP16 as u8)).contains(&(op as u8)) => {
                let depth = (op as u8).saturating_sub(Opcode::DUP1 as u8) as usize;
                self.op_dup(call_frame, depth)
            }
            op if ((Opcode::SWAP1 as u8)..=(Opcode::SWAP16 as u8)).contains(&(op as u8)) => {
                let depth = (op as u8).saturating_sub(Opcode::SWAP1 as u8).saturating_add(1) as usize;
                self.op_swap(call_frame, depth)
            }
            op if ((Opcode::LOG0 as u8)..=(Opcode::LOG4 as u8)).contains(&(op as u8)) => {
                let topic_count = (op as u8).saturating_sub(Opcode::LOG0 as u8);
                self.op_log(call_frame, topic_count)
            }
            Opcode::CREATE => self.op_create(call_frame),
            Opcode::CALL => self.op_call(call_frame),
            Opcode::CALLCODE => self.op_callcode(call_frame),
            Opcode::RETURN => self.op_return(call_frame),
            Opcode::DELEGATECALL => self.op_delegatecall(call_frame),
            Opcode::CREATE2 => self.op_create2(call_frame),
            Opcode::STATICCALL => self.op_staticcall(call_frame),
            Opcode::REVERT => self.op_revert(call_frame),
            Opcode::INVALID => self.op_invalid(call_frame),
            Opcode::SELFDESTRUCT => self.op_selfdestruct(call_frame),
        }
    }

    /// Caps `self.refunded_gas` at `gas_used / denom` per spec.md §4.H step
    /// 5 (denom = 2 pre-London, 5 from London on).
    fn capped_refund(&self, gas_used: u64) -> u64 {
        let denominator = if self.env.revision.reduced_refunds() {
            GAS_REFUND_DENOMINATOR_LONDON
        } else {
            crate::constants::GAS_REFUND_DENOMINATOR_PRE_LONDON
        };
        let max_refund = gas_used / denominator;
        u64::try_from(self.refunded_gas.max(0)).unwrap_or(0).min(max_refund)
    }

    fn build_report(&self, call_frame: &CallFrame, result: TxResult) -> TransactionReport {
        let gas_refunded = self.capped_refund(call_frame.gas_used);

        let output = match &result {
            TxResult::Success => call_frame.output.clone(),
            TxResult::Revert(_) => call_frame.output.clone(),
        };

        TransactionReport {
            result,
            gas_used: call_frame.gas_used,
            gas_refunded,
            output,
            logs: call_frame.logs.clone(),
            new_contract_address: None,
        }
    }

    /// Runs `call_frame` to completion: STOP/RETURN/SELFDESTRUCT produce a
    /// successful report, REVERT and every opcode-level [`VMError`] produce a
    /// failed one. Only [`VMError::is_internal`] errors propagate as `Err`.
    pub fn execute(&mut self, call_frame: &mut CallFrame) -> Result<TransactionReport, VMError> {
        loop {
            let Some(opcode_byte) = call_frame.next_opcode() else {
                return Ok(self.build_report(call_frame, TxResult::Success));
            };
            let opcode = Opcode::from(opcode_byte);

            if call_frame.is_static && opcode.is_state_mutating() {
                // WriteProtection is a hard fail like any other (spec.md
                // §4.E/§7): it burns the whole remaining frame gas, same as
                // the Err(e) arm below.
                call_frame.gas_used = call_frame.gas_limit;
                return Ok(self.build_report(
                    call_frame,
                    TxResult::Revert(VMError::OpcodeNotAllowedInStaticContext),
                ));
            }
            if opcode.requires_cancun() && !self.env.revision.has_transient_storage() {
                return Ok(self.build_report(call_frame, TxResult::Revert(VMError::InvalidOpcode)));
            }

            match self.dispatch_opcode(call_frame, opcode) {
                Ok(OpcodeSuccess::Continue) => {
                    if !Self::opcode_moves_pc_itself(opcode) {
                        call_frame.increment_pc()?;
                    }
                }
                Ok(OpcodeSuccess::Result(ResultReason::Stop))
                | Ok(OpcodeSuccess::Result(ResultReason::Return)) => {
                    return Ok(self.build_report(call_frame, TxResult::Success));
                }
                Ok(OpcodeSuccess::Result(ResultReason::SelfDestruct)) => {
                    return Ok(self.build_report(call_frame, TxResult::Success));
                }
                Err(e) if e.is_internal() => return Err(e),
                Err(VMError::RevertOpcode) => {
                    return Ok(self.build_report(call_frame, TxResult::Revert(VMError::RevertOpcode)));
                }
                Err(e) => {
                    // Every hard failure (stack errors, invalid jump/opcode,
                    // out-of-gas, write protection, oversized create output)
                    // burns the entire remaining frame gas, unlike an
                    // explicit REVERT which refunds what wasn't spent.
                    call_frame.gas_used = call_frame.gas_limit;
                    return Ok(self.build_report(call_frame, TxResult::Revert(e)));
                }
            }
        }
    }

    // ---- call / create engine ------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn generic_call(
        &mut self,
        current_call_frame: &CallFrame,
        kind: CallKind,
        code_address: Address,
        storage_address: Address,
        value: U256,
        gas_limit: u64,
        calldata: Bytes,
    ) -> Result<CallResult, VMError> {
        let depth = current_call_frame.depth.saturating_add(1);
        if depth >= MAX_CALL_DEPTH {
            return Ok(CallResult { success: false, output: Bytes::new(), gas_left: gas_limit, logs: Vec::new() });
        }

        if precompiles::is_precompile(&code_address) {
            return match precompiles::execute_precompile(code_address, &calldata, gas_limit) {
                Ok((output, gas_used)) => Ok(CallResult {
                    success: true,
                    output,
                    gas_left: gas_limit.saturating_sub(gas_used),
                    logs: Vec::new(),
                }),
                Err(_) => Ok(CallResult { success: false, output: Bytes::new(), gas_left: 0, logs: Vec::new() }),
            };
        }

        let msg_sender = match kind {
            CallKind::Call | CallKind::CallCode => current_call_frame.to,
            CallKind::DelegateCall | CallKind::StaticCall => current_call_frame.msg_sender,
        };
        let frame_value = match kind {
            CallKind::DelegateCall => current_call_frame.value,
            _ => value,
        };

        let transfers_value = matches!(kind, CallKind::Call | CallKind::CallCode) && !value.is_zero();
        if transfers_value {
            let sender_balance = self.get_balance(current_call_frame.to)?;
            if sender_balance < value {
                return Ok(CallResult { success: false, output: Bytes::new(), gas_left: gas_limit, logs: Vec::new() });
            }
        }

        let cache_snapshot = self.cache.clone();
        let substate_snapshot = self.accrued_substate.clone();
        let refund_snapshot = self.refunded_gas;

        if transfers_value {
            self.transfer_balance(current_call_frame.to, storage_address, value)?;
        }

        let bytecode = self.get_bytecode(code_address)?;
        let is_static = current_call_frame.is_static || matches!(kind, CallKind::StaticCall);

        let mut new_frame = CallFrame::new(
            msg_sender,
            storage_address,
            code_address,
            None,
            bytecode,
            frame_value,
            calldata,
            is_static,
            gas_limit,
            depth,
            false,
        );

        let report = self.execute(&mut new_frame)?;

        if !report.is_success() {
            self.cache = cache_snapshot;
            self.accrued_substate = substate_snapshot;
            self.refunded_gas = refund_snapshot;
        }

        let gas_left = gas_limit.saturating_sub(report.gas_used);
        Ok(CallResult { success: report.is_success(), output: report.output, gas_left, logs: report.logs })
    }

    /// CREATE/CREATE2 never abort the parent frame: every failure path below
    /// pushes 0 and reports back only the gas the child actually burned, so
    /// the caller can refund whatever of `gas_limit` went unused.
    pub fn create(
        &mut self,
        current_call_frame: &mut CallFrame,
        value: U256,
        init_code: Bytes,
        salt: Option<U256>,
        gas_limit: u64,
    ) -> Result<CreateOutcome, VMError> {
        let failed = |gas_used: u64| CreateOutcome { address: U256::zero(), gas_used };

        let depth = current_call_frame.depth.saturating_add(1);
        if depth >= MAX_CALL_DEPTH {
            return Ok(failed(0));
        }

        if init_code.len() > MAX_INIT_CODE_SIZE {
            return Ok(failed(0));
        }

        let sender = current_call_frame.to;
        let sender_balance = self.get_balance(sender)?;
        if sender_balance < value {
            return Ok(failed(0));
        }

        let sender_nonce = self.get_account_info(sender)?.nonce;
        let new_address = match salt {
            Some(salt) => self.calculate_create2_address(sender, salt, &init_code)?,
            None => self.calculate_create_address(sender, sender_nonce)?,
        };

        let target_info = self.get_account_info(new_address)?;
        if target_info.nonce != 0 || target_info.has_code()? {
            return Ok(failed(0));
        }

        self.bump_nonce(sender)?;

        let cache_snapshot = self.cache.clone();
        let substate_snapshot = self.accrued_substate.clone();
        let refund_snapshot = self.refunded_gas;

        cache::insert_account(
            &mut self.cache,
            new_address,
            Account::new(U256::zero(), Bytes::new(), 1, HashMap::new()),
        );
        self.accrued_substate.created_accounts.insert(new_address);
        self.transfer_balance(sender, new_address, value)?;

        let mut new_frame = CallFrame::new(
            sender,
            new_address,
            new_address,
            None,
            init_code,
            value,
            Bytes::new(),
            false,
            gas_limit,
            depth,
            true,
        );

        let report = self.execute(&mut new_frame)?;

        if !report.is_success() {
            self.cache = cache_snapshot;
            self.accrued_substate = substate_snapshot;
            self.refunded_gas = refund_snapshot;
            return Ok(failed(report.gas_used));
        }

        let runtime_code = report.output;
        if runtime_code.len() > MAX_CODE_SIZE || runtime_code.first().copied() == Some(INVALID_CONTRACT_PREFIX) {
            self.cache = cache_snapshot;
            self.accrued_substate = substate_snapshot;
            self.refunded_gas = refund_snapshot;
            return Ok(failed(report.gas_used));
        }

        let deposit_cost = gas_cost::code_deposit_gas_cost(runtime_code.len())?;
        if deposit_cost > gas_limit.saturating_sub(report.gas_used) {
            self.cache = cache_snapshot;
            self.accrued_substate = substate_snapshot;
            self.refunded_gas = refund_snapshot;
            return Ok(failed(report.gas_used));
        }

        if let Some(account) = cache::get_account_mut(&mut self.cache, new_address) {
            account.info.bytecode = runtime_code;
        }

        Ok(CreateOutcome {
            address: address_to_word(new_address),
            gas_used: report.gas_used.saturating_add(deposit_cost),
        })
    }

    // ---- transaction processor ------------------------------------------------

    fn revision(&self) -> crate::revision::Revision {
        self.env.revision
    }

    /// Validates the transaction and charges the up-front gas/value cost
    /// before any frame executes. Failures here are rejections, distinct
    /// from an executed-but-reverted transaction.
    pub fn prepare_execution(&mut self) -> Result<u64, VMError> {
        let sender = self.env.origin;
        let sender_info = self.get_account_info(sender)?;

        if sender_info.bytecode.len() > 0 {
            return Err(VMError::TxValidation(TxValidationError::SenderNotEOA));
        }

        if sender_info.nonce != self.env.tx_nonce {
            return Err(VMError::TxValidation(TxValidationError::NonceMismatch {
                tx_nonce: self.env.tx_nonce,
                account_nonce: sender_info.nonce,
            }));
        }
        if sender_info.nonce == u64::MAX {
            return Err(VMError::TxValidation(TxValidationError::NonceIsMax));
        }

        if self.env.gas_limit > self.env.block_gas_limit {
            return Err(VMError::TxValidation(TxValidationError::GasLimitExceedsBlockGasLimit));
        }

        if let (Some(priority), Some(max_fee)) =
            (self.env.tx_max_priority_fee_per_gas, self.env.tx_max_fee_per_gas)
        {
            if priority > max_fee {
                return Err(VMError::TxValidation(TxValidationError::PriorityFeeGreaterThanMaxFeePerGas));
            }
            if self.revision().has_base_fee() && max_fee < self.env.base_fee_per_gas {
                return Err(VMError::TxValidation(TxValidationError::MaxFeePerGasTooLow));
            }
        }

        if matches!(self.tx_kind, TxKind::Create) && self.calldata.len() > MAX_INIT_CODE_SIZE {
            return Err(VMError::TxValidation(TxValidationError::InitCodeTooLarge));
        }

        if !self.env.tx_blob_hashes.is_empty() {
            if self.env.tx_blob_hashes.len() as u64 > crate::constants::MAX_BLOB_NUMBER_PER_BLOCK {
                return Err(VMError::TxValidation(TxValidationError::TooManyBlobs));
            }
            let blob_base_fee = self.get_base_fee_per_blob_gas()?;
            if let Some(max_fee) = self.env.tx_max_fee_per_blob_gas {
                if max_fee < blob_base_fee {
                    return Err(VMError::TxValidation(TxValidationError::MaxFeePerBlobGasTooLow));
                }
            }
        }

        let intrinsic = intrinsic_gas(self.tx_kind, &self.calldata, &self.access_list, self.revision())?;
        if self.env.gas_limit < intrinsic {
            return Err(VMError::TxValidation(TxValidationError::IntrinsicGasTooLow));
        }

        let upfront_gas_cost = U256::from(self.env.gas_limit)
            .checked_mul(self.env.gas_price)
            .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
        let blob_cost = self.get_max_blob_gas_cost()?;
        let total_cost = upfront_gas_cost
            .checked_add(self.value)
            .and_then(|v| v.checked_add(blob_cost))
            .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;

        if sender_info.balance < total_cost {
            return Err(VMError::TxValidation(TxValidationError::InsufficientAccountFunds));
        }

        self.decrease_balance(sender, upfront_gas_cost)?;
        // A Call tx's nonce bump happens here; a Create tx's nonce belongs to
        // the account `create()` is about to derive an address from, so it
        // bumps it itself (matching CREATE-opcode semantics for nested
        // creations) and must see the pre-bump value.
        if matches!(self.tx_kind, TxKind::Call(_)) {
            self.bump_nonce(sender)?;
        }

        for item in self.access_list.clone() {
            self.access_account(item.address);
            for key in item.storage_keys {
                self.access_storage_slot(item.address, U256::from_big_endian(key.as_bytes()));
            }
        }
        self.access_account(sender);
        if let TxKind::Call(to) = self.tx_kind {
            self.access_account(to);
        }

        Ok(intrinsic)
    }

    /// Settles the coinbase fee, refunds unused gas to the sender, and
    /// destroys any account that self-destructed during the transaction.
    pub fn post_execution_changes(&mut self, report: &mut TransactionReport) -> Result<(), VMError> {
        let sender = self.env.origin;

        let actual_gas_used = report
            .gas_used
            .checked_sub(report.gas_refunded)
            .unwrap_or(report.gas_used);
        let unused_gas = self.env.gas_limit.saturating_sub(actual_gas_used);

        let refund_amount = U256::from(unused_gas)
            .checked_mul(self.env.gas_price)
            .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
        self.increase_balance(sender, refund_amount)?;

        let priority_fee = if self.revision().has_base_fee() {
            self.env
                .tx_max_priority_fee_per_gas
                .unwrap_or(self.env.gas_price)
                .min(self.env.gas_price.saturating_sub(self.env.base_fee_per_gas))
        } else {
            self.env.gas_price
        };
        let coinbase_fee = U256::from(actual_gas_used)
            .checked_mul(priority_fee)
            .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
        self.increase_balance(self.env.coinbase, coinbase_fee)?;

        let destroyed: Vec<Address> = self.accrued_substate.self_destruct_set.iter().copied().collect();
        for address in destroyed {
            cache::remove_account(&mut self.cache, &address);
        }

        report.gas_used = actual_gas_used;
        Ok(())
    }

    pub fn is_create(&self) -> bool {
        matches!(self.tx_kind, TxKind::Create)
    }

    /// The transaction processor entry point: validates, runs the top-level
    /// frame, and settles gas/refunds/destruction.
    pub fn transact(&mut self) -> Result<TransactionReport, VMError> {
        let intrinsic = self.prepare_execution()?;

        let sender = self.env.origin;
        let gas_limit = self.env.gas_limit;
        let value = self.value;
        let calldata = self.calldata.clone();

        let mut report = match self.tx_kind {
            TxKind::Call(to) => {
                let bytecode = self.get_bytecode(to)?;
                self.access_account(to);
                let sender_balance = self.get_balance(sender)?;
                if sender_balance < value {
                    return Ok(TransactionReport {
                        result: TxResult::Revert(VMError::TxValidation(
                            TxValidationError::InsufficientAccountFunds,
                        )),
                        gas_used: gas_limit,
                        gas_refunded: 0,
                        output: Bytes::new(),
                        logs: Vec::new(),
                        new_contract_address: None,
                    });
                }
                self.transfer_balance(sender, to, value)?;
                let mut frame =
                    CallFrame::new(sender, to, to, None, bytecode, value, calldata, false, gas_limit, 0, false);
                frame.gas_used = intrinsic;
                self.execute(&mut frame)?
            }
            TxKind::Create => {
                let mut frame = CallFrame::new(
                    sender,
                    sender,
                    sender,
                    None,
                    Bytes::new(),
                    value,
                    Bytes::new(),
                    false,
                    gas_limit,
                    0,
                    true,
                );
                frame.gas_used = intrinsic;
                let create_gas_limit = gas_limit.saturating_sub(intrinsic);
                let outcome = self.create(&mut frame, value, calldata, None, create_gas_limit)?;
                frame.gas_used = intrinsic.saturating_add(outcome.gas_used);
                let new_address = word_to_address(outcome.address);
                TransactionReport {
                    result: if outcome.address.is_zero() {
                        TxResult::Revert(VMError::CreateFailed)
                    } else {
                        TxResult::Success
                    },
                    gas_used: frame.gas_used,
                    gas_refunded: self.capped_refund(frame.gas_used),
                    output: Bytes::new(),
                    logs: Vec::new(),
                    new_contract_address: if outcome.address.is_zero() { None } else { Some(new_address) },
                }
            }
        };

        self.post_execution_changes(&mut report)?;
        Ok(report)
    }
}
