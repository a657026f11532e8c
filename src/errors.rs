use thiserror::Error;

/// Marker returned by opcode handlers that completed successfully, signalling
/// the dispatch loop whether to keep running the current frame or to unwind
/// it (the frame produced RETURN/REVERT/STOP/SELFDESTRUCT data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpcodeSuccess {
    Continue,
    Result(ResultReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultReason {
    Stop,
    Return,
    SelfDestruct,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OutOfGasError {
    #[error("not enough gas for static cost")]
    NotEnoughGasForStaticCost,
    #[error("not enough gas for memory expansion")]
    NotEnoughGasForMemoryExpansion,
    #[error("not enough gas for the dynamic portion of an opcode")]
    NotEnoughGasForDynamicCost,
    #[error("gas cost overflowed while computing a dynamic price")]
    GasCostOverflow,
    #[error("gas limit below intrinsic gas")]
    IntrinsicGasTooLow,
    #[error("max gas limit exceeded")]
    MaxGasLimitExceeded,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxValidationError {
    #[error("sender account is not an EOA")]
    SenderNotEOA,
    #[error("nonce mismatch: tx nonce {tx_nonce}, account nonce {account_nonce}")]
    NonceMismatch { tx_nonce: u64, account_nonce: u64 },
    #[error("sender balance cannot cover the transaction's up-front cost")]
    InsufficientAccountFunds,
    #[error("gas limit is below the transaction's intrinsic gas cost")]
    IntrinsicGasTooLow,
    #[error("gas limit exceeds the block gas limit")]
    GasLimitExceedsBlockGasLimit,
    #[error("priority fee is greater than max fee per gas")]
    PriorityFeeGreaterThanMaxFeePerGas,
    #[error("max fee per gas is lower than the block's base fee")]
    MaxFeePerGasTooLow,
    #[error("init code exceeds the maximum permitted size")]
    InitCodeTooLarge,
    #[error("nonce would overflow u64")]
    NonceIsMax,
    #[error("transaction type does not carry blobs but declared some")]
    TypeThreeWithoutBlobs,
    #[error("blob count exceeds the per-block maximum")]
    TooManyBlobs,
    #[error("max fee per blob gas is lower than the block's blob base fee")]
    MaxFeePerBlobGasTooLow,
    #[error("blob versioned hash did not start with the expected version byte")]
    InvalidBlobVersionedHash,
    #[error("transaction carries no blobs but declares a non-empty blob gas price")]
    EmptyBlobs,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrecompileError {
    #[error("precompile input was malformed")]
    ParsingInputError,
    #[error("not enough gas to run the precompile")]
    NotEnoughGas,
    #[error("point is not on the elliptic curve")]
    PointNotInCurve,
    #[error("evaluation proof for point evaluation precompile failed")]
    InvalidEvaluationPoint,
    #[error("precompile execution failed")]
    ExecutionFailed,
}

/// Bookkeeping errors that should be unreachable given the interpreter's own
/// invariants. Unlike every other variant here, these are never folded into
/// an executed-but-failed [`crate::vm::TransactionReport`]: they propagate as
/// a hard `Err` out of [`crate::vm::VM::transact`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InternalError {
    #[error("arithmetic operation overflowed")]
    ArithmeticOperationOverflow,
    #[error("arithmetic operation underflowed")]
    ArithmeticOperationUnderflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("account not found in cache or database")]
    AccountNotFound,
    #[error("call frame stack is unexpectedly empty")]
    CouldNotPopCallFrame,
    #[error("a required numeric conversion does not fit in the target type")]
    ConversionError,
    #[error("unexpected None value")]
    UnexpectedNone,
    #[error("tried to access storage/account outside of an active substate")]
    MissingSubstateEntry,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VMError {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("invalid jump destination")]
    InvalidJump,
    #[error("invalid opcode")]
    InvalidOpcode,
    #[error("opcode not found")]
    OpcodeNotFound,
    #[error("opcode not allowed in a static context")]
    OpcodeNotAllowedInStaticContext,
    #[error("out of gas: {0}")]
    OutOfGas(#[from] OutOfGasError),
    #[error("execution reverted")]
    RevertOpcode,
    #[error("offset/size requested exceeds the available return data")]
    ReturnDataOutOfBounds,
    #[error("contract creation output exceeds the maximum code size")]
    ContractOutputTooBig,
    #[error("contract code starts with the reserved 0xef byte")]
    InvalidContractPrefix,
    #[error("account balance would overflow")]
    BalanceOverflow,
    #[error("account balance would underflow")]
    BalanceUnderflow,
    #[error("account nonce would overflow")]
    NonceOverflow,
    #[error("account nonce would underflow")]
    NonceUnderflow,
    #[error("address already occupied by a contract or non-empty account")]
    AddressAlreadyOccupied,
    #[error("contract creation failed (collision, oversized init code, or execution failure)")]
    CreateFailed,
    #[error("precompile error: {0}")]
    PrecompileError(#[from] PrecompileError),
    #[error("transaction validation error: {0}")]
    TxValidation(#[from] TxValidationError),
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
    #[error("maximum call depth exceeded")]
    MaxCallDepthExceeded,
    #[error("memory access out of bounds")]
    MemoryOutOfBounds,
    #[error("irrecoverable internal invariant violated")]
    FatalUnwrap,
}

impl VMError {
    /// Distinguishes crate-internal bugs (which must propagate as a hard
    /// `Err` out of `transact`) from ordinary protocol-level halts (which are
    /// captured into a failed [`crate::vm::TransactionReport`]).
    pub fn is_internal(&self) -> bool {
        matches!(self, VMError::Internal(_) | VMError::FatalUnwrap)
    }
}
