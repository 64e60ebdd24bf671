use bytes::Bytes;
use ethereum_types::Address;
use thiserror::Error;

/// Consensus-level halts. Any of these aborts the frame, consumes its
/// remaining gas and reverts the frame's snapshot.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionalHalt {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("out of gas")]
    OutOfGas,
    #[error("invalid jump destination")]
    InvalidJumpDestination,
    #[error("invalid opcode")]
    InvalidOpcode,
    #[error("write protection")]
    WriteProtection,
    #[error("return data out of bounds")]
    ReturnDataOutOfBounds,
    #[error("max code size exceeded")]
    MaxCodeSizeExceeded,
    #[error("call depth exceeded")]
    CallDepthExceeded,
    #[error("insufficient balance for transfer")]
    InsufficientBalance,
    #[error("contract address collision")]
    AddressCollision,
}

/// Bugs, not consensus outcomes. Reaching one of these aborts the whole
/// transition instead of producing a receipt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InternalError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("{0}")]
    Custom(&'static str),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("database error: {0}")]
    Custom(String),
}

/// Pre-execution rejections. A transaction failing one of these produces no
/// receipt; its hash lands on the rejected list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxValidationError {
    #[error("invalid signature: {0}")]
    SignatureInvalid(String),
    #[error("nonce mismatch: expected {expected}, got {actual}")]
    NonceMismatch { expected: u64, actual: u64 },
    #[error("insufficient funds for gas * price + value")]
    InsufficientFunds,
    #[error("intrinsic gas too low: have {limit}, need {intrinsic}")]
    IntrinsicGasTooLow { intrinsic: u64, limit: u64 },
    #[error("block gas limit reached")]
    GasLimitReached,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VMError {
    #[error(transparent)]
    Halt(#[from] ExceptionalHalt),
    #[error("execution reverted")]
    Revert,
    #[error(transparent)]
    Internal(#[from] InternalError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl VMError {
    /// True for errors that abort the transition instead of settling into a
    /// failed frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VMError::Internal(_) | VMError::Database(_))
    }

    /// REVERT keeps the frame's remaining gas; every other frame error
    /// consumes it.
    pub fn consumes_all_gas(&self) -> bool {
        !matches!(self, VMError::Revert)
    }
}

/// What the dispatch loop does after a handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    Continue { pc_increment: usize },
    Halt,
}

/// Outcome of a frame or a whole transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxResult {
    Success,
    Revert(VMError),
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TxResult::Success)
    }
}

/// Result of one completed call frame.
#[derive(Debug, Clone)]
pub struct ContextResult {
    pub result: TxResult,
    pub gas_used: u64,
    pub output: Bytes,
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

/// Result of a whole applied transaction.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub result: TxResult,
    pub gas_used: u64,
    pub gas_refunded: u64,
    pub output: Bytes,
    pub created_address: Option<Address>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}
