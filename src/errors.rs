use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

/// Failures that halt the current frame and consume all remaining gas,
/// except for [`VMError::RevertOpcode`] which keeps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ExceptionalHalt {
    #[error("Out Of Gas")]
    OutOfGas,
    #[error("Stack Overflow")]
    StackOverflow,
    #[error("Stack Underflow")]
    StackUnderflow,
    #[error("Bad Jump Destination")]
    BadJumpDestination,
    #[error("Invalid Instruction")]
    InvalidInstruction,
    #[error("Unsupported Opcode")]
    UnsupportedOpcode,
    #[error("Invalid Memory Access")]
    InvalidMemoryAccess,
    #[error("Too Large Required Memory")]
    TooLargeRequiredMemory,
    #[error("Call Depth Exceeded")]
    CallDepthExceeded,
    #[error("Static Mode Violation")]
    StaticModeViolation,
    #[error("Insufficient Balance")]
    InsufficientBalance,
    #[error("Operand Exceeds Native Width")]
    VeryLargeNumber,
    #[error("Failure")]
    Failure,
}

/// Errors that should never be reachable from well-formed inputs. Hitting one
/// of these is a bug in the engine, not in the executed bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("Arithmetic overflow")]
    Overflow,
    #[error("Arithmetic underflow")]
    Underflow,
    #[error("Slicing out of bounds")]
    Slicing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VMError {
    /// The REVERT opcode. Not exceptional: remaining gas survives.
    #[error("Revert Opcode")]
    RevertOpcode,
    #[error("{0}")]
    ExceptionalHalt(#[from] ExceptionalHalt),
    #[error("Internal error: {0}")]
    Internal(#[from] InternalError),
}

impl VMError {
    pub fn is_internal(&self) -> bool {
        matches!(self, VMError::Internal(_))
    }
}

/// Errors raised while ingesting a bytecode module.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Invalid raw data")]
    InvalidRawData,
    #[error("Invalid hex input: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised during bytecode-to-MIR translation. Compilation is a pure
/// function of the bytecode, so these surface before anything executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Unsupported opcode 0x{0:02x}")]
    UnsupportedOpcode(u8),
    #[error("Operand stack underflow during translation")]
    StackUnderflow,
    #[error("Operand type mismatch during translation")]
    TypeMismatch,
}

/// What an opcode handler tells the dispatch loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    /// Keep executing. `pc_increment` covers the opcode byte plus any
    /// immediates; jump handlers pass 0 because they set `pc` themselves.
    Continue { pc_increment: usize },
    /// The current frame is done with status SUCCESS.
    Halt,
}

/// Outcome of a completed execution, as seen by the embedder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TxResult {
    Success,
    Revert,
    Halt(ExceptionalHalt),
}

/// Final report for one top-level execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub result: TxResult,
    /// `initial_gas - gas_left - gas_refunded`.
    pub gas_used: u64,
    pub gas_left: u64,
    /// Refund actually credited, after the per-revision cap.
    pub gas_refunded: u64,
    #[serde(skip)]
    pub output: Bytes,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.result == TxResult::Success
    }
}
