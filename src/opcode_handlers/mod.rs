use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    vm::Vm,
};

pub mod arithmetic;
pub mod bitwise_comparison;
pub mod block;
pub mod dup;
pub mod environment;
pub mod exchange;
pub mod keccak;
pub mod logging;
pub mod push;
pub mod stack_memory_storage_flow;
pub mod system;

pub trait OpcodeHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError>;
}

pub struct OpStopHandler;
impl OpcodeHandler for OpStopHandler {
    fn eval(_vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        Ok(OpcodeResult::Halt)
    }
}

/// The designated INVALID opcode (0xFE).
pub struct OpInvalidHandler;
impl OpcodeHandler for OpInvalidHandler {
    fn eval(_vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        Err(ExceptionalHalt::InvalidInstruction.into())
    }
}

/// Any byte with no assigned meaning in the active revision.
pub struct OpUndefinedHandler;
impl OpcodeHandler for OpUndefinedHandler {
    fn eval(_vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        Err(ExceptionalHalt::UnsupportedOpcode.into())
    }
}
