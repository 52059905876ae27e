//! # Push operations
//!
//! Includes the following opcodes:
//!   - `PUSH0`
//!   - `PUSH1` to `PUSH32`

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::Vm,
};
use ethereum_types::U256;

/// Implementation for the `PUSH1` to `PUSH32` opcodes, monomorphised over
/// the immediate width.
pub struct OpPushHandler<const N: usize>;
impl<const N: usize> OpcodeHandler for OpPushHandler<N> {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::PUSHN)?;

        // Skip the opcode byte itself; the module's STOP padding guarantees
        // the full immediate is readable even at the end of the code.
        let start = vm.current_call_frame.pc.wrapping_add(1);
        let value = vm
            .module
            .code()
            .get(start..start.wrapping_add(N))
            .map(U256::from_big_endian)
            .unwrap_or_default();

        vm.current_call_frame.stack.push(value)?;

        // The immediate bytes plus the opcode itself.
        Ok(OpcodeResult::Continue {
            pc_increment: N.wrapping_add(1),
        })
    }
}

/// Implementation for the `PUSH0` opcode.
pub struct OpPush0Handler;
impl OpcodeHandler for OpPush0Handler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::PUSH0)?;

        vm.current_call_frame.stack.push_zero()?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
