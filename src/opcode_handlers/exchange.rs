use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::Vm,
};

// Exchange Operations (16)
// Opcodes: SWAP1 ... SWAP16

/// Implementation for the `SWAPn` opcodes; the top is swapped with the word
/// at depth `N`.
pub struct OpSwapHandler<const N: usize>;
impl<const N: usize> OpcodeHandler for OpSwapHandler<N> {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SWAPN)?;

        vm.current_call_frame.stack.swap(N)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
