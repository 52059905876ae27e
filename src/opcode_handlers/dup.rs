use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::Vm,
};

// Duplication Operations (16)
// Opcodes: DUP1 ... DUP16

/// Implementation for the `DUPn` opcodes; `N` is the zero-based depth.
pub struct OpDupHandler<const N: usize>;
impl<const N: usize> OpcodeHandler for OpDupHandler<N> {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::DUPN)?;

        vm.current_call_frame.stack.dup::<N>()?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
