//! # Logging operations
//!
//! Includes the following opcodes:
//!   - `LOG0` to `LOG4`

use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    utils::{size_offset_to_usize, u256_to_h256},
    vm::Vm,
};
use ethereum_types::H256;

/// Implementation for the `LOGn` opcodes.
pub struct OpLogHandler<const N: usize>;
impl<const N: usize> OpcodeHandler for OpLogHandler<N> {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        if vm.current_call_frame.is_static() {
            return Err(ExceptionalHalt::StaticModeViolation.into());
        }

        let [offset, len] = *vm.current_call_frame.stack.pop()?;
        let topics: [H256; N] = vm.current_call_frame.stack.pop::<N>()?.map(u256_to_h256);
        let (len, offset) = size_offset_to_usize(len, offset)?;

        vm.current_call_frame.increase_consumed_gas(gas_cost::log(
            calculate_memory_size(offset, len)?,
            vm.current_call_frame.memory.len(),
            len,
            N,
        )?)?;

        let data = vm.current_call_frame.memory.load_range(offset, len)?;
        vm.host
            .emit_log(vm.current_call_frame.message.recipient, &data, &topics);

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
