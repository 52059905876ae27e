//! # Stack, memory, storage and control flow operations
//!
//! Includes the following opcodes:
//!   - `POP`
//!   - `GAS`
//!   - `PC`
//!   - `MLOAD`
//!   - `MSTORE`
//!   - `MSTORE8`
//!   - `MCOPY`
//!   - `MSIZE`
//!   - `TLOAD`
//!   - `TSTORE`
//!   - `SLOAD`
//!   - `SSTORE`
//!   - `JUMPDEST`
//!   - `JUMP`
//!   - `JUMPI`

use crate::{
    constants::WORD_SIZE_IN_BYTES_USIZE,
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost::{self, COLD_SLOAD_COST, SSTORE_STIPEND},
    gas_schedule,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    revision::Revision,
    utils::{size_offset_to_usize, u256_to_usize},
    vm::Vm,
};

/// Implementation for the `POP` opcode.
pub struct OpPopHandler;
impl OpcodeHandler for OpPopHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::POP)?;

        vm.current_call_frame.stack.pop1()?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `GAS` opcode.
pub struct OpGasHandler;
impl OpcodeHandler for OpGasHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::GAS)?;

        let gas_left = vm.current_call_frame.gas_left;
        vm.current_call_frame.stack.push(gas_left.into())?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `PC` opcode.
pub struct OpPcHandler;
impl OpcodeHandler for OpPcHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::PC)?;

        let pc = vm.current_call_frame.pc;
        vm.current_call_frame.stack.push(pc.into())?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MLOAD` opcode.
pub struct OpMLoadHandler;
impl OpcodeHandler for OpMLoadHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let offset = u256_to_usize(vm.current_call_frame.stack.pop1()?)?;
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::mload(
                calculate_memory_size(offset, WORD_SIZE_IN_BYTES_USIZE)?,
                vm.current_call_frame.memory.len(),
            )?)?;

        let word = vm.current_call_frame.memory.load_word(offset)?;
        vm.current_call_frame.stack.push(word)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MSTORE` opcode.
pub struct OpMStoreHandler;
impl OpcodeHandler for OpMStoreHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [offset, value] = *vm.current_call_frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::mstore(
                calculate_memory_size(offset, WORD_SIZE_IN_BYTES_USIZE)?,
                vm.current_call_frame.memory.len(),
            )?)?;

        vm.current_call_frame.memory.store_word(offset, value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MSTORE8` opcode.
pub struct OpMStore8Handler;
impl OpcodeHandler for OpMStore8Handler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [offset, value] = *vm.current_call_frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::mstore8(
                calculate_memory_size(offset, 1)?,
                vm.current_call_frame.memory.len(),
            )?)?;

        vm.current_call_frame
            .memory
            .store_byte(offset, value.byte(0))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MCOPY` opcode.
pub struct OpMCopyHandler;
impl OpcodeHandler for OpMCopyHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [dst_offset, src_offset, len] = *vm.current_call_frame.stack.pop()?;
        let (len, dst_offset) = size_offset_to_usize(len, dst_offset)?;
        let src_offset = u256_to_usize(src_offset).unwrap_or(usize::MAX);

        let new_memory_size =
            calculate_memory_size(dst_offset, len)?.max(calculate_memory_size(src_offset, len)?);
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::mcopy(
                new_memory_size,
                vm.current_call_frame.memory.len(),
                len,
            )?)?;

        vm.current_call_frame
            .memory
            .copy_within(src_offset, dst_offset, len)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MSIZE` opcode.
pub struct OpMSizeHandler;
impl OpcodeHandler for OpMSizeHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::MSIZE)?;

        let memory_size = vm.current_call_frame.memory.len();
        vm.current_call_frame.stack.push(memory_size.into())?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `TLOAD` opcode.
pub struct OpTLoadHandler;
impl OpcodeHandler for OpTLoadHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::TLOAD)?;

        let key = vm.current_call_frame.stack.pop1()?;
        let value = vm
            .host
            .get_transient_storage(vm.current_call_frame.message.recipient, key);
        vm.current_call_frame.stack.push(value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `TSTORE` opcode.
pub struct OpTStoreHandler;
impl OpcodeHandler for OpTStoreHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        if vm.current_call_frame.is_static() {
            return Err(ExceptionalHalt::StaticModeViolation.into());
        }

        vm.current_call_frame.increase_consumed_gas(gas_cost::TSTORE)?;

        let [key, value] = *vm.current_call_frame.stack.pop()?;
        vm.host
            .set_transient_storage(vm.current_call_frame.message.recipient, key, value);

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SLOAD` opcode.
pub struct OpSLoadHandler;
impl OpcodeHandler for OpSLoadHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let key = vm.current_call_frame.stack.pop1()?;
        let recipient = vm.current_call_frame.message.recipient;

        let slot_was_cold = vm.host.access_storage(recipient, key).is_cold();
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::sload(slot_was_cold, vm.revision)?)?;

        let value = vm.host.get_storage(recipient, key);
        vm.current_call_frame.stack.push(value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SSTORE` opcode.
pub struct OpSStoreHandler;
impl OpcodeHandler for OpSStoreHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        if vm.current_call_frame.is_static() {
            return Err(ExceptionalHalt::StaticModeViolation.into());
        }

        // EIP-2200: reject when the remaining gas cannot cover the stipend.
        if vm.current_call_frame.gas_left <= SSTORE_STIPEND {
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        let [key, value] = *vm.current_call_frame.stack.pop()?;
        let recipient = vm.current_call_frame.message.recipient;

        let slot_was_cold = vm.host.access_storage(recipient, key).is_cold();
        let status = vm.host.set_storage(recipient, key, value);

        let store_cost = gas_schedule::sstore_cost(vm.revision, status);
        let mut cost = store_cost.gas;
        if vm.revision >= Revision::Berlin && slot_was_cold {
            cost = cost
                .checked_add(COLD_SLOAD_COST)
                .ok_or(ExceptionalHalt::OutOfGas)?;
        }

        vm.current_call_frame.increase_consumed_gas(cost)?;
        vm.current_call_frame.apply_refund_delta(store_cost.refund);

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `JUMPDEST` opcode.
pub struct OpJumpDestHandler;
impl OpcodeHandler for OpJumpDestHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::JUMPDEST)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `JUMP` opcode.
pub struct OpJumpHandler;
impl OpcodeHandler for OpJumpHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::JUMP)?;

        let target = vm.current_call_frame.stack.pop1()?;
        jump(vm, target.try_into().unwrap_or(usize::MAX))?;

        Ok(OpcodeResult::Continue { pc_increment: 0 })
    }
}

/// Implementation for the `JUMPI` opcode.
pub struct OpJumpIHandler;
impl OpcodeHandler for OpJumpIHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::JUMPI)?;

        let [target, condition] = *vm.current_call_frame.stack.pop()?;
        if condition.is_zero() {
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }

        jump(vm, target.try_into().unwrap_or(usize::MAX))?;
        Ok(OpcodeResult::Continue { pc_increment: 0 })
    }
}

/// The target must be a JUMPDEST byte inside the unpadded code.
fn jump(vm: &mut Vm<'_>, target: usize) -> Result<(), VMError> {
    if vm.module.is_valid_jump_target(target) {
        vm.current_call_frame.pc = target;
        Ok(())
    } else {
        Err(ExceptionalHalt::BadJumpDestination.into())
    }
}
