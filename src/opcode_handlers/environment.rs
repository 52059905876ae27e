//! # Environment operations
//!
//! Includes the following opcodes:
//!   - `ADDRESS`
//!   - `BALANCE`
//!   - `ORIGIN`
//!   - `CALLER`
//!   - `CALLVALUE`
//!   - `CALLDATALOAD`
//!   - `CALLDATASIZE`
//!   - `CALLDATACOPY`
//!   - `CODESIZE`
//!   - `CODECOPY`
//!   - `GASPRICE`
//!   - `EXTCODESIZE`
//!   - `EXTCODECOPY`
//!   - `RETURNDATASIZE`
//!   - `RETURNDATACOPY`
//!   - `EXTCODEHASH`

use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    utils::{address_to_word, h256_to_u256, size_offset_to_usize, u256_to_usize, word_to_address},
    vm::Vm,
};
use ethereum_types::U256;

/// Implementation for the `ADDRESS` opcode.
pub struct OpAddressHandler;
impl OpcodeHandler for OpAddressHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::ADDRESS)?;

        let recipient = vm.current_call_frame.message.recipient;
        vm.current_call_frame.stack.push(address_to_word(recipient))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `BALANCE` opcode.
pub struct OpBalanceHandler;
impl OpcodeHandler for OpBalanceHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(vm.current_call_frame.stack.pop1()?);
        let address_was_cold = vm.host.access_account(address).is_cold();
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::balance(address_was_cold, vm.revision)?)?;

        let balance = vm.host.get_balance(address);
        vm.current_call_frame.stack.push(balance)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `ORIGIN` opcode.
pub struct OpOriginHandler;
impl OpcodeHandler for OpOriginHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::ORIGIN)?;

        let origin = vm.cache.tx_context(vm.host).tx_origin;
        vm.current_call_frame.stack.push(address_to_word(origin))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CALLER` opcode.
pub struct OpCallerHandler;
impl OpcodeHandler for OpCallerHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CALLER)?;

        let sender = vm.current_call_frame.message.sender;
        vm.current_call_frame.stack.push(address_to_word(sender))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CALLVALUE` opcode.
pub struct OpCallValueHandler;
impl OpcodeHandler for OpCallValueHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CALLVALUE)?;

        let value = vm.current_call_frame.message.value;
        vm.current_call_frame.stack.push(value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CALLDATALOAD` opcode.
pub struct OpCallDataLoadHandler;
impl OpcodeHandler for OpCallDataLoadHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CALLDATALOAD)?;

        let value_bytes = usize::try_from(vm.current_call_frame.stack.pop1()?)
            .ok()
            .and_then(|offset| vm.current_call_frame.message.input.get(offset..));
        vm.current_call_frame.stack.push(match value_bytes {
            Some(data) if data.len() >= 32 => {
                #[expect(clippy::indexing_slicing, reason = "length checked above")]
                U256::from_big_endian(&data[..32])
            }
            Some(data) => {
                let mut bytes = [0u8; 32];
                #[expect(clippy::indexing_slicing, reason = "data is shorter than 32")]
                bytes[..data.len()].copy_from_slice(data);
                U256::from_big_endian(&bytes)
            }
            None => U256::zero(),
        })?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CALLDATASIZE` opcode.
pub struct OpCallDataSizeHandler;
impl OpcodeHandler for OpCallDataSizeHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CALLDATASIZE)?;

        let size = vm.current_call_frame.message.input.len();
        vm.current_call_frame.stack.push(U256::from(size))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CALLDATACOPY` opcode.
pub struct OpCallDataCopyHandler;
impl OpcodeHandler for OpCallDataCopyHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [dst_offset, src_offset, len] = *vm.current_call_frame.stack.pop()?;
        let (len, dst_offset) = size_offset_to_usize(len, dst_offset)?;
        let src_offset = u256_to_usize(src_offset).unwrap_or(usize::MAX);

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::calldatacopy(
                calculate_memory_size(dst_offset, len)?,
                vm.current_call_frame.memory.len(),
                len,
            )?)?;

        if len > 0 {
            let frame = &mut vm.current_call_frame;
            let data = frame.message.input.get(src_offset..).unwrap_or_default();
            let data = data.get(..len).unwrap_or(data);
            let copied = data.len();

            frame.memory.store_data(dst_offset, data)?;
            if copied < len {
                frame.memory.store_zeros(dst_offset + copied, len - copied)?;
            }
        }

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CODESIZE` opcode.
pub struct OpCodeSizeHandler;
impl OpcodeHandler for OpCodeSizeHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CODESIZE)?;

        vm.current_call_frame
            .stack
            .push(U256::from(vm.module.code_size()))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CODECOPY` opcode.
pub struct OpCodeCopyHandler;
impl OpcodeHandler for OpCodeCopyHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [dst_offset, src_offset, len] = *vm.current_call_frame.stack.pop()?;
        let (len, dst_offset) = size_offset_to_usize(len, dst_offset)?;
        let src_offset = u256_to_usize(src_offset).unwrap_or(usize::MAX);

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::codecopy(
                calculate_memory_size(dst_offset, len)?,
                vm.current_call_frame.memory.len(),
                len,
            )?)?;

        if len > 0 {
            // Copy from the unpadded code; everything past it is zero.
            let code = vm
                .module
                .code()
                .get(..vm.module.code_size())
                .unwrap_or_default();
            let data = code.get(src_offset..).unwrap_or_default();
            let data = data.get(..len).unwrap_or(data);
            let copied = data.len();

            vm.current_call_frame.memory.store_data(dst_offset, data)?;
            if copied < len {
                vm.current_call_frame
                    .memory
                    .store_zeros(dst_offset + copied, len - copied)?;
            }
        }

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `GASPRICE` opcode.
pub struct OpGasPriceHandler;
impl OpcodeHandler for OpGasPriceHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::GASPRICE)?;

        let gas_price = vm.cache.tx_context(vm.host).tx_gas_price;
        vm.current_call_frame.stack.push(gas_price)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `EXTCODESIZE` opcode.
pub struct OpExtCodeSizeHandler;
impl OpcodeHandler for OpExtCodeSizeHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(vm.current_call_frame.stack.pop1()?);
        let address_was_cold = vm.host.access_account(address).is_cold();
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::extcodesize(address_was_cold, vm.revision)?)?;

        let code_size = vm.host.get_code_size(address);
        vm.current_call_frame.stack.push(U256::from(code_size))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `EXTCODECOPY` opcode.
pub struct OpExtCodeCopyHandler;
impl OpcodeHandler for OpExtCodeCopyHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [address, dst_offset, src_offset, len] = *vm.current_call_frame.stack.pop()?;
        let address = word_to_address(address);
        let (len, dst_offset) = size_offset_to_usize(len, dst_offset)?;
        let src_offset = u256_to_usize(src_offset).unwrap_or(usize::MAX);

        let address_was_cold = vm.host.access_account(address).is_cold();
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::extcodecopy(
                calculate_memory_size(dst_offset, len)?,
                vm.current_call_frame.memory.len(),
                len,
                address_was_cold,
                vm.revision,
            )?)?;

        if len > 0 {
            vm.current_call_frame.memory.resize(
                dst_offset
                    .checked_add(len)
                    .ok_or(ExceptionalHalt::TooLargeRequiredMemory)?,
            )?;
            // Anything the host does not fill stays zero.
            let mut buf = vec![0u8; len];
            vm.host.copy_code(address, src_offset, &mut buf);
            vm.current_call_frame.memory.store_data(dst_offset, &buf)?;
        }

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `RETURNDATASIZE` opcode.
pub struct OpReturnDataSizeHandler;
impl OpcodeHandler for OpReturnDataSizeHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::RETURNDATASIZE)?;

        vm.current_call_frame
            .stack
            .push(U256::from(vm.return_data.len()))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `RETURNDATACOPY` opcode.
pub struct OpReturnDataCopyHandler;
impl OpcodeHandler for OpReturnDataCopyHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [dst_offset, src_offset, len] = *vm.current_call_frame.stack.pop()?;
        let (len, dst_offset) = size_offset_to_usize(len, dst_offset)?;
        let src_offset = u256_to_usize(src_offset)?;

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::returndatacopy(
                calculate_memory_size(dst_offset, len)?,
                vm.current_call_frame.memory.len(),
                len,
            )?)?;

        // Unlike the other copies, reading past the end of the return data
        // buffer is an error rather than zero fill.
        let end = src_offset
            .checked_add(len)
            .ok_or(ExceptionalHalt::InvalidMemoryAccess)?;
        if end > vm.return_data.len() {
            return Err(ExceptionalHalt::InvalidMemoryAccess.into());
        }

        if len > 0 {
            let data = vm
                .return_data
                .get(src_offset..end)
                .ok_or(ExceptionalHalt::InvalidMemoryAccess)?
                .to_vec();
            vm.current_call_frame.memory.store_data(dst_offset, &data)?;
        }

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `EXTCODEHASH` opcode.
pub struct OpExtCodeHashHandler;
impl OpcodeHandler for OpExtCodeHashHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(vm.current_call_frame.stack.pop1()?);
        let address_was_cold = vm.host.access_account(address).is_cold();
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::extcodehash(address_was_cold, vm.revision)?)?;

        let code_hash = vm.host.get_code_hash(address);
        vm.current_call_frame.stack.push(h256_to_u256(code_hash))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
