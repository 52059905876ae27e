//! # Comparison and bitwise logic operations
//!
//! Includes the following opcodes:
//!   - `LT`, `GT`, `SLT`, `SGT`, `EQ`, `ISZERO`
//!   - `AND`, `OR`, `XOR`, `NOT`
//!   - `BYTE`
//!   - `SHL`, `SHR`, `SAR`

use crate::{
    arith,
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::Vm,
};
use ethereum_types::U256;

const ONE: U256 = U256([1, 0, 0, 0]);

const fn u256_from_bool(value: bool) -> U256 {
    if value { ONE } else { U256::zero() }
}

/// Implementation for the `LT` opcode.
pub struct OpLtHandler;
impl OpcodeHandler for OpLtHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::LT)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(u256_from_bool(lhs < rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `GT` opcode.
pub struct OpGtHandler;
impl OpcodeHandler for OpGtHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::GT)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(u256_from_bool(lhs > rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SLT` opcode.
pub struct OpSLtHandler;
impl OpcodeHandler for OpSLtHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SLT)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        let lhs_is_negative = lhs.bit(255);
        let rhs_is_negative = rhs.bit(255);
        let result = if lhs_is_negative == rhs_is_negative {
            // Same sign: compare magnitudes.
            u256_from_bool(lhs < rhs)
        } else {
            // Different signs: the negative one is smaller.
            u256_from_bool(lhs_is_negative)
        };
        vm.current_call_frame.stack.push(result)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SGT` opcode.
pub struct OpSGtHandler;
impl OpcodeHandler for OpSGtHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SGT)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        let lhs_is_negative = lhs.bit(255);
        let rhs_is_negative = rhs.bit(255);
        let result = if lhs_is_negative == rhs_is_negative {
            u256_from_bool(lhs > rhs)
        } else {
            u256_from_bool(rhs_is_negative)
        };
        vm.current_call_frame.stack.push(result)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `EQ` opcode.
pub struct OpEqHandler;
impl OpcodeHandler for OpEqHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::EQ)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .stack
            .push(u256_from_bool(lhs == rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `ISZERO` opcode.
pub struct OpIsZeroHandler;
impl OpcodeHandler for OpIsZeroHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::ISZERO)?;

        let operand = vm.current_call_frame.stack.pop1()?;
        vm.current_call_frame
            .stack
            .push(u256_from_bool(operand.is_zero()))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `AND` opcode.
pub struct OpAndHandler;
impl OpcodeHandler for OpAndHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::AND)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(lhs & rhs)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `OR` opcode.
pub struct OpOrHandler;
impl OpcodeHandler for OpOrHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::OR)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(lhs | rhs)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `XOR` opcode.
pub struct OpXorHandler;
impl OpcodeHandler for OpXorHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::XOR)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(lhs ^ rhs)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `NOT` opcode.
pub struct OpNotHandler;
impl OpcodeHandler for OpNotHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::NOT)?;

        let operand = vm.current_call_frame.stack.pop1()?;
        vm.current_call_frame.stack.push(!operand)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `BYTE` opcode.
pub struct OpByteHandler;
impl OpcodeHandler for OpByteHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::BYTE)?;

        let [index, value] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(arith::byte(index, value))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SHL` opcode.
pub struct OpShlHandler;
impl OpcodeHandler for OpShlHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SHL)?;

        let [shift, value] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(arith::shl(shift, value))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SHR` opcode.
pub struct OpShrHandler;
impl OpcodeHandler for OpShrHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SHR)?;

        let [shift, value] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(arith::shr(shift, value))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SAR` opcode.
pub struct OpSarHandler;
impl OpcodeHandler for OpSarHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SAR)?;

        let [shift, value] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(arith::sar(shift, value))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
