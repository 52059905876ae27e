//! # Arithmetic operations
//!
//! Includes the following opcodes:
//!   - `ADD`
//!   - `SUB`
//!   - `MUL`
//!   - `DIV`
//!   - `SDIV`
//!   - `MOD`
//!   - `SMOD`
//!   - `ADDMOD`
//!   - `MULMOD`
//!   - `EXP`
//!   - `SIGNEXTEND`

use crate::{
    arith,
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::Vm,
};

/// Implementation for the `ADD` opcode.
pub struct OpAddHandler;
impl OpcodeHandler for OpAddHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::ADD)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .stack
            .push(arith::wrapping_add(lhs, rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SUB` opcode.
pub struct OpSubHandler;
impl OpcodeHandler for OpSubHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SUB)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .stack
            .push(arith::wrapping_sub(lhs, rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MUL` opcode.
pub struct OpMulHandler;
impl OpcodeHandler for OpMulHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::MUL)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .stack
            .push(arith::wrapping_mul(lhs, rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `DIV` opcode.
pub struct OpDivHandler;
impl OpcodeHandler for OpDivHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::DIV)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(arith::div(lhs, rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SDIV` opcode.
pub struct OpSDivHandler;
impl OpcodeHandler for OpSDivHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SDIV)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(arith::sdiv(lhs, rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MOD` opcode.
pub struct OpModHandler;
impl OpcodeHandler for OpModHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::MOD)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(arith::rem(lhs, rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SMOD` opcode.
pub struct OpSModHandler;
impl OpcodeHandler for OpSModHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SMOD)?;

        let [lhs, rhs] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(arith::smod(lhs, rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `ADDMOD` opcode.
pub struct OpAddModHandler;
impl OpcodeHandler for OpAddModHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::ADDMOD)?;

        let [lhs, rhs, modulus] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .stack
            .push(arith::addmod(lhs, rhs, modulus))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MULMOD` opcode.
pub struct OpMulModHandler;
impl OpcodeHandler for OpMulModHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::MULMOD)?;

        let [lhs, rhs, modulus] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .stack
            .push(arith::mulmod(lhs, rhs, modulus))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `EXP` opcode.
pub struct OpExpHandler;
impl OpcodeHandler for OpExpHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [base, exponent] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::exp(exponent, vm.revision)?)?;

        vm.current_call_frame
            .stack
            .push(arith::exp(base, exponent))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SIGNEXTEND` opcode.
pub struct OpSignExtendHandler;
impl OpcodeHandler for OpSignExtendHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::SIGNEXTEND)?;

        let [index, value] = *vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .stack
            .push(arith::sign_extend(index, value))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
