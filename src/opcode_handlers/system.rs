//! # System operations
//!
//! Includes the following opcodes:
//!   - `CALL`
//!   - `CALLCODE`
//!   - `DELEGATECALL`
//!   - `STATICCALL`
//!   - `CREATE`
//!   - `CREATE2`
//!   - `RETURN`
//!   - `REVERT`
//!   - `SELFDESTRUCT`

use crate::{
    call_frame::{CallKind, Message},
    constants::{CALL_DEPTH_LIMIT, FAIL, INIT_CODE_MAX_SIZE, SUCCESS},
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost::{self, CALL_POSITIVE_VALUE_STIPEND},
    host::CallStatus,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    revision::Revision,
    utils::{address_to_word, size_offset_to_usize, word_to_address},
    vm::Vm,
};
use bytes::Bytes;
use ethereum_types::{Address, U256};

pub struct OpCallHandler;
impl OpcodeHandler for OpCallHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, callee, value, args_offset, args_len, return_offset, return_len] =
            *vm.current_call_frame.stack.pop()?;
        let callee = word_to_address(callee);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        if vm.current_call_frame.is_static() && !value.is_zero() {
            return Err(ExceptionalHalt::StaticModeViolation.into());
        }

        let new_memory_size = calculate_memory_size(args_offset, args_len)?
            .max(calculate_memory_size(return_offset, return_len)?);
        let address_was_cold = vm.host.access_account(callee).is_cold();
        let address_is_empty = !vm.host.account_exists(callee);
        let (cost, gas_limit) = gas_cost::call(
            new_memory_size,
            vm.current_call_frame.memory.len(),
            address_was_cold,
            address_is_empty,
            value,
            gas,
            vm.current_call_frame.gas_left,
            vm.revision,
        )?;
        vm.current_call_frame.increase_consumed_gas(cost)?;
        vm.current_call_frame.memory.resize(new_memory_size)?;

        let calldata = Bytes::from(
            vm.current_call_frame
                .memory
                .load_range(args_offset, args_len)?,
        );
        let sender = vm.current_call_frame.message.recipient;
        vm.generic_call(
            CallKind::Call,
            gas_limit,
            value,
            sender,
            callee,
            callee,
            vm.current_call_frame.is_static(),
            calldata,
            return_offset,
            return_len,
        )
    }
}

pub struct OpCallCodeHandler;
impl OpcodeHandler for OpCallCodeHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, address, value, args_offset, args_len, return_offset, return_len] =
            *vm.current_call_frame.stack.pop()?;
        let code_address = word_to_address(address);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        let new_memory_size = calculate_memory_size(args_offset, args_len)?
            .max(calculate_memory_size(return_offset, return_len)?);
        let address_was_cold = vm.host.access_account(code_address).is_cold();
        let (cost, gas_limit) = gas_cost::callcode(
            new_memory_size,
            vm.current_call_frame.memory.len(),
            address_was_cold,
            value,
            gas,
            vm.current_call_frame.gas_left,
            vm.revision,
        )?;
        vm.current_call_frame.increase_consumed_gas(cost)?;
        vm.current_call_frame.memory.resize(new_memory_size)?;

        let calldata = Bytes::from(
            vm.current_call_frame
                .memory
                .load_range(args_offset, args_len)?,
        );
        // The callee's code runs in the caller's own account.
        let recipient = vm.current_call_frame.message.recipient;
        vm.generic_call(
            CallKind::CallCode,
            gas_limit,
            value,
            recipient,
            recipient,
            code_address,
            vm.current_call_frame.is_static(),
            calldata,
            return_offset,
            return_len,
        )
    }
}

pub struct OpDelegateCallHandler;
impl OpcodeHandler for OpDelegateCallHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, address, args_offset, args_len, return_offset, return_len] =
            *vm.current_call_frame.stack.pop()?;
        let code_address = word_to_address(address);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        let new_memory_size = calculate_memory_size(args_offset, args_len)?
            .max(calculate_memory_size(return_offset, return_len)?);
        let address_was_cold = vm.host.access_account(code_address).is_cold();
        let (cost, gas_limit) = gas_cost::delegatecall(
            new_memory_size,
            vm.current_call_frame.memory.len(),
            address_was_cold,
            gas,
            vm.current_call_frame.gas_left,
            vm.revision,
        )?;
        vm.current_call_frame.increase_consumed_gas(cost)?;
        vm.current_call_frame.memory.resize(new_memory_size)?;

        let calldata = Bytes::from(
            vm.current_call_frame
                .memory
                .load_range(args_offset, args_len)?,
        );
        // Caller, recipient and value are all inherited from the current
        // context; only the code comes from the popped address.
        let sender = vm.current_call_frame.message.sender;
        let recipient = vm.current_call_frame.message.recipient;
        let value = vm.current_call_frame.message.value;
        vm.generic_call(
            CallKind::DelegateCall,
            gas_limit,
            value,
            sender,
            recipient,
            code_address,
            vm.current_call_frame.is_static(),
            calldata,
            return_offset,
            return_len,
        )
    }
}

pub struct OpStaticCallHandler;
impl OpcodeHandler for OpStaticCallHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, address, args_offset, args_len, return_offset, return_len] =
            *vm.current_call_frame.stack.pop()?;
        let callee = word_to_address(address);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        let new_memory_size = calculate_memory_size(args_offset, args_len)?
            .max(calculate_memory_size(return_offset, return_len)?);
        let address_was_cold = vm.host.access_account(callee).is_cold();
        let (cost, gas_limit) = gas_cost::delegatecall(
            new_memory_size,
            vm.current_call_frame.memory.len(),
            address_was_cold,
            gas,
            vm.current_call_frame.gas_left,
            vm.revision,
        )?;
        vm.current_call_frame.increase_consumed_gas(cost)?;
        vm.current_call_frame.memory.resize(new_memory_size)?;

        let calldata = Bytes::from(
            vm.current_call_frame
                .memory
                .load_range(args_offset, args_len)?,
        );
        let sender = vm.current_call_frame.message.recipient;
        vm.generic_call(
            CallKind::StaticCall,
            gas_limit,
            U256::zero(),
            sender,
            callee,
            callee,
            true,
            calldata,
            return_offset,
            return_len,
        )
    }
}

pub struct OpCreateHandler;
impl OpcodeHandler for OpCreateHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [value, code_offset, code_len] = *vm.current_call_frame.stack.pop()?;
        let (code_len, code_offset) = size_offset_to_usize(code_len, code_offset)?;

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::create(
                calculate_memory_size(code_offset, code_len)?,
                vm.current_call_frame.memory.len(),
                code_len,
                false,
                vm.revision,
            )?)?;

        vm.generic_create(value, code_offset, code_len, None)
    }
}

pub struct OpCreate2Handler;
impl OpcodeHandler for OpCreate2Handler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [value, code_offset, code_len, salt] = *vm.current_call_frame.stack.pop()?;
        let (code_len, code_offset) = size_offset_to_usize(code_len, code_offset)?;

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::create(
                calculate_memory_size(code_offset, code_len)?,
                vm.current_call_frame.memory.len(),
                code_len,
                true,
                vm.revision,
            )?)?;

        vm.generic_create(value, code_offset, code_len, Some(salt))
    }
}

pub struct OpReturnHandler;
impl OpcodeHandler for OpReturnHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [offset, len] = *vm.current_call_frame.stack.pop()?;
        let (len, offset) = size_offset_to_usize(len, offset)?;

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::exit_opcode(
                calculate_memory_size(offset, len)?,
                vm.current_call_frame.memory.len(),
            )?)?;

        if len != 0 {
            vm.current_call_frame.output =
                Bytes::from(vm.current_call_frame.memory.load_range(offset, len)?);
        }

        Ok(OpcodeResult::Halt)
    }
}

pub struct OpRevertHandler;
impl OpcodeHandler for OpRevertHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        let [offset, len] = *vm.current_call_frame.stack.pop()?;
        let (len, offset) = size_offset_to_usize(len, offset)?;

        vm.current_call_frame
            .increase_consumed_gas(gas_cost::exit_opcode(
                calculate_memory_size(offset, len)?,
                vm.current_call_frame.memory.len(),
            )?)?;

        if len != 0 {
            vm.current_call_frame.output =
                Bytes::from(vm.current_call_frame.memory.load_range(offset, len)?);
        }

        Err(VMError::RevertOpcode)
    }
}

pub struct OpSelfDestructHandler;
impl OpcodeHandler for OpSelfDestructHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        if vm.current_call_frame.is_static() {
            return Err(ExceptionalHalt::StaticModeViolation.into());
        }

        let beneficiary = word_to_address(vm.current_call_frame.stack.pop1()?);

        let address_was_cold = vm.host.access_account(beneficiary).is_cold();
        let beneficiary_is_absent = !vm.host.account_exists(beneficiary);
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::selfdestruct(
                address_was_cold,
                beneficiary_is_absent,
                vm.revision,
            )?)?;

        // Whether the account actually disappears (and when) is entirely the
        // host's business, in particular after EIP-6780.
        let recipient = vm.current_call_frame.message.recipient;
        vm.host.selfdestruct(recipient, beneficiary);

        Ok(OpcodeResult::Halt)
    }
}

impl<'a> Vm<'a> {
    /// Common tail of the CALL-family opcodes: depth and balance checks,
    /// gas forwarding, the host call, and output copy-back.
    #[allow(clippy::too_many_arguments)]
    fn generic_call(
        &mut self,
        kind: CallKind,
        gas_limit: u64,
        value: U256,
        sender: Address,
        recipient: Address,
        code_address: Address,
        is_static: bool,
        calldata: Bytes,
        return_offset: usize,
        return_len: usize,
    ) -> Result<OpcodeResult, VMError> {
        self.return_data = Bytes::new();

        let depth = self.current_call_frame.message.depth;
        if depth.wrapping_add(1) >= CALL_DEPTH_LIMIT {
            self.current_call_frame.stack.push(FAIL)?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }

        // A transfer the sender cannot afford fails the call, not the frame.
        if !value.is_zero() && kind != CallKind::DelegateCall {
            let balance = self.host.get_balance(sender);
            if value > balance {
                self.current_call_frame.stack.push(FAIL)?;
                return Ok(OpcodeResult::Continue { pc_increment: 1 });
            }
        }

        // The stipend rides along for free; everything else is deducted from
        // the caller until the callee hands it back.
        let stipend = if value.is_zero() || kind == CallKind::DelegateCall {
            0
        } else {
            CALL_POSITIVE_VALUE_STIPEND
        };
        self.current_call_frame
            .increase_consumed_gas(gas_limit.saturating_sub(stipend))?;

        let message = Message {
            kind,
            is_static,
            depth: depth.wrapping_add(1),
            gas: gas_limit,
            recipient,
            sender,
            code_address,
            value,
            input: calldata,
            create2_salt: U256::zero(),
        };
        let result = self.host.call(&message);

        self.current_call_frame.gas_left = self
            .current_call_frame
            .gas_left
            .saturating_add(result.gas_left);
        self.current_call_frame.gas_refund = self
            .current_call_frame
            .gas_refund
            .saturating_add(result.gas_refund);

        self.return_data = result.output.clone();

        let copy_len = return_len.min(result.output.len());
        if copy_len > 0 {
            let data = result
                .output
                .get(..copy_len)
                .ok_or(ExceptionalHalt::InvalidMemoryAccess)?;
            self.current_call_frame
                .memory
                .store_data(return_offset, data)?;
        }

        self.current_call_frame.stack.push(match result.status {
            CallStatus::Success => SUCCESS,
            CallStatus::Revert | CallStatus::Failure => FAIL,
        })?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    /// Common tail of CREATE and CREATE2.
    fn generic_create(
        &mut self,
        value: U256,
        code_offset: usize,
        code_len: usize,
        salt: Option<U256>,
    ) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static() {
            return Err(ExceptionalHalt::StaticModeViolation.into());
        }

        // EIP-3860 bounds the initcode size.
        if self.revision >= Revision::Shanghai && code_len > INIT_CODE_MAX_SIZE {
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        self.return_data = Bytes::new();

        let init_code = Bytes::from(
            self.current_call_frame
                .memory
                .load_range(code_offset, code_len)?,
        );

        let depth = self.current_call_frame.message.depth;
        let sender = self.current_call_frame.message.recipient;
        if depth.wrapping_add(1) >= CALL_DEPTH_LIMIT || value > self.host.get_balance(sender) {
            self.current_call_frame.stack.push(FAIL)?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }

        // EIP-150: the creation frame gets all but one sixty-fourth.
        let gas_left = self.current_call_frame.gas_left;
        let child_gas = gas_left - gas_left / 64;
        self.current_call_frame.increase_consumed_gas(child_gas)?;

        let message = Message {
            kind: if salt.is_some() {
                CallKind::Create2
            } else {
                CallKind::Create
            },
            is_static: false,
            depth: depth.wrapping_add(1),
            gas: child_gas,
            // The host derives the created address.
            recipient: Address::zero(),
            sender,
            code_address: Address::zero(),
            value,
            input: init_code,
            create2_salt: salt.unwrap_or_default(),
        };
        let result = self.host.call(&message);

        self.current_call_frame.gas_left = self
            .current_call_frame
            .gas_left
            .saturating_add(result.gas_left);
        self.current_call_frame.gas_refund = self
            .current_call_frame
            .gas_refund
            .saturating_add(result.gas_refund);

        match result.status {
            CallStatus::Success => {
                let created = result.create_address.unwrap_or_default();
                self.current_call_frame.stack.push(address_to_word(created))?;
            }
            CallStatus::Revert => {
                // Only a reverting creation exposes its output.
                self.return_data = result.output;
                self.current_call_frame.stack.push(FAIL)?;
            }
            CallStatus::Failure => {
                self.current_call_frame.stack.push(FAIL)?;
            }
        }

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
