//! # Block information operations
//!
//! Includes the following opcodes:
//!   - `BLOCKHASH`
//!   - `COINBASE`
//!   - `TIMESTAMP`
//!   - `NUMBER`
//!   - `PREVRANDAO`
//!   - `GASLIMIT`
//!   - `CHAINID`
//!   - `SELFBALANCE`
//!   - `BASEFEE`
//!   - `BLOBHASH`
//!   - `BLOBBASEFEE`

use crate::{
    constants::LAST_AVAILABLE_BLOCK_LIMIT,
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    utils::{address_to_word, h256_to_u256, u256_to_usize},
    vm::Vm,
};
use ethereum_types::U256;

/// Implementation for the `BLOCKHASH` opcode.
pub struct OpBlockHashHandler;
impl OpcodeHandler for OpBlockHashHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::BLOCKHASH)?;

        let block_number = vm.current_call_frame.stack.pop1()?;
        let current_block = U256::from(vm.cache.tx_context(vm.host).block_number);

        // Only the previous 256 blocks are reachable.
        if block_number >= current_block
            || block_number < current_block.saturating_sub(LAST_AVAILABLE_BLOCK_LIMIT)
        {
            vm.current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }

        let block_number = block_number.low_u64();
        let hash = *vm.cache.block_hash(vm.host, block_number);
        vm.current_call_frame
            .stack
            .push(U256::from_big_endian(&hash))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `COINBASE` opcode.
pub struct OpCoinbaseHandler;
impl OpcodeHandler for OpCoinbaseHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::COINBASE)?;

        let coinbase = vm.cache.tx_context(vm.host).block_coinbase;
        vm.current_call_frame.stack.push(address_to_word(coinbase))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `TIMESTAMP` opcode.
pub struct OpTimestampHandler;
impl OpcodeHandler for OpTimestampHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::TIMESTAMP)?;

        let timestamp = vm.cache.tx_context(vm.host).block_timestamp;
        vm.current_call_frame.stack.push(U256::from(timestamp))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `NUMBER` opcode.
pub struct OpNumberHandler;
impl OpcodeHandler for OpNumberHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::NUMBER)?;

        let block_number = vm.cache.tx_context(vm.host).block_number;
        vm.current_call_frame.stack.push(U256::from(block_number))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `PREVRANDAO` opcode.
pub struct OpPrevRandaoHandler;
impl OpcodeHandler for OpPrevRandaoHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::PREVRANDAO)?;

        let prev_randao = vm.cache.tx_context(vm.host).block_prev_randao;
        vm.current_call_frame.stack.push(h256_to_u256(prev_randao))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `GASLIMIT` opcode.
pub struct OpGasLimitHandler;
impl OpcodeHandler for OpGasLimitHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::GASLIMIT)?;

        let block_gas_limit = vm.cache.tx_context(vm.host).block_gas_limit;
        vm.current_call_frame
            .stack
            .push(U256::from(block_gas_limit))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CHAINID` opcode.
pub struct OpChainIdHandler;
impl OpcodeHandler for OpChainIdHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CHAINID)?;

        let chain_id = vm.cache.tx_context(vm.host).chain_id;
        vm.current_call_frame.stack.push(chain_id)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SELFBALANCE` opcode.
pub struct OpSelfBalanceHandler;
impl OpcodeHandler for OpSelfBalanceHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::SELFBALANCE)?;

        let balance = vm.host.get_balance(vm.current_call_frame.message.recipient);
        vm.current_call_frame.stack.push(balance)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `BASEFEE` opcode.
pub struct OpBaseFeeHandler;
impl OpcodeHandler for OpBaseFeeHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::BASEFEE)?;

        let base_fee = vm.cache.tx_context(vm.host).block_base_fee;
        vm.current_call_frame.stack.push(base_fee)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `BLOBHASH` opcode.
pub struct OpBlobHashHandler;
impl OpcodeHandler for OpBlobHashHandler {
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::BLOBHASH)?;

        let index = vm.current_call_frame.stack.pop1()?;
        let blob_hashes = &vm.cache.tx_context(vm.host).blob_hashes;

        let hash = match u256_to_usize(index) {
            Ok(index) => blob_hashes.get(index).copied(),
            Err(_) => None,
        };
        match hash {
            Some(hash) => vm.current_call_frame.stack.push(h256_to_u256(hash))?,
            None => vm.current_call_frame.stack.push_zero()?,
        }

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `BLOBBASEFEE` opcode.
pub struct OpBlobBaseFeeHandler;
impl OpcodeHandler for OpBlobBaseFeeHandler {
    #[inline(always)]
    fn eval(vm: &mut Vm<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::BLOBBASEFEE)?;

        let blob_base_fee = vm.cache.tx_context(vm.host).blob_base_fee;
        vm.current_call_frame.stack.push(blob_base_fee)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
