//! The runtime function table.
//!
//! Compiled code calls these through absolute addresses baked in at
//! compile time, so the table is a single statically initialised struct of
//! C-linkage function pointers shared by every module. Each function takes
//! the instance as its first argument; 256-bit values cross the boundary
//! as four little-endian limbs, byte strings as pointers into the
//! instance's interned cache.
//!
//! Rust cannot unwind across compiled frames, so a failing function records
//! its error on the instance via `halt` and returns a zeroed value; the
//! execution surface checks for a pending halt after control returns.

use crate::{
    arith,
    constants::LAST_AVAILABLE_BLOCK_LIMIT,
    errors::{ExceptionalHalt, VMError},
    gas_cost::{self, COLD_SLOAD_COST, SSTORE_STIPEND},
    gas_schedule,
    revision::Revision,
    runtime::instance::{EvmInstance, ExitStatus},
    utils::{address_to_word, word_to_address},
};
use ethereum_types::U256;
use sha3::{Digest, Keccak256};

pub type U256UnFn = extern "C" fn(*mut EvmInstance, U256) -> U256;
pub type U256BinFn = extern "C" fn(*mut EvmInstance, U256, U256) -> U256;
pub type U256TernFn = extern "C" fn(*mut EvmInstance, U256, U256, U256) -> U256;
pub type Bytes32Fn = extern "C" fn(*mut EvmInstance) -> *const u8;
pub type Bytes32AtFn = extern "C" fn(*mut EvmInstance, u64) -> *const u8;
pub type SizeFn = extern "C" fn(*mut EvmInstance) -> u64;
pub type U256Fn = extern "C" fn(*mut EvmInstance) -> U256;

/// Function pointers reachable from compiled code. Initialised once; read
/// only afterwards.
#[repr(C)]
pub struct RuntimeFunctions {
    // 256-bit arithmetic too heavy to inline
    pub mul: U256BinFn,
    pub div: U256BinFn,
    pub sdiv: U256BinFn,
    pub rem: U256BinFn,
    pub smod: U256BinFn,
    pub addmod: U256TernFn,
    pub mulmod: U256TernFn,
    pub exp: U256BinFn,
    pub byte: U256BinFn,
    pub signextend: U256BinFn,

    // Environment
    pub address: Bytes32Fn,
    pub origin: Bytes32Fn,
    pub caller: Bytes32Fn,
    pub callvalue: Bytes32Fn,
    pub calldataload: Bytes32AtFn,
    pub calldatasize: SizeFn,
    pub codesize: SizeFn,
    pub gasprice: U256Fn,
    pub balance: U256UnFn,
    pub extcodesize: extern "C" fn(*mut EvmInstance, U256) -> u64,
    pub extcodehash: extern "C" fn(*mut EvmInstance, U256) -> *const u8,
    pub returndatasize: SizeFn,
    pub gas: SizeFn,

    // Block
    pub blockhash: Bytes32AtFn,
    pub coinbase: Bytes32Fn,
    pub timestamp: U256Fn,
    pub number: U256Fn,
    pub prevrandao: Bytes32Fn,
    pub gaslimit: U256Fn,
    pub chainid: U256Fn,
    pub selfbalance: U256Fn,
    pub basefee: U256Fn,
    pub blobhash: Bytes32AtFn,
    pub blobbasefee: U256Fn,

    // Memory
    pub msize: SizeFn,
    pub mload: extern "C" fn(*mut EvmInstance, u64) -> U256,
    pub mstore: extern "C" fn(*mut EvmInstance, u64, U256),
    pub mstore8: extern "C" fn(*mut EvmInstance, u64, U256),
    pub mcopy: extern "C" fn(*mut EvmInstance, u64, u64, u64),
    pub codecopy: extern "C" fn(*mut EvmInstance, u64, u64, u64),
    pub calldatacopy: extern "C" fn(*mut EvmInstance, u64, u64, u64),
    pub extcodecopy: extern "C" fn(*mut EvmInstance, U256, u64, u64, u64),
    pub returndatacopy: extern "C" fn(*mut EvmInstance, u64, u64, u64),

    // Storage
    pub sload: U256UnFn,
    pub sstore: extern "C" fn(*mut EvmInstance, U256, U256),
    pub tload: U256UnFn,
    pub tstore: extern "C" fn(*mut EvmInstance, U256, U256),

    // Crypto
    pub keccak256: extern "C" fn(*mut EvmInstance, u64, u64) -> *const u8,

    // Termination
    pub set_return: extern "C" fn(*mut EvmInstance, u64, u64),
    pub set_revert: extern "C" fn(*mut EvmInstance, u64, u64),
    pub stop: extern "C" fn(*mut EvmInstance),
    pub invalid: extern "C" fn(*mut EvmInstance),
    pub selfdestruct: extern "C" fn(*mut EvmInstance, U256),
}

static RUNTIME_FUNCTIONS: RuntimeFunctions = RuntimeFunctions {
    mul: evm_mul,
    div: evm_div,
    sdiv: evm_sdiv,
    rem: evm_rem,
    smod: evm_smod,
    addmod: evm_addmod,
    mulmod: evm_mulmod,
    exp: evm_exp,
    byte: evm_byte,
    signextend: evm_signextend,
    address: evm_address,
    origin: evm_origin,
    caller: evm_caller,
    callvalue: evm_callvalue,
    calldataload: evm_calldataload,
    calldatasize: evm_calldatasize,
    codesize: evm_codesize,
    gasprice: evm_gasprice,
    balance: evm_balance,
    extcodesize: evm_extcodesize,
    extcodehash: evm_extcodehash,
    returndatasize: evm_returndatasize,
    gas: evm_gas,
    blockhash: evm_blockhash,
    coinbase: evm_coinbase,
    timestamp: evm_timestamp,
    number: evm_number,
    prevrandao: evm_prevrandao,
    gaslimit: evm_gaslimit,
    chainid: evm_chainid,
    selfbalance: evm_selfbalance,
    basefee: evm_basefee,
    blobhash: evm_blobhash,
    blobbasefee: evm_blobbasefee,
    msize: evm_msize,
    mload: evm_mload,
    mstore: evm_mstore,
    mstore8: evm_mstore8,
    mcopy: evm_mcopy,
    codecopy: evm_codecopy,
    calldatacopy: evm_calldatacopy,
    extcodecopy: evm_extcodecopy,
    returndatacopy: evm_returndatacopy,
    sload: evm_sload,
    sstore: evm_sstore,
    tload: evm_tload,
    tstore: evm_tstore,
    keccak256: evm_keccak256,
    set_return: evm_set_return,
    set_revert: evm_set_revert,
    stop: evm_stop,
    invalid: evm_invalid,
    selfdestruct: evm_selfdestruct,
};

/// The process-wide table. Its address, and the addresses of the functions
/// inside it, are stable for the lifetime of the process.
pub fn runtime_function_table() -> &'static RuntimeFunctions {
    &RUNTIME_FUNCTIONS
}

/// Reborrows the raw instance pointer handed over by compiled code.
///
/// # Safety
///
/// Callers come from generated code that received the pointer from the
/// execution surface, which keeps the instance alive and unaliased for the
/// duration of the call.
#[inline]
fn instance_mut<'i>(instance: *mut EvmInstance) -> &'i mut EvmInstance {
    unsafe { &mut *instance }
}

// ==================== Arithmetic ====================

extern "C" fn evm_mul(_instance: *mut EvmInstance, lhs: U256, rhs: U256) -> U256 {
    arith::wrapping_mul(lhs, rhs)
}

extern "C" fn evm_div(_instance: *mut EvmInstance, lhs: U256, rhs: U256) -> U256 {
    arith::div(lhs, rhs)
}

extern "C" fn evm_sdiv(_instance: *mut EvmInstance, lhs: U256, rhs: U256) -> U256 {
    arith::sdiv(lhs, rhs)
}

extern "C" fn evm_rem(_instance: *mut EvmInstance, lhs: U256, rhs: U256) -> U256 {
    arith::rem(lhs, rhs)
}

extern "C" fn evm_smod(_instance: *mut EvmInstance, lhs: U256, rhs: U256) -> U256 {
    arith::smod(lhs, rhs)
}

extern "C" fn evm_addmod(_instance: *mut EvmInstance, lhs: U256, rhs: U256, modulus: U256) -> U256 {
    arith::addmod(lhs, rhs, modulus)
}

extern "C" fn evm_mulmod(_instance: *mut EvmInstance, lhs: U256, rhs: U256, modulus: U256) -> U256 {
    arith::mulmod(lhs, rhs, modulus)
}

extern "C" fn evm_exp(instance: *mut EvmInstance, base: U256, exponent: U256) -> U256 {
    let inst = instance_mut(instance);
    match gas_cost::exp(exponent, inst.revision()).and_then(|cost| inst.charge_gas(cost)) {
        Ok(()) => arith::exp(base, exponent),
        Err(error) => {
            inst.halt(error);
            U256::zero()
        }
    }
}

extern "C" fn evm_byte(_instance: *mut EvmInstance, index: U256, value: U256) -> U256 {
    arith::byte(index, value)
}

extern "C" fn evm_signextend(_instance: *mut EvmInstance, index: U256, value: U256) -> U256 {
    arith::sign_extend(index, value)
}

// ==================== Environment ====================

extern "C" fn evm_address(instance: *mut EvmInstance) -> *const u8 {
    let inst = instance_mut(instance);
    let word = inst
        .current_message()
        .map(|msg| address_to_word(msg.recipient))
        .unwrap_or_default();
    inst.intern_bytes32(word.to_big_endian()).as_ptr()
}

extern "C" fn evm_origin(instance: *mut EvmInstance) -> *const u8 {
    let inst = instance_mut(instance);
    let origin = inst.tx_context().tx_origin;
    inst.intern_bytes32(address_to_word(origin).to_big_endian())
        .as_ptr()
}

extern "C" fn evm_caller(instance: *mut EvmInstance) -> *const u8 {
    let inst = instance_mut(instance);
    let word = inst
        .current_message()
        .map(|msg| address_to_word(msg.sender))
        .unwrap_or_default();
    inst.intern_bytes32(word.to_big_endian()).as_ptr()
}

extern "C" fn evm_callvalue(instance: *mut EvmInstance) -> *const u8 {
    let inst = instance_mut(instance);
    let value = inst
        .current_message()
        .map(|msg| msg.value)
        .unwrap_or_default();
    inst.intern_bytes32(value.to_big_endian()).as_ptr()
}

extern "C" fn evm_calldataload(instance: *mut EvmInstance, offset: u64) -> *const u8 {
    let inst = instance_mut(instance);
    inst.cached_calldata_word(offset).as_ptr()
}

extern "C" fn evm_calldatasize(instance: *mut EvmInstance) -> u64 {
    let inst = instance_mut(instance);
    inst.current_message()
        .map(|msg| msg.input.len() as u64)
        .unwrap_or(0)
}

extern "C" fn evm_codesize(instance: *mut EvmInstance) -> u64 {
    instance_mut(instance).module().code_size() as u64
}

extern "C" fn evm_gasprice(instance: *mut EvmInstance) -> U256 {
    instance_mut(instance).tx_context().tx_gas_price
}

extern "C" fn evm_balance(instance: *mut EvmInstance, address: U256) -> U256 {
    let inst = instance_mut(instance);
    let address = word_to_address(address);
    let address_was_cold = inst.host_mut().access_account(address).is_cold();
    match gas_cost::balance(address_was_cold, inst.revision())
        .and_then(|cost| inst.charge_gas(cost))
    {
        Ok(()) => inst.host().get_balance(address),
        Err(error) => {
            inst.halt(error);
            U256::zero()
        }
    }
}

extern "C" fn evm_extcodesize(instance: *mut EvmInstance, address: U256) -> u64 {
    let inst = instance_mut(instance);
    let address = word_to_address(address);
    let address_was_cold = inst.host_mut().access_account(address).is_cold();
    match gas_cost::extcodesize(address_was_cold, inst.revision())
        .and_then(|cost| inst.charge_gas(cost))
    {
        Ok(()) => inst.host().get_code_size(address),
        Err(error) => {
            inst.halt(error);
            0
        }
    }
}

extern "C" fn evm_extcodehash(instance: *mut EvmInstance, address: U256) -> *const u8 {
    let inst = instance_mut(instance);
    let address = word_to_address(address);
    let address_was_cold = inst.host_mut().access_account(address).is_cold();
    let hash = match gas_cost::extcodehash(address_was_cold, inst.revision())
        .and_then(|cost| inst.charge_gas(cost))
    {
        Ok(()) => inst.host().get_code_hash(address).0,
        Err(error) => {
            inst.halt(error);
            [0u8; 32]
        }
    };
    inst.intern_bytes32(hash).as_ptr()
}

extern "C" fn evm_returndatasize(instance: *mut EvmInstance) -> u64 {
    instance_mut(instance).return_data().len() as u64
}

extern "C" fn evm_gas(instance: *mut EvmInstance) -> u64 {
    instance_mut(instance).gas_left()
}

// ==================== Block ====================

extern "C" fn evm_blockhash(instance: *mut EvmInstance, block_number: u64) -> *const u8 {
    let inst = instance_mut(instance);
    let current_block = inst.tx_context().block_number;
    let lower_bound = current_block.saturating_sub(LAST_AVAILABLE_BLOCK_LIMIT.low_u64());
    if block_number >= current_block || block_number < lower_bound {
        return inst.intern_bytes32([0u8; 32]).as_ptr();
    }
    inst.cached_block_hash(block_number).as_ptr()
}

extern "C" fn evm_coinbase(instance: *mut EvmInstance) -> *const u8 {
    let inst = instance_mut(instance);
    let coinbase = inst.tx_context().block_coinbase;
    inst.intern_bytes32(address_to_word(coinbase).to_big_endian())
        .as_ptr()
}

extern "C" fn evm_timestamp(instance: *mut EvmInstance) -> U256 {
    U256::from(instance_mut(instance).tx_context().block_timestamp)
}

extern "C" fn evm_number(instance: *mut EvmInstance) -> U256 {
    U256::from(instance_mut(instance).tx_context().block_number)
}

extern "C" fn evm_prevrandao(instance: *mut EvmInstance) -> *const u8 {
    let inst = instance_mut(instance);
    let randao = inst.tx_context().block_prev_randao.0;
    inst.intern_bytes32(randao).as_ptr()
}

extern "C" fn evm_gaslimit(instance: *mut EvmInstance) -> U256 {
    U256::from(instance_mut(instance).tx_context().block_gas_limit)
}

extern "C" fn evm_chainid(instance: *mut EvmInstance) -> U256 {
    instance_mut(instance).tx_context().chain_id
}

extern "C" fn evm_selfbalance(instance: *mut EvmInstance) -> U256 {
    let inst = instance_mut(instance);
    match inst.current_message() {
        Some(msg) => {
            let recipient = msg.recipient;
            inst.host().get_balance(recipient)
        }
        None => U256::zero(),
    }
}

extern "C" fn evm_basefee(instance: *mut EvmInstance) -> U256 {
    instance_mut(instance).tx_context().block_base_fee
}

extern "C" fn evm_blobhash(instance: *mut EvmInstance, index: u64) -> *const u8 {
    instance_mut(instance).cached_blob_hash(index).as_ptr()
}

extern "C" fn evm_blobbasefee(instance: *mut EvmInstance) -> U256 {
    instance_mut(instance).tx_context().blob_base_fee
}

// ==================== Memory ====================

extern "C" fn evm_msize(instance: *mut EvmInstance) -> u64 {
    instance_mut(instance).memory_size() as u64
}

fn expand_for(inst: &mut EvmInstance, offset: u64, len: u64) -> Result<usize, VMError> {
    let required = offset
        .checked_add(len)
        .ok_or(ExceptionalHalt::TooLargeRequiredMemory)?;
    inst.consume_memory_expansion_gas(required)?;
    inst.expand_memory(required)?;
    usize::try_from(offset).map_err(|_| ExceptionalHalt::TooLargeRequiredMemory.into())
}

extern "C" fn evm_mload(instance: *mut EvmInstance, offset: u64) -> U256 {
    let inst = instance_mut(instance);
    let result = expand_for(inst, offset, 32).and_then(|offset| {
        inst.memory()
            .get(offset..offset + 32)
            .map(U256::from_big_endian)
            .ok_or(ExceptionalHalt::InvalidMemoryAccess.into())
    });
    match result {
        Ok(value) => value,
        Err(error) => {
            inst.halt(error);
            U256::zero()
        }
    }
}

extern "C" fn evm_mstore(instance: *mut EvmInstance, offset: u64, value: U256) {
    let inst = instance_mut(instance);
    let result = expand_for(inst, offset, 32).and_then(|offset| {
        inst.memory_mut()
            .get_mut(offset..offset + 32)
            .map(|window| window.copy_from_slice(&value.to_big_endian()))
            .ok_or(ExceptionalHalt::InvalidMemoryAccess.into())
    });
    if let Err(error) = result {
        inst.halt(error);
    }
}

extern "C" fn evm_mstore8(instance: *mut EvmInstance, offset: u64, value: U256) {
    let inst = instance_mut(instance);
    let result = expand_for(inst, offset, 1).and_then(|offset| {
        inst.memory_mut()
            .get_mut(offset)
            .map(|slot| *slot = value.byte(0))
            .ok_or(ExceptionalHalt::InvalidMemoryAccess.into())
    });
    if let Err(error) = result {
        inst.halt(error);
    }
}

extern "C" fn evm_mcopy(instance: *mut EvmInstance, dest: u64, src: u64, len: u64) {
    if len == 0 {
        return;
    }
    let inst = instance_mut(instance);
    let result = (|| -> Result<(), VMError> {
        let required = dest
            .max(src)
            .checked_add(len)
            .ok_or(ExceptionalHalt::TooLargeRequiredMemory)?;
        inst.consume_memory_expansion_gas(required)?;
        inst.expand_memory(required)?;
        let (dest, src, len) = (dest as usize, src as usize, len as usize);
        let memory = inst.memory_mut();
        if src + len > memory.len() || dest + len > memory.len() {
            return Err(ExceptionalHalt::InvalidMemoryAccess.into());
        }
        memory.copy_within(src..src + len, dest);
        Ok(())
    })();
    if let Err(error) = result {
        inst.halt(error);
    }
}

/// Shared tail of the copy family: expand the destination window, copy what
/// the source has, zero the rest.
fn copy_to_memory(
    inst: &mut EvmInstance,
    dest: u64,
    len: u64,
    fill: impl FnOnce(&mut [u8]),
) -> Result<(), VMError> {
    if len == 0 {
        return Ok(());
    }
    let dest = expand_for(inst, dest, len)?;
    let len = len as usize;
    let window = inst
        .memory_mut()
        .get_mut(dest..dest + len)
        .ok_or(ExceptionalHalt::InvalidMemoryAccess)?;
    window.fill(0);
    fill(window);
    Ok(())
}

extern "C" fn evm_codecopy(instance: *mut EvmInstance, dest: u64, offset: u64, size: u64) {
    let inst = instance_mut(instance);
    let code_size = inst.module().code_size();
    let code: Vec<u8> = inst
        .module()
        .code()
        .get(..code_size)
        .unwrap_or_default()
        .to_vec();
    let result = copy_to_memory(inst, dest, size, |window| {
        if let Ok(offset) = usize::try_from(offset) {
            if let Some(src) = code.get(offset..) {
                let n = src.len().min(window.len());
                window[..n].copy_from_slice(&src[..n]);
            }
        }
    });
    if let Err(error) = result {
        inst.halt(error);
    }
}

extern "C" fn evm_calldatacopy(instance: *mut EvmInstance, dest: u64, offset: u64, size: u64) {
    let inst = instance_mut(instance);
    let input = inst
        .current_message()
        .map(|msg| msg.input.clone())
        .unwrap_or_default();
    let result = copy_to_memory(inst, dest, size, |window| {
        if let Ok(offset) = usize::try_from(offset) {
            if let Some(src) = input.get(offset..) {
                let n = src.len().min(window.len());
                window[..n].copy_from_slice(&src[..n]);
            }
        }
    });
    if let Err(error) = result {
        inst.halt(error);
    }
}

extern "C" fn evm_extcodecopy(
    instance: *mut EvmInstance,
    address: U256,
    dest: u64,
    offset: u64,
    size: u64,
) {
    let inst = instance_mut(instance);
    let address = word_to_address(address);
    let address_was_cold = inst.host_mut().access_account(address).is_cold();
    let result = gas_cost::extcodesize(address_was_cold, inst.revision())
        .and_then(|cost| inst.charge_gas(cost))
        .and_then(|()| {
            let mut buf = vec![0u8; size as usize];
            if let Ok(offset) = usize::try_from(offset) {
                inst.host().copy_code(address, offset, &mut buf);
            }
            copy_to_memory(inst, dest, size, |window| {
                let n = buf.len().min(window.len());
                window[..n].copy_from_slice(&buf[..n]);
            })
        });
    if let Err(error) = result {
        inst.halt(error);
    }
}

extern "C" fn evm_returndatacopy(instance: *mut EvmInstance, dest: u64, offset: u64, size: u64) {
    let inst = instance_mut(instance);
    let return_data = inst.return_data().to_vec();
    let result = (|| -> Result<(), VMError> {
        // Reading past the return buffer is an error, not zero fill.
        let end = offset
            .checked_add(size)
            .ok_or(ExceptionalHalt::InvalidMemoryAccess)?;
        if end > return_data.len() as u64 {
            return Err(ExceptionalHalt::InvalidMemoryAccess.into());
        }
        copy_to_memory(inst, dest, size, |window| {
            let src = &return_data[offset as usize..end as usize];
            window.copy_from_slice(src);
        })
    })();
    if let Err(error) = result {
        inst.halt(error);
    }
}

// ==================== Storage ====================

extern "C" fn evm_sload(instance: *mut EvmInstance, key: U256) -> U256 {
    let inst = instance_mut(instance);
    let recipient = match inst.current_message() {
        Some(msg) => msg.recipient,
        None => return U256::zero(),
    };
    let slot_was_cold = inst.host_mut().access_storage(recipient, key).is_cold();
    match gas_cost::sload(slot_was_cold, inst.revision()).and_then(|cost| inst.charge_gas(cost)) {
        Ok(()) => inst.host().get_storage(recipient, key),
        Err(error) => {
            inst.halt(error);
            U256::zero()
        }
    }
}

extern "C" fn evm_sstore(instance: *mut EvmInstance, key: U256, value: U256) {
    let inst = instance_mut(instance);
    let result = (|| -> Result<(), VMError> {
        if inst.is_static_mode() {
            return Err(ExceptionalHalt::StaticModeViolation.into());
        }
        if inst.gas_left() <= SSTORE_STIPEND {
            return Err(ExceptionalHalt::OutOfGas.into());
        }
        let recipient = inst
            .current_message()
            .map(|msg| msg.recipient)
            .unwrap_or_default();

        let slot_was_cold = inst.host_mut().access_storage(recipient, key).is_cold();
        let status = inst.host_mut().set_storage(recipient, key, value);

        let store_cost = gas_schedule::sstore_cost(inst.revision(), status);
        let mut cost = store_cost.gas;
        if inst.revision() >= Revision::Berlin && slot_was_cold {
            cost = cost
                .checked_add(COLD_SLOAD_COST)
                .ok_or(ExceptionalHalt::OutOfGas)?;
        }
        inst.charge_gas(cost)?;
        inst.add_gas_refund(store_cost.refund);
        Ok(())
    })();
    if let Err(error) = result {
        inst.halt(error);
    }
}

extern "C" fn evm_tload(instance: *mut EvmInstance, key: U256) -> U256 {
    let inst = instance_mut(instance);
    match inst.current_message() {
        Some(msg) => {
            let recipient = msg.recipient;
            inst.host().get_transient_storage(recipient, key)
        }
        None => U256::zero(),
    }
}

extern "C" fn evm_tstore(instance: *mut EvmInstance, key: U256, value: U256) {
    let inst = instance_mut(instance);
    if inst.is_static_mode() {
        inst.halt(ExceptionalHalt::StaticModeViolation.into());
        return;
    }
    let recipient = inst
        .current_message()
        .map(|msg| msg.recipient)
        .unwrap_or_default();
    inst.host_mut().set_transient_storage(recipient, key, value);
}

// ==================== Crypto ====================

extern "C" fn evm_keccak256(instance: *mut EvmInstance, offset: u64, len: u64) -> *const u8 {
    let inst = instance_mut(instance);
    let digest = (|| -> Result<[u8; 32], VMError> {
        let offset = expand_for(inst, offset, len)?;
        let len = len as usize;
        let data = inst
            .memory()
            .get(offset..offset + len)
            .ok_or(ExceptionalHalt::InvalidMemoryAccess)?;
        let mut hasher = Keccak256::new();
        hasher.update(data);
        Ok(hasher.finalize().into())
    })();
    match digest {
        Ok(digest) => inst.intern_bytes32(digest).as_ptr(),
        Err(error) => {
            inst.halt(error);
            inst.intern_bytes32([0u8; 32]).as_ptr()
        }
    }
}

// ==================== Termination ====================

extern "C" fn evm_set_return(instance: *mut EvmInstance, offset: u64, len: u64) {
    let inst = instance_mut(instance);
    let result = (|| -> Result<(), VMError> {
        let offset = expand_for(inst, offset, len)?;
        let len = len as usize;
        let data = inst
            .memory()
            .get(offset..offset + len)
            .ok_or(ExceptionalHalt::InvalidMemoryAccess)?
            .to_vec();
        inst.set_return_data(data);
        inst.exit(ExitStatus::Success);
        Ok(())
    })();
    if let Err(error) = result {
        inst.halt(error);
    }
}

extern "C" fn evm_set_revert(instance: *mut EvmInstance, offset: u64, len: u64) {
    let inst = instance_mut(instance);
    let result = (|| -> Result<(), VMError> {
        let offset = expand_for(inst, offset, len)?;
        let len = len as usize;
        let data = inst
            .memory()
            .get(offset..offset + len)
            .ok_or(ExceptionalHalt::InvalidMemoryAccess)?
            .to_vec();
        inst.set_return_data(data);
        inst.exit(ExitStatus::Revert);
        Ok(())
    })();
    if let Err(error) = result {
        inst.halt(error);
    }
}

extern "C" fn evm_stop(instance: *mut EvmInstance) {
    let inst = instance_mut(instance);
    inst.set_return_data(Vec::new());
    inst.exit(ExitStatus::Success);
}

extern "C" fn evm_invalid(instance: *mut EvmInstance) {
    instance_mut(instance).halt(ExceptionalHalt::InvalidInstruction.into());
}

extern "C" fn evm_selfdestruct(instance: *mut EvmInstance, beneficiary: U256) {
    let inst = instance_mut(instance);
    let result = (|| -> Result<(), VMError> {
        if inst.is_static_mode() {
            return Err(ExceptionalHalt::StaticModeViolation.into());
        }
        let beneficiary = word_to_address(beneficiary);
        let recipient = inst
            .current_message()
            .map(|msg| msg.recipient)
            .unwrap_or_default();

        let address_was_cold = inst.host_mut().access_account(beneficiary).is_cold();
        let beneficiary_is_absent = !inst.host().account_exists(beneficiary);
        let cost = gas_cost::selfdestruct(address_was_cold, beneficiary_is_absent, inst.revision())?;
        inst.charge_gas(cost)?;

        inst.host_mut().selfdestruct(recipient, beneficiary);
        inst.set_return_data(Vec::new());
        inst.exit(ExitStatus::Success);
        Ok(())
    })();
    if let Err(error) = result {
        inst.halt(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::EvmModule,
        call_frame::Message,
        host::{AccessStatus, CallResult, Host, StorageStatus, TxContext},
    };
    use bytes::Bytes;
    use ethereum_types::{Address, H256};

    struct FlatHost {
        storage: std::collections::HashMap<(Address, U256), U256>,
    }

    impl Host for FlatHost {
        fn account_exists(&self, _address: Address) -> bool {
            true
        }
        fn access_account(&mut self, _address: Address) -> AccessStatus {
            AccessStatus::Warm
        }
        fn access_storage(&mut self, _address: Address, _key: U256) -> AccessStatus {
            AccessStatus::Warm
        }
        fn get_storage(&self, address: Address, key: U256) -> U256 {
            self.storage
                .get(&(address, key))
                .copied()
                .unwrap_or_default()
        }
        fn set_storage(&mut self, address: Address, key: U256, value: U256) -> StorageStatus {
            self.storage.insert((address, key), value);
            StorageStatus::Added
        }
        fn get_transient_storage(&self, _address: Address, _key: U256) -> U256 {
            U256::zero()
        }
        fn set_transient_storage(&mut self, _address: Address, _key: U256, _value: U256) {}
        fn get_balance(&self, _address: Address) -> U256 {
            U256::from(99)
        }
        fn get_code_size(&self, _address: Address) -> u64 {
            0
        }
        fn get_code_hash(&self, _address: Address) -> H256 {
            H256::zero()
        }
        fn copy_code(&self, _address: Address, _offset: usize, _buf: &mut [u8]) -> usize {
            0
        }
        fn selfdestruct(&mut self, _address: Address, _beneficiary: Address) {}
        fn call(&mut self, _message: &Message) -> CallResult {
            CallResult::failure()
        }
        fn get_tx_context(&self) -> TxContext {
            TxContext {
                block_number: 1000,
                ..TxContext::default()
            }
        }
        fn get_block_hash(&self, block_number: u64) -> H256 {
            H256::from_low_u64_be(block_number)
        }
        fn emit_log(&mut self, _address: Address, _data: &[u8], _topics: &[H256]) {}
    }

    fn setup(gas: u64) -> (EvmModule, FlatHost, Message) {
        let module = EvmModule::from_bytes(&[0x00]).unwrap();
        let host = FlatHost {
            storage: Default::default(),
        };
        let message = Message::top_level(
            Address::from_low_u64_be(1),
            Address::from_low_u64_be(2),
            U256::zero(),
            Bytes::from_static(&[0xaa, 0xbb]),
            gas,
        );
        (module, host, message)
    }

    #[test]
    fn mstore_mload_roundtrip_through_the_table() {
        let (module, mut host, message) = setup(100_000);
        let mut inst =
            unsafe { EvmInstance::new(&module, &mut host, message, Revision::Cancun) };
        let table = runtime_function_table();

        (table.mstore)(&mut inst, 64, U256::from(0x1234));
        let loaded = (table.mload)(&mut inst, 64);
        assert_eq!(loaded, U256::from(0x1234));
        assert!(inst.take_halt().is_none());
        assert_eq!((table.msize)(&mut inst), 96);
    }

    #[test]
    fn memory_overflow_halts_with_too_large_memory() {
        let (module, mut host, message) = setup(100_000);
        let mut inst =
            unsafe { EvmInstance::new(&module, &mut host, message, Revision::Cancun) };
        let table = runtime_function_table();

        // The u64 normalisation sentinel for an oversized offset.
        (table.mstore)(&mut inst, u64::MAX, U256::one());
        assert_eq!(
            inst.take_halt(),
            Some(ExceptionalHalt::TooLargeRequiredMemory.into())
        );
    }

    #[test]
    fn sstore_then_sload_roundtrip() {
        let (module, mut host, message) = setup(100_000);
        let mut inst =
            unsafe { EvmInstance::new(&module, &mut host, message, Revision::Cancun) };
        let table = runtime_function_table();

        (table.sstore)(&mut inst, U256::from(7), U256::from(42));
        assert!(inst.take_halt().is_none());
        assert_eq!((table.sload)(&mut inst, U256::from(7)), U256::from(42));
        // Added costs 20000, warm sload 100.
        assert_eq!(inst.gas_left(), 100_000 - 20_000 - 100);
    }

    #[test]
    fn calldataload_window_is_cached_and_zero_padded() {
        let (module, mut host, message) = setup(100_000);
        let mut inst =
            unsafe { EvmInstance::new(&module, &mut host, message, Revision::Cancun) };
        let table = runtime_function_table();

        let first = (table.calldataload)(&mut inst, 0);
        let again = (table.calldataload)(&mut inst, 0);
        assert_eq!(first, again);
        let word = unsafe { std::slice::from_raw_parts(first, 32) };
        assert_eq!(&word[..2], &[0xaa, 0xbb]);
        assert!(word[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn set_return_snapshots_memory_and_exits() {
        let (module, mut host, message) = setup(100_000);
        let mut inst =
            unsafe { EvmInstance::new(&module, &mut host, message, Revision::Cancun) };
        let table = runtime_function_table();

        (table.mstore)(&mut inst, 0, U256::from(7));
        (table.set_return)(&mut inst, 0, 32);
        assert_eq!(inst.exit_status(), Some(ExitStatus::Success));
        assert_eq!(inst.return_data().len(), 32);
        assert_eq!(inst.return_data()[31], 7);
    }

    #[test]
    fn blockhash_window() {
        let (module, mut host, message) = setup(100_000);
        let mut inst =
            unsafe { EvmInstance::new(&module, &mut host, message, Revision::Cancun) };
        let table = runtime_function_table();

        let recent = (table.blockhash)(&mut inst, 999);
        let word = unsafe { std::slice::from_raw_parts(recent, 32) };
        assert_eq!(word[31], 0xe7);

        let future = (table.blockhash)(&mut inst, 1000);
        let word = unsafe { std::slice::from_raw_parts(future, 32) };
        assert!(word.iter().all(|&b| b == 0));
    }
}
