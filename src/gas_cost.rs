//! Gas costs of the EVM instructions.
//!
//! Constants cover the base costs that never changed across revisions;
//! the helpers below them compute the dynamic parts (memory expansion,
//! per-word copies, cold/warm access, call forwarding).

use crate::{
    constants::WORD_SIZE,
    errors::{ExceptionalHalt, VMError},
    gas_schedule::GasSchedule,
    memory,
    revision::Revision,
};
use ExceptionalHalt::OutOfGas;
use ethereum_types::U256;

pub const STOP: u64 = 0;
pub const ADD: u64 = 3;
pub const MUL: u64 = 5;
pub const SUB: u64 = 3;
pub const DIV: u64 = 5;
pub const SDIV: u64 = 5;
pub const MOD: u64 = 5;
pub const SMOD: u64 = 5;
pub const ADDMOD: u64 = 8;
pub const MULMOD: u64 = 8;
pub const EXP_STATIC: u64 = 10;
pub const SIGNEXTEND: u64 = 5;
pub const LT: u64 = 3;
pub const GT: u64 = 3;
pub const SLT: u64 = 3;
pub const SGT: u64 = 3;
pub const EQ: u64 = 3;
pub const ISZERO: u64 = 3;
pub const AND: u64 = 3;
pub const OR: u64 = 3;
pub const XOR: u64 = 3;
pub const NOT: u64 = 3;
pub const BYTE: u64 = 3;
pub const SHL: u64 = 3;
pub const SHR: u64 = 3;
pub const SAR: u64 = 3;
pub const KECCAK256_STATIC: u64 = 30;
pub const KECCAK256_DYNAMIC_BASE: u64 = 6;
pub const ADDRESS: u64 = 2;
pub const ORIGIN: u64 = 2;
pub const CALLER: u64 = 2;
pub const CALLVALUE: u64 = 2;
pub const CALLDATALOAD: u64 = 3;
pub const CALLDATASIZE: u64 = 2;
pub const CALLDATACOPY_STATIC: u64 = 3;
pub const CALLDATACOPY_DYNAMIC_BASE: u64 = 3;
pub const CODESIZE: u64 = 2;
pub const CODECOPY_STATIC: u64 = 3;
pub const CODECOPY_DYNAMIC_BASE: u64 = 3;
pub const GASPRICE: u64 = 2;
pub const EXTCODECOPY_DYNAMIC_BASE: u64 = 3;
pub const RETURNDATASIZE: u64 = 2;
pub const RETURNDATACOPY_STATIC: u64 = 3;
pub const RETURNDATACOPY_DYNAMIC_BASE: u64 = 3;
pub const BLOCKHASH: u64 = 20;
pub const COINBASE: u64 = 2;
pub const TIMESTAMP: u64 = 2;
pub const NUMBER: u64 = 2;
pub const PREVRANDAO: u64 = 2;
pub const GASLIMIT: u64 = 2;
pub const CHAINID: u64 = 2;
pub const SELFBALANCE: u64 = 5;
pub const BASEFEE: u64 = 2;
pub const BLOBHASH: u64 = 3;
pub const BLOBBASEFEE: u64 = 2;
pub const POP: u64 = 2;
pub const MLOAD_STATIC: u64 = 3;
pub const MSTORE_STATIC: u64 = 3;
pub const MSTORE8_STATIC: u64 = 3;
pub const JUMP: u64 = 8;
pub const JUMPI: u64 = 10;
pub const PC: u64 = 2;
pub const MSIZE: u64 = 2;
pub const GAS: u64 = 2;
pub const JUMPDEST: u64 = 1;
pub const TLOAD: u64 = 100;
pub const TSTORE: u64 = 100;
pub const MCOPY_STATIC: u64 = 3;
pub const MCOPY_DYNAMIC_BASE: u64 = 3;
pub const PUSH0: u64 = 2;
pub const PUSHN: u64 = 3;
pub const DUPN: u64 = 3;
pub const SWAPN: u64 = 3;
pub const LOGN_STATIC: u64 = 375;
pub const LOGN_DYNAMIC_BASE: u64 = 375;
pub const LOGN_DYNAMIC_BYTE_BASE: u64 = 8;

pub const SELFDESTRUCT_STATIC: u64 = 5000;

pub const COLD_ADDRESS_ACCESS_COST: u64 = 2600;
pub const WARM_ADDRESS_ACCESS_COST: u64 = 100;
pub const COLD_SLOAD_COST: u64 = 2100;
pub const WARM_STORAGE_READ_COST: u64 = 100;
/// SSTORE rejects frames holding no more than this much gas (EIP-2200).
pub const SSTORE_STIPEND: u64 = 2300;

pub const NON_ZERO_VALUE_COST: u64 = 9000;
pub const CALL_POSITIVE_VALUE_STIPEND: u64 = 2300;
pub const VALUE_TO_EMPTY_ACCOUNT_COST: u64 = 25000;
pub const ACCOUNT_CREATION_COST: u64 = 25000;

pub const INIT_CODE_WORD_COST: u64 = 2;
pub const CREATE_BASE_COST: u64 = 32000;

/// Dynamic EXP cost: a per-byte charge on the exponent's width.
pub fn exp(exponent: U256, revision: Revision) -> Result<u64, VMError> {
    let exponent_byte_size = (exponent.bits().checked_add(7).ok_or(OutOfGas)?) / 8;

    let exponent_byte_size: u64 = exponent_byte_size
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;

    let schedule = GasSchedule::for_revision(revision);
    let exponent_byte_size_cost = schedule
        .exp_byte
        .checked_mul(exponent_byte_size)
        .ok_or(OutOfGas)?;

    EXP_STATIC
        .checked_add(exponent_byte_size_cost)
        .ok_or(OutOfGas.into())
}

fn copy_behavior(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
    dynamic_base: u64,
    static_cost: u64,
) -> Result<u64, VMError> {
    let minimum_word_size = size.checked_add(WORD_SIZE - 1).ok_or(OutOfGas)? / WORD_SIZE;

    let minimum_word_size: u64 = minimum_word_size
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;

    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;

    let minimum_word_size_cost = dynamic_base
        .checked_mul(minimum_word_size)
        .ok_or(OutOfGas)?;
    static_cost
        .checked_add(minimum_word_size_cost)
        .ok_or(OutOfGas)?
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas.into())
}

pub fn keccak256(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        KECCAK256_DYNAMIC_BASE,
        KECCAK256_STATIC,
    )
}

pub fn calldatacopy(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        CALLDATACOPY_DYNAMIC_BASE,
        CALLDATACOPY_STATIC,
    )
}

pub fn codecopy(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        CODECOPY_DYNAMIC_BASE,
        CODECOPY_STATIC,
    )
}

pub fn returndatacopy(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        RETURNDATACOPY_DYNAMIC_BASE,
        RETURNDATACOPY_STATIC,
    )
}

pub fn extcodecopy(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
    address_was_cold: bool,
    revision: Revision,
) -> Result<u64, VMError> {
    let schedule = GasSchedule::for_revision(revision);
    let access_cost = schedule.account_access_cost(address_was_cold, schedule.extcodecopy_base);
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        EXTCODECOPY_DYNAMIC_BASE,
        access_cost,
    )
}

/// RETURN and REVERT only pay for memory expansion.
pub fn exit_opcode(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    memory::expansion_cost(new_memory_size, current_memory_size)
}

pub fn mload(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    mem_expansion_behavior(new_memory_size, current_memory_size, MLOAD_STATIC)
}

pub fn mstore(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    mem_expansion_behavior(new_memory_size, current_memory_size, MSTORE_STATIC)
}

pub fn mstore8(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    mem_expansion_behavior(new_memory_size, current_memory_size, MSTORE8_STATIC)
}

fn mem_expansion_behavior(
    new_memory_size: usize,
    current_memory_size: usize,
    static_cost: u64,
) -> Result<u64, VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;
    static_cost
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas.into())
}

pub fn mcopy(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        MCOPY_DYNAMIC_BASE,
        MCOPY_STATIC,
    )
}

pub fn log(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
    number_of_topics: usize,
) -> Result<u64, VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;

    let topics_cost = LOGN_DYNAMIC_BASE
        .checked_mul(number_of_topics as u64)
        .ok_or(OutOfGas)?;

    let size: u64 = size
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    let bytes_cost = LOGN_DYNAMIC_BYTE_BASE.checked_mul(size).ok_or(OutOfGas)?;

    topics_cost
        .checked_add(LOGN_STATIC)
        .ok_or(OutOfGas)?
        .checked_add(bytes_cost)
        .ok_or(OutOfGas)?
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas.into())
}

pub fn sload(storage_slot_was_cold: bool, revision: Revision) -> Result<u64, VMError> {
    Ok(GasSchedule::for_revision(revision).sload_cost(storage_slot_was_cold))
}

pub fn balance(address_was_cold: bool, revision: Revision) -> Result<u64, VMError> {
    let schedule = GasSchedule::for_revision(revision);
    Ok(schedule.account_access_cost(address_was_cold, schedule.balance))
}

pub fn extcodesize(address_was_cold: bool, revision: Revision) -> Result<u64, VMError> {
    let schedule = GasSchedule::for_revision(revision);
    Ok(schedule.account_access_cost(address_was_cold, schedule.extcodesize))
}

pub fn extcodehash(address_was_cold: bool, revision: Revision) -> Result<u64, VMError> {
    let schedule = GasSchedule::for_revision(revision);
    Ok(schedule.account_access_cost(address_was_cold, schedule.extcodehash))
}

pub fn selfdestruct(
    address_was_cold: bool,
    beneficiary_is_absent: bool,
    revision: Revision,
) -> Result<u64, VMError> {
    let mut cost = SELFDESTRUCT_STATIC;
    if revision >= Revision::Berlin && address_was_cold {
        cost = cost
            .checked_add(COLD_ADDRESS_ACCESS_COST - WARM_ADDRESS_ACCESS_COST)
            .ok_or(OutOfGas)?;
    }
    if revision >= Revision::SpuriousDragon && beneficiary_is_absent {
        cost = cost.checked_add(ACCOUNT_CREATION_COST).ok_or(OutOfGas)?;
    }
    Ok(cost)
}

/// Cost charged to the caller and the gas limit handed to the callee for the
/// CALL-family opcodes. The 2300 stipend for non-zero value is granted to
/// the callee without being charged to the caller.
#[allow(clippy::too_many_arguments)]
pub fn call(
    new_memory_size: usize,
    current_memory_size: usize,
    address_was_cold: bool,
    address_is_empty: bool,
    value: U256,
    requested_gas: U256,
    gas_left: u64,
    revision: Revision,
) -> Result<(u64, u64), VMError> {
    let schedule = GasSchedule::for_revision(revision);

    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;
    let access_cost = schedule.account_access_cost(address_was_cold, schedule.call_base);

    let mut positive_value_cost = 0u64;
    if !value.is_zero() {
        positive_value_cost = NON_ZERO_VALUE_COST;
        if address_is_empty {
            positive_value_cost = positive_value_cost
                .checked_add(VALUE_TO_EMPTY_ACCOUNT_COST)
                .ok_or(OutOfGas)?;
        }
    }

    let call_gas_cost = memory_expansion_cost
        .checked_add(access_cost)
        .ok_or(OutOfGas)?
        .checked_add(positive_value_cost)
        .ok_or(OutOfGas)?;

    let gas_limit = forwarded_gas(requested_gas, gas_left, call_gas_cost, value, schedule)?;
    Ok((call_gas_cost, gas_limit))
}

/// Like [`call`] but without the empty-account surcharge (CALLCODE keeps the
/// value fee only).
pub fn callcode(
    new_memory_size: usize,
    current_memory_size: usize,
    address_was_cold: bool,
    value: U256,
    requested_gas: U256,
    gas_left: u64,
    revision: Revision,
) -> Result<(u64, u64), VMError> {
    call(
        new_memory_size,
        current_memory_size,
        address_was_cold,
        false,
        value,
        requested_gas,
        gas_left,
        revision,
    )
}

/// DELEGATECALL and STATICCALL transfer no value.
pub fn delegatecall(
    new_memory_size: usize,
    current_memory_size: usize,
    address_was_cold: bool,
    requested_gas: U256,
    gas_left: u64,
    revision: Revision,
) -> Result<(u64, u64), VMError> {
    call(
        new_memory_size,
        current_memory_size,
        address_was_cold,
        false,
        U256::zero(),
        requested_gas,
        gas_left,
        revision,
    )
}

fn forwarded_gas(
    requested_gas: U256,
    gas_left: u64,
    call_gas_cost: u64,
    value: U256,
    schedule: &GasSchedule,
) -> Result<u64, VMError> {
    let gas_after_cost = gas_left.checked_sub(call_gas_cost).ok_or(OutOfGas)?;

    // EIP-150: hold back one sixty-fourth.
    let max_forward = if schedule.has_63_64_rule {
        gas_after_cost - gas_after_cost / 64
    } else {
        gas_after_cost
    };

    let requested = u64::try_from(requested_gas).unwrap_or(u64::MAX);
    let mut gas_limit = requested.min(max_forward);

    if !value.is_zero() {
        gas_limit = gas_limit
            .checked_add(CALL_POSITIVE_VALUE_STIPEND)
            .ok_or(OutOfGas)?;
    }
    Ok(gas_limit)
}

pub fn create(
    new_memory_size: usize,
    current_memory_size: usize,
    code_size_in_memory: usize,
    is_create_2: bool,
    revision: Revision,
) -> Result<u64, VMError> {
    let minimum_word_size = code_size_in_memory.checked_add(31).ok_or(OutOfGas)? / 32;

    let minimum_word_size: u64 = minimum_word_size
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;

    // EIP-3860: charge for each initcode word.
    let init_code_cost = if revision >= Revision::Shanghai {
        minimum_word_size
            .checked_mul(INIT_CODE_WORD_COST)
            .ok_or(OutOfGas)?
    } else {
        0
    };

    // CREATE2 pays to hash the initcode.
    let hash_cost = if is_create_2 {
        minimum_word_size
            .checked_mul(KECCAK256_DYNAMIC_BASE)
            .ok_or(OutOfGas)?
    } else {
        0
    };

    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;

    CREATE_BASE_COST
        .checked_add(init_code_cost)
        .ok_or(OutOfGas)?
        .checked_add(hash_cost)
        .ok_or(OutOfGas)?
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_cost_scales_with_exponent_width() {
        assert_eq!(exp(U256::zero(), Revision::Cancun).unwrap(), 10);
        assert_eq!(exp(U256::from(0xff), Revision::Cancun).unwrap(), 60);
        assert_eq!(exp(U256::from(0x100), Revision::Cancun).unwrap(), 110);
        // Pre-EIP-160 charged 10 per byte.
        assert_eq!(exp(U256::from(0x100), Revision::Homestead).unwrap(), 30);
    }

    #[test]
    fn call_forwards_all_but_one_64th() {
        let (cost, limit) = call(
            0,
            0,
            false,
            false,
            U256::zero(),
            U256::MAX,
            6400,
            Revision::Cancun,
        )
        .unwrap();
        assert_eq!(cost, WARM_ADDRESS_ACCESS_COST);
        let after = 6400 - cost;
        assert_eq!(limit, after - after / 64);
    }

    #[test]
    fn call_value_fee_and_stipend() {
        let (cost, limit) = call(
            0,
            0,
            true,
            true,
            U256::one(),
            U256::from(1000),
            100_000,
            Revision::Cancun,
        )
        .unwrap();
        assert_eq!(
            cost,
            COLD_ADDRESS_ACCESS_COST + NON_ZERO_VALUE_COST + VALUE_TO_EMPTY_ACCOUNT_COST
        );
        assert_eq!(limit, 1000 + CALL_POSITIVE_VALUE_STIPEND);
    }

    #[test]
    fn create2_charges_hashing() {
        let plain = create(0, 0, 64, false, Revision::Cancun).unwrap();
        let salted = create(0, 0, 64, true, Revision::Cancun).unwrap();
        assert_eq!(salted - plain, 2 * KECCAK256_DYNAMIC_BASE);
    }
}
