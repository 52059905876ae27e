//! End-to-end interpreter scenarios: bytecode in, status, gas and return
//! data out, executed against the recursive mock host.

mod common;

use bytes::Bytes;
use common::{run_code, run_code_with_host, Account, MockHost};
use ethereum_types::{Address, U256};
use zevm::{
    call_frame::Message, constants::TX_BASE_COST, EvmModule, ExceptionalHalt, Revision, TxResult,
    Vm,
};

fn assemble(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

#[test]
fn simple_add_returns_seven() {
    // PUSH1 3, PUSH1 4, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
    let code = [
        0x60, 0x03, 0x60, 0x04, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];
    let report = run_code(&code, 100_000);

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(report.output.len(), 32);
    let mut expected = [0u8; 32];
    expected[31] = 7;
    assert_eq!(report.output.as_ref(), &expected);

    // Five PUSHes, ADD and MSTORE at 3 gas each, RETURN at 0, plus the
    // expansion to one word of memory.
    let opcode_gas = 6 * 3 + 3;
    let memory_gas = 3;
    assert_eq!(report.gas_used, TX_BASE_COST + opcode_gas + memory_gas);
}

#[test]
fn keccak256_of_abc() {
    // "abc" left-padded at offset 0 occupies bytes 29..32.
    let code = assemble(&[
        &[0x62, 0x61, 0x62, 0x63], // PUSH3 "abc"
        &[0x60, 0x00, 0x52],       // MSTORE at 0
        &[0x60, 0x03],             // size = 3
        &[0x60, 0x1d],             // offset = 29
        &[0x20],                   // KECCAK256
        &[0x60, 0x00, 0x52],       // store the digest
        &[0x60, 0x20, 0x60, 0x00, 0xF3],
    ]);
    let report = run_code(&code, 100_000);

    assert_eq!(report.result, TxResult::Success);
    let expected =
        hex::decode("4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45").unwrap();
    assert_eq!(report.output.as_ref(), expected.as_slice());
}

#[test]
fn revert_keeps_gas_and_forfeits_refund() {
    // PUSH1 1, PUSH1 0, REVERT: one zero byte of freshly expanded memory.
    let code = [0x60, 0x01, 0x60, 0x00, 0xFD];
    let report = run_code(&code, 100_000);

    assert_eq!(report.result, TxResult::Revert);
    assert_eq!(report.output.as_ref(), &[0u8]);
    assert!(report.gas_left > 0);
    assert_eq!(report.gas_refunded, 0);
}

#[test]
fn sstore_cold_then_warm() {
    // Two identical SSTOREs of 1 into slot 0.
    let code = assemble(&[
        &[0x60, 0x01, 0x60, 0x00, 0x55], // SSTORE(0, 1): cold + fresh slot
        &[0x60, 0x01, 0x60, 0x00, 0x55], // SSTORE(0, 1): warm no-op
        &[0x00],
    ]);
    let mut host = MockHost::default();
    let report = run_code_with_host(&code, 100_000, &mut host);

    assert_eq!(report.result, TxResult::Success);
    // 2100 cold + 20000 set, then 100 for the warm assignment.
    let pushes = 4 * 3;
    assert_eq!(report.gas_used, TX_BASE_COST + pushes + 22_100 + 100);
    assert_eq!(
        host.storage_value(Address::from_low_u64_be(0xBB), U256::zero()),
        U256::one()
    );
}

#[test]
fn sstore_clearing_grants_refund_capped_by_gas_used() {
    // Store 1 then clear it: the Deleted transition refunds 4800 on Cancun.
    let code = assemble(&[
        &[0x60, 0x01, 0x60, 0x00, 0x55], // SSTORE(0, 1)
        &[0x60, 0x00, 0x60, 0x00, 0x55], // SSTORE(0, 0)
        &[0x00],
    ]);
    let report = run_code(&code, 100_000);

    assert_eq!(report.result, TxResult::Success);
    // The AddedDeleted transition grants 19900, but the payout is capped at
    // a fifth of the gas consumed.
    let consumed = TX_BASE_COST + 4 * 3 + 22_100 + 100;
    assert_eq!(report.gas_refunded, consumed / 5);
    assert_eq!(report.gas_used, consumed - consumed / 5);
    assert!(report.gas_refunded <= (report.gas_used + report.gas_refunded) / 5);
}

#[test]
fn jumpdest_validity() {
    // PUSH1 3, JUMP, STOP, JUMPDEST, PUSH1 42, PUSH1 0, MSTORE,
    // PUSH1 32, PUSH1 0, RETURN
    let code = [
        0x60, 0x03, 0x56, 0x00, 0x5B, 0x60, 0x2A, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];
    let report = run_code(&code, 100_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(report.output[31], 42);

    // Replacing the JUMPDEST with STOP turns the jump into a fault.
    let mut broken = code;
    broken[4] = 0x00;
    let report = run_code(&broken, 100_000);
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::BadJumpDestination)
    );
    assert_eq!(report.gas_left, 0);
}

#[test]
fn jump_to_code_size_fails() {
    // The code is 3 bytes; 3 is one past the end, inside the padding.
    let code = [0x60, 0x03, 0x56];
    let report = run_code(&code, 100_000);
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::BadJumpDestination)
    );
}

#[test]
fn jumpi_with_zero_condition_falls_through() {
    // PUSH1 0 (cond), PUSH1 6 (target), JUMPI, PUSH1 1, STOP, JUMPDEST
    let code = [0x60, 0x00, 0x60, 0x06, 0x57, 0x60, 0x01, 0x00];
    let report = run_code(&code, 100_000);
    assert_eq!(report.result, TxResult::Success);
}

#[test]
fn shift_across_the_64_bit_boundary() {
    // SHL(1, 2^63) = 2^64
    let code = assemble(&[
        &[0x67, 0x80, 0, 0, 0, 0, 0, 0, 0], // PUSH8 2^63
        &[0x60, 0x01, 0x1B],                // PUSH1 1, SHL
        &[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3],
    ]);
    let report = run_code(&code, 100_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(U256::from_big_endian(&report.output), U256::one() << 64);

    // SHR(1, 2^64) = 2^63
    let code = assemble(&[
        &[0x68, 0x01, 0, 0, 0, 0, 0, 0, 0, 0], // PUSH9 2^64
        &[0x60, 0x01, 0x1C],                   // PUSH1 1, SHR
        &[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3],
    ]);
    let report = run_code(&code, 100_000);
    assert_eq!(U256::from_big_endian(&report.output), U256::one() << 63);

    // SAR(1, 2^255): the sign bit smears into the top two bits.
    let mut push32 = vec![0x7F];
    let mut word = [0u8; 32];
    word[0] = 0x80;
    push32.extend_from_slice(&word);
    let code = assemble(&[
        &push32,
        &[0x60, 0x01, 0x1D], // PUSH1 1, SAR
        &[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3],
    ]);
    let report = run_code(&code, 100_000);
    assert_eq!(report.output[0], 0xC0);
    assert!(report.output[1..].iter().all(|&b| b == 0));
}

#[test]
fn stack_limit_allows_pop_but_not_push() {
    // 1024 pushes fill the stack exactly.
    let mut code = Vec::new();
    for _ in 0..1024 {
        code.extend_from_slice(&[0x60, 0x01]);
    }
    code.push(0x00);
    let report = run_code(&code, 100_000);
    assert_eq!(report.result, TxResult::Success);

    // One more push overflows.
    let mut overflowing = Vec::new();
    for _ in 0..1025 {
        overflowing.extend_from_slice(&[0x60, 0x01]);
    }
    let report = run_code(&overflowing, 100_000);
    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::StackOverflow));

    // POP at the limit is fine.
    let mut popping = Vec::new();
    for _ in 0..1024 {
        popping.extend_from_slice(&[0x60, 0x01]);
    }
    popping.push(0x50);
    popping.extend_from_slice(&[0x60, 0x01, 0x00]);
    let report = run_code(&popping, 100_000);
    assert_eq!(report.result, TxResult::Success);
}

#[test]
fn returndatacopy_past_buffer_end_fails() {
    // PUSH1 1 (len), PUSH1 0 (offset), PUSH1 0 (dest), RETURNDATACOPY,
    // with an empty return buffer.
    let code = [0x60, 0x01, 0x60, 0x00, 0x60, 0x00, 0x3E];
    let report = run_code(&code, 100_000);
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::InvalidMemoryAccess)
    );
}

#[test]
fn mstore_mload_roundtrip() {
    // MSTORE(64, 0x1122) then MLOAD(64) and return it.
    let code = assemble(&[
        &[0x61, 0x11, 0x22, 0x60, 0x40, 0x52], // PUSH2, PUSH1 64, MSTORE
        &[0x60, 0x40, 0x51],                   // MLOAD(64)
        &[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3],
    ]);
    let report = run_code(&code, 100_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(U256::from_big_endian(&report.output), U256::from(0x1122));
}

#[test]
fn sstore_sload_roundtrip_in_one_frame() {
    let code = assemble(&[
        &[0x60, 0x05, 0x60, 0x07, 0x55], // SSTORE(7, 5)
        &[0x60, 0x07, 0x54],             // SLOAD(7)
        &[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3],
    ]);
    let report = run_code(&code, 100_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(U256::from_big_endian(&report.output), U256::from(5));
}

#[test]
fn reverted_subcall_rolls_back_storage() {
    let callee = Address::from_low_u64_be(0xC1);
    // Callee: SSTORE(0, 9) then REVERT(0, 0).
    let callee_code = vec![0x60, 0x09, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0xFD];

    // Caller: CALL(gas, callee, 0, 0, 0, 0, 0), then return the flag.
    let mut caller_code = vec![
        0x60, 0x00, // retLen
        0x60, 0x00, // retOff
        0x60, 0x00, // argsLen
        0x60, 0x00, // argsOff
        0x60, 0x00, // value
        0x73, // PUSH20 callee
    ];
    caller_code.extend_from_slice(callee.as_bytes());
    caller_code.extend_from_slice(&[0x5A, 0xF1]); // GAS, CALL
    caller_code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3]);

    let mut host = MockHost::default().with_account(
        callee,
        Account {
            code: callee_code,
            ..Account::default()
        },
    );
    let report = run_code_with_host(&caller_code, 200_000, &mut host);

    assert_eq!(report.result, TxResult::Success);
    // The call pushed 0 because the callee reverted.
    assert_eq!(U256::from_big_endian(&report.output), U256::zero());
    // And the callee's write is gone.
    assert_eq!(host.storage_value(callee, U256::zero()), U256::zero());
}

#[test]
fn successful_subcall_output_lands_in_returndata() {
    let callee = Address::from_low_u64_be(0xC2);
    // Callee returns 32 bytes holding 0x2A.
    let callee_code = vec![
        0x60, 0x2A, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];

    // Caller calls, then RETURNDATACOPYs the word and returns it.
    let mut caller_code = vec![
        0x60, 0x20, // retLen
        0x60, 0x00, // retOff
        0x60, 0x00, // argsLen
        0x60, 0x00, // argsOff
        0x60, 0x00, // value
        0x73,
    ];
    caller_code.extend_from_slice(callee.as_bytes());
    caller_code.extend_from_slice(&[0x5A, 0xF1, 0x50]); // GAS, CALL, POP
    caller_code.extend_from_slice(&[
        0x60, 0x20, 0x60, 0x00, 0x60, 0x00, 0x3E, // RETURNDATACOPY(0, 0, 32)
        0x60, 0x20, 0x60, 0x00, 0xF3,
    ]);

    let mut host = MockHost::default().with_account(
        callee,
        Account {
            code: callee_code,
            ..Account::default()
        },
    );
    let report = run_code_with_host(&caller_code, 200_000, &mut host);

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(U256::from_big_endian(&report.output), U256::from(0x2A));
}

#[test]
fn call_depth_limit_caps_recursion() {
    // A contract that calls itself until the depth limit trips.
    let me = Address::from_low_u64_be(0xDD);
    let mut code = vec![
        0x60, 0x00, // retLen
        0x60, 0x00, // retOff
        0x60, 0x00, // argsLen
        0x60, 0x00, // argsOff
        0x60, 0x00, // value
        0x73,
    ];
    code.extend_from_slice(me.as_bytes());
    code.extend_from_slice(&[0x5A, 0xF1, 0x00]); // GAS, CALL, STOP

    // Deep recursion needs real stack; run it on a dedicated thread.
    let handle = std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(move || {
            let mut host = MockHost::default().with_account(
                me,
                Account {
                    code: code.clone(),
                    ..Account::default()
                },
            );
            let module = EvmModule::from_bytes(&code).unwrap();
            let message = Message::top_level(
                Address::from_low_u64_be(0xAA),
                me,
                U256::zero(),
                Bytes::new(),
                // The 63/64 rule eats gas geometrically; reaching depth
                // 1024 needs roughly (64/63)^1024 times the leaf cost.
                200_000_000_000,
            );
            let report = {
                let mut vm = Vm::new(&module, &mut host, message, Revision::Cancun).unwrap();
                vm.execute().unwrap()
            };
            (report, host.max_depth)
        })
        .unwrap();
    let (report, max_depth) = handle.join().unwrap();

    assert_eq!(report.result, TxResult::Success);
    // Depth 1023 is the deepest child; the next CALL fails fast with a
    // pushed zero and no host invocation.
    assert_eq!(max_depth, 1023);
}

#[test]
fn undefined_opcode_consumes_all_gas() {
    let code = [0x60, 0x01, 0x0C]; // 0x0C is unassigned
    let report = run_code(&code, 100_000);
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::UnsupportedOpcode)
    );
    assert_eq!(report.gas_left, 0);
    assert_eq!(report.gas_used, 100_000);
}

#[test]
fn invalid_opcode_consumes_all_gas() {
    let code = [0xFE];
    let report = run_code(&code, 100_000);
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::InvalidInstruction)
    );
    assert_eq!(report.gas_left, 0);
}

#[test]
fn running_off_the_code_end_stops_cleanly() {
    // A bare PUSH1 with its immediate truncated by the code end: the
    // padding provides the immediate and the STOP.
    let code = [0x60];
    let report = run_code(&code, 100_000);
    assert_eq!(report.result, TxResult::Success);
    assert!(report.output.is_empty());
}

#[test]
fn out_of_gas_zeroes_everything() {
    let code = [0x60, 0x03, 0x60, 0x04, 0x01, 0x00];
    let report = run_code(&code, 21_003);
    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::OutOfGas));
    assert_eq!(report.gas_left, 0);
    assert!(report.output.is_empty());
}

#[test]
fn transient_storage_roundtrip() {
    let code = assemble(&[
        &[0x60, 0x2A, 0x60, 0x01, 0x5D], // TSTORE(1, 42)
        &[0x60, 0x01, 0x5C],             // TLOAD(1)
        &[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3],
    ]);
    let report = run_code(&code, 100_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(U256::from_big_endian(&report.output), U256::from(42));
}

#[test]
fn logs_reach_the_host_in_program_order() {
    let code = assemble(&[
        &[0x60, 0x01, 0x60, 0x00, 0x53], // MSTORE8(0, 1)
        &[0x60, 0x01, 0x60, 0x00, 0xA0], // LOG0(0, 1)
        &[0x60, 0x07, 0x60, 0x01, 0x60, 0x00, 0xA1], // LOG1(0, 1) topic 7
        &[0x00],
    ]);
    let mut host = MockHost::default();
    let report = run_code_with_host(&code, 100_000, &mut host);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(host.logs.len(), 2);
    assert_eq!(host.logs[0].1, vec![1u8]);
    assert!(host.logs[0].2.is_empty());
    assert_eq!(host.logs[1].2.len(), 1);
    assert_eq!(host.logs[1].2[0].0[31], 7);
}

#[test]
fn static_call_blocks_writes() {
    let callee = Address::from_low_u64_be(0xC3);
    // Callee tries to SSTORE under STATICCALL.
    let callee_code = vec![0x60, 0x01, 0x60, 0x00, 0x55, 0x00];

    let mut caller_code = vec![
        0x60, 0x00, // retLen
        0x60, 0x00, // retOff
        0x60, 0x00, // argsLen
        0x60, 0x00, // argsOff
        0x73,
    ];
    caller_code.extend_from_slice(callee.as_bytes());
    caller_code.extend_from_slice(&[0x5A, 0xFA]); // GAS, STATICCALL
    caller_code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3]);

    let mut host = MockHost::default().with_account(
        callee,
        Account {
            code: callee_code,
            ..Account::default()
        },
    );
    let report = run_code_with_host(&caller_code, 200_000, &mut host);
    assert_eq!(report.result, TxResult::Success);
    // The callee faulted, so the call pushed 0.
    assert_eq!(U256::from_big_endian(&report.output), U256::zero());
    assert_eq!(host.storage_value(callee, U256::zero()), U256::zero());
}

#[test]
fn selfdestruct_pays_out_and_halts() {
    let beneficiary = Address::from_low_u64_be(0xEE);
    let mut code = vec![0x73]; // PUSH20 beneficiary
    code.extend_from_slice(beneficiary.as_bytes());
    code.push(0xFF); // SELFDESTRUCT

    let mut host = MockHost::default();
    host.accounts
        .entry(Address::from_low_u64_be(0xBB))
        .or_default()
        .balance = U256::from(1000);
    let report = run_code_with_host(&code, 100_000, &mut host);

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(
        host.selfdestructs,
        vec![(Address::from_low_u64_be(0xBB), beneficiary)]
    );
    // The mock host moves the balance synchronously.
    assert_eq!(
        host.accounts[&beneficiary].balance,
        U256::from(1000)
    );
}

#[test]
fn chainid_comes_from_the_tx_context() {
    // CHAINID, MSTORE(0), RETURN 32 bytes. The mock host's chain id is 1.
    let code = [0x46, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3];
    let report = run_code(&code, 100_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(U256::from_big_endian(&report.output), U256::one());
}

#[test]
fn create_installs_returned_code() {
    // Initcode: return one byte 0xFE as the deployed code.
    // MSTORE8(0, 0xFE), RETURN(0, 1)
    let initcode = [0x60, 0xFE, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xF3];

    // Caller: CODECOPY the initcode tail into memory, then CREATE.
    // Layout: [create section][initcode at offset init_off].
    let mut code = Vec::new();
    let init_len = initcode.len() as u8;
    // PUSH1 len, PUSH1 init_off, PUSH1 0, CODECOPY
    // init_off is patched after assembly.
    code.extend_from_slice(&[0x60, init_len, 0x60, 0x00, 0x60, 0x00, 0x39]);
    // CREATE(0, 0, len)
    code.extend_from_slice(&[0x60, init_len, 0x60, 0x00, 0x60, 0x00, 0xF0]);
    // Return the created address.
    code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3]);
    let init_off = code.len() as u8;
    code[3] = init_off;
    code.extend_from_slice(&initcode);

    let mut host = MockHost::default();
    host.accounts
        .entry(Address::from_low_u64_be(0xBB))
        .or_default();
    let report = run_code_with_host(&code, 500_000, &mut host);

    assert_eq!(report.result, TxResult::Success);
    let created = Address::from_slice(&report.output[12..]);
    assert_ne!(created, Address::zero());
    assert_eq!(host.accounts[&created].code, vec![0xFE]);
}
