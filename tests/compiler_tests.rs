//! MIR shape tests: compile small programs and assert what the frontend
//! emitted, since the backend that would execute it is out of scope.

use zevm::{
    compiler::{
        compile_module,
        mir::{BinOp, CmpOp, Inst, MirFunction, MirType, ShiftOp},
    },
    errors::CompileError,
    EvmModule,
};

fn compile(code: &[u8]) -> MirFunction {
    let module = EvmModule::from_bytes(code).unwrap();
    compile_module(&module).expect("test bytecode must compile")
}

fn count(func: &MirFunction, pred: impl Fn(&Inst) -> bool) -> usize {
    func.count_matching(pred)
}

fn call_names(func: &MirFunction) -> Vec<&'static str> {
    func.iter_insts()
        .filter_map(|data| match data.inst {
            Inst::FuncAddr { name, .. } => Some(name),
            _ => None,
        })
        .collect()
}

#[test]
fn add_lowers_to_inline_carry_chain() {
    // PUSH1 3, PUSH1 4, ADD, STOP
    let func = compile(&[0x60, 0x03, 0x60, 0x04, 0x01, 0x00]);

    // limb0 one add, limbs 1..3 two adds each.
    assert_eq!(
        count(&func, |i| matches!(i, Inst::Binary { op: BinOp::Add, .. })),
        7
    );
    assert_eq!(
        count(&func, |i| matches!(i, Inst::Cmp { op: CmpOp::Ult, .. })),
        7
    );
    // ADD itself makes no runtime call; only the STOP does.
    assert_eq!(call_names(&func), vec!["evm_stop"]);
}

#[test]
fn sub_lowers_to_inline_borrow_chain() {
    let func = compile(&[0x60, 0x03, 0x60, 0x04, 0x03, 0x00]);
    assert_eq!(
        count(&func, |i| matches!(i, Inst::Binary { op: BinOp::Sub, .. })),
        7
    );
}

#[test]
fn mul_lowers_to_a_runtime_call_with_marshalled_limbs() {
    // PUSH1 3, PUSH1 4, MUL, STOP
    let func = compile(&[0x60, 0x03, 0x60, 0x04, 0x02, 0x00]);

    assert!(call_names(&func).contains(&"evm_mul"));
    let mul_args = func
        .iter_insts()
        .find_map(|data| match &data.inst {
            Inst::Call {
                args,
                ret: MirType::U256,
                ..
            } => Some(args.len()),
            _ => None,
        })
        .unwrap();
    // Instance pointer plus four limbs per operand.
    assert_eq!(mul_args, 9);
    // Reassembly: trunc + three wide shifts + trunc each.
    assert_eq!(count(&func, |i| matches!(i, Inst::Trunc { .. })), 4);
    assert_eq!(count(&func, |i| matches!(i, Inst::ShrWide { .. })), 3);
}

#[test]
fn div_family_and_exp_are_runtime_calls() {
    // DIV, SDIV, MOD, SMOD, ADDMOD, MULMOD, EXP over pushed constants.
    let code = [
        0x60, 0x01, 0x60, 0x02, 0x04, // DIV
        0x60, 0x01, 0x05, // SDIV
        0x60, 0x01, 0x06, // MOD
        0x60, 0x01, 0x07, // SMOD
        0x60, 0x01, 0x60, 0x02, 0x08, // ADDMOD
        0x60, 0x01, 0x60, 0x02, 0x09, // MULMOD
        0x60, 0x01, 0x0A, // EXP
        0x00,
    ];
    let names = call_names(&compile(&code));
    for expected in [
        "evm_div",
        "evm_sdiv",
        "evm_rem",
        "evm_smod",
        "evm_addmod",
        "evm_mulmod",
        "evm_exp",
    ] {
        assert!(names.contains(&expected), "missing {expected}");
    }
}

#[test]
fn shifts_are_branch_free_select_chains() {
    // PUSH1 2, PUSH1 1, SHL, STOP
    let func = compile(&[0x60, 0x02, 0x60, 0x01, 0x1B, 0x00]);

    // Each output limb carries a displacement chain and the large-shift
    // override; no branching and no runtime call for the shift itself.
    assert!(count(&func, |i| matches!(i, Inst::Select { .. })) >= 16);
    assert_eq!(count(&func, |i| matches!(i, Inst::BrIf { .. })), 0);
    assert_eq!(call_names(&func), vec!["evm_stop"]);
    // The >= 256 test appears exactly once.
    assert_eq!(
        count(&func, |i| matches!(i, Inst::Cmp { op: CmpOp::Uge, .. })),
        1
    );
}

#[test]
fn sar_uses_signed_shifts_for_sign_fill() {
    let func = compile(&[0x60, 0x02, 0x60, 0x01, 0x1D, 0x00]);
    assert!(
        count(&func, |i| matches!(
            i,
            Inst::Shift {
                op: ShiftOp::Ashr,
                ..
            }
        )) >= 2
    );
}

#[test]
fn compares_walk_limbs_with_selects() {
    // PUSH1 1, PUSH1 2, SLT, STOP
    let func = compile(&[0x60, 0x01, 0x60, 0x02, 0x12, 0x00]);
    // The signed comparator touches only the top limb.
    assert_eq!(
        count(&func, |i| matches!(i, Inst::Cmp { op: CmpOp::Slt, .. })),
        1
    );
    assert_eq!(
        count(&func, |i| matches!(i, Inst::Cmp { op: CmpOp::Ult, .. })),
        3
    );
    assert_eq!(count(&func, |i| matches!(i, Inst::Select { .. })), 3);
}

#[test]
fn iszero_is_an_or_reduction() {
    let func = compile(&[0x60, 0x01, 0x15, 0x00]);
    assert_eq!(
        count(&func, |i| matches!(i, Inst::Binary { op: BinOp::Or, .. })),
        3
    );
    assert_eq!(
        count(&func, |i| matches!(i, Inst::Cmp { op: CmpOp::Eq, .. })),
        1
    );
}

#[test]
fn memory_and_storage_ops_are_runtime_calls() {
    // MSTORE(0, 1); SLOAD(0); KECCAK256(0, 32); STOP (popping in between).
    let code = [
        0x60, 0x01, 0x60, 0x00, 0x52, // MSTORE
        0x60, 0x00, 0x54, 0x50, // SLOAD, POP
        0x60, 0x20, 0x60, 0x00, 0x20, 0x50, // KECCAK256, POP
        0x00,
    ];
    let names = call_names(&compile(&code));
    assert!(names.contains(&"evm_mstore"));
    assert!(names.contains(&"evm_sload"));
    assert!(names.contains(&"evm_keccak256"));
}

#[test]
fn keccak_result_is_a_bytes32_reassembled_on_use() {
    // KECCAK256(0, 32) then ADD 1: the digest pointer must be split into
    // limbs through byte-swapped loads.
    let code = [
        0x60, 0x20, 0x60, 0x00, 0x20, // KECCAK256
        0x60, 0x01, 0x01, // PUSH1 1, ADD
        0x00,
    ];
    let func = compile(&code);
    assert_eq!(
        count(&func, |i| matches!(i, Inst::LoadWordBe { .. })),
        4
    );
}

#[test]
fn constant_u64_arguments_fold_at_compile_time() {
    // MLOAD with a constant offset: no normalisation select emitted.
    let func = compile(&[0x60, 0x40, 0x51, 0x50, 0x00]);
    assert_eq!(count(&func, |i| matches!(i, Inst::Select { .. })), 0);
}

#[test]
fn dynamic_u64_arguments_get_the_sentinel_select() {
    // The MLOAD offset is CALLDATASIZE + CALLDATASIZE, unknown at compile
    // time, so the normalisation chain appears.
    let func = compile(&[0x36, 0x36, 0x01, 0x51, 0x50, 0x00]);
    assert_eq!(count(&func, |i| matches!(i, Inst::Select { .. })), 1);
    assert!(func
        .iter_insts()
        .any(|data| matches!(data.inst, Inst::IConst { value: u64::MAX })));
}

#[test]
fn jumps_shape_basic_blocks() {
    // PUSH1 4, JUMP, STOP, JUMPDEST, STOP
    let func = compile(&[0x60, 0x04, 0x56, 0x00, 0x5B, 0x00]);
    assert!(count(&func, |i| matches!(i, Inst::Br { .. })) >= 1);
    // Entry, jump continuation, jumpdest block, post-STOP blocks.
    assert!(func.blocks.len() >= 3);
}

#[test]
fn jumpi_emits_a_conditional_branch_on_the_or_reduction() {
    // PUSH1 1 (cond), PUSH1 6 (dest), JUMPI, STOP, JUMPDEST, STOP
    let func = compile(&[0x60, 0x01, 0x60, 0x06, 0x57, 0x00, 0x5B, 0x00]);
    assert_eq!(count(&func, |i| matches!(i, Inst::BrIf { .. })), 1);
    assert!(count(&func, |i| matches!(i, Inst::Cmp { op: CmpOp::Ne, .. })) >= 1);
}

#[test]
fn stack_spills_across_control_flow_edges() {
    // A value pushed before a JUMPDEST must survive in variable slots.
    // PUSH1 7, JUMPDEST, PUSH1 1, ADD, STOP
    let func = compile(&[0x60, 0x07, 0x5B, 0x60, 0x01, 0x01, 0x00]);
    assert_eq!(count(&func, |i| matches!(i, Inst::WriteVar { .. })), 4);
    // The ADD after the edge reads the limbs back.
    assert_eq!(count(&func, |i| matches!(i, Inst::ReadVar { .. })), 4);
    assert_eq!(func.vars.len(), 4);
}

#[test]
fn return_lowers_to_runtime_call_plus_ret() {
    let func = compile(&[0x60, 0x20, 0x60, 0x00, 0xF3]);
    assert!(call_names(&func).contains(&"evm_set_return"));
    assert!(count(&func, |i| matches!(i, Inst::Ret)) >= 1);
}

#[test]
fn revert_and_selfdestruct_lower_to_runtime_calls() {
    let func = compile(&[0x60, 0x00, 0x60, 0x00, 0xFD]);
    assert!(call_names(&func).contains(&"evm_set_revert"));

    let func = compile(&[0x60, 0x01, 0xFF]);
    assert!(call_names(&func).contains(&"evm_selfdestruct"));
}

#[test]
fn environment_queries_are_runtime_calls() {
    let code = [
        0x30, 0x50, // ADDRESS, POP
        0x33, 0x50, // CALLER, POP
        0x3A, 0x50, // GASPRICE, POP
        0x43, 0x50, // NUMBER, POP
        0x5A, 0x50, // GAS, POP
        0x00,
    ];
    let names = call_names(&compile(&code));
    for expected in [
        "evm_address",
        "evm_caller",
        "evm_gasprice",
        "evm_number",
        "evm_gas",
    ] {
        assert!(names.contains(&expected), "missing {expected}");
    }
}

#[test]
fn the_call_family_does_not_compile() {
    // PUSH the seven CALL operands, then CALL.
    let mut code = Vec::new();
    for _ in 0..7 {
        code.extend_from_slice(&[0x60, 0x00]);
    }
    code.push(0xF1);
    let module = EvmModule::from_bytes(&code).unwrap();
    assert_eq!(
        compile_module(&module).unwrap_err(),
        CompileError::UnsupportedOpcode(0xF1)
    );

    let module = EvmModule::from_bytes(&[0x60, 0x00, 0x60, 0x00, 0xA0]).unwrap();
    assert_eq!(
        compile_module(&module).unwrap_err(),
        CompileError::UnsupportedOpcode(0xA0)
    );
}

#[test]
fn unassigned_bytes_do_not_compile() {
    let module = EvmModule::from_bytes(&[0x0C]).unwrap();
    assert_eq!(
        compile_module(&module).unwrap_err(),
        CompileError::UnsupportedOpcode(0x0C)
    );
}

#[test]
fn compile_stack_underflow_is_reported() {
    let module = EvmModule::from_bytes(&[0x01]).unwrap();
    assert_eq!(
        compile_module(&module).unwrap_err(),
        CompileError::StackUnderflow
    );
}

#[test]
fn push_at_code_end_reads_padding_zeros() {
    // A PUSH32 with no immediate bytes in the code proper.
    let func = compile(&[0x7F]);
    // The constant never even materialises: nothing used it.
    assert_eq!(count(&func, |i| matches!(i, Inst::Call { .. })), 1);
    assert!(call_names(&func).contains(&"evm_stop"));
}

#[test]
fn dup_and_swap_are_pure_bookkeeping() {
    // PUSH1 1, PUSH1 2, DUP2, SWAP1, ADD, ADD, STOP
    let func = compile(&[0x60, 0x01, 0x60, 0x02, 0x81, 0x90, 0x01, 0x01, 0x00]);
    // Only the two ADD chains and the trailing stop reach the MIR.
    assert_eq!(call_names(&func), vec!["evm_stop"]);
    assert_eq!(
        count(&func, |i| matches!(i, Inst::Binary { op: BinOp::Add, .. })),
        14
    );
}

#[test]
fn compile_errors_render_the_offending_byte() {
    let err = CompileError::UnsupportedOpcode(0xF1);
    assert_eq!(err.to_string(), "Unsupported opcode 0xf1");
}
