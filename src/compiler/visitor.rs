//! Linear bytecode decoding into MIR.
//!
//! A single pass over the module's code, with an operand stack shadowing
//! the EVM stack at compile time. PUSH, DUP, SWAP and POP are pure stack
//! bookkeeping; arithmetic, bitwise, shift and comparison opcodes call the
//! inline lowerings; memory, storage and environment opcodes become
//! runtime calls. JUMP, JUMPI and JUMPDEST shape basic blocks, with the
//! operand stack spilled to variable slots across every edge. The call and
//! logging families are not compiled.

use crate::{
    bytecode::EvmModule,
    compiler::{
        builder::{
            ArithOp, BitwiseOp, ComparePred, MirBuilder, RuntimeArg, RuntimeFn, RuntimeRet,
            ShiftKind,
        },
        mir::MirFunction,
        operand::Operand,
    },
    errors::CompileError,
    opcodes::Opcode,
};
use tracing::debug;

/// Compiles a module's bytecode into a single MIR function taking the
/// instance pointer as its only parameter.
pub fn compile_module(module: &EvmModule) -> Result<MirFunction, CompileError> {
    debug!(code_size = module.code_size(), "compiling EVM module");
    let mut func = MirFunction::new();
    let builder = MirBuilder::new(&mut func);
    BytecodeVisitor::new(builder, module).decode()?;
    Ok(func)
}

/// The compile-time operand stack.
#[derive(Default)]
struct EvalStack {
    stack: Vec<Operand>,
}

impl EvalStack {
    fn push(&mut self, operand: Operand) {
        self.stack.push(operand);
    }

    fn pop(&mut self) -> Result<Operand, CompileError> {
        self.stack.pop().ok_or(CompileError::StackUnderflow)
    }

    fn peek(&self, index: usize) -> Result<Operand, CompileError> {
        if index >= self.stack.len() {
            return Err(CompileError::StackUnderflow);
        }
        Ok(self.stack[self.stack.len() - 1 - index].clone())
    }

    fn swap(&mut self, index: usize) -> Result<(), CompileError> {
        if index >= self.stack.len() {
            return Err(CompileError::StackUnderflow);
        }
        let top = self.stack.len() - 1;
        self.stack.swap(top, top - index);
        Ok(())
    }
}

struct BytecodeVisitor<'m, 'f> {
    builder: MirBuilder<'f>,
    module: &'m EvmModule,
    stack: EvalStack,
    pc: usize,
}

impl<'m, 'f> BytecodeVisitor<'m, 'f> {
    fn new(builder: MirBuilder<'f>, module: &'m EvmModule) -> Self {
        Self {
            builder,
            module,
            stack: EvalStack::default(),
            pc: 0,
        }
    }

    fn decode(mut self) -> Result<(), CompileError> {
        // Iterate the unpadded code; immediates may reach into the STOP
        // padding, which reads as zeros.
        while self.pc < self.module.code_size() {
            let byte = self.module.code().get(self.pc).copied().unwrap_or(0);
            let opcode_pc = self.pc;
            self.pc += 1;

            let opcode = Opcode::from(byte);
            // The lookup table folds every unassigned byte onto INVALID;
            // those must fail translation instead.
            if u8::from(opcode) != byte {
                return Err(CompileError::UnsupportedOpcode(byte));
            }

            match opcode {
                Opcode::STOP => {
                    self.builder
                        .emit_runtime_call(RuntimeFn::Stop, &[], RuntimeRet::Void);
                    self.builder.emit_ret();
                }

                // ==================== Inline arithmetic ====================
                Opcode::ADD => self.binary_arithmetic(ArithOp::Add)?,
                Opcode::SUB => self.binary_arithmetic(ArithOp::Sub)?,
                Opcode::AND => self.bitwise(BitwiseOp::And)?,
                Opcode::OR => self.bitwise(BitwiseOp::Or)?,
                Opcode::XOR => self.bitwise(BitwiseOp::Xor)?,
                Opcode::NOT => {
                    let operand = self.stack.pop()?;
                    let result = self.builder.handle_not(&operand)?;
                    self.stack.push(result);
                }
                Opcode::SHL => self.shift(ShiftKind::Shl)?,
                Opcode::SHR => self.shift(ShiftKind::Shr)?,
                Opcode::SAR => self.shift(ShiftKind::Sar)?,

                // ==================== Inline comparison ====================
                Opcode::LT => self.compare(ComparePred::Lt)?,
                Opcode::GT => self.compare(ComparePred::Gt)?,
                Opcode::SLT => self.compare(ComparePred::Slt)?,
                Opcode::SGT => self.compare(ComparePred::Sgt)?,
                Opcode::EQ => self.compare(ComparePred::Eq)?,
                Opcode::ISZERO => {
                    let operand = self.stack.pop()?;
                    let result = self
                        .builder
                        .handle_compare(ComparePred::IsZero, &operand, None)?;
                    self.stack.push(result);
                }

                // ==================== Runtime-call arithmetic ====================
                Opcode::MUL => self.runtime_binary(RuntimeFn::Mul)?,
                Opcode::DIV => self.runtime_binary(RuntimeFn::Div)?,
                Opcode::SDIV => self.runtime_binary(RuntimeFn::SDiv)?,
                Opcode::MOD => self.runtime_binary(RuntimeFn::Rem)?,
                Opcode::SMOD => self.runtime_binary(RuntimeFn::SMod)?,
                Opcode::EXP => self.runtime_binary(RuntimeFn::Exp)?,
                Opcode::BYTE => self.runtime_binary(RuntimeFn::Byte)?,
                Opcode::SIGNEXTEND => self.runtime_binary(RuntimeFn::SignExtend)?,
                Opcode::ADDMOD => self.runtime_ternary(RuntimeFn::AddMod)?,
                Opcode::MULMOD => self.runtime_ternary(RuntimeFn::MulMod)?,

                // ==================== Crypto ====================
                Opcode::KECCAK256 => {
                    let offset = self.stack.pop()?;
                    let len = self.stack.pop()?;
                    let result = self.builder.emit_runtime_call(
                        RuntimeFn::Keccak256,
                        &[RuntimeArg::U64(&offset), RuntimeArg::U64(&len)],
                        RuntimeRet::Bytes32,
                    );
                    self.stack.push(result);
                }

                // ==================== Environment ====================
                Opcode::ADDRESS => self.runtime_env(RuntimeFn::Address, RuntimeRet::Bytes32),
                Opcode::ORIGIN => self.runtime_env(RuntimeFn::Origin, RuntimeRet::Bytes32),
                Opcode::CALLER => self.runtime_env(RuntimeFn::Caller, RuntimeRet::Bytes32),
                Opcode::CALLVALUE => self.runtime_env(RuntimeFn::CallValue, RuntimeRet::Bytes32),
                Opcode::CALLDATASIZE => self.runtime_env(RuntimeFn::CallDataSize, RuntimeRet::U64),
                Opcode::CODESIZE => self.runtime_env(RuntimeFn::CodeSize, RuntimeRet::U64),
                Opcode::GASPRICE => self.runtime_env(RuntimeFn::GasPrice, RuntimeRet::U256),
                Opcode::RETURNDATASIZE => {
                    self.runtime_env(RuntimeFn::ReturnDataSize, RuntimeRet::U64)
                }
                Opcode::COINBASE => self.runtime_env(RuntimeFn::Coinbase, RuntimeRet::Bytes32),
                Opcode::TIMESTAMP => self.runtime_env(RuntimeFn::Timestamp, RuntimeRet::U256),
                Opcode::NUMBER => self.runtime_env(RuntimeFn::Number, RuntimeRet::U256),
                Opcode::PREVRANDAO => self.runtime_env(RuntimeFn::PrevRandao, RuntimeRet::Bytes32),
                Opcode::GASLIMIT => self.runtime_env(RuntimeFn::GasLimit, RuntimeRet::U256),
                Opcode::CHAINID => self.runtime_env(RuntimeFn::ChainId, RuntimeRet::U256),
                Opcode::SELFBALANCE => self.runtime_env(RuntimeFn::SelfBalance, RuntimeRet::U256),
                Opcode::BASEFEE => self.runtime_env(RuntimeFn::BaseFee, RuntimeRet::U256),
                Opcode::BLOBBASEFEE => self.runtime_env(RuntimeFn::BlobBaseFee, RuntimeRet::U256),
                Opcode::MSIZE => self.runtime_env(RuntimeFn::MSize, RuntimeRet::U64),
                Opcode::GAS => self.runtime_env(RuntimeFn::Gas, RuntimeRet::U64),

                Opcode::CALLDATALOAD => {
                    let offset = self.stack.pop()?;
                    let result = self.builder.emit_runtime_call(
                        RuntimeFn::CallDataLoad,
                        &[RuntimeArg::U64(&offset)],
                        RuntimeRet::Bytes32,
                    );
                    self.stack.push(result);
                }
                Opcode::BALANCE => {
                    let address = self.stack.pop()?;
                    let result = self.builder.emit_runtime_call(
                        RuntimeFn::Balance,
                        &[RuntimeArg::U256(&address)],
                        RuntimeRet::U256,
                    );
                    self.stack.push(result);
                }
                Opcode::EXTCODESIZE => {
                    let address = self.stack.pop()?;
                    let result = self.builder.emit_runtime_call(
                        RuntimeFn::ExtCodeSize,
                        &[RuntimeArg::U256(&address)],
                        RuntimeRet::U64,
                    );
                    self.stack.push(result);
                }
                Opcode::EXTCODEHASH => {
                    let address = self.stack.pop()?;
                    let result = self.builder.emit_runtime_call(
                        RuntimeFn::ExtCodeHash,
                        &[RuntimeArg::U256(&address)],
                        RuntimeRet::Bytes32,
                    );
                    self.stack.push(result);
                }
                Opcode::BLOCKHASH => {
                    let number = self.stack.pop()?;
                    let result = self.builder.emit_runtime_call(
                        RuntimeFn::BlockHash,
                        &[RuntimeArg::U64(&number)],
                        RuntimeRet::Bytes32,
                    );
                    self.stack.push(result);
                }
                Opcode::BLOBHASH => {
                    let index = self.stack.pop()?;
                    let result = self.builder.emit_runtime_call(
                        RuntimeFn::BlobHash,
                        &[RuntimeArg::U64(&index)],
                        RuntimeRet::Bytes32,
                    );
                    self.stack.push(result);
                }

                // ==================== Copies ====================
                Opcode::CALLDATACOPY => self.runtime_copy(RuntimeFn::CallDataCopy)?,
                Opcode::CODECOPY => self.runtime_copy(RuntimeFn::CodeCopy)?,
                Opcode::RETURNDATACOPY => self.runtime_copy(RuntimeFn::ReturnDataCopy)?,
                Opcode::EXTCODECOPY => {
                    let address = self.stack.pop()?;
                    let dest = self.stack.pop()?;
                    let offset = self.stack.pop()?;
                    let size = self.stack.pop()?;
                    self.builder.emit_runtime_call(
                        RuntimeFn::ExtCodeCopy,
                        &[
                            RuntimeArg::U256(&address),
                            RuntimeArg::U64(&dest),
                            RuntimeArg::U64(&offset),
                            RuntimeArg::U64(&size),
                        ],
                        RuntimeRet::Void,
                    );
                }

                // ==================== Memory ====================
                Opcode::MLOAD => {
                    let offset = self.stack.pop()?;
                    let result = self.builder.emit_runtime_call(
                        RuntimeFn::MLoad,
                        &[RuntimeArg::U64(&offset)],
                        RuntimeRet::U256,
                    );
                    self.stack.push(result);
                }
                Opcode::MSTORE => {
                    let offset = self.stack.pop()?;
                    let value = self.stack.pop()?;
                    self.builder.emit_runtime_call(
                        RuntimeFn::MStore,
                        &[RuntimeArg::U64(&offset), RuntimeArg::U256(&value)],
                        RuntimeRet::Void,
                    );
                }
                Opcode::MSTORE8 => {
                    let offset = self.stack.pop()?;
                    let value = self.stack.pop()?;
                    self.builder.emit_runtime_call(
                        RuntimeFn::MStore8,
                        &[RuntimeArg::U64(&offset), RuntimeArg::U256(&value)],
                        RuntimeRet::Void,
                    );
                }
                Opcode::MCOPY => self.runtime_copy(RuntimeFn::MCopy)?,

                // ==================== Storage ====================
                Opcode::SLOAD => {
                    let key = self.stack.pop()?;
                    let result = self.builder.emit_runtime_call(
                        RuntimeFn::SLoad,
                        &[RuntimeArg::U256(&key)],
                        RuntimeRet::U256,
                    );
                    self.stack.push(result);
                }
                Opcode::SSTORE => {
                    let key = self.stack.pop()?;
                    let value = self.stack.pop()?;
                    self.builder.emit_runtime_call(
                        RuntimeFn::SStore,
                        &[RuntimeArg::U256(&key), RuntimeArg::U256(&value)],
                        RuntimeRet::Void,
                    );
                }
                Opcode::TLOAD => {
                    let key = self.stack.pop()?;
                    let result = self.builder.emit_runtime_call(
                        RuntimeFn::TLoad,
                        &[RuntimeArg::U256(&key)],
                        RuntimeRet::U256,
                    );
                    self.stack.push(result);
                }
                Opcode::TSTORE => {
                    let key = self.stack.pop()?;
                    let value = self.stack.pop()?;
                    self.builder.emit_runtime_call(
                        RuntimeFn::TStore,
                        &[RuntimeArg::U256(&key), RuntimeArg::U256(&value)],
                        RuntimeRet::Void,
                    );
                }

                // ==================== Stack bookkeeping ====================
                Opcode::POP => {
                    self.stack.pop()?;
                }
                Opcode::PUSH0 => {
                    let result = self.builder.handle_push(&[]);
                    self.stack.push(result);
                }
                opcode @ Opcode::PUSH1
                | opcode @ Opcode::PUSH2
                | opcode @ Opcode::PUSH3
                | opcode @ Opcode::PUSH4
                | opcode @ Opcode::PUSH5
                | opcode @ Opcode::PUSH6
                | opcode @ Opcode::PUSH7
                | opcode @ Opcode::PUSH8
                | opcode @ Opcode::PUSH9
                | opcode @ Opcode::PUSH10
                | opcode @ Opcode::PUSH11
                | opcode @ Opcode::PUSH12
                | opcode @ Opcode::PUSH13
                | opcode @ Opcode::PUSH14
                | opcode @ Opcode::PUSH15
                | opcode @ Opcode::PUSH16
                | opcode @ Opcode::PUSH17
                | opcode @ Opcode::PUSH18
                | opcode @ Opcode::PUSH19
                | opcode @ Opcode::PUSH20
                | opcode @ Opcode::PUSH21
                | opcode @ Opcode::PUSH22
                | opcode @ Opcode::PUSH23
                | opcode @ Opcode::PUSH24
                | opcode @ Opcode::PUSH25
                | opcode @ Opcode::PUSH26
                | opcode @ Opcode::PUSH27
                | opcode @ Opcode::PUSH28
                | opcode @ Opcode::PUSH29
                | opcode @ Opcode::PUSH30
                | opcode @ Opcode::PUSH31
                | opcode @ Opcode::PUSH32 => {
                    let num_bytes = usize::from(u8::from(opcode)) - usize::from(u8::from(Opcode::PUSH0));
                    // Immediates come from the padded buffer, so a PUSH at
                    // the very end of the code reads zeros.
                    let data = self
                        .module
                        .code()
                        .get(self.pc..self.pc + num_bytes)
                        .unwrap_or_default();
                    let result = self.builder.handle_push(data);
                    self.stack.push(result);
                    self.pc += num_bytes;
                }
                Opcode::DUP1
                | Opcode::DUP2
                | Opcode::DUP3
                | Opcode::DUP4
                | Opcode::DUP5
                | Opcode::DUP6
                | Opcode::DUP7
                | Opcode::DUP8
                | Opcode::DUP9
                | Opcode::DUP10
                | Opcode::DUP11
                | Opcode::DUP12
                | Opcode::DUP13
                | Opcode::DUP14
                | Opcode::DUP15
                | Opcode::DUP16 => {
                    let depth = usize::from(byte - u8::from(Opcode::DUP1));
                    let value = self.stack.peek(depth)?;
                    self.stack.push(value);
                }
                Opcode::SWAP1
                | Opcode::SWAP2
                | Opcode::SWAP3
                | Opcode::SWAP4
                | Opcode::SWAP5
                | Opcode::SWAP6
                | Opcode::SWAP7
                | Opcode::SWAP8
                | Opcode::SWAP9
                | Opcode::SWAP10
                | Opcode::SWAP11
                | Opcode::SWAP12
                | Opcode::SWAP13
                | Opcode::SWAP14
                | Opcode::SWAP15
                | Opcode::SWAP16 => {
                    let depth = usize::from(byte - u8::from(Opcode::SWAP1)) + 1;
                    self.stack.swap(depth)?;
                }

                // ==================== Control flow ====================
                Opcode::JUMP => {
                    // The destination operand only shapes the block graph;
                    // the backend resolves the actual target.
                    self.stack.pop()?;
                    self.spill_stack()?;
                    self.builder.handle_jump();
                }
                Opcode::JUMPI => {
                    let _dest = self.stack.pop()?;
                    let cond = self.stack.pop()?;
                    self.spill_stack()?;
                    self.builder.handle_jumpi(&cond)?;
                }
                Opcode::JUMPDEST => {
                    self.spill_stack()?;
                    self.builder.handle_jumpdest();
                }
                Opcode::PC => {
                    let result = self.builder.handle_pc(opcode_pc as u64);
                    self.stack.push(result);
                }

                // ==================== Termination ====================
                Opcode::RETURN => {
                    let offset = self.stack.pop()?;
                    let len = self.stack.pop()?;
                    self.builder.emit_runtime_call(
                        RuntimeFn::SetReturn,
                        &[RuntimeArg::U64(&offset), RuntimeArg::U64(&len)],
                        RuntimeRet::Void,
                    );
                    self.builder.emit_ret();
                }
                Opcode::REVERT => {
                    let offset = self.stack.pop()?;
                    let len = self.stack.pop()?;
                    self.builder.emit_runtime_call(
                        RuntimeFn::SetRevert,
                        &[RuntimeArg::U64(&offset), RuntimeArg::U64(&len)],
                        RuntimeRet::Void,
                    );
                    self.builder.emit_ret();
                }
                Opcode::INVALID => {
                    self.builder
                        .emit_runtime_call(RuntimeFn::Invalid, &[], RuntimeRet::Void);
                    self.builder.emit_ret();
                }
                Opcode::SELFDESTRUCT => {
                    let beneficiary = self.stack.pop()?;
                    self.builder.emit_runtime_call(
                        RuntimeFn::SelfDestruct,
                        &[RuntimeArg::U256(&beneficiary)],
                        RuntimeRet::Void,
                    );
                    self.builder.emit_ret();
                }

                // The call and logging families stay interpreter-only.
                Opcode::LOG0
                | Opcode::LOG1
                | Opcode::LOG2
                | Opcode::LOG3
                | Opcode::LOG4
                | Opcode::CREATE
                | Opcode::CREATE2
                | Opcode::CALL
                | Opcode::CALLCODE
                | Opcode::DELEGATECALL
                | Opcode::STATICCALL => {
                    return Err(CompileError::UnsupportedOpcode(byte));
                }
            }
        }

        self.builder.finalize();
        Ok(())
    }

    fn binary_arithmetic(&mut self, op: ArithOp) -> Result<(), CompileError> {
        let lhs = self.stack.pop()?;
        let rhs = self.stack.pop()?;
        let result = self.builder.handle_binary_arithmetic(op, &lhs, &rhs)?;
        self.stack.push(result);
        Ok(())
    }

    fn bitwise(&mut self, op: BitwiseOp) -> Result<(), CompileError> {
        let lhs = self.stack.pop()?;
        let rhs = self.stack.pop()?;
        let result = self.builder.handle_bitwise(op, &lhs, &rhs)?;
        self.stack.push(result);
        Ok(())
    }

    fn shift(&mut self, kind: ShiftKind) -> Result<(), CompileError> {
        let shift = self.stack.pop()?;
        let value = self.stack.pop()?;
        let result = self.builder.handle_shift(kind, &shift, &value)?;
        self.stack.push(result);
        Ok(())
    }

    fn compare(&mut self, pred: ComparePred) -> Result<(), CompileError> {
        let lhs = self.stack.pop()?;
        let rhs = self.stack.pop()?;
        let result = self.builder.handle_compare(pred, &lhs, Some(&rhs))?;
        self.stack.push(result);
        Ok(())
    }

    /// A two-operand opcode lowered to a u256 runtime call.
    fn runtime_binary(&mut self, func: RuntimeFn) -> Result<(), CompileError> {
        let lhs = self.stack.pop()?;
        let rhs = self.stack.pop()?;
        let result = self.builder.emit_runtime_call(
            func,
            &[RuntimeArg::U256(&lhs), RuntimeArg::U256(&rhs)],
            RuntimeRet::U256,
        );
        self.stack.push(result);
        Ok(())
    }

    fn runtime_ternary(&mut self, func: RuntimeFn) -> Result<(), CompileError> {
        let a = self.stack.pop()?;
        let b = self.stack.pop()?;
        let c = self.stack.pop()?;
        let result = self.builder.emit_runtime_call(
            func,
            &[
                RuntimeArg::U256(&a),
                RuntimeArg::U256(&b),
                RuntimeArg::U256(&c),
            ],
            RuntimeRet::U256,
        );
        self.stack.push(result);
        Ok(())
    }

    /// A no-operand environment query.
    fn runtime_env(&mut self, func: RuntimeFn, ret: RuntimeRet) {
        let result = self.builder.emit_runtime_call(func, &[], ret);
        self.stack.push(result);
    }

    /// A (dest, offset, size) copy opcode.
    fn runtime_copy(&mut self, func: RuntimeFn) -> Result<(), CompileError> {
        let dest = self.stack.pop()?;
        let offset = self.stack.pop()?;
        let size = self.stack.pop()?;
        self.builder.emit_runtime_call(
            func,
            &[
                RuntimeArg::U64(&dest),
                RuntimeArg::U64(&offset),
                RuntimeArg::U64(&size),
            ],
            RuntimeRet::Void,
        );
        Ok(())
    }

    /// Materialises every live stack slot into variable tuples so the
    /// values survive the upcoming control-flow edge.
    fn spill_stack(&mut self) -> Result<(), CompileError> {
        for i in 0..self.stack.stack.len() {
            let operand = self.stack.stack[i].clone();
            self.stack.stack[i] = self.builder.spill_operand(operand)?;
        }
        Ok(())
    }
}
