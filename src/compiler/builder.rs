//! Lowering of EVM operations onto the MIR.
//!
//! 256-bit values travel as four i64 limbs. Addition and subtraction
//! propagate carries limb by limb; shifts are branch-free select chains
//! over the limb displacement; comparisons walk limbs high to low. The
//! heavy opcodes marshal their operands into a call to the runtime
//! function table and reassemble the result.

use crate::{
    compiler::{
        mir::{BinOp, BlockId, CmpOp, Inst, MirFunction, MirType, ShiftOp, ValueId},
        operand::{EvmType, Operand},
    },
    errors::CompileError,
    runtime::imported::runtime_function_table,
};
use ethereum_types::U256;
use smallvec::SmallVec;

/// Inline-lowered two-operand arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
}

/// Inline-lowered limb-wise bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
}

/// Inline-lowered shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    Shl,
    Shr,
    Sar,
}

/// Inline-lowered comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparePred {
    Lt,
    Gt,
    Slt,
    Sgt,
    Eq,
    IsZero,
}

/// A function in the runtime table, named for dumps and resolved to its
/// absolute address at lowering time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFn {
    Mul,
    Div,
    SDiv,
    Rem,
    SMod,
    AddMod,
    MulMod,
    Exp,
    Byte,
    SignExtend,
    Address,
    Origin,
    Caller,
    CallValue,
    CallDataLoad,
    CallDataSize,
    CodeSize,
    CodeCopy,
    CallDataCopy,
    GasPrice,
    Balance,
    ExtCodeSize,
    ExtCodeHash,
    ExtCodeCopy,
    ReturnDataSize,
    ReturnDataCopy,
    Gas,
    BlockHash,
    Coinbase,
    Timestamp,
    Number,
    PrevRandao,
    GasLimit,
    ChainId,
    SelfBalance,
    BaseFee,
    BlobHash,
    BlobBaseFee,
    MSize,
    MLoad,
    MStore,
    MStore8,
    MCopy,
    SLoad,
    SStore,
    TLoad,
    TStore,
    Keccak256,
    SetReturn,
    SetRevert,
    Stop,
    Invalid,
    SelfDestruct,
}

impl RuntimeFn {
    pub fn name(self) -> &'static str {
        match self {
            RuntimeFn::Mul => "evm_mul",
            RuntimeFn::Div => "evm_div",
            RuntimeFn::SDiv => "evm_sdiv",
            RuntimeFn::Rem => "evm_rem",
            RuntimeFn::SMod => "evm_smod",
            RuntimeFn::AddMod => "evm_addmod",
            RuntimeFn::MulMod => "evm_mulmod",
            RuntimeFn::Exp => "evm_exp",
            RuntimeFn::Byte => "evm_byte",
            RuntimeFn::SignExtend => "evm_signextend",
            RuntimeFn::Address => "evm_address",
            RuntimeFn::Origin => "evm_origin",
            RuntimeFn::Caller => "evm_caller",
            RuntimeFn::CallValue => "evm_callvalue",
            RuntimeFn::CallDataLoad => "evm_calldataload",
            RuntimeFn::CallDataSize => "evm_calldatasize",
            RuntimeFn::CodeSize => "evm_codesize",
            RuntimeFn::CodeCopy => "evm_codecopy",
            RuntimeFn::CallDataCopy => "evm_calldatacopy",
            RuntimeFn::GasPrice => "evm_gasprice",
            RuntimeFn::Balance => "evm_balance",
            RuntimeFn::ExtCodeSize => "evm_extcodesize",
            RuntimeFn::ExtCodeHash => "evm_extcodehash",
            RuntimeFn::ExtCodeCopy => "evm_extcodecopy",
            RuntimeFn::ReturnDataSize => "evm_returndatasize",
            RuntimeFn::ReturnDataCopy => "evm_returndatacopy",
            RuntimeFn::Gas => "evm_gas",
            RuntimeFn::BlockHash => "evm_blockhash",
            RuntimeFn::Coinbase => "evm_coinbase",
            RuntimeFn::Timestamp => "evm_timestamp",
            RuntimeFn::Number => "evm_number",
            RuntimeFn::PrevRandao => "evm_prevrandao",
            RuntimeFn::GasLimit => "evm_gaslimit",
            RuntimeFn::ChainId => "evm_chainid",
            RuntimeFn::SelfBalance => "evm_selfbalance",
            RuntimeFn::BaseFee => "evm_basefee",
            RuntimeFn::BlobHash => "evm_blobhash",
            RuntimeFn::BlobBaseFee => "evm_blobbasefee",
            RuntimeFn::MSize => "evm_msize",
            RuntimeFn::MLoad => "evm_mload",
            RuntimeFn::MStore => "evm_mstore",
            RuntimeFn::MStore8 => "evm_mstore8",
            RuntimeFn::MCopy => "evm_mcopy",
            RuntimeFn::SLoad => "evm_sload",
            RuntimeFn::SStore => "evm_sstore",
            RuntimeFn::TLoad => "evm_tload",
            RuntimeFn::TStore => "evm_tstore",
            RuntimeFn::Keccak256 => "evm_keccak256",
            RuntimeFn::SetReturn => "evm_set_return",
            RuntimeFn::SetRevert => "evm_set_revert",
            RuntimeFn::Stop => "evm_stop",
            RuntimeFn::Invalid => "evm_invalid",
            RuntimeFn::SelfDestruct => "evm_selfdestruct",
        }
    }

    /// The absolute address compiled code will call through. The table is a
    /// single static, so these addresses are stable process-wide.
    #[expect(clippy::as_conversions, reason = "fn pointer to address")]
    pub fn address(self) -> u64 {
        let table = runtime_function_table();
        let addr = match self {
            RuntimeFn::Mul => table.mul as usize,
            RuntimeFn::Div => table.div as usize,
            RuntimeFn::SDiv => table.sdiv as usize,
            RuntimeFn::Rem => table.rem as usize,
            RuntimeFn::SMod => table.smod as usize,
            RuntimeFn::AddMod => table.addmod as usize,
            RuntimeFn::MulMod => table.mulmod as usize,
            RuntimeFn::Exp => table.exp as usize,
            RuntimeFn::Byte => table.byte as usize,
            RuntimeFn::SignExtend => table.signextend as usize,
            RuntimeFn::Address => table.address as usize,
            RuntimeFn::Origin => table.origin as usize,
            RuntimeFn::Caller => table.caller as usize,
            RuntimeFn::CallValue => table.callvalue as usize,
            RuntimeFn::CallDataLoad => table.calldataload as usize,
            RuntimeFn::CallDataSize => table.calldatasize as usize,
            RuntimeFn::CodeSize => table.codesize as usize,
            RuntimeFn::CodeCopy => table.codecopy as usize,
            RuntimeFn::CallDataCopy => table.calldatacopy as usize,
            RuntimeFn::GasPrice => table.gasprice as usize,
            RuntimeFn::Balance => table.balance as usize,
            RuntimeFn::ExtCodeSize => table.extcodesize as usize,
            RuntimeFn::ExtCodeHash => table.extcodehash as usize,
            RuntimeFn::ExtCodeCopy => table.extcodecopy as usize,
            RuntimeFn::ReturnDataSize => table.returndatasize as usize,
            RuntimeFn::ReturnDataCopy => table.returndatacopy as usize,
            RuntimeFn::Gas => table.gas as usize,
            RuntimeFn::BlockHash => table.blockhash as usize,
            RuntimeFn::Coinbase => table.coinbase as usize,
            RuntimeFn::Timestamp => table.timestamp as usize,
            RuntimeFn::Number => table.number as usize,
            RuntimeFn::PrevRandao => table.prevrandao as usize,
            RuntimeFn::GasLimit => table.gaslimit as usize,
            RuntimeFn::ChainId => table.chainid as usize,
            RuntimeFn::SelfBalance => table.selfbalance as usize,
            RuntimeFn::BaseFee => table.basefee as usize,
            RuntimeFn::BlobHash => table.blobhash as usize,
            RuntimeFn::BlobBaseFee => table.blobbasefee as usize,
            RuntimeFn::MSize => table.msize as usize,
            RuntimeFn::MLoad => table.mload as usize,
            RuntimeFn::MStore => table.mstore as usize,
            RuntimeFn::MStore8 => table.mstore8 as usize,
            RuntimeFn::MCopy => table.mcopy as usize,
            RuntimeFn::SLoad => table.sload as usize,
            RuntimeFn::SStore => table.sstore as usize,
            RuntimeFn::TLoad => table.tload as usize,
            RuntimeFn::TStore => table.tstore as usize,
            RuntimeFn::Keccak256 => table.keccak256 as usize,
            RuntimeFn::SetReturn => table.set_return as usize,
            RuntimeFn::SetRevert => table.set_revert as usize,
            RuntimeFn::Stop => table.stop as usize,
            RuntimeFn::Invalid => table.invalid as usize,
            RuntimeFn::SelfDestruct => table.selfdestruct as usize,
        };
        addr as u64
    }
}

/// How an operand is marshalled into a runtime-call argument.
pub enum RuntimeArg<'a> {
    /// Four i64 limbs, little-endian.
    U256(&'a Operand),
    /// limb0, normalised with the `UINT64_MAX` overflow sentinel.
    U64(&'a Operand),
}

/// The ABI return class of a runtime function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeRet {
    U256,
    U64,
    Bytes32,
    Void,
}

pub struct MirBuilder<'f> {
    func: &'f mut MirFunction,
    current_block: BlockId,
    /// The instance pointer, parameter 0 of every compiled function.
    instance: ValueId,
}

impl<'f> MirBuilder<'f> {
    pub fn new(func: &'f mut MirFunction) -> Self {
        let entry = func.create_block();
        let instance = func.emit(entry, Inst::Param { index: 0 }, MirType::I64);
        Self {
            func,
            current_block: entry,
            instance,
        }
    }

    /// Terminates the function: any fallthrough off the code end behaves
    /// like STOP.
    pub fn finalize(&mut self) {
        if !self.func.is_terminated(self.current_block) {
            self.emit_runtime_call(RuntimeFn::Stop, &[], RuntimeRet::Void);
            self.emit(Inst::Ret, MirType::Void);
        }
    }

    // ==================== Emission helpers ====================

    fn emit(&mut self, inst: Inst, ty: MirType) -> ValueId {
        self.func.emit(self.current_block, inst, ty)
    }

    fn iconst(&mut self, value: u64) -> ValueId {
        self.emit(Inst::IConst { value }, MirType::I64)
    }

    fn binary(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit(Inst::Binary { op, lhs, rhs }, MirType::I64)
    }

    fn cmp(&mut self, op: CmpOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit(Inst::Cmp { op, lhs, rhs }, MirType::I64)
    }

    fn shift_inst(&mut self, op: ShiftOp, value: ValueId, amount: ValueId) -> ValueId {
        self.emit(Inst::Shift { op, value, amount }, MirType::I64)
    }

    fn select(&mut self, cond: ValueId, then_value: ValueId, else_value: ValueId) -> ValueId {
        self.emit(
            Inst::Select {
                cond,
                then_value,
                else_value,
            },
            MirType::I64,
        )
    }

    // ==================== Operand access ====================

    /// Materialises an operand as four i64 limbs, little-endian. Constants
    /// become constant instructions here and not before.
    pub fn materialize_limbs(&mut self, operand: &Operand) -> Result<[ValueId; 4], CompileError> {
        match operand {
            Operand::Const(value) => {
                let limbs = value.0;
                Ok([
                    self.iconst(limbs[0]),
                    self.iconst(limbs[1]),
                    self.iconst(limbs[2]),
                    self.iconst(limbs[3]),
                ])
            }
            Operand::Limbs(limbs) => Ok(*limbs),
            Operand::VarLimbs(vars) => Ok([
                self.emit(Inst::ReadVar { var: vars[0] }, MirType::I64),
                self.emit(Inst::ReadVar { var: vars[1] }, MirType::I64),
                self.emit(Inst::ReadVar { var: vars[2] }, MirType::I64),
                self.emit(Inst::ReadVar { var: vars[3] }, MirType::I64),
            ]),
            Operand::Typed {
                value,
                ty: EvmType::Uint64,
            } => {
                let zero = self.iconst(0);
                Ok([*value, zero, zero, zero])
            }
            // A 32-byte big-endian blob: limb0 is the last word.
            Operand::Typed {
                value,
                ty: EvmType::Bytes32,
            } => {
                let ptr = *value;
                Ok([
                    self.emit(Inst::LoadWordBe { ptr, offset: 24 }, MirType::I64),
                    self.emit(Inst::LoadWordBe { ptr, offset: 16 }, MirType::I64),
                    self.emit(Inst::LoadWordBe { ptr, offset: 8 }, MirType::I64),
                    self.emit(Inst::LoadWordBe { ptr, offset: 0 }, MirType::I64),
                ])
            }
            _ => Err(CompileError::TypeMismatch),
        }
    }

    /// Spills an operand into variable slots so it survives a control-flow
    /// edge.
    pub fn spill_operand(&mut self, operand: Operand) -> Result<Operand, CompileError> {
        if matches!(operand, Operand::VarLimbs(_)) {
            return Ok(operand);
        }
        let limbs = self.materialize_limbs(&operand)?;
        let vars = [
            self.func.create_var(MirType::I64),
            self.func.create_var(MirType::I64),
            self.func.create_var(MirType::I64),
            self.func.create_var(MirType::I64),
        ];
        for (&var, limb) in vars.iter().zip(limbs) {
            self.emit(Inst::WriteVar { var, value: limb }, MirType::Void);
        }
        Ok(Operand::VarLimbs(vars))
    }

    // ==================== Stack instruction handlers ====================

    /// PUSHn: big-endian immediate bytes to a constant operand.
    pub fn handle_push(&mut self, data: &[u8]) -> Operand {
        Operand::Const(U256::from_big_endian(data))
    }

    /// PC: the instruction offset is a compile-time constant.
    pub fn handle_pc(&mut self, pc: u64) -> Operand {
        let value = self.iconst(pc);
        Operand::typed(value, EvmType::Uint64)
    }

    // ==================== Arithmetic lowering ====================

    /// ADD and SUB: four 64-bit steps with carry (or borrow) propagation.
    /// The carry out of the top limb is dropped, which is exactly the
    /// wrap-around the EVM wants.
    pub fn handle_binary_arithmetic(
        &mut self,
        op: ArithOp,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<Operand, CompileError> {
        let lhs = self.materialize_limbs(lhs)?;
        let rhs = self.materialize_limbs(rhs)?;

        let (bin_op, cmp_carry) = match op {
            ArithOp::Add => (BinOp::Add, CmpOp::Ult),
            ArithOp::Sub => (BinOp::Sub, CmpOp::Ult),
        };

        let mut result = [lhs[0]; 4];
        let mut carry: Option<ValueId> = None;
        for i in 0..4 {
            match op {
                ArithOp::Add => {
                    let sum = self.binary(bin_op, lhs[i], rhs[i]);
                    // carry1 = sum < lhs
                    let carry1 = self.cmp(cmp_carry, sum, lhs[i]);
                    let (sum, carry_out) = match carry {
                        None => (sum, carry1),
                        Some(carry_in) => {
                            let sum2 = self.binary(BinOp::Add, sum, carry_in);
                            let carry2 = self.cmp(CmpOp::Ult, sum2, sum);
                            (sum2, self.binary(BinOp::Or, carry1, carry2))
                        }
                    };
                    result[i] = sum;
                    carry = Some(carry_out);
                }
                ArithOp::Sub => {
                    let diff = self.binary(bin_op, lhs[i], rhs[i]);
                    // borrow1 = lhs < rhs
                    let borrow1 = self.cmp(cmp_carry, lhs[i], rhs[i]);
                    let (diff, borrow_out) = match carry {
                        None => (diff, borrow1),
                        Some(borrow_in) => {
                            let diff2 = self.binary(BinOp::Sub, diff, borrow_in);
                            let borrow2 = self.cmp(CmpOp::Ult, diff, borrow_in);
                            (diff2, self.binary(BinOp::Or, borrow1, borrow2))
                        }
                    };
                    result[i] = diff;
                    carry = Some(borrow_out);
                }
            }
        }

        Ok(Operand::Limbs(result))
    }

    /// AND, OR, XOR: four independent limb-wise operations.
    pub fn handle_bitwise(
        &mut self,
        op: BitwiseOp,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<Operand, CompileError> {
        let lhs = self.materialize_limbs(lhs)?;
        let rhs = self.materialize_limbs(rhs)?;
        let op = match op {
            BitwiseOp::And => BinOp::And,
            BitwiseOp::Or => BinOp::Or,
            BitwiseOp::Xor => BinOp::Xor,
        };
        let mut result = [lhs[0]; 4];
        for i in 0..4 {
            result[i] = self.binary(op, lhs[i], rhs[i]);
        }
        Ok(Operand::Limbs(result))
    }

    /// NOT: four limb-wise bitwise-nots.
    pub fn handle_not(&mut self, operand: &Operand) -> Result<Operand, CompileError> {
        let limbs = self.materialize_limbs(operand)?;
        let mut result = [limbs[0]; 4];
        for i in 0..4 {
            result[i] = self.emit(Inst::Not { value: limbs[i] }, MirType::I64);
        }
        Ok(Operand::Limbs(result))
    }

    // ==================== Shift lowering ====================

    /// SHL, SHR and SAR over a variable shift amount, entirely branch-free.
    ///
    /// The shift splits into an inter-limb displacement (`shift / 64`) and
    /// an intra-limb count (`shift mod 64`). Each output limb is a select
    /// chain over the displacement picking the shifted source limb,
    /// OR-combined with the carry bits of the adjacent limb. Amounts of 256
    /// or more are detected once and override the whole result.
    pub fn handle_shift(
        &mut self,
        kind: ShiftKind,
        shift: &Operand,
        value: &Operand,
    ) -> Result<Operand, CompileError> {
        let shift = self.materialize_limbs(shift)?;
        let value = self.materialize_limbs(value)?;

        let zero = self.iconst(0);

        // shift >= 256 iff any high limb is set or limb0 >= 256.
        let high_or = {
            let or01 = self.binary(BinOp::Or, shift[1], shift[2]);
            self.binary(BinOp::Or, or01, shift[3])
        };
        let high_nonzero = self.cmp(CmpOp::Ne, high_or, zero);
        let c256 = self.iconst(256);
        let low_large = self.cmp(CmpOp::Uge, shift[0], c256);
        let large_shift = self.binary(BinOp::Or, high_nonzero, low_large);

        let c63 = self.iconst(63);
        let c6 = self.iconst(6);
        let c3 = self.iconst(3);
        // Intra-limb bit count and inter-limb displacement.
        let sbits = self.binary(BinOp::And, shift[0], c63);
        let shifted6 = self.shift_inst(ShiftOp::Lshr, shift[0], c6);
        let disp = self.binary(BinOp::And, shifted6, c3);

        // The carry uses a shift by 64 - sbits, which is out of range when
        // sbits is 0; the select squashes that lane.
        let sbits_is_zero = self.cmp(CmpOp::Eq, sbits, zero);
        let c64 = self.iconst(64);
        let inv_sbits = self.binary(BinOp::Sub, c64, sbits);

        // For SAR every limb beyond the top is the sign word.
        let sign_word = match kind {
            ShiftKind::Sar => {
                let c63s = self.iconst(63);
                self.shift_inst(ShiftOp::Ashr, value[3], c63s)
            }
            _ => zero,
        };

        // Source limb at logical index i, where i is off the ends of the
        // word for some displacements.
        let src = |i: isize| -> Option<ValueId> {
            if (0..4).contains(&i) {
                Some(value[i as usize])
            } else {
                None
            }
        };

        let mut result = [zero; 4];
        for (j, slot) in result.iter_mut().enumerate() {
            let j = j as isize;
            let mut candidates = [zero; 4];
            for (k, candidate) in candidates.iter_mut().enumerate() {
                let k = k as isize;
                let (main_index, carry_index) = match kind {
                    // Limb j takes limb j-d shifted left, with low bits of
                    // limb j-d-1 carried in.
                    ShiftKind::Shl => (j - k, j - k - 1),
                    // Limb j takes limb j+d shifted right, with high bits of
                    // limb j+d+1 carried in.
                    ShiftKind::Shr | ShiftKind::Sar => (j + k, j + k + 1),
                };

                let main_src = match (kind, src(main_index)) {
                    (_, Some(limb)) => Some(limb),
                    (ShiftKind::Sar, None) if main_index > 3 => Some(sign_word),
                    _ => None,
                };
                let Some(main_src) = main_src else {
                    *candidate = match kind {
                        ShiftKind::Sar => sign_word,
                        _ => zero,
                    };
                    continue;
                };

                let main = match kind {
                    ShiftKind::Shl => self.shift_inst(ShiftOp::Shl, main_src, sbits),
                    ShiftKind::Shr => self.shift_inst(ShiftOp::Lshr, main_src, sbits),
                    // The top limb fills with sign bits as it shifts.
                    ShiftKind::Sar if main_index == 3 => {
                        self.shift_inst(ShiftOp::Ashr, main_src, sbits)
                    }
                    ShiftKind::Sar => self.shift_inst(ShiftOp::Lshr, main_src, sbits),
                };

                let carry_src = match (kind, src(carry_index)) {
                    (_, Some(limb)) => Some(limb),
                    (ShiftKind::Sar, None) if carry_index > 3 => Some(sign_word),
                    _ => None,
                };
                *candidate = match carry_src {
                    // SAR's top-limb shift already fills the vacated bits,
                    // so it takes no separate carry.
                    Some(_) if kind == ShiftKind::Sar && main_index == 3 => main,
                    Some(carry_limb) => {
                        let carry = match kind {
                            ShiftKind::Shl => self.shift_inst(ShiftOp::Lshr, carry_limb, inv_sbits),
                            _ => self.shift_inst(ShiftOp::Shl, carry_limb, inv_sbits),
                        };
                        let carry = self.select(sbits_is_zero, zero, carry);
                        self.binary(BinOp::Or, main, carry)
                    }
                    None => main,
                };
            }

            // Select chain over the displacement.
            let mut chained = candidates[3];
            for k in (0..3).rev() {
                let ck = self.iconst(k as u64);
                let disp_is_k = self.cmp(CmpOp::Eq, disp, ck);
                chained = self.select(disp_is_k, candidates[k as usize], chained);
            }

            // A large shift overrides everything.
            let large_result = match kind {
                ShiftKind::Sar => sign_word,
                _ => zero,
            };
            *slot = self.select(large_shift, large_result, chained);
        }

        Ok(Operand::Limbs(result))
    }

    // ==================== Comparison lowering ====================

    pub fn handle_compare(
        &mut self,
        pred: ComparePred,
        lhs: &Operand,
        rhs: Option<&Operand>,
    ) -> Result<Operand, CompileError> {
        let zero = self.iconst(0);
        let lhs = self.materialize_limbs(lhs)?;

        let low = match pred {
            // OR-reduce, compare against zero, extend into limb0.
            ComparePred::IsZero => {
                let or01 = self.binary(BinOp::Or, lhs[0], lhs[1]);
                let or012 = self.binary(BinOp::Or, or01, lhs[2]);
                let reduced = self.binary(BinOp::Or, or012, lhs[3]);
                self.cmp(CmpOp::Eq, reduced, zero)
            }
            // Limb-wise equality, AND-reduced.
            ComparePred::Eq => {
                let rhs = self.materialize_limbs(rhs.ok_or(CompileError::TypeMismatch)?)?;
                let mut acc = self.cmp(CmpOp::Eq, lhs[0], rhs[0]);
                for i in 1..4 {
                    let eq_i = self.cmp(CmpOp::Eq, lhs[i], rhs[i]);
                    acc = self.binary(BinOp::And, acc, eq_i);
                }
                acc
            }
            // Lexicographic, high limb decides; lower limbs only matter on
            // equality. Signed predicates use the signed comparator on the
            // top limb alone.
            ComparePred::Lt | ComparePred::Gt | ComparePred::Slt | ComparePred::Sgt => {
                let rhs = self.materialize_limbs(rhs.ok_or(CompileError::TypeMismatch)?)?;
                let unsigned = match pred {
                    ComparePred::Lt | ComparePred::Slt => CmpOp::Ult,
                    _ => CmpOp::Ugt,
                };
                let top = match pred {
                    ComparePred::Slt => CmpOp::Slt,
                    ComparePred::Sgt => CmpOp::Sgt,
                    _ => unsigned,
                };
                let mut carry = self.cmp(unsigned, lhs[0], rhs[0]);
                for i in 1..4 {
                    let op = if i == 3 { top } else { unsigned };
                    let cmp_i = self.cmp(op, lhs[i], rhs[i]);
                    let eq_i = self.cmp(CmpOp::Eq, lhs[i], rhs[i]);
                    carry = self.select(eq_i, carry, cmp_i);
                }
                carry
            }
        };

        Ok(Operand::Limbs([low, zero, zero, zero]))
    }

    // ==================== Control flow ====================

    /// JUMP: ends the block. The target is resolved by the backend; the
    /// frontend only records the shape.
    pub fn handle_jump(&mut self) {
        let target = self.func.create_block();
        self.emit(Inst::Br { target }, MirType::Void);
        self.current_block = target;
    }

    /// JUMPI: the condition is the OR-reduction of the limbs.
    pub fn handle_jumpi(&mut self, cond: &Operand) -> Result<(), CompileError> {
        let limbs = self.materialize_limbs(cond)?;
        let or01 = self.binary(BinOp::Or, limbs[0], limbs[1]);
        let or012 = self.binary(BinOp::Or, or01, limbs[2]);
        let reduced = self.binary(BinOp::Or, or012, limbs[3]);
        let zero = self.iconst(0);
        let taken = self.cmp(CmpOp::Ne, reduced, zero);

        let then_target = self.func.create_block();
        let else_target = self.func.create_block();
        self.emit(
            Inst::BrIf {
                cond: taken,
                then_target,
                else_target,
            },
            MirType::Void,
        );
        // Decoding continues on the fallthrough edge.
        self.current_block = else_target;
        Ok(())
    }

    /// JUMPDEST: begins a basic block; a preceding fallthrough gets an
    /// explicit edge.
    pub fn handle_jumpdest(&mut self) {
        let target = self.func.create_block();
        if !self.func.is_terminated(self.current_block) {
            self.emit(Inst::Br { target }, MirType::Void);
        }
        self.current_block = target;
    }

    /// Emits a function return and opens a fresh block for any code that
    /// follows the terminator.
    pub fn emit_ret(&mut self) {
        self.emit(Inst::Ret, MirType::Void);
        self.current_block = self.func.create_block();
    }

    // ==================== Runtime-call lowering ====================

    /// Emits an indirect call into the runtime table: the function's
    /// absolute address, the instance pointer, then the marshalled
    /// arguments. The return value is reassembled per its ABI class.
    pub fn emit_runtime_call(
        &mut self,
        func: RuntimeFn,
        args: &[RuntimeArg<'_>],
        ret: RuntimeRet,
    ) -> Operand {
        let target = self.emit(
            Inst::FuncAddr {
                name: func.name(),
                address: func.address(),
            },
            MirType::I64,
        );

        let mut call_args: SmallVec<[ValueId; 8]> = SmallVec::new();
        call_args.push(self.instance);
        for arg in args {
            match arg {
                RuntimeArg::U256(operand) => {
                    // Errors cannot occur here: the visitor only marshals
                    // operands it has already materialised or constants.
                    if let Ok(limbs) = self.materialize_limbs(operand) {
                        call_args.extend(limbs);
                    }
                }
                RuntimeArg::U64(operand) => {
                    let value = self.normalize_u64(operand);
                    call_args.push(value);
                }
            }
        }

        let ret_ty = match ret {
            RuntimeRet::U256 => MirType::U256,
            RuntimeRet::U64 => MirType::I64,
            RuntimeRet::Bytes32 => MirType::Ptr,
            RuntimeRet::Void => MirType::Void,
        };
        let call = self.emit(
            Inst::Call {
                target,
                args: call_args,
                ret: ret_ty,
            },
            ret_ty,
        );

        match ret {
            // Truncation plus three right shifts.
            RuntimeRet::U256 => {
                let limb0 = self.emit(Inst::Trunc { value: call }, MirType::I64);
                let mut limbs = [limb0; 4];
                for (i, limb) in limbs.iter_mut().enumerate().skip(1) {
                    let shifted = self.emit(
                        Inst::ShrWide {
                            value: call,
                            bits: (i * 64) as u8,
                        },
                        MirType::U256,
                    );
                    *limb = self.emit(Inst::Trunc { value: shifted }, MirType::I64);
                }
                Operand::Limbs(limbs)
            }
            // Zero-extended into limb0.
            RuntimeRet::U64 => {
                let zero = self.iconst(0);
                Operand::Limbs([call, zero, zero, zero])
            }
            RuntimeRet::Bytes32 => Operand::typed(call, EvmType::Bytes32),
            RuntimeRet::Void => Operand::Empty,
        }
    }

    /// U256 to u64 ABI normalisation: limb0 if the high limbs are all zero,
    /// else the `UINT64_MAX` sentinel that makes the callee fail with the
    /// appropriate out-of-range error. Constants fold at compile time.
    fn normalize_u64(&mut self, operand: &Operand) -> ValueId {
        match operand {
            Operand::Const(value) => {
                let folded = if value.0[1] == 0 && value.0[2] == 0 && value.0[3] == 0 {
                    value.0[0]
                } else {
                    u64::MAX
                };
                self.iconst(folded)
            }
            Operand::Typed {
                value,
                ty: EvmType::Uint64,
            } => *value,
            _ => {
                let limbs = match self.materialize_limbs(operand) {
                    Ok(limbs) => limbs,
                    Err(_) => return self.iconst(u64::MAX),
                };
                let zero = self.iconst(0);
                let eq1 = self.cmp(CmpOp::Eq, limbs[1], zero);
                let eq2 = self.cmp(CmpOp::Eq, limbs[2], zero);
                let eq3 = self.cmp(CmpOp::Eq, limbs[3], zero);
                let and12 = self.binary(BinOp::And, eq1, eq2);
                let is_u64 = self.binary(BinOp::And, and12, eq3);
                let sentinel = self.iconst(u64::MAX);
                self.select(is_u64, limbs[0], sentinel)
            }
        }
    }
}
