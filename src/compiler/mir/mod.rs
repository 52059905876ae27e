//! A minimal register-based machine IR.
//!
//! Values are produced by instructions and identified by [`ValueId`]; basic
//! blocks hold instruction sequences and explicit successor edges. The
//! 256-bit EVM word never exists here as a first-class value: the frontend
//! lowers it to four i64 limbs. The [`MirType::U256`] type only appears at
//! runtime-call boundaries, where the ABI returns a 256-bit value that is
//! immediately split back into limbs.

use index_vec::{define_index_type, IndexVec};
use smallvec::SmallVec;
use std::fmt;

define_index_type! {
    /// An SSA value, indexing the function's instruction arena.
    pub struct ValueId = u32;
}

define_index_type! {
    pub struct BlockId = u32;
}

define_index_type! {
    /// A mutable variable slot, read and written as an i64.
    pub struct VarId = u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirType {
    Void,
    I8,
    I32,
    I64,
    /// An untyped pointer, materially an i64.
    Ptr,
    /// A 256-bit value; only produced by calls, consumed by `Trunc` and
    /// `ShrWide`.
    U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Shl,
    Lshr,
    Ashr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Ult,
    Uge,
    Ugt,
    Slt,
    Sgt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
    /// The i-th function parameter.
    Param { index: u32 },
    IConst { value: u64 },
    /// The absolute address of a runtime function, as an i64 constant. The
    /// name is carried for dumps; only the address reaches machine code.
    FuncAddr { name: &'static str, address: u64 },
    Binary { op: BinOp, lhs: ValueId, rhs: ValueId },
    Not { value: ValueId },
    Shift { op: ShiftOp, value: ValueId, amount: ValueId },
    /// Comparison producing an i64 that is 0 or 1.
    Cmp { op: CmpOp, lhs: ValueId, rhs: ValueId },
    Select { cond: ValueId, then_value: ValueId, else_value: ValueId },
    ReadVar { var: VarId },
    WriteVar { var: VarId, value: ValueId },
    /// Indirect call through an absolute address.
    Call { target: ValueId, args: SmallVec<[ValueId; 8]>, ret: MirType },
    /// Low 64 bits of a u256 call result.
    Trunc { value: ValueId },
    /// A u256 call result shifted right by a constant bit count.
    ShrWide { value: ValueId, bits: u8 },
    /// Byte-swapped i64 load from a 32-byte big-endian blob.
    LoadWordBe { ptr: ValueId, offset: u8 },
    Br { target: BlockId },
    BrIf { cond: ValueId, then_target: BlockId, else_target: BlockId },
    Ret,
}

impl Inst {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Inst::Br { .. } | Inst::BrIf { .. } | Inst::Ret)
    }
}

#[derive(Debug, Clone)]
pub struct InstData {
    pub inst: Inst,
    pub ty: MirType,
}

#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub insts: Vec<ValueId>,
    pub successors: SmallVec<[BlockId; 2]>,
}

#[derive(Debug, Default)]
pub struct MirFunction {
    pub insts: IndexVec<ValueId, InstData>,
    pub blocks: IndexVec<BlockId, BasicBlock>,
    pub vars: IndexVec<VarId, MirType>,
}

impl MirFunction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_block(&mut self) -> BlockId {
        self.blocks.push(BasicBlock::default())
    }

    pub fn create_var(&mut self, ty: MirType) -> VarId {
        self.vars.push(ty)
    }

    /// Appends an instruction to `block` and returns its value id.
    pub fn emit(&mut self, block: BlockId, inst: Inst, ty: MirType) -> ValueId {
        match &inst {
            Inst::Br { target } => self.blocks[block].successors.push(*target),
            Inst::BrIf {
                then_target,
                else_target,
                ..
            } => {
                self.blocks[block].successors.push(*then_target);
                self.blocks[block].successors.push(*else_target);
            }
            _ => {}
        }
        let id = self.insts.push(InstData { inst, ty });
        self.blocks[block].insts.push(id);
        id
    }

    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.blocks[block]
            .insts
            .last()
            .is_some_and(|&id| self.insts[id].inst.is_terminator())
    }

    /// Iterates all instructions in emission order.
    pub fn iter_insts(&self) -> impl Iterator<Item = &InstData> {
        self.insts.iter()
    }

    pub fn count_matching(&self, predicate: impl Fn(&Inst) -> bool) -> usize {
        self.insts.iter().filter(|data| predicate(&data.inst)).count()
    }
}

impl fmt::Display for MirFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (block_id, block) in self.blocks.iter_enumerated() {
            writeln!(f, "bb{}:", block_id.index())?;
            for &value in &block.insts {
                let data = &self.insts[value];
                write!(f, "  v{} = ", value.index())?;
                match &data.inst {
                    Inst::Param { index } => writeln!(f, "param {index}")?,
                    Inst::IConst { value } => writeln!(f, "iconst {value:#x}")?,
                    Inst::FuncAddr { name, .. } => writeln!(f, "funcaddr @{name}")?,
                    Inst::Binary { op, lhs, rhs } => {
                        writeln!(f, "{op:?} v{}, v{}", lhs.index(), rhs.index())?
                    }
                    Inst::Not { value } => writeln!(f, "not v{}", value.index())?,
                    Inst::Shift { op, value, amount } => {
                        writeln!(f, "{op:?} v{}, v{}", value.index(), amount.index())?
                    }
                    Inst::Cmp { op, lhs, rhs } => {
                        writeln!(f, "{op:?} v{}, v{}", lhs.index(), rhs.index())?
                    }
                    Inst::Select {
                        cond,
                        then_value,
                        else_value,
                    } => writeln!(
                        f,
                        "select v{}, v{}, v{}",
                        cond.index(),
                        then_value.index(),
                        else_value.index()
                    )?,
                    Inst::ReadVar { var } => writeln!(f, "dread x{}", var.index())?,
                    Inst::WriteVar { var, value } => {
                        writeln!(f, "dwrite x{}, v{}", var.index(), value.index())?
                    }
                    Inst::Call { target, args, ret } => {
                        write!(f, "call [{ret:?}] v{}(", target.index())?;
                        for (i, arg) in args.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "v{}", arg.index())?;
                        }
                        writeln!(f, ")")?
                    }
                    Inst::Trunc { value } => writeln!(f, "trunc v{}", value.index())?,
                    Inst::ShrWide { value, bits } => {
                        writeln!(f, "shrwide v{}, {bits}", value.index())?
                    }
                    Inst::LoadWordBe { ptr, offset } => {
                        writeln!(f, "loadword.be v{}, {offset}", ptr.index())?
                    }
                    Inst::Br { target } => writeln!(f, "br bb{}", target.index())?,
                    Inst::BrIf {
                        cond,
                        then_target,
                        else_target,
                    } => writeln!(
                        f,
                        "br_if v{}, bb{}, bb{}",
                        cond.index(),
                        then_target.index(),
                        else_target.index()
                    )?,
                    Inst::Ret => writeln!(f, "ret")?,
                }
            }
        }
        Ok(())
    }
}
