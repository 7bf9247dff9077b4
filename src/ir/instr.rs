use crate::ast::{DeclId, ExprId};
use crate::ir::block::BlockId;
use crate::ir::function::FunctionId;
use crate::ir::types::{BaseType, Literal};
use crate::ir::value::ValueId;

/// Index of an instruction within a block's instruction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(pub u32);

/// Binary operations. `>` and `>=` have no opcode of their own: the lowerer
/// emits them as `CmpLt` / `CmpLe` with swapped operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitXor,
    BitOr,
    /// Comparisons: yield a bool scalar.
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    LogicAnd,
    LogicOr,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Rem => "rem",
            BinOp::Shl => "shl",
            BinOp::Shr => "shr",
            BinOp::BitAnd => "and",
            BinOp::BitXor => "xor",
            BinOp::BitOr => "or",
            BinOp::CmpEq => "cmpeq",
            BinOp::CmpNe => "cmpne",
            BinOp::CmpLt => "cmplt",
            BinOp::CmpLe => "cmple",
            BinOp::LogicAnd => "land",
            BinOp::LogicOr => "lor",
        };
        f.write_str(s)
    }
}

/// Scalar unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarUnaryOp {
    /// Arithmetic negation: `-x`
    Neg,
    /// Bitwise complement: `~x`
    BitNot,
    /// Boolean NOT: `!x`
    Not,
}

impl std::fmt::Display for ScalarUnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarUnaryOp::Neg => f.write_str("neg"),
            ScalarUnaryOp::BitNot => f.write_str("bitnot"),
            ScalarUnaryOp::Not => f.write_str("not"),
        }
    }
}

/// Implicit widening conversions inserted to reconcile operand types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    SignExtend,
    ZeroExtend,
    IntToFloat,
    FloatExtend,
}

impl std::fmt::Display for CastOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CastOp::SignExtend => "sext",
            CastOp::ZeroExtend => "zext",
            CastOp::IntToFloat => "itof",
            CastOp::FloatExtend => "fpext",
        };
        f.write_str(s)
    }
}

/// Anything an instruction or terminator can consume.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Result of an instruction or a block parameter.
    Value(ValueId),
    /// Literal constant; never materialized as an instruction.
    Const(Literal),
    /// A binder left unsubstituted (e.g. a self parameter).
    Var(DeclId),
    /// A code block compiled as its own function graph.
    Function(FunctionId),
    /// A statically known function or record with no runtime representation.
    Static(ExprId),
    /// Poison left behind by a recovered error, or a placeholder argument.
    Undef,
}

impl Operand {
    pub fn as_value(&self) -> Option<ValueId> {
        match self {
            Operand::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_const(&self) -> Option<&Literal> {
        match self {
            Operand::Const(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Operand::Undef)
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{}", v),
            Operand::Const(l) => write!(f, "{}", l),
            Operand::Var(d) => write!(f, "$v{}", d.0),
            Operand::Function(id) => write!(f, "@f{}", id.0),
            Operand::Static(e) => write!(f, "static{}", e),
            Operand::Undef => f.write_str("undef"),
        }
    }
}

/// A single non-terminating instruction in SSA form.
///
/// Every instruction produces exactly one result whose element type is `ty`.
#[derive(Debug, Clone)]
pub enum IrInstr {
    BinOp {
        result: ValueId,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
        ty: BaseType,
    },
    UnaryOp {
        result: ValueId,
        op: ScalarUnaryOp,
        operand: Operand,
        ty: BaseType,
    },
    Cast {
        result: ValueId,
        op: CastOp,
        operand: Operand,
        ty: BaseType,
    },
    /// Partial application materialized as a value.
    Apply {
        result: ValueId,
        func: Operand,
        args: Vec<Operand>,
        ty: BaseType,
    },
    /// Slot access on a record value.
    Project {
        result: ValueId,
        base: Operand,
        slot: String,
        ty: BaseType,
    },
    Call {
        result: ValueId,
        callee: Operand,
        args: Vec<Operand>,
        ty: BaseType,
    },
    /// Allocate a cell initialised with `init`; the result is an address.
    Alloc {
        result: ValueId,
        init: Operand,
        ty: BaseType,
    },
    Load {
        result: ValueId,
        addr: Operand,
        ty: BaseType,
    },
}

impl IrInstr {
    pub fn result(&self) -> ValueId {
        match self {
            IrInstr::BinOp { result, .. }
            | IrInstr::UnaryOp { result, .. }
            | IrInstr::Cast { result, .. }
            | IrInstr::Apply { result, .. }
            | IrInstr::Project { result, .. }
            | IrInstr::Call { result, .. }
            | IrInstr::Alloc { result, .. }
            | IrInstr::Load { result, .. } => *result,
        }
    }

    /// Element type of the result.
    pub fn ty(&self) -> BaseType {
        match self {
            IrInstr::BinOp { ty, .. }
            | IrInstr::UnaryOp { ty, .. }
            | IrInstr::Cast { ty, .. }
            | IrInstr::Apply { ty, .. }
            | IrInstr::Project { ty, .. }
            | IrInstr::Call { ty, .. }
            | IrInstr::Alloc { ty, .. }
            | IrInstr::Load { ty, .. } => *ty,
        }
    }

    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            IrInstr::BinOp { lhs, rhs, .. } => vec![lhs, rhs],
            IrInstr::UnaryOp { operand, .. } | IrInstr::Cast { operand, .. } => vec![operand],
            IrInstr::Apply { func, args, .. } => std::iter::once(func).chain(args.iter()).collect(),
            IrInstr::Project { base, .. } => vec![base],
            IrInstr::Call { callee, args, .. } => {
                std::iter::once(callee).chain(args.iter()).collect()
            }
            IrInstr::Alloc { init, .. } => vec![init],
            IrInstr::Load { addr, .. } => vec![addr],
        }
    }
}

/// Block terminators. Every block gets exactly one.
#[derive(Debug, Clone)]
pub enum Terminator {
    /// Unconditional jump; `args` bind the target's block parameters.
    Goto { target: BlockId, args: Vec<Operand> },
    Branch {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return { value: Operand },
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Goto { target, .. } => vec![*target],
            Terminator::Branch { then_block, else_block, .. } => vec![*then_block, *else_block],
            Terminator::Return { .. } => vec![],
        }
    }

    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Terminator::Goto { args, .. } => args.iter().collect(),
            Terminator::Branch { cond, .. } => vec![cond],
            Terminator::Return { value } => vec![value],
        }
    }
}
