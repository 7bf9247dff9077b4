//! Unary and binary operators: operand checks, implicit widening casts,
//! comparison canonicalization and literal folding.

use crate::ast::{BinaryOpcode, ExprId, UnaryOpcode};
use crate::error::{DiagnosticKind, LowerError};
use crate::ir::instr::{BinOp, CastOp, IrInstr, Operand, ScalarUnaryOp};
use crate::ir::types::{BaseType, DType, LitValue, Literal};

use super::scope::{Attr, Residual};
use super::{Lowerer, TraverseKind};

/// Operand class an opcode accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandClass {
    Numeric,
    Integer,
    Boolean,
    Any,
}

impl OperandClass {
    fn accepts(self, ty: BaseType) -> bool {
        match self {
            OperandClass::Numeric => ty.is_numeric(),
            OperandClass::Integer => ty.is_int(),
            OperandClass::Boolean => ty.is_bool(),
            OperandClass::Any => true,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            OperandClass::Numeric => "a numeric operand",
            OperandClass::Integer => "an integer operand",
            OperandClass::Boolean => "a boolean operand",
            OperandClass::Any => "a value",
        }
    }
}

fn binary_class(op: BinaryOpcode) -> OperandClass {
    use BinaryOpcode::*;
    match op {
        Add | Sub | Mul | Div | Rem | Lt | Leq | Gt | Geq => OperandClass::Numeric,
        Shl | Shr | BitAnd | BitXor | BitOr => OperandClass::Integer,
        LogicAnd | LogicOr => OperandClass::Boolean,
        Eq | Neq => OperandClass::Any,
    }
}

fn unary_class(op: UnaryOpcode) -> OperandClass {
    match op {
        UnaryOpcode::Negative => OperandClass::Numeric,
        UnaryOpcode::BitNot => OperandClass::Integer,
        UnaryOpcode::LogicNot => OperandClass::Boolean,
    }
}

/// Maps a source opcode to its IR opcode. `>` and `>=` become `<` and `<=`;
/// the returned flag says the operands must be swapped.
fn canonicalize(op: BinaryOpcode) -> (BinOp, bool) {
    use BinaryOpcode::*;
    match op {
        Add => (BinOp::Add, false),
        Sub => (BinOp::Sub, false),
        Mul => (BinOp::Mul, false),
        Div => (BinOp::Div, false),
        Rem => (BinOp::Rem, false),
        Shl => (BinOp::Shl, false),
        Shr => (BinOp::Shr, false),
        BitAnd => (BinOp::BitAnd, false),
        BitXor => (BinOp::BitXor, false),
        BitOr => (BinOp::BitOr, false),
        Eq => (BinOp::CmpEq, false),
        Neq => (BinOp::CmpNe, false),
        Lt => (BinOp::CmpLt, false),
        Leq => (BinOp::CmpLe, false),
        Gt => (BinOp::CmpLt, true),
        Geq => (BinOp::CmpLe, true),
        LogicAnd => (BinOp::LogicAnd, false),
        LogicOr => (BinOp::LogicOr, false),
    }
}

fn yields_bool(op: BinOp) -> bool {
    matches!(
        op,
        BinOp::CmpEq | BinOp::CmpNe | BinOp::CmpLt | BinOp::CmpLe | BinOp::LogicAnd | BinOp::LogicOr
    )
}

/// The cast that widens `from` to `to`, if one is legal.
pub(crate) fn widening_cast(from: BaseType, to: BaseType) -> Option<CastOp> {
    if from.lanes != to.lanes || from == to {
        return None;
    }
    let (f, t) = (from.dtype, to.dtype);
    if f.is_int() && t.is_int() {
        let widens = t.bits() > f.bits();
        return match (f.is_signed_int(), t.is_signed_int()) {
            (true, true) if widens => Some(CastOp::SignExtend),
            (false, _) if widens => Some(CastOp::ZeroExtend),
            _ => None,
        };
    }
    if f.is_int() && t.is_float() {
        return Some(CastOp::IntToFloat);
    }
    if f == DType::F32 && t == DType::F64 {
        return Some(CastOp::FloatExtend);
    }
    None
}

/// Truncates an integer to the width of `dtype`, re-extending by signedness.
fn wrap_int(v: i64, dtype: DType) -> i64 {
    match dtype {
        DType::I8 => v as i8 as i64,
        DType::I16 => v as i16 as i64,
        DType::I32 => v as i32 as i64,
        DType::U8 => v as u8 as i64,
        DType::U16 => v as u16 as i64,
        DType::U32 => v as u32 as i64,
        _ => v,
    }
}

/// Converts a literal in place instead of emitting a cast.
fn convert_literal(lit: Literal, to: BaseType) -> Literal {
    let value = match (lit.value, to.dtype.is_float()) {
        (LitValue::Int(v), true) => LitValue::Float(v as f64),
        (LitValue::Int(v), false) => LitValue::Int(wrap_int(v, to.dtype)),
        (other, _) => other,
    };
    Literal { value, ty: to }
}

/// Evaluates `lhs op rhs` on literals of type `ty`. Division or remainder by
/// zero and shifts out of range are left to run time.
fn fold_binary(op: BinOp, lhs: &Literal, rhs: &Literal, ty: BaseType) -> Option<Literal> {
    let lit = match (lhs.value, rhs.value) {
        (LitValue::Int(a), LitValue::Int(b)) => {
            let unsigned = ty.dtype.is_unsigned_int();
            let int = |v: i64| Literal::int(wrap_int(v, ty.dtype), ty.dtype);
            match op {
                BinOp::Add => int(a.wrapping_add(b)),
                BinOp::Sub => int(a.wrapping_sub(b)),
                BinOp::Mul => int(a.wrapping_mul(b)),
                BinOp::Div if b == 0 => return None,
                BinOp::Div if unsigned => int(((a as u64) / (b as u64)) as i64),
                BinOp::Div => int(a.wrapping_div(b)),
                BinOp::Rem if b == 0 => return None,
                BinOp::Rem if unsigned => int(((a as u64) % (b as u64)) as i64),
                BinOp::Rem => int(a.wrapping_rem(b)),
                BinOp::Shl | BinOp::Shr if !(0..ty.dtype.bits() as i64).contains(&b) => return None,
                BinOp::Shl => int(a.wrapping_shl(b as u32)),
                BinOp::Shr if unsigned => int(((a as u64) >> b) as i64),
                BinOp::Shr => int(a >> b),
                BinOp::BitAnd => int(a & b),
                BinOp::BitXor => int(a ^ b),
                BinOp::BitOr => int(a | b),
                BinOp::CmpEq => Literal::bool(a == b),
                BinOp::CmpNe => Literal::bool(a != b),
                BinOp::CmpLt if unsigned => Literal::bool((a as u64) < (b as u64)),
                BinOp::CmpLt => Literal::bool(a < b),
                BinOp::CmpLe if unsigned => Literal::bool((a as u64) <= (b as u64)),
                BinOp::CmpLe => Literal::bool(a <= b),
                BinOp::LogicAnd | BinOp::LogicOr => return None,
            }
        }
        (LitValue::Float(a), LitValue::Float(b)) => {
            let float = |v: f64| Literal {
                value: LitValue::Float(v),
                ty,
            };
            match op {
                BinOp::Add => float(a + b),
                BinOp::Sub => float(a - b),
                BinOp::Mul => float(a * b),
                BinOp::Div => float(a / b),
                BinOp::Rem => float(a % b),
                BinOp::CmpEq => Literal::bool(a == b),
                BinOp::CmpNe => Literal::bool(a != b),
                BinOp::CmpLt => Literal::bool(a < b),
                BinOp::CmpLe => Literal::bool(a <= b),
                _ => return None,
            }
        }
        (LitValue::Bool(a), LitValue::Bool(b)) => match op {
            BinOp::LogicAnd => Literal::bool(a && b),
            BinOp::LogicOr => Literal::bool(a || b),
            BinOp::CmpEq => Literal::bool(a == b),
            BinOp::CmpNe => Literal::bool(a != b),
            _ => return None,
        },
        _ => return None,
    };
    Some(lit)
}

fn fold_unary(op: ScalarUnaryOp, lit: &Literal) -> Option<Literal> {
    let value = match (op, lit.value) {
        (ScalarUnaryOp::Neg, LitValue::Int(v)) => LitValue::Int(wrap_int(v.wrapping_neg(), lit.ty.dtype)),
        (ScalarUnaryOp::Neg, LitValue::Float(v)) => LitValue::Float(-v),
        (ScalarUnaryOp::BitNot, LitValue::Int(v)) => LitValue::Int(wrap_int(!v, lit.ty.dtype)),
        (ScalarUnaryOp::Not, LitValue::Bool(b)) => LitValue::Bool(!b),
        _ => return None,
    };
    Some(Literal { value, ty: lit.ty })
}

impl<'a> Lowerer<'a> {
    /// Widens `operand` from `from` to `to`: literals are converted in place,
    /// anything else gets a cast instruction.
    pub(crate) fn widen(&mut self, operand: Operand, from: BaseType, to: BaseType, op: CastOp) -> Operand {
        if let Operand::Const(lit) = operand {
            return Operand::Const(convert_literal(lit, to));
        }
        log::trace!("widen {} from {} to {} with {}", operand, from, to, op);
        match self.emit(|result| IrInstr::Cast {
            result,
            op,
            operand,
            ty: to,
        }) {
            Residual::Value(v) => Operand::Value(v),
            _ => Operand::Undef,
        }
    }

    /// Integers narrower than 32 bits are promoted before arithmetic.
    fn promote(&mut self, operand: Operand, ty: BaseType) -> (Operand, BaseType) {
        match ty.promoted() {
            Some(wide) => {
                let cast = if ty.dtype.is_signed_int() {
                    CastOp::SignExtend
                } else {
                    CastOp::ZeroExtend
                };
                (self.widen(operand, ty, wide, cast), wide)
            }
            None => (operand, ty),
        }
    }

    pub(crate) fn reduce_unary(
        &mut self,
        expr: ExprId,
        op: UnaryOpcode,
        operand: ExprId,
    ) -> Result<Attr, LowerError> {
        let oa = self.traverse(operand, TraverseKind::Arg)?;
        if oa.is_poison() {
            return Ok(Attr::poison());
        }
        let op_name = match op {
            UnaryOpcode::Negative => "-",
            UnaryOpcode::BitNot => "~",
            UnaryOpcode::LogicNot => "!",
        };
        let Some(ty) = self.scalar_type(&oa) else {
            self.report(DiagnosticKind::InvalidOperator { op: op_name.to_owned() }, expr);
            return Ok(Attr::poison());
        };
        let class = unary_class(op);
        if !class.accepts(ty) {
            self.report(
                DiagnosticKind::InvalidOperand {
                    op: op_name.to_owned(),
                    expected: class.describe(),
                    found: ty.to_string(),
                },
                expr,
            );
            return Ok(Attr::poison());
        }

        let ir_op = match op {
            UnaryOpcode::Negative => ScalarUnaryOp::Neg,
            UnaryOpcode::BitNot => ScalarUnaryOp::BitNot,
            UnaryOpcode::LogicNot => ScalarUnaryOp::Not,
        };
        if let Some(folded) = oa.as_literal().and_then(|lit| fold_unary(ir_op, lit)) {
            return Ok(Attr::literal(folded));
        }
        let operand = self.materialize(&oa)?;
        let residual = self.emit(|result| IrInstr::UnaryOp {
            result,
            op: ir_op,
            operand,
            ty,
        });
        Ok(Attr::value(residual, ty))
    }

    pub(crate) fn reduce_binary(
        &mut self,
        expr: ExprId,
        op: BinaryOpcode,
        lhs: ExprId,
        rhs: ExprId,
    ) -> Result<Attr, LowerError> {
        let la = self.traverse(lhs, TraverseKind::Arg)?;
        let ra = self.traverse(rhs, TraverseKind::Arg)?;
        if la.is_poison() || ra.is_poison() {
            return Ok(Attr::poison());
        }
        let (Some(lt), Some(rt)) = (self.scalar_type(&la), self.scalar_type(&ra)) else {
            self.report(DiagnosticKind::InvalidOperator { op: op.to_string() }, expr);
            return Ok(Attr::poison());
        };

        // 1. Promote narrow integers, then reconcile operand types.
        let lhs_op = self.materialize(&la)?;
        let rhs_op = self.materialize(&ra)?;
        let (mut lhs_op, mut lt) = self.promote(lhs_op, lt);
        let (mut rhs_op, rt) = self.promote(rhs_op, rt);
        if lt != rt {
            if let Some(cast) = widening_cast(rt, lt) {
                rhs_op = self.widen(rhs_op, rt, lt, cast);
            } else if let Some(cast) = widening_cast(lt, rt) {
                lhs_op = self.widen(lhs_op, lt, rt, cast);
                lt = rt;
            } else {
                self.report(
                    DiagnosticKind::IncompatibleTypes {
                        op: op.to_string(),
                        lhs: lt.to_string(),
                        rhs: rt.to_string(),
                    },
                    expr,
                );
            }
        }
        let operand_ty = lt;

        // 2. Per-opcode operand check.
        let class = binary_class(op);
        if !class.accepts(operand_ty) {
            self.report(
                DiagnosticKind::InvalidOperand {
                    op: op.to_string(),
                    expected: class.describe(),
                    found: operand_ty.to_string(),
                },
                expr,
            );
            return Ok(Attr::poison());
        }

        // 3. `a > b` is emitted as `b < a`.
        let (ir_op, swap) = canonicalize(op);
        if swap {
            std::mem::swap(&mut lhs_op, &mut rhs_op);
        }
        let ty = if yields_bool(ir_op) {
            BaseType::vector(DType::Bool, operand_ty.lanes)
        } else {
            operand_ty
        };

        // 4. Literal operands fold without emitting anything.
        if let (Operand::Const(l), Operand::Const(r)) = (&lhs_op, &rhs_op) {
            if let Some(folded) = fold_binary(ir_op, l, r, operand_ty) {
                return Ok(Attr::literal(folded));
            }
        }

        let residual = self.emit(|result| IrInstr::BinOp {
            result,
            op: ir_op,
            lhs: lhs_op,
            rhs: rhs_op,
            ty,
        });
        Ok(Attr::value(residual, ty))
    }
}
