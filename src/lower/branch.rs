//! Conditionals.
//!
//! ```text
//!   entry:  branch %c, then, else
//!   then:   ... goto join(%a)
//!   else:   ... goto join(%b)
//!   join(%r): ...
//! ```
//!
//! With an ambient continuation both arms jump straight to it and no join
//! block is created. A literal condition selects its arm statically and
//! allocates nothing.
//!
//! The join parameter is typed before either arm is lowered: both arms are
//! first reduced with nothing emitted, and the wider of their two types wins.
//! Edges into the join may still be emitted late by nested functions, so its
//! type cannot wait for the first `goto`.

use crate::ast::ExprId;
use crate::error::{DiagnosticKind, LowerError};
use crate::ir::instr::{Operand, Terminator};
use crate::ir::types::BaseType;

use super::fold::widening_cast;
use super::scope::{Attr, Continuation, Relation, Residual, Subst, TypeRef};
use super::{EvalMode, Lowerer, TraverseKind};

impl<'a> Lowerer<'a> {
    pub(crate) fn compile_branch(
        &mut self,
        expr: ExprId,
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
    ) -> Result<Attr, LowerError> {
        // 1. The condition must be a boolean; anything else is poisoned.
        let ca = self.traverse(cond, TraverseKind::Arg)?;
        let cond_op = if ca.is_poison() {
            Operand::Undef
        } else if self.scalar_type(&ca).is_some_and(|ty| ty == BaseType::BOOL) {
            self.materialize(&ca)?
        } else {
            let found = self.describe(&ca);
            self.report(
                DiagnosticKind::TypeMismatch {
                    expected: BaseType::BOOL.to_string(),
                    found,
                },
                expr,
            );
            Operand::Undef
        };

        // 2. Statically known condition: only the selected arm exists.
        if let Some(taken) = cond_op.as_const().and_then(|lit| lit.as_bool()) {
            let arm = if taken { then_expr } else { else_expr };
            return self.traverse(arm, TraverseKind::Tail);
        }

        // Pure type computation walks both arms and keeps the then-type.
        if self.mode == EvalMode::WeakHead || !self.is_active() {
            let then_attr = self.traverse(then_expr, TraverseKind::Arg)?;
            self.traverse(else_expr, TraverseKind::Arg)?;
            return Ok(then_attr);
        }

        let ambient = self.scope.continuation();
        let join_ty = match ambient {
            Some(_) => None,
            None => self.join_type(then_expr, else_expr)?,
        };

        // 3. Split the current block.
        let builder = self.builder_mut()?;
        let then_block = builder.create_block(Some("then"), 0);
        let else_block = builder.create_block(Some("else"), 0);
        builder.finish_block(Terminator::Branch {
            cond: cond_op,
            then_block,
            else_block,
        })?;

        let (join_cont, join_block) = match ambient {
            Some(cont) => (cont, None),
            None => {
                let builder = self.builder_mut()?;
                let join = builder.create_block(Some("join"), 0);
                builder.add_block_param(join, None, join_ty);
                (Continuation::Block(join), Some(join))
            }
        };

        // 4. Both arms flow to the join continuation.
        for (block, arm) in [(then_block, then_expr), (else_block, else_expr)] {
            self.builder_mut()?.begin_block(block)?;
            self.scope.set_continuation(Some(join_cont));
            self.traverse(arm, TraverseKind::Tail)?;
        }

        // 5. Resume after the conditional.
        self.scope.set_continuation(ambient);
        let Some(join) = join_block else {
            return Ok(Attr::default());
        };
        let builder = self.builder_mut()?;
        builder.begin_block(join)?;
        let result = builder.block_params(join)[0];
        let ty = builder.value_type(result);
        Ok(Attr {
            residual: Some(Residual::Value(result)),
            relation: Relation::ApproximateType,
            ty: ty.map(TypeRef::Base),
            subst: Subst::default(),
        })
    }

    /// Element type of the join parameter. Both arms are reduced with
    /// emission off and diagnostics dropped; an arm whose type widens to the
    /// other's takes the wider type. Poisoned arms do not constrain it.
    fn join_type(&mut self, then_expr: ExprId, else_expr: ExprId) -> Result<Option<BaseType>, LowerError> {
        let then_ty = self.arm_type(then_expr)?;
        let else_ty = self.arm_type(else_expr)?;
        let ty = match (then_ty, else_ty) {
            (Some(t), Some(e)) if t != e && widening_cast(t, e).is_some() => Some(e),
            (Some(t), _) => Some(t),
            (None, e) => e,
        };
        log::trace!("join type {:?} from arms {:?} and {:?}", ty, then_ty, else_ty);
        Ok(ty)
    }

    fn arm_type(&mut self, arm: ExprId) -> Result<Option<BaseType>, LowerError> {
        self.quiet += 1;
        let prev = self.set_emit(false);
        let attr = self.traverse(arm, TraverseKind::Arg);
        self.set_emit(prev);
        self.quiet -= 1;
        self.element_type(&attr?)
    }
}
