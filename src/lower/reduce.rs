//! Per-construct reduction rules and type-expression forcing.

use crate::ast::{ApplyKind, DeclId, DeclKind, Expr, ExprId};
use crate::error::{DiagnosticKind, LowerError};
use crate::ir::instr::{IrInstr, Operand};
use crate::ir::types::{BaseType, DType};

use super::scope::{Attr, Binding, Relation, Residual, Scope, Subst, TypeRef};
use super::{EvalMode, Lowerer, TraverseKind};

impl<'a> Lowerer<'a> {
    // -----------------------------------------------------------------------
    // Type forcing
    // -----------------------------------------------------------------------

    /// Forces `attr.ty` to weak-head form under `attr.subst`. Types that are
    /// already concrete or already values are left alone.
    pub(crate) fn evaluate_type_expr(&mut self, attr: &mut Attr) -> Result<(), LowerError> {
        let Some(TypeRef::Expr(ty)) = attr.ty else {
            return Ok(());
        };
        if self.arena.expr(ty).is_value() {
            return Ok(());
        }
        let outer = std::mem::replace(&mut self.scope, Scope::from_subst(&attr.subst));
        let result = self.compute_attr_type(attr, ty);
        self.scope = outer;
        result
    }

    /// Weak-head reduces the type expression `ty` in the current scope with
    /// emission disabled, then moves the resulting type back onto `attr`.
    fn compute_attr_type(&mut self, attr: &mut Attr, ty: ExprId) -> Result<(), LowerError> {
        let prev_emit = self.set_emit(false);
        let prev_mode = std::mem::replace(&mut self.mode, EvalMode::WeakHead);
        let result = self.traverse(ty, TraverseKind::Decl);
        self.mode = prev_mode;
        self.set_emit(prev_emit);

        let forced = result?;
        attr.ty = forced.ty;
        attr.subst = forced.subst;
        Ok(())
    }

    /// The element type tag of a forced type. Functions, records, code and
    /// fields collapse to `addr`.
    pub(crate) fn base_type_of(&self, ty: &TypeRef) -> Result<BaseType, LowerError> {
        match ty {
            TypeRef::Base(bt) => Ok(*bt),
            TypeRef::Cell(_) => Ok(BaseType::ADDR),
            TypeRef::Expr(expr) => match self.arena.expr(*expr) {
                Expr::Function { .. } | Expr::Code { .. } | Expr::Record { .. } | Expr::Field { .. } => {
                    Ok(BaseType::ADDR)
                }
                Expr::ScalarType(bt) => Ok(*bt),
                Expr::Literal(lit) => Ok(lit.ty),
                Expr::Future(inner) => self.base_type_of(&TypeRef::Expr(*inner)),
                other => Err(LowerError::NotAValue {
                    construct: other.construct(),
                }),
            },
        }
    }

    /// Element type of an attribute, `None` when its type is unknown (poison).
    pub(crate) fn element_type(&self, attr: &Attr) -> Result<Option<BaseType>, LowerError> {
        attr.ty.as_ref().map(|ty| self.base_type_of(ty)).transpose()
    }

    /// The scalar type of a runtime value, if the attribute denotes one.
    pub(crate) fn scalar_type(&self, attr: &Attr) -> Option<BaseType> {
        match attr.ty.as_ref()? {
            TypeRef::Base(bt) => Some(*bt),
            TypeRef::Cell(_) => None,
            TypeRef::Expr(expr) => match self.arena.expr(*expr) {
                Expr::ScalarType(bt) => Some(*bt),
                Expr::Literal(lit) => Some(lit.ty),
                _ => None,
            },
        }
    }

    /// Short type description for diagnostics.
    pub(crate) fn describe(&self, attr: &Attr) -> String {
        match &attr.ty {
            None => "unknown".to_owned(),
            Some(TypeRef::Base(bt)) => bt.to_string(),
            Some(TypeRef::Cell(bt)) => format!("cell<{}>", bt),
            Some(TypeRef::Expr(expr)) => match self.arena.expr(*expr) {
                Expr::ScalarType(bt) => bt.to_string(),
                other => other.construct().to_owned(),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    pub(crate) fn reduce_variable(&mut self, decl: DeclId) -> Result<Attr, LowerError> {
        let var = self.arena.decl(decl);
        let position = var.position as usize;
        if position >= self.scope.len() {
            return Err(LowerError::VariableOutOfScope {
                name: var.name.clone(),
                position: var.position,
                depth: self.scope.len(),
            });
        }
        match self.scope.var(position).and_then(|b| b.attr.clone()) {
            None => self.promote_variable(decl),
            Some(attr) => self.reduce_var_substitution(attr, decl),
        }
    }

    /// An opaque binder reduces to itself, typed by its weak-head
    /// definition under a scope of opaque outer positions.
    pub(crate) fn promote_variable(&mut self, decl: DeclId) -> Result<Attr, LowerError> {
        let var = self.arena.decl(decl);
        let relation = match var.kind {
            DeclKind::Fun => Relation::ApproximateType,
            DeclKind::SelfFun => Relation::ExactType,
            DeclKind::Let => Relation::Equivalent,
        };
        let mut attr = Attr {
            residual: Some(Residual::Var(decl)),
            relation,
            ty: var.definition.map(TypeRef::Expr),
            subst: Subst::null(var.position as usize),
        };
        self.evaluate_type_expr(&mut attr)?;
        Ok(attr)
    }

    fn reduce_var_substitution(&mut self, attr: Attr, decl: DeclId) -> Result<Attr, LowerError> {
        if attr.ty.is_some() {
            return Ok(attr);
        }
        match &attr.residual {
            Some(Residual::Var(inner)) => self.promote_variable(*inner),
            Some(Residual::Value(_)) | Some(Residual::Undefined) => Ok(attr),
            _ => Err(LowerError::InvalidSubstitution {
                name: self.arena.decl(decl).name.clone(),
            }),
        }
    }

    /// Resolves a name against the environment, innermost binder first.
    /// Failing that, a slot of an enclosing self-function's record is
    /// reached through an implicit self-application.
    pub(crate) fn reduce_identifier(&mut self, expr: ExprId, name: &str) -> Result<Attr, LowerError> {
        let arena = self.arena;
        for position in (0..self.scope.len()).rev() {
            let Some(binding) = self.scope.var(position) else {
                continue;
            };
            let Some(decl) = binding.decl else {
                continue;
            };
            if arena.decl(decl).name != name {
                continue;
            }
            return match binding.attr.clone() {
                None => self.promote_variable(decl),
                Some(attr) => self.reduce_var_substitution(attr, decl),
            };
        }

        for position in (0..self.scope.len()).rev() {
            let Some(decl) = self.scope.var(position).and_then(|b| b.decl) else {
                continue;
            };
            let var = arena.decl(decl);
            if var.kind != DeclKind::SelfFun {
                continue;
            }
            let Some(Expr::Function { body, .. }) = var.definition.map(|d| arena.expr(d)) else {
                continue;
            };
            let Some(slot) = arena.find_slot(*body, name) else {
                continue;
            };
            if slot.is_final {
                if let Expr::Literal(lit) = arena.expr(slot.definition) {
                    return Ok(Attr::literal(*lit));
                }
            }
            return self.reduce_self_slot(decl, position, name, slot.definition);
        }

        self.report(DiagnosticKind::IdentifierNotFound { name: name.to_owned() }, expr);
        Ok(Attr::poison())
    }

    /// `self@.slot` for an identifier that names a slot of the enclosing
    /// self-function's record.
    fn reduce_self_slot(
        &mut self,
        self_decl: DeclId,
        position: usize,
        slot: &str,
        slot_def: ExprId,
    ) -> Result<Attr, LowerError> {
        let self_attr = self.reduce_variable(self_decl)?;

        let mut subst = Subst::null(position);
        subst.push(Binding {
            decl: Some(self_decl),
            attr: Some(self_attr.clone()),
        });
        let mut attr = Attr {
            residual: None,
            relation: Relation::ApproximateType,
            ty: Some(TypeRef::Expr(slot_def)),
            subst,
        };
        self.evaluate_type_expr(&mut attr)?;

        if self.mode == EvalMode::Full {
            let head = self.materialize(&self_attr)?;
            let record = self.emit(|result| IrInstr::Apply {
                result,
                func: head.clone(),
                args: vec![head.clone()],
                ty: BaseType::ADDR,
            });
            let base = self.materialize(&Attr {
                residual: Some(record),
                ..Attr::default()
            })?;
            let ty = self.element_type(&attr)?.unwrap_or(BaseType::VOID);
            let slot = slot.to_owned();
            attr.residual = Some(self.emit(|result| IrInstr::Project {
                result,
                base,
                slot,
                ty,
            }));
        }
        Ok(attr)
    }

    // -----------------------------------------------------------------------
    // Apply, project, call
    // -----------------------------------------------------------------------

    /// Applies a function to an argument. The result's type is the
    /// function body under the function's substitution extended with the
    /// argument. Runtime-wise an application only extends a partial chain;
    /// nothing is emitted until the chain is used as a value.
    pub(crate) fn reduce_apply(
        &mut self,
        expr: ExprId,
        func: ExprId,
        arg: Option<ExprId>,
        kind: ApplyKind,
    ) -> Result<Attr, LowerError> {
        let fa = self.traverse(func, TraverseKind::Arg)?;
        let target = match &fa.ty {
            Some(TypeRef::Expr(e)) => match self.arena.expr(*e) {
                Expr::Function { decl, body } => Some((*decl, *body)),
                _ => None,
            },
            _ => None,
        };
        let Some((param, body)) = target else {
            if !fa.is_poison() {
                let found = self.describe(&fa);
                self.report(DiagnosticKind::NotAFunction { found }, expr);
            }
            return Ok(Attr::poison());
        };

        // A self-application passes the function to itself.
        let self_apply = !matches!((kind, arg), (ApplyKind::Normal, Some(_)));
        let aa = match arg {
            Some(arg) if !self_apply => self.traverse(arg, TraverseKind::Arg)?,
            _ => fa.clone(),
        };

        let residual = if self.mode == EvalMode::Full {
            let (head, mut args) = match &fa.residual {
                Some(Residual::Partial { head, args }) => (head.clone(), args.clone()),
                _ => (self.materialize(&fa)?, Vec::new()),
            };
            let arg_op = if self_apply {
                head.clone()
            } else {
                self.materialize(&aa)?
            };
            args.push(arg_op);
            Some(Residual::Partial { head, args })
        } else {
            None
        };

        let mut subst = fa.subst.clone();
        subst.push(Binding {
            decl: Some(param),
            attr: Some(aa),
        });
        let mut attr = Attr {
            residual,
            relation: fa.relation,
            ty: Some(TypeRef::Expr(body)),
            subst,
        };
        self.evaluate_type_expr(&mut attr)?;
        Ok(attr)
    }

    pub(crate) fn reduce_project(
        &mut self,
        expr: ExprId,
        record: ExprId,
        slot: &str,
    ) -> Result<Attr, LowerError> {
        let arena = self.arena;
        let ra = self.traverse(record, TraverseKind::Arg)?;
        let record_expr = match &ra.ty {
            Some(TypeRef::Expr(e)) if matches!(arena.expr(*e), Expr::Record { .. }) => Some(*e),
            _ => None,
        };
        let Some(record_expr) = record_expr else {
            if !ra.is_poison() {
                let found = self.describe(&ra);
                self.report(DiagnosticKind::NotARecord { found }, expr);
            }
            return Ok(Attr::poison());
        };
        let Some(slot_def) = arena.find_slot(record_expr, slot).map(|s| s.definition) else {
            self.report(DiagnosticKind::SlotNotFound { slot: slot.to_owned() }, expr);
            return Ok(Attr::poison());
        };

        let mut attr = Attr {
            residual: None,
            relation: ra.relation,
            ty: Some(TypeRef::Expr(slot_def)),
            subst: ra.subst.clone(),
        };
        self.evaluate_type_expr(&mut attr)?;

        if self.mode == EvalMode::Full {
            let base = self.materialize(&ra)?;
            let ty = self.element_type(&attr)?.unwrap_or(BaseType::VOID);
            let slot = slot.to_owned();
            attr.residual = Some(self.emit(|result| IrInstr::Project {
                result,
                base,
                slot,
                ty,
            }));
        }
        Ok(attr)
    }

    /// Calls a code value. Calls into a nested function of the current
    /// graph become jumps; calls into a graph job become direct calls.
    pub(crate) fn reduce_call(&mut self, expr: ExprId, target: ExprId) -> Result<Attr, LowerError> {
        let arena = self.arena;
        let ta = self.traverse(target, TraverseKind::Arg)?;
        let code = match &ta.ty {
            Some(TypeRef::Expr(e)) => match arena.expr(*e) {
                Expr::Code { return_type, .. } => Some((*e, *return_type)),
                _ => None,
            },
            _ => None,
        };
        let Some((code, return_type)) = code else {
            if !ta.is_poison() {
                let found = self.describe(&ta);
                self.report(DiagnosticKind::NotACodeBlock { found }, expr);
            }
            return Ok(Attr::poison());
        };

        if let Some(attr) = self.nested_call(expr, code, &ta)? {
            return Ok(attr);
        }

        let mut attr = Attr {
            residual: None,
            relation: Relation::ApproximateType,
            ty: Some(TypeRef::Expr(return_type)),
            subst: ta.subst.clone(),
        };
        self.evaluate_type_expr(&mut attr)?;

        if self.mode == EvalMode::Full {
            let job = self.function_map.get(&code).copied();
            let (callee, args) = match job {
                Some(id) => (Operand::Function(id), self.runtime_args(&ta)),
                None => (self.materialize(&ta)?, Vec::new()),
            };
            let ty = self.element_type(&attr)?.unwrap_or(BaseType::VOID);
            attr.residual = Some(self.emit(|result| IrInstr::Call {
                result,
                callee,
                args,
                ty,
            }));
        }
        Ok(attr)
    }

    /// Applied arguments that correspond to entry-block parameters of a
    /// graph job; self arguments are static and dropped.
    fn runtime_args(&self, ta: &Attr) -> Vec<Operand> {
        let Some(Residual::Partial { args, .. }) = &ta.residual else {
            return Vec::new();
        };
        ta.subst
            .applied()
            .zip(args)
            .filter(|(binding, _)| {
                binding
                    .decl
                    .map_or(true, |d| self.arena.decl(d).kind != DeclKind::SelfFun)
            })
            .map(|(_, arg)| arg.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Memory
    // -----------------------------------------------------------------------

    pub(crate) fn reduce_alloc(&mut self, expr: ExprId, init: ExprId) -> Result<Attr, LowerError> {
        let ia = self.traverse(init, TraverseKind::Arg)?;
        if ia.is_poison() {
            return Ok(Attr::poison());
        }
        let Some(elem) = self.scalar_type(&ia) else {
            self.report(DiagnosticKind::AllocNotAValue, expr);
            return Ok(Attr::poison());
        };
        let init = self.materialize(&ia)?;
        let residual = self.emit(|result| IrInstr::Alloc {
            result,
            init,
            ty: BaseType::ADDR,
        });
        Ok(Attr {
            residual: Some(residual),
            relation: Relation::ApproximateType,
            ty: Some(TypeRef::Cell(elem)),
            subst: Subst::default(),
        })
    }

    pub(crate) fn reduce_load(&mut self, expr: ExprId, addr: ExprId) -> Result<Attr, LowerError> {
        let arena = self.arena;
        let aa = self.traverse(addr, TraverseKind::Arg)?;
        if aa.is_poison() {
            return Ok(Attr::poison());
        }
        if aa.as_literal().is_some_and(|lit| lit.ty.dtype == DType::Addr) {
            self.report(
                DiagnosticKind::UnsupportedConstruct {
                    detail: "load through a literal address".to_owned(),
                },
                expr,
            );
            return Ok(Attr::poison());
        }
        let elem = match &aa.ty {
            Some(TypeRef::Cell(bt)) => Some(*bt),
            Some(TypeRef::Expr(e)) => match arena.expr(*e) {
                Expr::Field { range, .. } => {
                    let mut range_attr = Attr {
                        ty: Some(TypeRef::Expr(*range)),
                        subst: aa.subst.clone(),
                        ..Attr::default()
                    };
                    self.evaluate_type_expr(&mut range_attr)?;
                    self.element_type(&range_attr)?
                }
                _ => None,
            },
            _ => None,
        };
        let Some(elem) = elem else {
            let found = self.describe(&aa);
            self.report(DiagnosticKind::NotAField { found }, expr);
            return Ok(Attr::poison());
        };

        let addr = self.materialize(&aa)?;
        let residual = self.emit(|result| IrInstr::Load {
            result,
            addr,
            ty: elem,
        });
        Ok(Attr::value(residual, elem))
    }
}
