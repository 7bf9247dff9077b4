//! Expression tree → CFG lowering.
//!
//! The lowerer walks the expression arena once, threading a continuation
//! through tail positions. A tail-position value never returns up the walk
//! when a continuation is set: it terminates the open block with a `goto`
//! (or `return`) instead. Every reduced expression also yields an [`Attr`]
//! carrying its type, which may stay an unevaluated expression under a
//! delayed substitution until an instruction needs a concrete element type.
//!
//! `code` expressions met outside any graph become graph jobs, each lowered
//! into its own `IrFunction`. `code` expressions met inside a graph become
//! pending blocks of that graph (see [`nested`]).

pub mod branch;
pub mod fold;
pub mod nested;
pub mod reduce;
pub mod scope;

pub use scope::{Attr, Binding, Continuation, Relation, Residual, Scope, Subst, TypeRef};

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ast::{DeclKind, Expr, ExprArena, ExprId};
use crate::diagnostics::Diagnostics;
use crate::error::{DiagnosticKind, LowerError};
use crate::ir::block::BlockId;
use crate::ir::function::FunctionId;
use crate::ir::instr::{IrInstr, Operand, Terminator};
use crate::ir::module::{IrFunctionBuilder, IrModule};
use crate::ir::types::BaseType;
use crate::ir::value::ValueId;

use nested::PendingBlocks;

/// Position of the expression being traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseKind {
    /// The value flows to the ambient continuation.
    Tail,
    /// Non-tail value position.
    Arg,
    /// Pure type computation; nothing is emitted.
    Type,
    /// Definition of a binder.
    Decl,
    /// Skipped.
    Lazy,
}

/// Full reduction emits code; weak-head reduction only computes the
/// outermost constructor of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Full,
    WeakHead,
}

/// Output of lowering one compilation unit.
#[derive(Debug)]
pub struct Lowered {
    pub module: IrModule,
    pub diagnostics: Diagnostics,
}

/// A `code` expression reached outside any graph, lowered later into its
/// own function.
struct GraphJob {
    id: FunctionId,
    name: String,
    code: ExprId,
    /// Scope depth of the outermost function binder whose parameters become
    /// entry-block parameters.
    base: usize,
    env: Scope,
}

/// Lower the expression rooted at `root` into an `IrModule`.
///
/// Recoverable errors are collected in the returned diagnostics; only broken
/// lowering invariants produce `Err`.
pub fn lower(arena: &ExprArena, root: ExprId, module_name: &str) -> Result<Lowered, LowerError> {
    let mut lowerer = Lowerer::new(arena, module_name);
    lowerer.traverse(root, TraverseKind::Decl)?;
    while let Some(job) = lowerer.jobs.pop_front() {
        lowerer.run_job(job)?;
    }
    Ok(Lowered {
        module: lowerer.module,
        diagnostics: lowerer.diags,
    })
}

pub(crate) struct Lowerer<'a> {
    arena: &'a ExprArena,
    module: IrModule,
    diags: Diagnostics,
    scope: Scope,
    mode: EvalMode,
    /// Mirrors the builder's emission flag while no graph is open.
    emit: bool,
    /// Builder of the graph under construction, if any.
    builder: Option<IrFunctionBuilder>,
    /// Pending blocks of the graph under construction.
    pending: PendingBlocks,
    jobs: VecDeque<GraphJob>,
    /// Code expression → the function it is compiled to.
    function_map: HashMap<ExprId, FunctionId>,
    function_names: HashSet<String>,
    next_function: u32,
    /// Binder name of the innermost let definition being traversed.
    name_hint: Option<String>,
    /// Nonzero while expressions are reduced a second time for their type
    /// only; diagnostics are dropped.
    quiet: usize,
}

impl<'a> Lowerer<'a> {
    fn new(arena: &'a ExprArena, module_name: &str) -> Self {
        Self {
            arena,
            module: IrModule::new(module_name),
            diags: Diagnostics::new(),
            scope: Scope::new(),
            mode: EvalMode::Full,
            emit: true,
            builder: None,
            pending: PendingBlocks::default(),
            jobs: VecDeque::new(),
            function_map: HashMap::new(),
            function_names: HashSet::new(),
            next_function: 0,
            name_hint: None,
            quiet: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Traversal driver
    // -----------------------------------------------------------------------

    /// Reduces `expr` in position `kind`.
    ///
    /// Non-tail positions run with the continuation cleared. A tail-position
    /// result that reaches an open block with a continuation set terminates
    /// that block and yields an empty attribute.
    pub(crate) fn traverse(&mut self, expr: ExprId, kind: TraverseKind) -> Result<Attr, LowerError> {
        if kind == TraverseKind::Lazy {
            return Ok(Attr::default());
        }

        let saved = self.scope.continuation();
        if kind != TraverseKind::Tail {
            self.scope.set_continuation(None);
        }
        let prev_emit = (kind == TraverseKind::Type).then(|| self.set_emit(false));

        let result = self.dispatch(expr, kind);

        if let Some(prev) = prev_emit {
            self.set_emit(prev);
        }
        self.scope.set_continuation(saved);
        let attr = result?;

        if kind != TraverseKind::Tail || !self.is_active() {
            return Ok(attr);
        }
        match saved {
            Some(cont) => {
                let value = self.materialize(&attr)?;
                self.jump_to(expr, cont, value)?;
                Ok(Attr::default())
            }
            None => Ok(attr),
        }
    }

    fn dispatch(&mut self, expr: ExprId, kind: TraverseKind) -> Result<Attr, LowerError> {
        let weak = self.mode == EvalMode::WeakHead;
        let arena = self.arena;
        match arena.expr(expr) {
            Expr::Literal(lit) => Ok(Attr::literal(*lit)),
            Expr::ScalarType(_) => {
                let residual = (!weak).then_some(Residual::Static(expr));
                Ok(Attr::type_value(expr, residual, Subst::default()))
            }
            Expr::Variable(decl) => self.reduce_variable(*decl),
            Expr::Identifier(name) => self.reduce_identifier(expr, name),
            Expr::Apply { func, arg, kind: apply_kind } => {
                self.reduce_apply(expr, *func, *arg, *apply_kind)
            }
            Expr::Project { record, slot } => self.reduce_project(expr, *record, slot),
            Expr::Call { target } => self.reduce_call(expr, *target),
            Expr::Let { decl, body } => self.reduce_let(*decl, *body, kind),
            Expr::IfThenElse {
                cond,
                then_expr,
                else_expr,
            } => self.compile_branch(expr, *cond, *then_expr, *else_expr),
            Expr::Function { .. } if weak => Ok(self.type_value(expr)),
            Expr::Function { .. } => self.traverse_function(expr, None),
            Expr::Code { .. } if weak => Ok(self.type_value(expr)),
            Expr::Code { .. } => {
                let base = self.scope.len();
                self.define_code(expr, base)
            }
            Expr::Record { .. } if weak => Ok(self.type_value(expr)),
            Expr::Record { slots } => {
                if self.builder.is_none() {
                    for slot in slots {
                        self.traverse(slot.definition, TraverseKind::Decl)?;
                    }
                }
                Ok(self.static_value(expr))
            }
            Expr::Field { .. } if weak => Ok(self.type_value(expr)),
            Expr::Field { .. } => Ok(self.static_value(expr)),
            Expr::Alloc { init } => self.reduce_alloc(expr, *init),
            Expr::Load { addr } => self.reduce_load(expr, *addr),
            Expr::UnaryOp { op, operand } => self.reduce_unary(expr, *op, *operand),
            Expr::BinaryOp { op, lhs, rhs } => self.reduce_binary(expr, *op, *lhs, *rhs),
            Expr::Future(inner) => self.traverse(*inner, kind),
            Expr::Undefined => Ok(Attr::poison()),
        }
    }

    fn type_value(&self, expr: ExprId) -> Attr {
        Attr::type_value(expr, None, self.scope.substitution())
    }

    fn static_value(&self, expr: ExprId) -> Attr {
        Attr::type_value(expr, Some(Residual::Static(expr)), self.scope.substitution())
    }

    /// `let x = def in body`: the body is reduced in the let's own position.
    fn reduce_let(
        &mut self,
        decl: crate::ast::DeclId,
        body: ExprId,
        kind: TraverseKind,
    ) -> Result<Attr, LowerError> {
        let arena = self.arena;
        let var = arena.decl(decl);
        let def_attr = match var.definition {
            Some(def) => {
                let outer_hint = self.name_hint.replace(var.name.clone());
                let attr = self.traverse(def, TraverseKind::Decl);
                self.name_hint = outer_hint;
                attr?
            }
            None => Attr::poison(),
        };
        if let (Some(Residual::Value(v)), Some(builder)) = (&def_attr.residual, &mut self.builder) {
            builder.set_value_name(*v, var.name.clone());
        }

        self.scope.enter(decl, def_attr);
        let result = self.traverse(body, kind);
        self.scope.exit();
        result
    }

    // -----------------------------------------------------------------------
    // Functions and code blocks
    // -----------------------------------------------------------------------

    /// Walks a chain of function binders down to its body. A `code` body
    /// becomes a graph job or a pending block whose parameters are the
    /// binders from `base` inward; any other body is only type-checked.
    fn traverse_function(&mut self, expr: ExprId, base: Option<usize>) -> Result<Attr, LowerError> {
        let arena = self.arena;
        let Expr::Function { decl, body } = arena.expr(expr) else {
            return Err(LowerError::NotAValue {
                construct: arena.expr(expr).construct(),
            });
        };
        let (decl, body) = (*decl, *body);
        let base = base.unwrap_or(self.scope.len());
        let subst = self.scope.substitution();

        self.scope.enter_null(decl);
        let result = match arena.expr(body) {
            Expr::Function { .. } => self.traverse_function(body, Some(base)).map(drop),
            Expr::Code { .. } => self.define_code(body, base).map(drop),
            _ => {
                let prev = self.set_emit(false);
                let attr = self.traverse(body, TraverseKind::Decl);
                self.set_emit(prev);
                attr.map(drop)
            }
        };
        self.scope.exit();
        result?;

        Ok(Attr::type_value(expr, Some(Residual::Static(expr)), subst))
    }

    /// A `code` value in full reduction.
    fn define_code(&mut self, code: ExprId, base: usize) -> Result<Attr, LowerError> {
        let arena = self.arena;
        let Expr::Code { body, .. } = arena.expr(code) else {
            return Err(LowerError::NotAValue {
                construct: arena.expr(code).construct(),
            });
        };
        let has_body = body.is_some();
        let subst = self.scope.substitution();

        if has_body && self.builder.is_some() && self.is_active() {
            self.register_nested(code, base)?;
            return Ok(Attr::type_value(code, Some(Residual::Static(code)), subst));
        }
        if has_body && self.builder.is_none() && self.emit {
            let id = self.enqueue_job(code, base);
            return Ok(Attr::type_value(code, Some(Residual::Function(id)), subst));
        }
        Ok(Attr::type_value(code, Some(Residual::Static(code)), subst))
    }

    fn enqueue_job(&mut self, code: ExprId, base: usize) -> FunctionId {
        if let Some(&id) = self.function_map.get(&code) {
            return id;
        }
        let id = FunctionId(self.next_function);
        self.next_function += 1;

        let name = match self.name_hint.clone() {
            Some(hint) if !self.function_names.contains(&hint) => hint,
            Some(hint) => format!("{}.{}", hint, id.0),
            None => format!("fn{}", id.0),
        };
        self.function_names.insert(name.clone());
        self.function_map.insert(code, id);

        log::debug!("enqueue graph job {} '{}' for code {}", id, name, code);
        self.jobs.push_back(GraphJob {
            id,
            name,
            code,
            base,
            env: self.scope.clone(),
        });
        id
    }

    /// Lowers one graph job into a function of the module.
    fn run_job(&mut self, job: GraphJob) -> Result<(), LowerError> {
        let arena = self.arena;
        let Expr::Code {
            return_type,
            body: Some(body),
        } = arena.expr(job.code)
        else {
            return Err(LowerError::NotAValue {
                construct: arena.expr(job.code).construct(),
            });
        };
        let (return_type, body) = (*return_type, *body);
        log::debug!("lowering graph job {} '{}'", job.id, job.name);

        let outer_scope = std::mem::replace(&mut self.scope, job.env);
        self.builder = Some(IrFunctionBuilder::new(job.name.clone(), BaseType::VOID));
        self.pending = PendingBlocks::default();

        // 1. Return type, computed with nothing emitted.
        let ret_attr = self.traverse(return_type, TraverseKind::Type)?;
        let ret_ty = self.element_type(&ret_attr)?.unwrap_or(BaseType::VOID);

        // 2. Entry block: one parameter per function binder; self binders
        //    stay opaque.
        let entry = self.builder_mut()?.create_block(Some("entry"), 0);
        for position in job.base..self.scope.len() {
            let Some(decl) = self.scope.var(position).and_then(|b| b.decl) else {
                continue;
            };
            let var = arena.decl(decl);
            if var.kind != DeclKind::Fun {
                continue;
            }
            let mut attr = self.promote_variable(decl)?;
            let ty = self.element_type(&attr)?;
            let builder = self.builder_mut()?;
            let param = builder.add_block_param(entry, Some(&var.name), ty);
            attr.residual = Some(Residual::Value(param));
            attr.relation = Relation::ApproximateType;
            self.scope.rebind(position, attr);
        }

        // 3. Body in tail position, returning from the function.
        self.builder_mut()?.begin_block(entry)?;
        self.scope.set_continuation(Some(Continuation::Return));
        self.traverse(body, TraverseKind::Tail)?;

        // 4. Nested functions reached by the body.
        self.drain_pending()?;

        self.scope = outer_scope;
        let mut builder = self.builder.take().ok_or(LowerError::NoOpenBlock)?;
        builder.set_return_type(ret_ty);
        let func = builder.build()?;
        log::debug!(
            "finished graph job {} '{}': {} blocks, {} instructions",
            job.id,
            func.name,
            func.blocks().len(),
            func.instr_count()
        );
        let id = self.module.add_function(func)?;
        debug_assert_eq!(id, job.id, "graph jobs must be added in enqueue order");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Builder access
    // -----------------------------------------------------------------------

    fn builder_mut(&mut self) -> Result<&mut IrFunctionBuilder, LowerError> {
        self.builder.as_mut().ok_or(LowerError::NoOpenBlock)
    }

    /// True when a graph is under construction with an open block and
    /// emission enabled.
    pub(crate) fn is_active(&self) -> bool {
        self.builder.as_ref().is_some_and(|b| b.is_active())
    }

    /// Switches emission on or off, returning the previous setting.
    pub(crate) fn set_emit(&mut self, emit: bool) -> bool {
        if let Some(builder) = &mut self.builder {
            builder.set_emit(emit);
        }
        std::mem::replace(&mut self.emit, emit)
    }

    /// Appends the instruction built by `make` to the open block.
    pub(crate) fn emit(&mut self, make: impl FnOnce(ValueId) -> IrInstr) -> Residual {
        match &mut self.builder {
            Some(builder) if builder.is_active() => {
                let result = builder.fresh_value();
                builder.push_instr(make(result));
                Residual::Value(result)
            }
            _ => Residual::Unemitted,
        }
    }

    /// Turns an attribute's residual into an operand, emitting an `apply`
    /// for a pending partial application.
    pub(crate) fn materialize(&mut self, attr: &Attr) -> Result<Operand, LowerError> {
        let operand = match &attr.residual {
            None | Some(Residual::Undefined) | Some(Residual::Unemitted) => Operand::Undef,
            Some(Residual::Value(v)) => Operand::Value(*v),
            Some(Residual::Literal(lit)) => Operand::Const(*lit),
            Some(Residual::Var(decl)) => Operand::Var(*decl),
            Some(Residual::Static(expr)) => Operand::Static(*expr),
            Some(Residual::Function(id)) => Operand::Function(*id),
            Some(Residual::Partial { head, args }) => {
                let ty = self.element_type(attr)?.unwrap_or(BaseType::ADDR);
                let (func, args) = (head.clone(), args.clone());
                match self.emit(|result| IrInstr::Apply {
                    result,
                    func,
                    args,
                    ty,
                }) {
                    Residual::Value(v) => Operand::Value(v),
                    _ => Operand::Undef,
                }
            }
        };
        Ok(operand)
    }

    /// Terminates the open block by passing `value` to `cont`. A value
    /// narrower than the target's parameter is widened first.
    pub(crate) fn jump_to(
        &mut self,
        expr: ExprId,
        cont: Continuation,
        value: Operand,
    ) -> Result<(), LowerError> {
        let term = match cont {
            Continuation::Block(target) => {
                let value = self.coerce_to_param(expr, target, 0, value, |param, arg| {
                    DiagnosticKind::IncompatibleTypes {
                        op: "if".to_owned(),
                        lhs: param.to_string(),
                        rhs: arg.to_string(),
                    }
                })?;
                Terminator::Goto {
                    target,
                    args: vec![value],
                }
            }
            Continuation::Return => Terminator::Return { value },
        };
        self.builder_mut()?.finish_block(term)?;
        Ok(())
    }

    /// Fits `value` to the `index`-th parameter of `target`: equal types pass,
    /// a narrower type is widened, anything else is reported through
    /// `mismatch` and replaced by `undef`.
    pub(crate) fn coerce_to_param(
        &mut self,
        expr: ExprId,
        target: BlockId,
        index: usize,
        value: Operand,
        mismatch: impl FnOnce(BaseType, BaseType) -> DiagnosticKind,
    ) -> Result<Operand, LowerError> {
        let builder = self.builder_mut()?;
        let (Some(param_ty), Some(arg_ty)) = (builder.param_type(target, index), builder.operand_type(&value))
        else {
            return Ok(value);
        };
        if param_ty == arg_ty {
            return Ok(value);
        }
        if let Some(cast) = fold::widening_cast(arg_ty, param_ty) {
            return Ok(self.widen(value, arg_ty, param_ty, cast));
        }
        self.report(mismatch(param_ty, arg_ty), expr);
        Ok(Operand::Undef)
    }

    pub(crate) fn report(&mut self, kind: DiagnosticKind, expr: ExprId) {
        if self.quiet > 0 {
            log::trace!("dropped while computing a type: {}", kind);
            return;
        }
        self.diags.report(kind, expr);
    }
}
