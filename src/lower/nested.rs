//! Nested functions compiled as extra blocks of the enclosing graph.
//!
//! A `code` value reached while a graph is being built is not a closure: it
//! becomes a pending block whose parameters are the function binders from
//! the nearest nested-function boundary inward. Its body is not reduced at
//! the definition site. Tail calls to it become `goto`s; the first call fixes
//! the block's continuation and queues the block. Once the graph's direct
//! control flow is done, queued blocks are drained FIFO against a snapshot
//! of the environment at their definition site. Draining may queue more.
//!
//! A nested function that is never called never gets a block.

use std::collections::{HashMap, VecDeque};

use crate::ast::{DeclKind, Expr, ExprId};
use crate::error::{DiagnosticKind, LowerError};
use crate::ir::block::BlockId;
use crate::ir::instr::{Operand, Terminator};
use crate::ir::types::BaseType;
use crate::ir::value::ValueId;

use super::scope::{Attr, Continuation, Relation, Residual, Scope, TypeRef};
use super::{Lowerer, TraverseKind};

struct PendingBlock {
    name: String,
    body: ExprId,
    /// Environment at the definition site with parameter positions rebound
    /// to the block parameters.
    env: Scope,
    /// Pre-allocated block parameters, one per binder position.
    params: Vec<(ValueId, Option<BaseType>)>,
    /// Allocated on the first call.
    block: Option<BlockId>,
    /// Fixed by the first call; never changes afterwards.
    cont: Option<Continuation>,
}

/// Pending blocks of one graph, indexed by the code expression they compile.
#[derive(Default)]
pub(crate) struct PendingBlocks {
    blocks: Vec<PendingBlock>,
    queue: VecDeque<usize>,
    index: HashMap<ExprId, usize>,
}

impl PendingBlocks {
    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }
}

impl<'a> Lowerer<'a> {
    /// Registers `code` as a pending block of the current graph. Binder
    /// positions `base..` become its parameters.
    pub(crate) fn register_nested(&mut self, code: ExprId, base: usize) -> Result<(), LowerError> {
        if self.pending.index.contains_key(&code) {
            return Ok(());
        }
        let arena = self.arena;
        let Expr::Code {
            return_type,
            body: Some(body),
        } = arena.expr(code)
        else {
            return Ok(());
        };

        // Only the return type is reduced here; the body waits for a call.
        self.traverse(*return_type, TraverseKind::Type)?;

        let depth = self.scope.len();
        let mut env = self.scope.clone();
        let mut params = Vec::with_capacity(depth.saturating_sub(base));
        for position in base..depth {
            let decl = self.scope.var(position).and_then(|b| b.decl);
            let value = self.builder_mut()?.fresh_value();
            match decl {
                Some(decl) if arena.decl(decl).kind == DeclKind::SelfFun => {
                    params.push((value, Some(BaseType::ADDR)));
                }
                Some(decl) => {
                    let mut attr = self.promote_variable(decl)?;
                    let ty = self.element_type(&attr)?;
                    attr.residual = Some(Residual::Value(value));
                    attr.relation = Relation::ApproximateType;
                    env.rebind(position, attr);
                    params.push((value, ty));
                }
                None => params.push((value, None)),
            }
        }

        let name = self.name_hint.clone().unwrap_or_else(|| "nested".to_owned());
        log::debug!(
            "register nested function '{}' for code {} with {} params",
            name,
            code,
            params.len()
        );
        let id = self.pending.blocks.len();
        self.pending.blocks.push(PendingBlock {
            name,
            body: *body,
            env,
            params,
            block: None,
            cont: None,
        });
        self.pending.index.insert(code, id);
        Ok(())
    }

    /// Compiles a call into a pending block as a jump. Returns `None` when
    /// `code` is not a pending block of the current graph.
    pub(crate) fn nested_call(
        &mut self,
        expr: ExprId,
        code: ExprId,
        target: &Attr,
    ) -> Result<Option<Attr>, LowerError> {
        if !self.is_active() {
            return Ok(None);
        }
        let Some(&id) = self.pending.index.get(&code) else {
            return Ok(None);
        };

        let Some(cont) = self.scope.continuation() else {
            self.report(DiagnosticKind::MustBeTailCall, expr);
            return Ok(Some(Attr::poison()));
        };
        let expected = self.pending.blocks[id].params.len();
        let found = target.subst.num_subst_vars();
        if expected != found {
            self.report(DiagnosticKind::ArityMismatch { expected, found }, expr);
            return Ok(Some(Attr::poison()));
        }

        let block = match (self.pending.blocks[id].cont, self.pending.blocks[id].block) {
            (Some(fixed), Some(block)) if fixed == cont => block,
            (Some(_), _) => {
                self.report(DiagnosticKind::NotAValidCfg, expr);
                return Ok(Some(Attr::poison()));
            }
            (None, _) => {
                let pending = &mut self.pending.blocks[id];
                pending.cont = Some(cont);
                let builder = self.builder.as_mut().ok_or(LowerError::NoOpenBlock)?;
                let block = builder.create_block_with_params(Some(&pending.name), &pending.params);
                pending.block = Some(block);
                self.pending.queue.push_back(id);
                log::debug!("enqueue nested block {} with continuation {:?}", block, cont);
                block
            }
        };

        let mut args = Vec::new();
        for (index, arg) in self.jump_args(target).into_iter().enumerate() {
            args.push(self.coerce_to_param(expr, block, index, arg, |param, arg| {
                DiagnosticKind::TypeMismatch {
                    expected: param.to_string(),
                    found: arg.to_string(),
                }
            })?);
        }
        self.builder_mut()?.finish_block(Terminator::Goto {
            target: block,
            args,
        })?;
        Ok(Some(Attr::default()))
    }

    /// Arguments of a jump into a pending block. Functions and self
    /// references are statically resolved and passed as placeholders.
    fn jump_args(&self, target: &Attr) -> Vec<Operand> {
        let Some(Residual::Partial { args, .. }) = &target.residual else {
            return Vec::new();
        };
        target
            .subst
            .applied()
            .zip(args)
            .map(|(binding, arg)| {
                let static_type = binding.attr.as_ref().is_some_and(|a| match &a.ty {
                    Some(TypeRef::Expr(e)) => matches!(
                        self.arena.expr(*e),
                        Expr::Function { .. } | Expr::Code { .. }
                    ),
                    _ => false,
                });
                match arg {
                    Operand::Static(_) | Operand::Function(_) | Operand::Var(_) => Operand::Undef,
                    _ if static_type => Operand::Undef,
                    other => other.clone(),
                }
            })
            .collect()
    }

    /// Lowers every queued pending block of the current graph.
    pub(crate) fn drain_pending(&mut self) -> Result<(), LowerError> {
        while let Some(id) = self.pending.queue.pop_front() {
            let pending = &self.pending.blocks[id];
            let (Some(block), Some(cont)) = (pending.block, pending.cont) else {
                continue;
            };
            let (env, body) = (pending.env.clone(), pending.body);
            log::debug!("drain nested block {} '{}'", block, pending.name);

            let outer = std::mem::replace(&mut self.scope, env);
            self.scope.set_continuation(Some(cont));
            let result = self
                .builder_mut()
                .and_then(|b| b.begin_block(block))
                .and_then(|()| self.traverse(body, TraverseKind::Tail));
            self.scope = outer;
            result?;
        }
        log::debug!("discarding {} pending blocks", self.pending.len());
        self.pending = PendingBlocks::default();
        Ok(())
    }
}
