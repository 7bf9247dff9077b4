//! Reduction attributes and the binding environment.
//!
//! A `Scope` maps binder positions (de Bruijn levels) to the attribute the
//! binder was reduced to. Bindings live in a persistent `im::Vector`, so
//! cloning a scope for a deferred nested-function body is O(1) and the
//! clone shares no mutable state with the original.

use im::Vector;

use crate::ast::{DeclId, ExprId};
use crate::ir::block::BlockId;
use crate::ir::function::FunctionId;
use crate::ir::instr::Operand;
use crate::ir::types::{BaseType, Literal};
use crate::ir::value::ValueId;

/// How precisely an attribute's type characterizes the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Relation {
    /// The type is the value itself.
    #[default]
    Equivalent,
    /// The value is some inhabitant of the type.
    ApproximateType,
    /// The value is exactly described by the type (self parameters).
    ExactType,
}

/// A type, possibly still unevaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    /// A concrete element type.
    Base(BaseType),
    /// A source expression, meaningful under the attribute's substitution.
    Expr(ExprId),
    /// An allocated cell holding values of the given element type.
    Cell(BaseType),
}

/// What a reduced expression left behind.
#[derive(Debug, Clone, PartialEq)]
pub enum Residual {
    Value(ValueId),
    Literal(Literal),
    /// Poison from a recovered error.
    Undefined,
    /// An unsubstituted binder.
    Var(DeclId),
    /// A function, record, field or type with no runtime representation.
    Static(ExprId),
    /// A code block compiled as its own graph.
    Function(FunctionId),
    /// An apply chain not yet materialized as an instruction.
    Partial { head: Operand, args: Vec<Operand> },
    /// An instruction computed while emission was disabled.
    Unemitted,
}

#[derive(Debug, Clone, Default)]
pub struct Attr {
    pub residual: Option<Residual>,
    pub relation: Relation,
    pub ty: Option<TypeRef>,
    pub subst: Subst,
}

impl Attr {
    pub fn poison() -> Self {
        Self {
            residual: Some(Residual::Undefined),
            ..Self::default()
        }
    }

    pub fn literal(lit: Literal) -> Self {
        Self {
            residual: Some(Residual::Literal(lit)),
            relation: Relation::Equivalent,
            ty: Some(TypeRef::Base(lit.ty)),
            subst: Subst::default(),
        }
    }

    /// A runtime value of a concrete element type.
    pub fn value(residual: Residual, ty: BaseType) -> Self {
        Self {
            residual: Some(residual),
            relation: Relation::ApproximateType,
            ty: Some(TypeRef::Base(ty)),
            subst: Subst::default(),
        }
    }

    /// The weak-head form of a value expression: its type is itself.
    pub fn type_value(expr: ExprId, residual: Option<Residual>, subst: Subst) -> Self {
        Self {
            residual,
            relation: Relation::Equivalent,
            ty: Some(TypeRef::Expr(expr)),
            subst,
        }
    }

    pub fn is_poison(&self) -> bool {
        matches!(self.residual, Some(Residual::Undefined))
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.residual {
            Some(Residual::Literal(l)) => Some(l),
            _ => None,
        }
    }
}

/// One environment slot. `attr == None` marks an opaque (null) position.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    pub decl: Option<DeclId>,
    pub attr: Option<Attr>,
}

/// A delayed substitution: the bindings a type expression must be evaluated
/// under. Entries past `base_len` were pushed by applications.
#[derive(Debug, Clone, Default)]
pub struct Subst {
    vars: Vector<Binding>,
    base_len: usize,
}

impl Subst {
    /// `n` opaque positions.
    pub fn null(n: usize) -> Self {
        Self {
            vars: (0..n).map(|_| Binding::default()).collect(),
            base_len: n,
        }
    }

    pub fn push(&mut self, binding: Binding) {
        self.vars.push_back(binding);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Number of arguments applied since the substitution was captured.
    pub fn num_subst_vars(&self) -> usize {
        self.vars.len() - self.base_len
    }

    /// Bindings pushed by applications, in application order.
    pub fn applied(&self) -> impl Iterator<Item = &Binding> {
        self.vars.iter().skip(self.base_len)
    }
}

/// Where control goes once a tail-position value is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Jump to a block with exactly one parameter.
    Block(BlockId),
    /// Leave the function.
    Return,
}

/// The binding stack plus the ambient continuation.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: Vector<Binding>,
    continuation: Option<Continuation>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope of `n` opaque positions.
    pub fn null(n: usize) -> Self {
        Self::from_subst(&Subst::null(n))
    }

    pub fn from_subst(subst: &Subst) -> Self {
        Self {
            bindings: subst.vars.clone(),
            continuation: None,
        }
    }

    pub fn enter(&mut self, decl: DeclId, attr: Attr) {
        self.bindings.push_back(Binding {
            decl: Some(decl),
            attr: Some(attr),
        });
    }

    pub fn enter_null(&mut self, decl: DeclId) {
        self.bindings.push_back(Binding {
            decl: Some(decl),
            attr: None,
        });
    }

    pub fn exit(&mut self) {
        self.bindings.pop_back();
    }

    pub fn var(&self, position: usize) -> Option<&Binding> {
        self.bindings.get(position)
    }

    pub fn is_null(&self, position: usize) -> bool {
        self.bindings
            .get(position)
            .map_or(true, |b| b.attr.is_none())
    }

    /// Replaces the attribute bound at `position`, keeping its declaration.
    pub fn rebind(&mut self, position: usize, attr: Attr) {
        if let Some(binding) = self.bindings.get_mut(position) {
            binding.attr = Some(attr);
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Snapshot of the current bindings with nothing applied yet.
    pub fn substitution(&self) -> Subst {
        Subst {
            vars: self.bindings.clone(),
            base_len: self.bindings.len(),
        }
    }

    pub fn continuation(&self) -> Option<Continuation> {
        self.continuation
    }

    /// Installs a continuation and returns the previous one.
    pub fn set_continuation(&mut self, cont: Option<Continuation>) -> Option<Continuation> {
        std::mem::replace(&mut self.continuation, cont)
    }
}
