//! Input data model: an immutable expression arena plus binder declarations.
//!
//! Expressions are addressed by `ExprId` and binders by `DeclId`. Both are
//! plain indices into `ExprArena`; the arena is never mutated once handed to
//! the lowerer. Binder positions are de Bruijn levels: a binder's `position`
//! is the number of binders enclosing it, so an environment lookup is a
//! direct index.

pub mod builder;

pub use builder::ExprBuilder;

use crate::ir::types::{BaseType, Literal};

/// Index of an expression in an `ExprArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(pub u32);

impl std::fmt::Display for ExprId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a binder declaration in an `ExprArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeclId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// Ordinary function parameter; `definition` is its type.
    Fun,
    /// Self parameter; `definition` is the enclosing function itself.
    SelfFun,
    /// Let binding; `definition` is the bound expression.
    Let,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub kind: DeclKind,
    pub name: String,
    /// Number of binders enclosing this one.
    pub position: u32,
    pub definition: Option<ExprId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyKind {
    Normal,
    /// Self-application; with no argument the function is passed to itself.
    SelfApply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpcode {
    Negative,
    BitNot,
    LogicNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOpcode {
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
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    LogicAnd,
    LogicOr,
}

impl std::fmt::Display for BinaryOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOpcode::Add => "+",
            BinaryOpcode::Sub => "-",
            BinaryOpcode::Mul => "*",
            BinaryOpcode::Div => "/",
            BinaryOpcode::Rem => "%",
            BinaryOpcode::Shl => "<<",
            BinaryOpcode::Shr => ">>",
            BinaryOpcode::BitAnd => "&",
            BinaryOpcode::BitXor => "^",
            BinaryOpcode::BitOr => "|",
            BinaryOpcode::Eq => "==",
            BinaryOpcode::Neq => "!=",
            BinaryOpcode::Lt => "<",
            BinaryOpcode::Leq => "<=",
            BinaryOpcode::Gt => ">",
            BinaryOpcode::Geq => ">=",
            BinaryOpcode::LogicAnd => "&&",
            BinaryOpcode::LogicOr => "||",
        };
        f.write_str(s)
    }
}

/// A named record member.
#[derive(Debug, Clone)]
pub struct Slot {
    pub name: String,
    pub definition: ExprId,
    /// Final slots whose definition is a literal are inlined at use sites.
    pub is_final: bool,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    ScalarType(BaseType),
    Variable(DeclId),
    /// Name-based reference, resolved against the environment during lowering.
    Identifier(String),
    Apply {
        func: ExprId,
        arg: Option<ExprId>,
        kind: ApplyKind,
    },
    Project {
        record: ExprId,
        slot: String,
    },
    Call {
        target: ExprId,
    },
    Let {
        decl: DeclId,
        body: ExprId,
    },
    IfThenElse {
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
    },
    Function {
        decl: DeclId,
        body: ExprId,
    },
    Code {
        return_type: ExprId,
        body: Option<ExprId>,
    },
    Record {
        slots: Vec<Slot>,
    },
    Field {
        range: ExprId,
        body: Option<ExprId>,
    },
    Alloc {
        init: ExprId,
    },
    Load {
        addr: ExprId,
    },
    UnaryOp {
        op: UnaryOpcode,
        operand: ExprId,
    },
    BinaryOp {
        op: BinaryOpcode,
        lhs: ExprId,
        rhs: ExprId,
    },
    /// Lazy thunk; forced when traversed.
    Future(ExprId),
    Undefined,
}

impl Expr {
    /// Values are the weak-head normal forms of type evaluation.
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            Expr::Literal(_)
                | Expr::ScalarType(_)
                | Expr::Function { .. }
                | Expr::Code { .. }
                | Expr::Record { .. }
                | Expr::Field { .. }
        )
    }

    /// Short construct name used in diagnostics.
    pub fn construct(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "literal",
            Expr::ScalarType(_) => "scalar type",
            Expr::Variable(_) => "variable",
            Expr::Identifier(_) => "identifier",
            Expr::Apply { .. } => "apply",
            Expr::Project { .. } => "project",
            Expr::Call { .. } => "call",
            Expr::Let { .. } => "let",
            Expr::IfThenElse { .. } => "if",
            Expr::Function { .. } => "function",
            Expr::Code { .. } => "code",
            Expr::Record { .. } => "record",
            Expr::Field { .. } => "field",
            Expr::Alloc { .. } => "alloc",
            Expr::Load { .. } => "load",
            Expr::UnaryOp { .. } => "unary op",
            Expr::BinaryOp { .. } => "binary op",
            Expr::Future(_) => "future",
            Expr::Undefined => "undefined",
        }
    }
}

impl Slot {
    pub fn new(name: impl Into<String>, definition: ExprId) -> Self {
        Self { name: name.into(), definition, is_final: false }
    }

    pub fn final_slot(name: impl Into<String>, definition: ExprId) -> Self {
        Self { name: name.into(), definition, is_final: true }
    }
}

/// Owner of all expressions and declarations of one compilation unit.
#[derive(Debug, Default, Clone)]
pub struct ExprArena {
    pub(crate) exprs: Vec<Expr>,
    pub(crate) decls: Vec<VarDecl>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn declare(&mut self, decl: VarDecl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn decl(&self, id: DeclId) -> &VarDecl {
        &self.decls[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Looks up a slot by name in a record expression.
    pub fn find_slot(&self, record: ExprId, name: &str) -> Option<&Slot> {
        match self.expr(record) {
            Expr::Record { slots } => slots.iter().find(|s| s.name == name),
            _ => None,
        }
    }
}
