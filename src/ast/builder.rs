//! Depth-aware construction of expression trees.
//!
//! Binder positions must agree with the nesting depth the lowerer observes,
//! so binders are only introduced through closures that receive the bound
//! variable and build the body one level deeper.

use crate::ast::{
    ApplyKind, BinaryOpcode, DeclId, DeclKind, Expr, ExprArena, ExprId, Slot, UnaryOpcode, VarDecl,
};
use crate::ir::types::{BaseType, DType, Literal};

pub struct ExprBuilder {
    arena: ExprArena,
    depth: u32,
}

impl Default for ExprBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprBuilder {
    pub fn new() -> Self {
        Self { arena: ExprArena::new(), depth: 0 }
    }

    pub fn arena(&self) -> &ExprArena {
        &self.arena
    }

    /// Consumes the builder and returns the finished arena.
    pub fn finish(self) -> ExprArena {
        self.arena
    }

    fn push(&mut self, expr: Expr) -> ExprId {
        self.arena.alloc(expr)
    }

    fn bind<F>(&mut self, kind: DeclKind, name: &str, definition: Option<ExprId>, body: F) -> (DeclId, ExprId)
    where
        F: FnOnce(&mut Self, ExprId) -> ExprId,
    {
        let decl = self.arena.declare(VarDecl {
            kind,
            name: name.to_owned(),
            position: self.depth,
            definition,
        });
        let var = self.push(Expr::Variable(decl));
        self.depth += 1;
        let body = body(self, var);
        self.depth -= 1;
        (decl, body)
    }

    // ---- Leaves ----

    pub fn lit(&mut self, lit: Literal) -> ExprId {
        self.push(Expr::Literal(lit))
    }

    pub fn int(&mut self, v: i32) -> ExprId {
        self.lit(Literal::i32(v))
    }

    pub fn int_of(&mut self, v: i64, dtype: DType) -> ExprId {
        self.lit(Literal::int(v, dtype))
    }

    pub fn bool(&mut self, b: bool) -> ExprId {
        self.lit(Literal::bool(b))
    }

    pub fn float(&mut self, v: f64) -> ExprId {
        self.lit(Literal::f64(v))
    }

    pub fn scalar_type(&mut self, ty: BaseType) -> ExprId {
        self.push(Expr::ScalarType(ty))
    }

    pub fn ty(&mut self, dtype: DType) -> ExprId {
        self.scalar_type(BaseType::scalar(dtype))
    }

    pub fn ident(&mut self, name: &str) -> ExprId {
        self.push(Expr::Identifier(name.to_owned()))
    }

    pub fn undefined(&mut self) -> ExprId {
        self.push(Expr::Undefined)
    }

    // ---- Binders ----

    /// `let name = definition in body`.
    pub fn let_in<F>(&mut self, name: &str, definition: ExprId, body: F) -> ExprId
    where
        F: FnOnce(&mut Self, ExprId) -> ExprId,
    {
        let (decl, body) = self.bind(DeclKind::Let, name, Some(definition), body);
        self.push(Expr::Let { decl, body })
    }

    /// `\(name: param_ty) -> body`.
    pub fn function<F>(&mut self, name: &str, param_ty: ExprId, body: F) -> ExprId
    where
        F: FnOnce(&mut Self, ExprId) -> ExprId,
    {
        let (decl, body) = self.bind(DeclKind::Fun, name, Some(param_ty), body);
        self.push(Expr::Function { decl, body })
    }

    /// `\@name -> body`, where `name` denotes the function itself.
    pub fn self_function<F>(&mut self, name: &str, body: F) -> ExprId
    where
        F: FnOnce(&mut Self, ExprId) -> ExprId,
    {
        let (decl, body) = self.bind(DeclKind::SelfFun, name, None, body);
        let func = self.push(Expr::Function { decl, body });
        self.arena.decls[decl.0 as usize].definition = Some(func);
        func
    }

    // ---- Compound expressions ----

    pub fn apply(&mut self, func: ExprId, arg: ExprId) -> ExprId {
        self.push(Expr::Apply { func, arg: Some(arg), kind: ApplyKind::Normal })
    }

    /// `f@`: applies a self-function to itself.
    pub fn self_apply(&mut self, func: ExprId) -> ExprId {
        self.push(Expr::Apply { func, arg: None, kind: ApplyKind::SelfApply })
    }

    pub fn project(&mut self, record: ExprId, slot: &str) -> ExprId {
        self.push(Expr::Project { record, slot: slot.to_owned() })
    }

    pub fn call(&mut self, target: ExprId) -> ExprId {
        self.push(Expr::Call { target })
    }

    /// `target(args..)()`: applies each argument in turn, then calls.
    pub fn call_with(&mut self, target: ExprId, args: &[ExprId]) -> ExprId {
        let applied = args.iter().fold(target, |f, &a| self.apply(f, a));
        self.call(applied)
    }

    pub fn if_then_else(&mut self, cond: ExprId, then_expr: ExprId, else_expr: ExprId) -> ExprId {
        self.push(Expr::IfThenElse { cond, then_expr, else_expr })
    }

    pub fn code<F>(&mut self, return_type: ExprId, body: F) -> ExprId
    where
        F: FnOnce(&mut Self) -> ExprId,
    {
        let body = body(self);
        self.push(Expr::Code { return_type, body: Some(body) })
    }

    /// A code block with no body (an external declaration).
    pub fn code_decl(&mut self, return_type: ExprId) -> ExprId {
        self.push(Expr::Code { return_type, body: None })
    }

    pub fn record(&mut self, slots: Vec<Slot>) -> ExprId {
        self.push(Expr::Record { slots })
    }

    pub fn field(&mut self, range: ExprId, body: Option<ExprId>) -> ExprId {
        self.push(Expr::Field { range, body })
    }

    pub fn alloc(&mut self, init: ExprId) -> ExprId {
        self.push(Expr::Alloc { init })
    }

    pub fn load(&mut self, addr: ExprId) -> ExprId {
        self.push(Expr::Load { addr })
    }

    pub fn future(&mut self, inner: ExprId) -> ExprId {
        self.push(Expr::Future(inner))
    }

    pub fn unary(&mut self, op: UnaryOpcode, operand: ExprId) -> ExprId {
        self.push(Expr::UnaryOp { op, operand })
    }

    pub fn binary(&mut self, op: BinaryOpcode, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.push(Expr::BinaryOp { op, lhs, rhs })
    }

    pub fn add(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.binary(BinaryOpcode::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.binary(BinaryOpcode::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.binary(BinaryOpcode::Mul, lhs, rhs)
    }

    pub fn lt(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.binary(BinaryOpcode::Lt, lhs, rhs)
    }

    pub fn gt(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.binary(BinaryOpcode::Gt, lhs, rhs)
    }
}
