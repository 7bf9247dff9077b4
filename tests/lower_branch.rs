//! Conditionals: block splitting, join phis, ambient continuations and
//! statically selected arms.

use cpsgraph::ast::{ExprArena, ExprBuilder, ExprId};
use cpsgraph::codegen::printer::emit_ir_text;
use cpsgraph::ir::instr::{BinOp, CastOp, IrInstr, Operand, Terminator};
use cpsgraph::ir::types::{BaseType, DType, Literal};
use cpsgraph::{compile, LowerOptions, Lowered};

fn lower(arena: &ExprArena, root: ExprId) -> Lowered {
    compile(arena, root, &LowerOptions::default()).expect("lowering should succeed")
}

/// `\(c: bool) -> code(i32) { (if c then 1 else 2) + 10 }`
fn branch_in_arg_position() -> (ExprArena, ExprId) {
    let mut b = ExprBuilder::new();
    let bool_ty = b.ty(DType::Bool);
    let root = b.function("c", bool_ty, |b, c| {
        let ret = b.ty(DType::I32);
        b.code(ret, |b| {
            let one = b.int(1);
            let two = b.int(2);
            let cond = b.if_then_else(c, one, two);
            let ten = b.int(10);
            b.add(cond, ten)
        })
    });
    (b.finish(), root)
}

#[test]
fn test_branch_in_arg_position_creates_join() {
    let (arena, root) = branch_in_arg_position();
    let lowered = lower(&arena, root);
    assert!(lowered.diagnostics.is_empty());

    let func = &lowered.module.functions()[0];
    assert_eq!(func.blocks().len(), 4, "entry, then, else and join");

    let entry = func.entry_block();
    let (then_block, else_block) = match entry.terminator() {
        Some(Terminator::Branch {
            cond,
            then_block,
            else_block,
        }) => {
            assert_eq!(cond, &Operand::Value(entry.params[0].id));
            (*then_block, *else_block)
        }
        other => panic!("expected branch, got {:?}", other),
    };

    let join = &func.blocks()[3];
    assert_eq!(join.params.len(), 1);
    assert_eq!(join.params[0].ty, Some(BaseType::I32), "phi typed from both arms");

    for (block, value) in [(then_block, 1), (else_block, 2)] {
        match func.block(block).and_then(|b| b.terminator()) {
            Some(Terminator::Goto { target, args }) => {
                assert_eq!(*target, join.id);
                assert_eq!(args, &vec![Operand::Const(Literal::i32(value))]);
            }
            other => panic!("expected goto into join, got {:?}", other),
        }
    }

    // The addition consumes the phi inside the join block.
    match &join.instrs[..] {
        [IrInstr::BinOp { op: BinOp::Add, lhs, .. }] => {
            assert_eq!(lhs, &Operand::Value(join.params[0].id));
        }
        other => panic!("expected one add in join, got {:?}", other),
    }
    assert_eq!(func.exit_blocks(), vec![join.id]);
}

#[test]
fn test_branch_in_tail_position_has_no_join() {
    // \(c: bool) -> code(i32) { if c then 1 else 2 }
    let mut b = ExprBuilder::new();
    let bool_ty = b.ty(DType::Bool);
    let root = b.function("c", bool_ty, |b, c| {
        let ret = b.ty(DType::I32);
        b.code(ret, |b| {
            let one = b.int(1);
            let two = b.int(2);
            b.if_then_else(c, one, two)
        })
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);

    let func = &lowered.module.functions()[0];
    assert_eq!(func.blocks().len(), 3, "arms return directly");
    assert_eq!(func.exit_blocks().len(), 2);
    assert!(func.blocks().iter().all(|b| b.params.is_empty() || b.id == func.entry_block().id));
}

#[test]
fn test_literal_condition_selects_arm_statically() {
    let build = |with_branch: bool| {
        let mut b = ExprBuilder::new();
        let ret = b.ty(DType::I32);
        let root = b.code(ret, |b| {
            let one = b.int(1);
            if with_branch {
                let t = b.bool(true);
                let two = b.int(2);
                b.if_then_else(t, one, two)
            } else {
                one
            }
        });
        let arena = b.finish();
        emit_ir_text(&lower(&arena, root).module).unwrap()
    };
    let folded = build(true);
    let plain = build(false);
    assert_eq!(folded, plain, "a dead arm must leave no trace");
    assert!(folded.contains("return 1:i32"), "got:\n{}", folded);
}

#[test]
fn test_false_literal_takes_else_arm() {
    let mut b = ExprBuilder::new();
    let ret = b.ty(DType::I32);
    let root = b.code(ret, |b| {
        let f = b.bool(false);
        let one = b.int(1);
        let two = b.int(2);
        b.if_then_else(f, one, two)
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);

    let func = &lowered.module.functions()[0];
    assert_eq!(func.blocks().len(), 1);
    assert!(matches!(
        func.entry_block().terminator(),
        Some(Terminator::Return { value: Operand::Const(lit) }) if *lit == Literal::i32(2)
    ));
}

#[test]
fn test_nested_branches_share_ambient_continuation() {
    // \(a: bool) -> \(b: bool) -> code(i32) {
    //     if a then (if b then 1 else 2) else 3 }
    let mut b = ExprBuilder::new();
    let a_ty = b.ty(DType::Bool);
    let root = b.function("a", a_ty, |b, a| {
        let b_ty = b.ty(DType::Bool);
        b.function("b", b_ty, |b, bv| {
            let ret = b.ty(DType::I32);
            b.code(ret, |b| {
                let one = b.int(1);
                let two = b.int(2);
                let inner = b.if_then_else(bv, one, two);
                let three = b.int(3);
                b.if_then_else(a, inner, three)
            })
        })
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);

    let func = &lowered.module.functions()[0];
    assert_eq!(func.blocks().len(), 5, "entry + two arms + two inner arms");
    assert_eq!(func.exit_blocks().len(), 3, "every leaf returns directly");
    assert!(func.blocks().iter().skip(1).all(|b| b.params.is_empty()));
}

#[test]
fn test_non_bool_condition_reports_type_mismatch() {
    let mut b = ExprBuilder::new();
    let ret = b.ty(DType::I32);
    let root = b.code(ret, |b| {
        let cond = b.int(1);
        let one = b.int(1);
        let two = b.int(2);
        b.if_then_else(cond, one, two)
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);

    assert_eq!(lowered.diagnostics.len(), 1);
    let diag = lowered.diagnostics.iter().next().unwrap();
    assert_eq!(diag.kind.code(), "E0128");

    // Recovery keeps both arms with a poisoned condition.
    let func = &lowered.module.functions()[0];
    assert!(matches!(
        func.entry_block().terminator(),
        Some(Terminator::Branch { cond: Operand::Undef, .. })
    ));
}

#[test]
fn test_join_takes_wider_arm_type() {
    // \(c: bool) -> \(n: i8) -> code(i32) { (if c then n else 300) + 0 }
    let mut b = ExprBuilder::new();
    let bool_ty = b.ty(DType::Bool);
    let root = b.function("c", bool_ty, |b, c| {
        let n_ty = b.ty(DType::I8);
        b.function("n", n_ty, |b, n| {
            let ret = b.ty(DType::I32);
            b.code(ret, |b| {
                let wide = b.int(300);
                let cond = b.if_then_else(c, n, wide);
                let zero = b.int(0);
                b.add(cond, zero)
            })
        })
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);

    let func = &lowered.module.functions()[0];
    let join = func
        .blocks()
        .iter()
        .find(|b| b.name.as_deref() == Some("join"))
        .expect("arg-position branch has a join");
    assert_eq!(join.params[0].ty, Some(BaseType::I32));

    let then_block = &func.blocks()[1];
    let widened = match &then_block.instrs[..] {
        [IrInstr::Cast {
            result,
            op: CastOp::SignExtend,
            ty,
            ..
        }] => {
            assert_eq!(*ty, BaseType::I32);
            *result
        }
        other => panic!("expected one sign extension, got {:?}", other),
    };
    assert!(matches!(
        then_block.terminator(),
        Some(Terminator::Goto { args, .. }) if args == &vec![Operand::Value(widened)]
    ));
    assert!(matches!(
        func.blocks()[2].terminator(),
        Some(Terminator::Goto { args, .. }) if args == &vec![Operand::Const(Literal::i32(300))]
    ));
}

#[test]
fn test_incompatible_arms_poison_the_edge() {
    // \(c: bool) -> code(i32) { (if c then 1 else true) + 1 }
    let mut b = ExprBuilder::new();
    let bool_ty = b.ty(DType::Bool);
    let root = b.function("c", bool_ty, |b, c| {
        let ret = b.ty(DType::I32);
        b.code(ret, |b| {
            let one = b.int(1);
            let t = b.bool(true);
            let cond = b.if_then_else(c, one, t);
            let one = b.int(1);
            b.add(cond, one)
        })
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);

    let codes: Vec<&str> = lowered.diagnostics.iter().map(|d| d.kind.code()).collect();
    assert_eq!(codes, vec!["E0127"]);

    let func = &lowered.module.functions()[0];
    assert_eq!(func.blocks()[3].params[0].ty, Some(BaseType::I32), "then-arm type wins");
    assert!(matches!(
        func.blocks()[2].terminator(),
        Some(Terminator::Goto { args, .. }) if args == &vec![Operand::Undef]
    ));
}

#[test]
fn test_conditional_forced_as_a_type_emits_nothing() {
    // \(c: bool) -> code(i32) {
    //   let g = \(k: bool) -> (if k then 1 else 2) in g(c) + 1
    // }
    let mut b = ExprBuilder::new();
    let bool_ty = b.ty(DType::Bool);
    let root = b.function("c", bool_ty, |b, c| {
        let ret = b.ty(DType::I32);
        b.code(ret, |b| {
            let k_ty = b.ty(DType::Bool);
            let g = b.function("k", k_ty, |b, k| {
                let one = b.int(1);
                let two = b.int(2);
                b.if_then_else(k, one, two)
            });
            b.let_in("g", g, |b, g| {
                let applied = b.apply(g, c);
                let one = b.int(1);
                b.add(applied, one)
            })
        })
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);

    let func = &lowered.module.functions()[0];
    assert_eq!(func.blocks().len(), 1, "a type-only conditional splits nothing");
    match &func.entry_block().instrs[..] {
        [IrInstr::Apply { ty, .. }, IrInstr::BinOp { op: BinOp::Add, .. }] => {
            assert_eq!(*ty, BaseType::I32, "then-arm type");
        }
        other => panic!("expected apply then add, got {:?}", other),
    }
}
