//! Nested functions compiled as blocks of the enclosing graph: tail calls as
//! jumps, self-recursion as loops, and the control-shape diagnostics.

use cpsgraph::ast::{ExprArena, ExprBuilder, ExprId};
use cpsgraph::error::{DiagnosticCategory, DiagnosticKind};
use cpsgraph::ir::block::BlockId;
use cpsgraph::ir::instr::{BinOp, IrInstr, Operand, Terminator};
use cpsgraph::ir::types::{BaseType, DType, Literal};
use cpsgraph::{compile, LowerOptions, Lowered};

fn lower(arena: &ExprArena, root: ExprId) -> Lowered {
    compile(arena, root, &LowerOptions::default()).expect("lowering should succeed")
}

/// ```text
/// code(i32) {
///   let loop = \@self -> \(i: i32) -> code(i32) {
///     if i < 10 then self@(i + 1)() else i
///   }
///   in loop@(start)()
/// }
/// ```
fn counting_loop(start: i32) -> (ExprArena, ExprId) {
    let mut b = ExprBuilder::new();
    let ret = b.ty(DType::I32);
    let root = b.code(ret, |b| {
        let def = b.self_function("self", |b, this| {
            let i_ty = b.ty(DType::I32);
            b.function("i", i_ty, |b, i| {
                let ret = b.ty(DType::I32);
                b.code(ret, |b| {
                    let ten = b.int(10);
                    let cond = b.lt(i, ten);
                    let me = b.self_apply(this);
                    let one = b.int(1);
                    let next = b.add(i, one);
                    let again = b.call_with(me, &[next]);
                    b.if_then_else(cond, again, i)
                })
            })
        });
        b.let_in("loop", def, |b, lp| {
            let me = b.self_apply(lp);
            let init = b.int(start);
            b.call_with(me, &[init])
        })
    });
    (b.finish(), root)
}

#[test]
fn test_self_recursion_is_a_loop() {
    let (arena, root) = counting_loop(0);
    let lowered = lower(&arena, root);
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);

    let func = &lowered.module.functions()[0];
    assert_eq!(lowered.module.functions().len(), 1, "no separate function for the loop");
    let loop_block = func
        .blocks()
        .iter()
        .find(|b| b.name.as_deref() == Some("loop"))
        .expect("the nested function gets a block named after its binder");
    assert_eq!(loop_block.params.len(), 2, "self placeholder + i");
    assert_eq!(loop_block.params[0].ty, Some(BaseType::ADDR));
    assert_eq!(loop_block.params[1].ty, Some(BaseType::I32));

    // entry jumps into the loop with the start value.
    match func.entry_block().terminator() {
        Some(Terminator::Goto { target, args }) => {
            assert_eq!(*target, loop_block.id);
            assert_eq!(args, &vec![Operand::Undef, Operand::Const(Literal::i32(0))]);
        }
        other => panic!("expected goto into loop, got {:?}", other),
    }

    // Exactly one block jumps back into the loop besides the entry.
    let back_edges: Vec<BlockId> = func
        .blocks()
        .iter()
        .filter(|b| b.id != func.entry_block().id)
        .filter(|b| matches!(b.terminator(), Some(Terminator::Goto { target, .. }) if *target == loop_block.id))
        .map(|b| b.id)
        .collect();
    assert_eq!(back_edges.len(), 1, "recursive call is a jump back");
}

#[test]
fn test_loop_block_count_independent_of_iterations() {
    let count = |start| {
        let (arena, root) = counting_loop(start);
        lower(&arena, root).module.functions()[0].blocks().len()
    };
    assert_eq!(count(0), count(9));
    assert_eq!(count(0), 4, "entry, loop, then, else");
}

#[test]
fn test_uncalled_nested_function_creates_no_block() {
    // code(i32) { let f = \(x: i32) -> code(i32) { x } in 5 }
    let mut b = ExprBuilder::new();
    let ret = b.ty(DType::I32);
    let root = b.code(ret, |b| {
        let x_ty = b.ty(DType::I32);
        let f = b.function("x", x_ty, |b, x| {
            let ret = b.ty(DType::I32);
            b.code(ret, |_| x)
        });
        b.let_in("f", f, |b, _| b.int(5))
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);

    assert!(lowered.diagnostics.is_empty());
    let module = &lowered.module;
    assert_eq!(module.functions().len(), 1);
    assert_eq!(module.functions()[0].blocks().len(), 1);
}

#[test]
fn test_non_tail_call_is_rejected() {
    // code(i32) { let f = \(x: i32) -> code(i32) { x } in f(1)() + 1 }
    let mut b = ExprBuilder::new();
    let ret = b.ty(DType::I32);
    let root = b.code(ret, |b| {
        let x_ty = b.ty(DType::I32);
        let f = b.function("x", x_ty, |b, x| {
            let ret = b.ty(DType::I32);
            b.code(ret, |_| x)
        });
        b.let_in("f", f, |b, f| {
            let one = b.int(1);
            let call = b.call_with(f, &[one]);
            let one = b.int(1);
            b.add(call, one)
        })
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);

    let kinds: Vec<&DiagnosticKind> = lowered.diagnostics.iter().map(|d| &d.kind).collect();
    assert_eq!(kinds, vec![&DiagnosticKind::MustBeTailCall], "poison is not re-reported");
    assert_eq!(lowered.diagnostics.count_category(DiagnosticCategory::ControlShape), 1);

    let func = &lowered.module.functions()[0];
    assert_eq!(func.blocks().len(), 1, "the rejected call allocates no block");
    assert!(matches!(
        func.entry_block().terminator(),
        Some(Terminator::Return { value: Operand::Undef })
    ));
}

#[test]
fn test_two_continuations_is_not_a_valid_cfg() {
    // \(c: bool) -> code(i32) {
    //   let f = \(x: i32) -> code(i32) { x }
    //   in let r = (if c then f(1)() else 0)
    //   in if c then f(2)() else r
    // }
    let mut b = ExprBuilder::new();
    let c_ty = b.ty(DType::Bool);
    let root = b.function("c", c_ty, |b, c| {
        let ret = b.ty(DType::I32);
        b.code(ret, |b| {
            let x_ty = b.ty(DType::I32);
            let f = b.function("x", x_ty, |b, x| {
                let ret = b.ty(DType::I32);
                b.code(ret, |_| x)
            });
            b.let_in("f", f, |b, f| {
                let one = b.int(1);
                let first = b.call_with(f, &[one]);
                let zero = b.int(0);
                let r_def = b.if_then_else(c, first, zero);
                b.let_in("r", r_def, |b, r| {
                    let two = b.int(2);
                    let second = b.call_with(f, &[two]);
                    b.if_then_else(c, second, r)
                })
            })
        })
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);

    let codes: Vec<&str> = lowered.diagnostics.iter().map(|d| d.kind.code()).collect();
    assert_eq!(codes, vec!["E0141"]);

    // The first call still produced a well-formed graph.
    let func = &lowered.module.functions()[0];
    let f_block = func
        .blocks()
        .iter()
        .find(|b| b.name.as_deref() == Some("f"))
        .expect("first call allocates the block");
    assert_eq!(f_block.params.len(), 1);
    assert!(matches!(f_block.terminator(), Some(Terminator::Goto { .. })));
}

#[test]
fn test_nested_call_under_shared_continuation() {
    // \(c: bool) -> code(i32) {
    //   let f = \(x: i32) -> code(i32) { x + 1 }
    //   in if c then f(1)() else f(2)()
    // }
    let mut b = ExprBuilder::new();
    let c_ty = b.ty(DType::Bool);
    let root = b.function("c", c_ty, |b, c| {
        let ret = b.ty(DType::I32);
        b.code(ret, |b| {
            let x_ty = b.ty(DType::I32);
            let f = b.function("x", x_ty, |b, x| {
                let ret = b.ty(DType::I32);
                b.code(ret, |b| {
                    let one = b.int(1);
                    b.add(x, one)
                })
            });
            b.let_in("f", f, |b, f| {
                let one = b.int(1);
                let first = b.call_with(f, &[one]);
                let two = b.int(2);
                let second = b.call_with(f, &[two]);
                b.if_then_else(c, first, second)
            })
        })
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);

    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let func = &lowered.module.functions()[0];
    assert_eq!(func.blocks().len(), 4, "entry, then, else and one block for f");
    let f_block = func.blocks().iter().find(|b| b.name.as_deref() == Some("f")).unwrap();
    let callers = func
        .blocks()
        .iter()
        .filter(|b| matches!(b.terminator(), Some(Terminator::Goto { target, .. }) if *target == f_block.id))
        .count();
    assert_eq!(callers, 2);
    assert_eq!(f_block.instrs.len(), 1);
    assert_eq!(func.exit_blocks(), vec![f_block.id]);
}

#[test]
fn test_branch_over_nested_calls_is_typed() {
    // \(c: bool) -> code(i32) {
    //   let f = \(x: i32) -> code(i32) { x }
    //   in (if c then f(1)() else f(2)()) + 10
    // }
    let mut b = ExprBuilder::new();
    let c_ty = b.ty(DType::Bool);
    let root = b.function("c", c_ty, |b, c| {
        let ret = b.ty(DType::I32);
        b.code(ret, |b| {
            let x_ty = b.ty(DType::I32);
            let f = b.function("x", x_ty, |b, x| {
                let ret = b.ty(DType::I32);
                b.code(ret, |_| x)
            });
            b.let_in("f", f, |b, f| {
                let one = b.int(1);
                let first = b.call_with(f, &[one]);
                let two = b.int(2);
                let second = b.call_with(f, &[two]);
                let cond = b.if_then_else(c, first, second);
                let ten = b.int(10);
                b.add(cond, ten)
            })
        })
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);

    let func = &lowered.module.functions()[0];
    assert_eq!(func.blocks().len(), 5, "entry, then, else, join and f");
    let join = func.blocks().iter().find(|b| b.name.as_deref() == Some("join")).unwrap();
    assert_eq!(join.params[0].ty, Some(BaseType::I32));
    assert!(
        matches!(&join.instrs[..], [IrInstr::BinOp { op: BinOp::Add, .. }]),
        "the addition is emitted, got {:?}",
        join.instrs
    );
    assert_eq!(func.exit_blocks(), vec![join.id]);

    // f's body is drained last and flows into the join.
    let f_block = func.blocks().iter().find(|b| b.name.as_deref() == Some("f")).unwrap();
    assert!(matches!(
        f_block.terminator(),
        Some(Terminator::Goto { target, .. }) if *target == join.id
    ));
}

#[test]
fn test_nested_call_widens_literal_argument() {
    // code(i64) { let f = \(x: i64) -> code(i64) { x } in f(1)() }
    let mut b = ExprBuilder::new();
    let ret = b.ty(DType::I64);
    let root = b.code(ret, |b| {
        let x_ty = b.ty(DType::I64);
        let f = b.function("x", x_ty, |b, x| {
            let ret = b.ty(DType::I64);
            b.code(ret, |_| x)
        });
        b.let_in("f", f, |b, f| {
            let one = b.int(1);
            b.call_with(f, &[one])
        })
    });
    let arena = b.finish();
    let lowered = lower(&arena, root);
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);

    let func = &lowered.module.functions()[0];
    match func.entry_block().terminator() {
        Some(Terminator::Goto { args, .. }) => {
            assert_eq!(args, &vec![Operand::Const(Literal::int(1, DType::I64))]);
        }
        other => panic!("expected goto into f, got {:?}", other),
    }
}
