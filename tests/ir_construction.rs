//! Tests that construct graphs through `IrFunctionBuilder` directly, without
//! lowering. These cover the builder's state machine and phi typing.

use cpsgraph::codegen::printer::emit_ir_text;
use cpsgraph::error::LowerError;
use cpsgraph::ir::instr::{BinOp, IrInstr, Operand, Terminator};
use cpsgraph::ir::module::{IrFunctionBuilder, IrModule};
use cpsgraph::ir::types::{BaseType, Literal};

#[test]
fn test_build_single_block_add() {
    let mut b = IrFunctionBuilder::new("add", BaseType::I32);
    let entry = b.create_block(Some("entry"), 0);
    let x = b.add_block_param(entry, Some("x"), Some(BaseType::I32));
    let y = b.add_block_param(entry, Some("y"), Some(BaseType::I32));
    b.begin_block(entry).unwrap();

    let result = b.fresh_value();
    let pushed = b.push_instr(IrInstr::BinOp {
        result,
        op: BinOp::Add,
        lhs: Operand::Value(x),
        rhs: Operand::Value(y),
        ty: BaseType::I32,
    });
    assert_eq!(pushed, Some(result));
    b.finish_block(Terminator::Return {
        value: Operand::Value(result),
    })
    .unwrap();

    let func = b.build().expect("all blocks are terminated");
    assert_eq!(func.blocks().len(), 1);
    assert_eq!(func.entry_block().params.len(), 2);
    assert_eq!(func.instr_count(), 1);
    assert_eq!(func.value_type(result), Some(BaseType::I32));
    assert_eq!(func.exit_blocks(), vec![entry]);

    let mut module = IrModule::new("m");
    let id = module.add_function(func).expect("should add function");
    assert_eq!(module.function(id).map(|f| f.name.as_str()), Some("add"));
    assert!(module.function_by_name("add").is_some());
}

#[test]
fn test_begin_while_open_is_invalid_state() {
    let mut b = IrFunctionBuilder::new("f", BaseType::VOID);
    let first = b.create_block(None, 0);
    let second = b.create_block(None, 0);
    b.begin_block(first).unwrap();

    let err = b.begin_block(second).unwrap_err();
    assert!(
        matches!(err, LowerError::InvalidState { open, requested } if open == first && requested == second),
        "expected InvalidState, got {:?}",
        err
    );
}

#[test]
fn test_double_terminate_is_rejected() {
    let mut b = IrFunctionBuilder::new("f", BaseType::I32);
    let entry = b.create_block(None, 0);
    b.begin_block(entry).unwrap();
    b.finish_block(Terminator::Return {
        value: Operand::Const(Literal::i32(0)),
    })
    .unwrap();

    // Re-opening a sealed block fails.
    let err = b.begin_block(entry).unwrap_err();
    assert!(matches!(err, LowerError::DoubleTerminated { block } if block == entry));

    // Terminating with nothing open fails too.
    let err = b
        .finish_block(Terminator::Return {
            value: Operand::Undef,
        })
        .unwrap_err();
    assert!(matches!(err, LowerError::NoOpenBlock));
}

#[test]
fn test_unterminated_block_fails_build() {
    let mut b = IrFunctionBuilder::new("f", BaseType::I32);
    let entry = b.create_block(None, 0);
    let dangling = b.create_block(Some("dangling"), 0);
    b.begin_block(entry).unwrap();
    b.finish_block(Terminator::Return {
        value: Operand::Const(Literal::i32(1)),
    })
    .unwrap();

    let err = b.build().unwrap_err();
    assert!(matches!(err, LowerError::Unterminated { block } if block == dangling));
}

#[test]
fn test_push_without_open_block_is_noop() {
    let mut b = IrFunctionBuilder::new("f", BaseType::I32);
    let result = b.fresh_value();
    let pushed = b.push_instr(IrInstr::BinOp {
        result,
        op: BinOp::Add,
        lhs: Operand::Const(Literal::i32(1)),
        rhs: Operand::Const(Literal::i32(2)),
        ty: BaseType::I32,
    });
    assert_eq!(pushed, None, "no block is open");

    let entry = b.create_block(None, 0);
    b.begin_block(entry).unwrap();
    let prev = b.set_emit(false);
    assert!(prev);
    assert!(!b.is_active());
    let pushed = b.push_instr(IrInstr::BinOp {
        result,
        op: BinOp::Add,
        lhs: Operand::Const(Literal::i32(1)),
        rhs: Operand::Const(Literal::i32(2)),
        ty: BaseType::I32,
    });
    assert_eq!(pushed, None, "emission is disabled");
}

#[test]
fn test_goto_types_phi_from_first_edge() {
    let mut b = IrFunctionBuilder::new("f", BaseType::I64);
    let entry = b.create_block(Some("entry"), 0);
    let join = b.create_block(Some("join"), 1);
    let phi = b.block_params(join)[0];
    assert_eq!(b.value_type(phi), None);

    b.begin_block(entry).unwrap();
    b.finish_block(Terminator::Goto {
        target: join,
        args: vec![Operand::Const(Literal::int(5, cpsgraph::ir::types::DType::I64))],
    })
    .unwrap();
    assert_eq!(b.value_type(phi), Some(BaseType::I64));

    b.begin_block(join).unwrap();
    b.finish_block(Terminator::Return {
        value: Operand::Value(phi),
    })
    .unwrap();
    let func = b.build().unwrap();
    assert_eq!(func.value_type(phi), Some(BaseType::I64));
}

#[test]
fn test_untyped_phi_defaults_to_void() {
    let mut b = IrFunctionBuilder::new("f", BaseType::VOID);
    let entry = b.create_block(None, 0);
    let join = b.create_block(None, 1);
    let phi = b.block_params(join)[0];

    b.begin_block(entry).unwrap();
    b.finish_block(Terminator::Goto {
        target: join,
        args: vec![Operand::Undef],
    })
    .unwrap();
    b.begin_block(join).unwrap();
    b.finish_block(Terminator::Return {
        value: Operand::Value(phi),
    })
    .unwrap();

    let func = b.build().unwrap();
    assert_eq!(func.value_type(phi), Some(BaseType::VOID));
}

#[test]
fn test_duplicate_function_name_rejected() {
    let build = |name: &str| {
        let mut b = IrFunctionBuilder::new(name, BaseType::I32);
        let entry = b.create_block(None, 0);
        b.begin_block(entry).unwrap();
        b.finish_block(Terminator::Return {
            value: Operand::Const(Literal::i32(0)),
        })
        .unwrap();
        b.build().unwrap()
    };
    let mut module = IrModule::new("m");
    module.add_function(build("f")).unwrap();
    let err = module.add_function(build("f")).unwrap_err();
    assert!(matches!(err, LowerError::DuplicateFunction { ref name } if name == "f"));
}

#[test]
fn test_printer_branch_and_return() {
    let mut b = IrFunctionBuilder::new("f", BaseType::I32);
    let entry = b.create_block(Some("entry"), 0);
    let x = b.add_block_param(entry, Some("x"), Some(BaseType::I32));
    let then_block = b.create_block(Some("then"), 0);
    let else_block = b.create_block(Some("else"), 0);

    b.begin_block(entry).unwrap();
    let r = b.fresh_value();
    b.push_instr(IrInstr::BinOp {
        result: r,
        op: BinOp::CmpLt,
        lhs: Operand::Value(x),
        rhs: Operand::Const(Literal::i32(3)),
        ty: BaseType::BOOL,
    });
    b.finish_block(Terminator::Branch {
        cond: Operand::Value(r),
        then_block,
        else_block,
    })
    .unwrap();
    for block in [then_block, else_block] {
        b.begin_block(block).unwrap();
        b.finish_block(Terminator::Return {
            value: Operand::Const(Literal::i32(1)),
        })
        .unwrap();
    }

    let mut module = IrModule::new("m");
    module.add_function(b.build().unwrap()).unwrap();
    let text = emit_ir_text(&module).unwrap();

    assert!(text.starts_with("// module: m\n"), "got:\n{}", text);
    assert!(text.contains("def @f0 f() -> i32 {"), "got:\n{}", text);
    assert!(text.contains("entry0(%0 x: i32):"), "got:\n{}", text);
    assert!(text.contains("%1 = cmplt %0, 3:i32 : bool"), "got:\n{}", text);
    assert!(text.contains("branch %1, then1, else2"), "got:\n{}", text);
    assert!(text.contains("return 1:i32"), "got:\n{}", text);
}
