//! IR pretty-printer.
//!
//! Emits a human-readable text representation of an `IrModule`.
//! Output is deterministic: functions are printed in `FunctionId` order,
//! blocks in `BlockId` order, instructions in program order.

use std::fmt::Write;

use crate::error::CodegenError;
use crate::ir::block::IrBlock;
use crate::ir::function::IrFunction;
use crate::ir::instr::{IrInstr, Operand, Terminator};
use crate::ir::module::IrModule;

/// Emits a full text dump of the IR module.
pub fn emit_ir_text(module: &IrModule) -> Result<String, CodegenError> {
    let mut out = String::new();
    writeln!(out, "// module: {}", module.name)?;

    for func in module.functions() {
        emit_function(&mut out, func)?;
    }
    Ok(out)
}

/// Emits one function graph.
pub fn emit_function(out: &mut String, func: &IrFunction) -> Result<(), CodegenError> {
    writeln!(out, "\ndef {} {}() -> {} {{", func.id, func.name, func.return_ty)?;

    for block in func.blocks() {
        write!(out, "  {}(", block_label(block))?;
        for (i, param) in block.params.iter().enumerate() {
            if i > 0 {
                write!(out, ", ")?;
            }
            let name = param.name.as_deref().unwrap_or("_");
            match param.ty {
                Some(ty) => write!(out, "{} {}: {}", param.id, name, ty)?,
                None => write!(out, "{} {}: ?", param.id, name)?,
            }
        }
        writeln!(out, "):")?;

        for instr in &block.instrs {
            write!(out, "    ")?;
            emit_instr(out, instr)?;
            if let Some(name) = func.value_name(instr.result()) {
                write!(out, "  // {}", name)?;
            }
            writeln!(out)?;
        }

        write!(out, "    ")?;
        match block.terminator() {
            Some(term) => emit_terminator(out, func, term)?,
            None => write!(out, "<unterminated>")?,
        }
        writeln!(out)?;
    }
    writeln!(out, "}}")?;
    Ok(())
}

fn block_label(block: &IrBlock) -> String {
    match &block.name {
        Some(name) => format!("{}{}", name, block.id.0),
        None => format!("{}", block.id),
    }
}

fn write_operands(out: &mut String, ops: &[Operand]) -> Result<(), CodegenError> {
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "{}", op)?;
    }
    Ok(())
}

fn emit_instr(out: &mut String, instr: &IrInstr) -> Result<(), CodegenError> {
    match instr {
        IrInstr::BinOp {
            result,
            op,
            lhs,
            rhs,
            ty,
        } => {
            write!(out, "{} = {} {}, {} : {}", result, op, lhs, rhs, ty)?;
        }

        IrInstr::UnaryOp {
            result,
            op,
            operand,
            ty,
        } => {
            write!(out, "{} = {} {} : {}", result, op, operand, ty)?;
        }

        IrInstr::Cast {
            result,
            op,
            operand,
            ty,
        } => {
            write!(out, "{} = {} {} : {}", result, op, operand, ty)?;
        }

        IrInstr::Apply {
            result,
            func,
            args,
            ty,
        } => {
            write!(out, "{} = apply {}(", result, func)?;
            write_operands(out, args)?;
            write!(out, ") : {}", ty)?;
        }

        IrInstr::Project {
            result,
            base,
            slot,
            ty,
        } => {
            write!(out, "{} = project {}.{} : {}", result, base, slot, ty)?;
        }

        IrInstr::Call {
            result,
            callee,
            args,
            ty,
        } => {
            write!(out, "{} = call {}(", result, callee)?;
            write_operands(out, args)?;
            write!(out, ") : {}", ty)?;
        }

        IrInstr::Alloc { result, init, ty } => {
            write!(out, "{} = alloc {} : {}", result, init, ty)?;
        }

        IrInstr::Load { result, addr, ty } => {
            write!(out, "{} = load {} : {}", result, addr, ty)?;
        }
    }
    Ok(())
}

fn emit_terminator(out: &mut String, func: &IrFunction, term: &Terminator) -> Result<(), CodegenError> {
    let label = |id| match func.block(id) {
        Some(block) => block_label(block),
        None => format!("{}", id),
    };
    match term {
        Terminator::Goto { target, args } => {
            write!(out, "goto {}(", label(*target))?;
            write_operands(out, args)?;
            write!(out, ")")?;
        }
        Terminator::Branch {
            cond,
            then_block,
            else_block,
        } => {
            write!(
                out,
                "branch {}, {}, {}",
                cond,
                label(*then_block),
                label(*else_block)
            )?;
        }
        Terminator::Return { value } => {
            write!(out, "return {}", value)?;
        }
    }
    Ok(())
}

