//! Structural validation of finished graphs.
//!
//! Run before hand-off to the backend. Rejects anything the lowerer should
//! never have produced; it never repairs.

use crate::error::PassError;
use crate::ir::block::{BlockId, IrBlock};
use crate::ir::function::IrFunction;
use crate::ir::instr::{IrInstr, Operand, Terminator};
use crate::ir::module::IrModule;
use crate::ir::types::{BaseType, DType};
use crate::ir::value::ValueId;
use crate::pass::Pass;

/// Validates every function of the module.
///
/// Checks:
/// 1. Every block has a terminator.
/// 2. Every `goto` passes exactly as many arguments as its target has
///    parameters, each of the parameter's element type.
/// 3. Both targets of a `branch` exist and take no parameters.
/// 4. Every block parameter, instruction result and value operand has an
///    element type, and that type has 1 to 4 lanes.
/// 5. No `load` goes through a literal address.
pub struct ValidatePass;

impl Pass for ValidatePass {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn run(&mut self, module: &mut IrModule) -> Result<(), PassError> {
        for func in module.functions() {
            log::trace!("validating '{}' ({} blocks)", func.name, func.blocks().len());
            for block in func.blocks() {
                check_block(func, block)?;
            }
        }
        Ok(())
    }
}

fn label(block: &IrBlock) -> String {
    match &block.name {
        Some(name) => format!("{}{}", name, block.id.0),
        None => format!("{}", block.id),
    }
}

fn check_block(func: &IrFunction, block: &IrBlock) -> Result<(), PassError> {
    for value in block.all_defs() {
        check_typed(func, value)?;
    }

    for instr in &block.instrs {
        for op in instr.operands() {
            check_operand(func, op)?;
        }
        if let IrInstr::Load { addr: Operand::Const(lit), .. } = instr {
            if lit.ty.dtype == DType::Addr {
                return Err(PassError::AddressLiteral {
                    func: func.name.clone(),
                    block: label(block),
                });
            }
        }
    }

    let Some(term) = block.terminator() else {
        return Err(PassError::MissingTerminator {
            func: func.name.clone(),
            block: label(block),
        });
    };
    for op in term.operands() {
        check_operand(func, op)?;
    }

    match term {
        Terminator::Goto { target, args } => {
            let target_block = resolve(func, block, *target)?;
            if target_block.params.len() != args.len() {
                return Err(PassError::ArityMismatch {
                    func: func.name.clone(),
                    block: label(block),
                    target: label(target_block),
                    expected: target_block.params.len(),
                    found: args.len(),
                });
            }
            for (index, (param, arg)) in target_block.params.iter().zip(args).enumerate() {
                let (Some(expected), Some(found)) = (param.ty, operand_type(func, arg)) else {
                    continue;
                };
                if expected != found {
                    return Err(PassError::ArgumentTypeMismatch {
                        func: func.name.clone(),
                        block: label(block),
                        target: label(target_block),
                        index,
                        expected: expected.to_string(),
                        found: found.to_string(),
                    });
                }
            }
        }
        Terminator::Branch {
            then_block,
            else_block,
            ..
        } => {
            for target in [*then_block, *else_block] {
                let target_block = resolve(func, block, target)?;
                if !target_block.params.is_empty() {
                    return Err(PassError::BranchTargetHasParams {
                        func: func.name.clone(),
                        block: label(block),
                        target: label(target_block),
                    });
                }
            }
        }
        Terminator::Return { .. } => {}
    }
    Ok(())
}

fn resolve<'f>(func: &'f IrFunction, from: &IrBlock, target: BlockId) -> Result<&'f IrBlock, PassError> {
    func.block(target).ok_or_else(|| PassError::UnknownBlock {
        func: func.name.clone(),
        block: label(from),
        target: format!("{}", target),
    })
}

/// Element type of a scalar operand. Placeholders and static references
/// carry none.
fn operand_type(func: &IrFunction, op: &Operand) -> Option<BaseType> {
    match op {
        Operand::Value(v) => func.value_type(*v),
        Operand::Const(lit) => Some(lit.ty),
        _ => None,
    }
}

fn check_operand(func: &IrFunction, op: &Operand) -> Result<(), PassError> {
    match op {
        Operand::Value(v) => check_typed(func, *v),
        _ => Ok(()),
    }
}

fn check_typed(func: &IrFunction, value: ValueId) -> Result<(), PassError> {
    let Some(ty) = func.value_type(value) else {
        return Err(PassError::UntypedValue {
            func: func.name.clone(),
            value: format!("{}", value),
        });
    };
    if !ty.is_lowerable() {
        return Err(PassError::UnsupportedType {
            func: func.name.clone(),
            value: format!("{}", value),
            ty: format!("{}", ty),
        });
    }
    Ok(())
}
