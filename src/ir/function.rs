use std::collections::HashMap;

use crate::ir::block::{BlockId, IrBlock};
use crate::ir::instr::Terminator;
use crate::ir::types::BaseType;
use crate::ir::value::{ValueDef, ValueId};

/// Uniquely identifies a function within an `IrModule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub u32);

impl std::fmt::Display for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@f{}", self.0)
    }
}

/// A function graph in block-parameter SSA form.
///
/// The entry block is always `blocks[0]`; its block params are the function
/// arguments. The exit is virtual: every block terminated by `return` flows
/// to it, see [`IrFunction::exit_blocks`].
#[derive(Debug, Clone)]
pub struct IrFunction {
    pub id: FunctionId,
    pub name: String,
    pub return_ty: BaseType,
    /// Flat list of blocks. `BlockId(n)` indexes `blocks[n]`.
    pub(crate) blocks: Vec<IrBlock>,
    /// Maps `ValueId` → its definition site. Populated during construction.
    pub(crate) value_defs: HashMap<ValueId, ValueDef>,
    /// Maps `ValueId` → its element type.
    pub(crate) value_types: HashMap<ValueId, BaseType>,
    /// Display names of let-bound values.
    pub(crate) value_names: HashMap<ValueId, String>,
    /// Counter for allocating fresh `ValueId`s.
    pub(crate) next_value: u32,
}

impl IrFunction {
    /// Returns the entry block (always `BlockId(0)`).
    pub fn entry_block(&self) -> &IrBlock {
        &self.blocks[0]
    }

    pub fn block(&self, id: BlockId) -> Option<&IrBlock> {
        self.blocks.get(id.0 as usize)
    }

    pub fn blocks(&self) -> &[IrBlock] {
        &self.blocks
    }

    /// Blocks that leave the function through `return`.
    pub fn exit_blocks(&self) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| matches!(b.terminator, Some(Terminator::Return { .. })))
            .map(|b| b.id)
            .collect()
    }

    /// Total number of non-terminating instructions across all blocks.
    pub fn instr_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instrs.len()).sum()
    }

    pub fn value_type(&self, v: ValueId) -> Option<BaseType> {
        self.value_types.get(&v).copied()
    }

    pub fn value_def(&self, v: ValueId) -> Option<&ValueDef> {
        self.value_defs.get(&v)
    }

    pub fn value_name(&self, v: ValueId) -> Option<&str> {
        self.value_names.get(&v).map(String::as_str)
    }

    /// Allocates a fresh `ValueId`. Used by the builder only.
    pub(crate) fn fresh_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }
}
