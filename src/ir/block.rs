use crate::ir::instr::{IrInstr, Terminator};
use crate::ir::value::{BlockParam, ValueId};

/// An opaque index identifying a basic block within an `IrFunction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A basic block in SSA form.
///
/// Invariants enforced by `IrFunctionBuilder`:
/// 1. `terminator` is set exactly once; `build()` rejects a block without one.
/// 2. `params` are considered defined before any instruction in this block.
/// 3. Each `ValueId` in `instrs` and `params` is unique within the function.
#[derive(Debug, Clone)]
pub struct IrBlock {
    pub id: BlockId,
    /// Block parameters model phi nodes (block-param SSA style).
    pub params: Vec<BlockParam>,
    /// Non-terminating instructions in program order.
    pub instrs: Vec<IrInstr>,
    pub(crate) terminator: Option<Terminator>,
    /// Optional display name used by the pretty-printer.
    pub name: Option<String>,
}

impl IrBlock {
    pub fn new(id: BlockId, name: Option<String>) -> Self {
        Self {
            id,
            params: Vec::new(),
            instrs: Vec::new(),
            terminator: None,
            name,
        }
    }

    pub fn terminator(&self) -> Option<&Terminator> {
        self.terminator.as_ref()
    }

    /// A block is sealed once its terminator is set.
    pub fn is_sealed(&self) -> bool {
        self.terminator.is_some()
    }

    pub fn param_ids(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.params.iter().map(|p| p.id)
    }

    /// Iterates over all `ValueId`s defined in this block (params + instr results).
    pub fn all_defs(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.param_ids().chain(self.instrs.iter().map(|i| i.result()))
    }
}
