use std::collections::HashMap;

use crate::error::LowerError;
use crate::ir::block::{BlockId, IrBlock};
use crate::ir::function::{FunctionId, IrFunction};
use crate::ir::instr::{InstrId, IrInstr, Operand, Terminator};
use crate::ir::types::BaseType;
use crate::ir::value::{BlockParam, ValueDef, ValueId};

/// The top-level IR container.
///
/// Invariants:
/// - Function names are unique within a module.
/// - `FunctionId(n)` always indexes `functions[n]`.
#[derive(Debug, Default)]
pub struct IrModule {
    pub name: String,
    pub(crate) functions: Vec<IrFunction>,
    pub(crate) function_index: HashMap<String, FunctionId>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            function_index: HashMap::new(),
        }
    }

    pub fn function(&self, id: FunctionId) -> Option<&IrFunction> {
        self.functions.get(id.0 as usize)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&IrFunction> {
        let id = self.function_index.get(name)?;
        self.functions.get(id.0 as usize)
    }

    pub fn functions(&self) -> &[IrFunction] {
        &self.functions
    }

    /// Registers a function built by `IrFunctionBuilder`.
    pub fn add_function(&mut self, mut func: IrFunction) -> Result<FunctionId, LowerError> {
        if self.function_index.contains_key(&func.name) {
            return Err(LowerError::DuplicateFunction { name: func.name });
        }
        let id = FunctionId(self.functions.len() as u32);
        func.id = id;
        self.function_index.insert(func.name.clone(), id);
        self.functions.push(func);
        Ok(id)
    }
}

/// Builder for constructing an `IrFunction` incrementally.
///
/// Call order:
/// 1. `create_block()`: allocate blocks, optionally with phi parameters
/// 2. `begin_block()`: open a block; only one block may be open at a time
/// 3. `push_instr()`: emit instructions into the open block
/// 4. `finish_block()`: set the open block's terminator and close it
/// 5. `build()`: consume the builder and return the completed `IrFunction`
///
/// Emission can be switched off for pure type computation; while it is off,
/// or while no block is open, `push_instr` appends nothing.
pub struct IrFunctionBuilder {
    func: IrFunction,
    current_block: Option<BlockId>,
    emit: bool,
}

impl IrFunctionBuilder {
    pub fn new(name: impl Into<String>, return_ty: BaseType) -> Self {
        let func = IrFunction {
            id: FunctionId(0), // reassigned by IrModule::add_function
            name: name.into(),
            return_ty,
            blocks: Vec::new(),
            value_defs: HashMap::new(),
            value_types: HashMap::new(),
            value_names: HashMap::new(),
            next_value: 0,
        };
        Self {
            func,
            current_block: None,
            emit: true,
        }
    }

    /// Creates a new block with `arity` untyped phi parameters.
    pub fn create_block(&mut self, name: Option<&str>, arity: usize) -> BlockId {
        let id = BlockId(self.func.blocks.len() as u32);
        self.func.blocks.push(IrBlock::new(id, name.map(str::to_owned)));
        for _ in 0..arity {
            self.add_block_param(id, None, None);
        }
        id
    }

    /// Creates a block whose parameters were allocated ahead of time with
    /// `fresh_value`.
    pub fn create_block_with_params(
        &mut self,
        name: Option<&str>,
        params: &[(ValueId, Option<BaseType>)],
    ) -> BlockId {
        let id = BlockId(self.func.blocks.len() as u32);
        self.func.blocks.push(IrBlock::new(id, name.map(str::to_owned)));
        for &(value, ty) in params {
            self.attach_param(id, value, None, ty);
        }
        id
    }

    /// Adds a parameter to a block. Returns the `ValueId` of the new param.
    pub fn add_block_param(
        &mut self,
        block: BlockId,
        name: Option<&str>,
        ty: Option<BaseType>,
    ) -> ValueId {
        let value = self.func.fresh_value();
        self.attach_param(block, value, name, ty);
        value
    }

    fn attach_param(
        &mut self,
        block: BlockId,
        value: ValueId,
        name: Option<&str>,
        ty: Option<BaseType>,
    ) {
        self.func.blocks[block.0 as usize].params.push(BlockParam {
            id: value,
            ty,
            name: name.map(str::to_owned),
        });
        self.func
            .value_defs
            .insert(value, ValueDef::BlockParam { block });
        if let Some(ty) = ty {
            self.func.value_types.insert(value, ty);
        }
    }

    pub fn block_params(&self, block: BlockId) -> Vec<ValueId> {
        self.func.blocks[block.0 as usize].param_ids().collect()
    }

    /// Element type of the `index`-th parameter of `block`, once known.
    pub fn param_type(&self, block: BlockId, index: usize) -> Option<BaseType> {
        self.func.blocks.get(block.0 as usize)?.params.get(index)?.ty
    }

        pub fn current_block(&self) -> Option<BlockId> {
        self.current_block
    }

    /// True when a block is open and emission is enabled.
    pub fn is_active(&self) -> bool {
        self.current_block.is_some() && self.emit
    }

    pub fn emit_enabled(&self) -> bool {
        self.emit
    }

    /// Switches emission on or off, returning the previous setting so the
    /// caller can restore it.
    pub fn set_emit(&mut self, emit: bool) -> bool {
        std::mem::replace(&mut self.emit, emit)
    }

    /// Opens `block` for instruction appends.
    pub fn begin_block(&mut self, block: BlockId) -> Result<(), LowerError> {
        if let Some(open) = self.current_block {
            return Err(LowerError::InvalidState {
                open,
                requested: block,
            });
        }
        if self.func.blocks[block.0 as usize].is_sealed() {
            return Err(LowerError::DoubleTerminated { block });
        }
        self.current_block = Some(block);
        Ok(())
    }

    /// Allocates a fresh `ValueId` without attaching it to any instruction.
    pub fn fresh_value(&mut self) -> ValueId {
        self.func.fresh_value()
    }

    /// Appends an instruction to the open block and returns its result.
    /// Returns `None` without appending when no block is open or emission
    /// is disabled.
    pub fn push_instr(&mut self, instr: IrInstr) -> Option<ValueId> {
        if !self.emit {
            return None;
        }
        let block_id = self.current_block?;
        let result = instr.result();
        let block = &mut self.func.blocks[block_id.0 as usize];
        let instr_idx = InstrId(block.instrs.len() as u32);
        self.func.value_defs.insert(
            result,
            ValueDef::InstrResult {
                block: block_id,
                instr: instr_idx,
            },
        );
        self.func.value_types.insert(result, instr.ty());
        block.instrs.push(instr);
        Some(result)
    }

    /// Sets the terminator of the open block and closes it.
    ///
    /// A `goto` fixes the element type of every still-untyped parameter of
    /// its target from the corresponding argument.
    pub fn finish_block(&mut self, term: Terminator) -> Result<BlockId, LowerError> {
        let block_id = self.current_block.ok_or(LowerError::NoOpenBlock)?;
        if let Terminator::Goto { target, args } = &term {
            self.refine_params(*target, args);
        }
        let block = &mut self.func.blocks[block_id.0 as usize];
        if block.terminator.is_some() {
            return Err(LowerError::DoubleTerminated { block: block_id });
        }
        log::trace!("{}: terminate {} with {:?}", self.func.name, block_id, term);
        block.terminator = Some(term);
        self.current_block = None;
        Ok(block_id)
    }

    fn refine_params(&mut self, target: BlockId, args: &[Operand]) {
        let Some(block) = self.func.blocks.get(target.0 as usize) else {
            return;
        };
        let updates: Vec<(usize, BaseType)> = block
            .params
            .iter()
            .zip(args)
            .enumerate()
            .filter(|(_, (p, _))| p.ty.is_none())
            .filter_map(|(i, (_, arg))| self.operand_type(arg).map(|ty| (i, ty)))
            .collect();
        for (i, ty) in updates {
            let param = &mut self.func.blocks[target.0 as usize].params[i];
            param.ty = Some(ty);
            self.func.value_types.insert(param.id, ty);
        }
    }

    /// Element type of an operand, if it is already known.
    pub fn operand_type(&self, op: &Operand) -> Option<BaseType> {
        match op {
            Operand::Value(v) => self.func.value_types.get(v).copied(),
            Operand::Const(lit) => Some(lit.ty),
            Operand::Var(_) | Operand::Function(_) | Operand::Static(_) => Some(BaseType::ADDR),
            Operand::Undef => None,
        }
    }

    pub fn value_type(&self, v: ValueId) -> Option<BaseType> {
        self.func.value_types.get(&v).copied()
    }

    pub fn set_value_name(&mut self, v: ValueId, name: impl Into<String>) {
        self.func.value_names.insert(v, name.into());
    }

    /// The return type is only known once the code's type has been forced.
    pub fn set_return_type(&mut self, ty: BaseType) {
        self.func.return_ty = ty;
    }

    pub fn name(&self) -> &str {
        &self.func.name
    }

    /// Consumes the builder and returns the completed `IrFunction`.
    ///
    /// Parameters that no edge ever typed (only poison reached them) are
    /// given the `void` element type.
    pub fn build(mut self) -> Result<IrFunction, LowerError> {
        if let Some(block) = self.func.blocks.iter().find(|b| !b.is_sealed()) {
            return Err(LowerError::Unterminated { block: block.id });
        }
        for block in &mut self.func.blocks {
            for param in block.params.iter_mut().filter(|p| p.ty.is_none()) {
                log::debug!("{}: {} param {} defaults to void", self.func.name, block.id, param.id);
                param.ty = Some(BaseType::VOID);
                self.func.value_types.insert(param.id, BaseType::VOID);
            }
        }
        Ok(self.func)
    }
}
