//! cpsgraph: continuation-passing lowering of expression trees into typed
//! control-flow graphs.
//!
//! Pipeline:
//!
//! ```text
//! [ExprArena] → Lowerer → [IrModule + Diagnostics] → PassManager → printer
//! ```
//!
//! The lowerer threads a continuation through tail positions, so every
//! conditional and every tail call into a nested function becomes explicit
//! control flow. Types are computed alongside, lazily, under delayed
//! substitutions.
//!
//! Passes (in order):
//! 1. `ValidatePass`: hand-off checks: terminators, phi arity, typed values

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod error;
pub mod ir;
pub mod lower;
pub mod pass;

pub use ast::{ExprArena, ExprBuilder, ExprId};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::Error;
pub use lower::{lower, Lowered};

/// Controls what `compile()` does after lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerOptions {
    /// Name of the produced `IrModule`.
    pub module_name: String,
    /// Run `ValidatePass` on the lowered module.
    pub validate: bool,
    /// Print the lowered module to stderr.
    pub dump_ir: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            module_name: "main".to_owned(),
            validate: true,
            dump_ir: false,
        }
    }
}

/// Lowers the expression rooted at `root` and runs the hand-off passes.
///
/// User errors do not fail compilation: they are returned in
/// `Lowered::diagnostics` alongside a module in which the offending values
/// are poison. The pipeline aborts only on broken lowering invariants or a
/// failed validation.
pub fn compile(arena: &ExprArena, root: ExprId, options: &LowerOptions) -> Result<Lowered, Error> {
    use crate::pass::validate::ValidatePass;
    use crate::pass::PassManager;

    // 1. Lower.
    let mut lowered = lower(arena, root, &options.module_name)?;
    log::debug!(
        "lowered module '{}': {} functions, {} diagnostics",
        lowered.module.name,
        lowered.module.functions().len(),
        lowered.diagnostics.len()
    );

    // 2. Run pass pipeline.
    let mut pm = PassManager::new();
    if options.validate {
        pm.add_pass(ValidatePass);
        if options.dump_ir {
            pm.set_dump_after("validate");
        }
    }
    pm.run(&mut lowered.module).map_err(|(_, e)| Error::Pass(e))?;

    // 3. Without a pass to hang the dump on, print directly.
    if options.dump_ir && !options.validate {
        let text = codegen::printer::emit_ir_text(&lowered.module)?;
        eprintln!("--- IR after lowering ---\n{}", text);
    }
    Ok(lowered)
}
