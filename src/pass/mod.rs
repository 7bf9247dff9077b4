pub mod validate;

pub use validate::ValidatePass;

use crate::error::PassError;
use crate::ir::module::IrModule;

/// A pass over a finished `IrModule`.
///
/// Passes must be deterministic: given the same module, the result is
/// identical across runs.
pub trait Pass {
    /// Human-readable name, used in error messages and IR dumps.
    fn name(&self) -> &'static str;

    /// Run the pass on the module.
    ///
    /// On error the pipeline aborts and the module state is unspecified.
    fn run(&mut self, module: &mut IrModule) -> Result<(), PassError>;
}

/// Runs an ordered sequence of passes, aborting at the first error.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
    /// If set, dumps IR text to stderr after the pass with this name completes.
    dump_after: Option<String>,
}

impl PassManager {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            dump_after: None,
        }
    }

    /// Appends a pass to the end of the pipeline.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Dumps IR to stderr after the named pass completes.
    pub fn set_dump_after(&mut self, pass_name: impl Into<String>) {
        self.dump_after = Some(pass_name.into());
    }

    /// Runs all passes in registration order on `module`.
    ///
    /// Returns `Err((pass_name, error))` at the first failure.
    pub fn run(&mut self, module: &mut IrModule) -> Result<(), (String, PassError)> {
        for pass in &mut self.passes {
            log::debug!("running pass '{}' on module '{}'", pass.name(), module.name);
            pass.run(module).map_err(|e| (pass.name().to_owned(), e))?;
            if self.dump_after.as_deref() == Some(pass.name()) {
                use crate::codegen::printer::emit_ir_text;
                if let Ok(text) = emit_ir_text(module) {
                    eprintln!("--- IR after {} ---\n{}", pass.name(), text);
                }
            }
        }
        Ok(())
    }

    /// Returns the names of all registered passes in pipeline order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}
