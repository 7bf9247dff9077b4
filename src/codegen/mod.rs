pub mod printer;

pub use printer::{emit_function, emit_ir_text};
