pub mod block;
pub mod function;
pub mod instr;
pub mod module;
pub mod types;
pub mod value;

pub use block::{BlockId, IrBlock};
pub use function::{FunctionId, IrFunction};
pub use instr::{BinOp, CastOp, InstrId, IrInstr, Operand, ScalarUnaryOp, Terminator};
pub use module::{IrFunctionBuilder, IrModule};
pub use types::{BaseType, DType, LitValue, Literal};
pub use value::{BlockParam, ValueDef, ValueId};
