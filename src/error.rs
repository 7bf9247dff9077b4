use thiserror::Error;

use crate::ir::block::BlockId;

/// Top-level error type for the lowering pipeline.
///
/// User-facing type and control-shape problems never surface here; they are
/// recorded as [`DiagnosticKind`]s and lowering carries on with poison.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", format_error_pretty("internal lowering error", &format!("{}", _0)))]
    Lower(#[from] LowerError),

    #[error("{}", format_error_pretty("validation error", &format!("{}", _0)))]
    Pass(#[from] PassError),

    #[error("{}", format_error_pretty("codegen error", &format!("{}", _0)))]
    Codegen(#[from] CodegenError),
}

fn format_error_pretty(category: &str, msg: &str) -> String {
    format!("[{}] {}", category, msg)
}

// ---------------------------------------------------------------------------
// Lowering errors
// ---------------------------------------------------------------------------

/// Broken preconditions inside the lowerer itself. Any of these aborts the
/// current compilation unit.
#[derive(Debug, Error)]
pub enum LowerError {
    #[error("cannot begin block {requested} while block {open} is still open")]
    InvalidState { open: BlockId, requested: BlockId },

    #[error("no block is open to receive a terminator")]
    NoOpenBlock,

    #[error("block {block} is already terminated")]
    DoubleTerminated { block: BlockId },

    #[error("block {block} was never terminated")]
    Unterminated { block: BlockId },

    #[error("variable '{name}' at position {position} is outside a scope of depth {depth}")]
    VariableOutOfScope { name: String, position: u32, depth: usize },

    #[error("binding of '{name}' has neither a type nor a substitutable residual")]
    InvalidSubstitution { name: String },

    #[error("expected a value in type position, found {construct}")]
    NotAValue { construct: &'static str },

    #[error("function '{name}' is already defined")]
    DuplicateFunction { name: String },
}

// ---------------------------------------------------------------------------
// Recoverable diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCategory {
    /// Ill-typed source; recovered with poison.
    UserType,
    /// Source that cannot be represented as a single well-formed graph.
    ControlShape,
    /// Well-typed source the lowerer deliberately refuses.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosticKind {
    #[error("not a function: callee has type {found}")]
    NotAFunction { found: String },

    #[error("not a code block: call target has type {found}")]
    NotACodeBlock { found: String },

    #[error("not a record: projected value has type {found}")]
    NotARecord { found: String },

    #[error("slot '{slot}' not found")]
    SlotNotFound { slot: String },

    #[error("identifier '{name}' not found")]
    IdentifierNotFound { name: String },

    #[error("invalid operand for '{op}': expected {expected}, found {found}")]
    InvalidOperand {
        op: String,
        expected: &'static str,
        found: String,
    },

    #[error("invalid operator '{op}': operand is not a value")]
    InvalidOperator { op: String },

    #[error("incompatible types for '{op}': {lhs} and {rhs}")]
    IncompatibleTypes { op: String, lhs: String, rhs: String },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("argument to alloc is not a value")]
    AllocNotAValue,

    #[error("not a field: loaded value has type {found}")]
    NotAField { found: String },

    #[error("must be a tail call")]
    MustBeTailCall,

    #[error("not a valid CFG: nested function is called under two different continuations")]
    NotAValidCfg,

    #[error("arity mismatch: block takes {expected} parameters, call supplies {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("unsupported construct: {detail}")]
    UnsupportedConstruct { detail: String },
}

impl DiagnosticKind {
    pub fn category(&self) -> DiagnosticCategory {
        match self {
            DiagnosticKind::MustBeTailCall
            | DiagnosticKind::NotAValidCfg
            | DiagnosticKind::ArityMismatch { .. } => DiagnosticCategory::ControlShape,
            DiagnosticKind::UnsupportedConstruct { .. } => DiagnosticCategory::Unsupported,
            _ => DiagnosticCategory::UserType,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::NotAFunction { .. } => "E0120",
            DiagnosticKind::NotACodeBlock { .. } => "E0121",
            DiagnosticKind::NotARecord { .. } => "E0122",
            DiagnosticKind::SlotNotFound { .. } => "E0123",
            DiagnosticKind::IdentifierNotFound { .. } => "E0124",
            DiagnosticKind::InvalidOperand { .. } => "E0125",
            DiagnosticKind::InvalidOperator { .. } => "E0126",
            DiagnosticKind::IncompatibleTypes { .. } => "E0127",
            DiagnosticKind::TypeMismatch { .. } => "E0128",
            DiagnosticKind::AllocNotAValue => "E0129",
            DiagnosticKind::NotAField { .. } => "E0130",
            DiagnosticKind::MustBeTailCall => "E0140",
            DiagnosticKind::NotAValidCfg => "E0141",
            DiagnosticKind::ArityMismatch { .. } => "E0142",
            DiagnosticKind::UnsupportedConstruct { .. } => "E0150",
        }
    }
}

// ---------------------------------------------------------------------------
// Pass errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PassError {
    #[error("in function '{func}': block '{block}' has no terminator")]
    MissingTerminator { func: String, block: String },

    #[error("in function '{func}': block '{block}' jumps to '{target}' with {found} arguments, but it takes {expected} parameters")]
    ArityMismatch {
        func: String,
        block: String,
        target: String,
        expected: usize,
        found: usize,
    },

    #[error("in function '{func}': block '{block}' branches to '{target}', which takes parameters")]
    BranchTargetHasParams {
        func: String,
        block: String,
        target: String,
    },

    #[error("in function '{func}': block '{block}' targets unknown block '{target}'")]
    UnknownBlock {
        func: String,
        block: String,
        target: String,
    },

    #[error("in function '{func}': value '{value}' has no element type")]
    UntypedValue { func: String, value: String },

    #[error("in function '{func}': value '{value}' has unsupported type {ty}")]
    UnsupportedType {
        func: String,
        value: String,
        ty: String,
    },

    #[error("in function '{func}': block '{block}' loads through a literal address")]
    AddressLiteral { func: String, block: String },

    #[error("in function '{func}': block '{block}' passes {found} to '{target}' parameter {index} of type {expected}")]
    ArgumentTypeMismatch {
        func: String,
        block: String,
        target: String,
        index: usize,
        expected: String,
        found: String,
    },
}

// ---------------------------------------------------------------------------
// Codegen errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("formatting failed while printing IR: {0}")]
    Fmt(#[from] std::fmt::Error),
}

impl Error {
    /// Returns a stable diagnostic code string for this error.
    pub fn diagnostic_code(&self) -> &'static str {
        match self {
            Error::Lower(l) => match l {
                LowerError::InvalidState { .. } => "E0100",
                LowerError::NoOpenBlock => "E0101",
                LowerError::DoubleTerminated { .. } => "E0102",
                LowerError::Unterminated { .. } => "E0103",
                LowerError::VariableOutOfScope { .. } => "E0104",
                LowerError::InvalidSubstitution { .. } => "E0105",
                LowerError::NotAValue { .. } => "E0106",
                LowerError::DuplicateFunction { .. } => "E0107",
            },
            Error::Pass(p) => match p {
                PassError::MissingTerminator { .. } => "E0200",
                PassError::ArityMismatch { .. } => "E0201",
                PassError::BranchTargetHasParams { .. } => "E0202",
                PassError::UnknownBlock { .. } => "E0203",
                PassError::UntypedValue { .. } => "E0204",
                PassError::UnsupportedType { .. } => "E0205",
                PassError::AddressLiteral { .. } => "E0206",
                PassError::ArgumentTypeMismatch { .. } => "E0207",
            },
            Error::Codegen(_) => "E0300",
        }
    }
}
