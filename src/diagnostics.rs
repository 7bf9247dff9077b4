//! Diagnostic sink for recoverable lowering errors, plus rendering.

use crate::ast::{ExprArena, ExprId};
use crate::error::{DiagnosticCategory, DiagnosticKind, Error};

/// A recovered error together with the expression that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub expr: ExprId,
}

/// Ordered collection of diagnostics reported during one compilation unit.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: DiagnosticKind, expr: ExprId) {
        log::debug!("diagnostic {} at {}: {}", kind.code(), expr, kind);
        self.entries.push(Diagnostic { kind, expr });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Number of diagnostics whose kind satisfies `pred`.
    pub fn count(&self, pred: impl Fn(&DiagnosticKind) -> bool) -> usize {
        self.entries.iter().filter(|d| pred(&d.kind)).count()
    }

    pub fn count_category(&self, category: DiagnosticCategory) -> usize {
        self.count(|k| k.category() == category)
    }

    /// One `error[Ecode]: message (at expr #n: construct)` line per
    /// diagnostic.
    pub fn render(&self, arena: &ExprArena) -> String {
        let mut out = String::new();
        for d in &self.entries {
            out.push_str(&format!(
                "error[{}]: {} (at expr {}: {})\n",
                d.kind.code(),
                d.kind,
                d.expr,
                arena.expr(d.expr).construct()
            ));
        }
        out
    }
}

/// Renders a fatal pipeline error with its diagnostic code.
///
/// ```text
/// error[E0102]: [internal lowering error] block bb1 is already terminated
/// ```
pub fn render_error(err: &Error) -> String {
    format!("error[{}]: {}\n", err.diagnostic_code(), err)
}
