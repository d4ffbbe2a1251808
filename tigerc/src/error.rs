//! Error handling: recoverable semantic diagnostics plus fatal structural-invariant failures.
//!
//! Two distinct paths, matching the severity split in spec's error-handling design:
//! `Diagnostic`/`Location` (grounded on `cranelift_reader::error::{Location, ParseError}`)
//! accumulate recoverable *semantic* errors — the checker keeps going, substituting `Int` for
//! the failed sub-expression's type, to surface as many problems as possible in one pass.
//! `CodegenError` (`failure`-derived, the exact crate `cranelift-codegen` uses for this) is for
//! *structural* violations — malformed IR or a malformed CFG — which aren't something the user
//! wrote wrong and abort compilation outright.

use failure_derive::Fail;
use std::fmt;

/// A 1-based line and column in the source file being compiled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.line, self.column)
    }
}

/// One recoverable, user-facing error, tied to the source position that caused it.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Where in the source the error was detected.
    pub location: Location,
    /// Human-readable message, e.g. "undeclared variable `x`".
    pub message: String,
}

impl Diagnostic {
    /// Construct a diagnostic at `location` with `message`.
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Accumulates diagnostics for one compilation unit and renders them with the active file name,
/// replacing the original's global `errm_any_errors`/`errm_tok_pos` pair.
#[derive(Default)]
pub struct Diagnostics {
    file: String,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Reset the accumulator for a new compilation unit named `file`, discarding any prior
    /// diagnostics — the direct analogue of `errm_reset(filename)`.
    pub fn reset(&mut self, file: impl Into<String>) {
        self.file = file.into();
        self.entries.clear();
    }

    /// Report a diagnostic.
    pub fn report(&mut self, location: Location, message: impl Into<String>) {
        self.entries.push(Diagnostic::new(location, message));
    }

    /// Has any diagnostic been reported since the last `reset`?
    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Every diagnostic reported so far, in report order.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Render every diagnostic as `file:line.col: message`, one per line.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|d| format!("{}:{}", self.file, d))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A violated structural invariant inside the middle-end: malformed IR, a malformed CFG, or
/// similar internal-only failures that are never the user's fault and abort compilation.
#[derive(Debug, Fail)]
pub enum CodegenError {
    /// The canonicaliser, instruction selector, or allocator received or produced IR violating
    /// one of their documented shape invariants.
    #[fail(display = "malformed IR: {}", _0)]
    MalformedIr(String),
    /// The control-flow graph built from an instruction list was inconsistent (e.g. a jump target
    /// with no matching label).
    #[fail(display = "malformed control-flow graph: {}", _0)]
    MalformedCfg(String),
    /// The spill-rewrite loop in the register allocator failed to converge within its bound.
    #[fail(display = "register allocator did not converge after {} spill-rewrite attempts", _0)]
    SpillWatchdog(u32),
}

/// Shorthand result type for fallible internal operations.
pub type CodegenResult<T> = Result<T, CodegenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_formats_file_line_col_message() {
        let mut diags = Diagnostics::default();
        diags.reset("test.tig");
        diags.report(Location { line: 3, column: 5 }, "undeclared variable `x`");
        assert_eq!(diags.render(), "test.tig:3.5: undeclared variable `x`");
        assert!(diags.has_errors());
    }

    #[test]
    fn reset_clears_prior_entries() {
        let mut diags = Diagnostics::default();
        diags.reset("a.tig");
        diags.report(Location { line: 1, column: 1 }, "oops");
        diags.reset("b.tig");
        assert!(!diags.has_errors());
    }
}
