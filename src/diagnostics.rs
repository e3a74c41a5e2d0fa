//! Compile-time diagnostics channel (spec §3, §7).
//!
//! `HINT`/`WARNING` never stop compilation; `ERROR` lets the current pass
//! continue but makes it fail at the end; `FATAL` aborts immediately by
//! raising [`CompilerFailure`].

use std::fmt;

use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Hint,
    Warning,
    Error,
    Fatal,
}

/// Stable diagnostic codes (spec §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Code {
    LEX_UNTERMINATED_STRING,
    LEX_UNTERMINATED_BEHAVIOR,
    LEX_INVALID_ESCAPE,
    PAR_INDENTATION_ERROR,
    PAR_EXPECTED_TOKEN,
    PAR_WARN,
    SEM_UNDEFINED_SYMBOL,
    SEM_REDEFINITION,
    SEM_TYPE_MISMATCH,
    PROTO_LIMIT,
    RUN_TYPE_MISMATCH,
    RUN_DIVISION_BY_ZERO,
    RUN_ATTRIBUTE_ERROR,
    RUN_INDEX_ERROR,
    RUN_CALL_ERROR,
    RUN_LIMIT_EXCEEDED,
    RUN_UNDEFINED_VARIABLE,
    RUN_LLM_ERROR,
    RUN_GENERIC_ERROR,
    SCHED_CIRCULAR_DEPENDENCY,
    SCHED_SANDBOX_VIOLATION,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Code,
    pub message: String,
    pub location: Option<Span>,
    pub hint: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(span) = self.location {
            write!(f, " (line {}, col {})", span.line, span.column)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  help: {}", hint)?;
        }
        Ok(())
    }
}

/// Raised when [`IssueTracker::check_errors`] finds accumulated errors, or
/// immediately when a `FATAL` diagnostic is reported.
#[derive(Debug, Clone, thiserror::Error)]
#[error("compilation failed with {} diagnostic(s)", .diagnostics.len())]
pub struct CompilerFailure {
    pub diagnostics: Vec<Diagnostic>,
}

/// Collects diagnostics for a single compilation unit (one source file).
#[derive(Debug, Default)]
pub struct IssueTracker {
    pub diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl IssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(
        &mut self,
        severity: Severity,
        code: Code,
        message: impl Into<String>,
        location: Option<Span>,
    ) -> Result<(), CompilerFailure> {
        self.report_with_hint(severity, code, message, location, None)
    }

    pub fn report_with_hint(
        &mut self,
        severity: Severity,
        code: Code,
        message: impl Into<String>,
        location: Option<Span>,
        hint: Option<String>,
    ) -> Result<(), CompilerFailure> {
        let diag = Diagnostic {
            severity,
            code,
            message: message.into(),
            location,
            hint,
        };
        tracing::debug!(target: "ibci::diagnostics", ?severity, %code, "{}", diag.message);
        self.diagnostics.push(diag);
        if severity >= Severity::Error {
            self.error_count += 1;
        }
        if severity == Severity::Fatal {
            return Err(CompilerFailure {
                diagnostics: self.diagnostics.clone(),
            });
        }
        Ok(())
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn check_errors(&self) -> Result<(), CompilerFailure> {
        if self.has_errors() {
            Err(CompilerFailure {
                diagnostics: self.diagnostics.clone(),
            })
        } else {
            Ok(())
        }
    }

    pub fn merge(&mut self, other: IssueTracker) {
        self.diagnostics.extend(other.diagnostics);
        self.error_count += other.error_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_does_not_abort_but_marks_failure() {
        let mut tracker = IssueTracker::new();
        tracker
            .report(Severity::Error, Code::SEM_UNDEFINED_SYMBOL, "oops", None)
            .unwrap();
        assert!(tracker.has_errors());
        assert!(tracker.check_errors().is_err());
    }

    #[test]
    fn hint_and_warning_never_fail() {
        let mut tracker = IssueTracker::new();
        tracker
            .report(Severity::Hint, Code::PROTO_LIMIT, "nested generic", None)
            .unwrap();
        tracker
            .report(Severity::Warning, Code::PAR_WARN, "discarded intent", None)
            .unwrap();
        assert!(!tracker.has_errors());
        assert!(tracker.check_errors().is_ok());
    }

    #[test]
    fn fatal_aborts_immediately() {
        let mut tracker = IssueTracker::new();
        let result = tracker.report(Severity::Fatal, Code::RUN_GENERIC_ERROR, "halt", None);
        assert!(result.is_err());
    }

    #[test]
    fn merge_combines_error_counts() {
        let mut a = IssueTracker::new();
        let mut b = IssueTracker::new();
        a.report(Severity::Error, Code::SEM_TYPE_MISMATCH, "a", None)
            .unwrap();
        b.report(Severity::Error, Code::SEM_TYPE_MISMATCH, "b", None)
            .unwrap();
        a.merge(b);
        assert_eq!(a.diagnostics.len(), 2);
        assert!(a.has_errors());
    }
}
