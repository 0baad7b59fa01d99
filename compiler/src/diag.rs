// diag.rs — Unified diagnostics model
//
// Shared diagnostic types used by the front-end phases (resolve, HLIR
// construction). Core analysis errors are typed enums instead — see
// `graph::StructuralError` and `schedule::CycleError`.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0212`).
///
/// Codes are `&'static str` constants defined in the `codes` module. Once
/// assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable diagnostic codes.
///
/// E020x — duplicate declarations, E021x — unknown references,
/// E022x — primitive misuse, E023x/E024x — table and control constraints,
/// W025x — lint-level findings.
pub mod codes {
    use super::DiagCode;

    pub const E0200: DiagCode = DiagCode("E0200"); // duplicate header type
    pub const E0201: DiagCode = DiagCode("E0201"); // duplicate instance
    pub const E0202: DiagCode = DiagCode("E0202"); // duplicate action
    pub const E0203: DiagCode = DiagCode("E0203"); // duplicate table
    pub const E0204: DiagCode = DiagCode("E0204"); // duplicate parser state
    pub const E0205: DiagCode = DiagCode("E0205"); // duplicate control block
    pub const E0210: DiagCode = DiagCode("E0210"); // unknown header type
    pub const E0211: DiagCode = DiagCode("E0211"); // unknown instance
    pub const E0212: DiagCode = DiagCode("E0212"); // unknown field
    pub const E0213: DiagCode = DiagCode("E0213"); // unknown parser return target
    pub const E0220: DiagCode = DiagCode("E0220"); // unknown primitive
    pub const E0221: DiagCode = DiagCode("E0221"); // primitive arity mismatch
    pub const E0222: DiagCode = DiagCode("E0222"); // write target is not a field
    pub const E0231: DiagCode = DiagCode("E0231"); // valid key with field part
    pub const E0232: DiagCode = DiagCode("E0232"); // field key missing field part
    pub const E0233: DiagCode = DiagCode("E0233"); // unknown action in table
    pub const E0234: DiagCode = DiagCode("E0234"); // table with no actions
    pub const E0240: DiagCode = DiagCode("E0240"); // unknown table in apply
    pub const E0241: DiagCode = DiagCode("E0241"); // table applied more than once
    pub const W0250: DiagCode = DiagCode("W0250"); // table never applied
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related span ─────────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted by any front-end phase.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
    pub related_spans: Vec<RelatedSpan>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint, or related spans.
    pub fn new(level: DiagLevel, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
            related_spans: Vec::new(),
        }
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a related span.
    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related_spans.push(RelatedSpan {
            span,
            label: label.into(),
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// True if any diagnostic in the slice is error-level.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        (0..1).into()
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, dummy_span(), "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code() {
        let d = Diagnostic::new(DiagLevel::Warning, dummy_span(), "table never applied")
            .with_code(codes::W0250);
        assert_eq!(format!("{d}"), "warning[W0250]: table never applied");
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::new(DiagLevel::Error, dummy_span(), "unknown field")
            .with_code(codes::E0212)
            .with_hint("declare the field in the header type")
            .with_related(dummy_span(), "header type declared here");
        assert_eq!(d.code, Some(codes::E0212));
        assert_eq!(
            d.hint.as_deref(),
            Some("declare the field in the header type")
        );
        assert_eq!(d.related_spans.len(), 1);
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let w = Diagnostic::new(DiagLevel::Warning, dummy_span(), "w");
        let e = Diagnostic::new(DiagLevel::Error, dummy_span(), "e");
        assert!(!has_errors(&[w.clone()]));
        assert!(has_errors(&[w, e]));
    }
}
