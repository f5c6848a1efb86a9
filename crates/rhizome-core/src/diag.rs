//! Diagnostics collection.
//!
//! Errors and warnings the engine reports to the user are collected here
//! rather than printed eagerly. Every distinct condition carries a stable
//! `(module, code)` pair so callers and tests can match on it without
//! depending on message wording.

/// Diagnostic severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Reporting module, e.g. `"BLOAD"`.
    pub module: &'static str,
    /// Stable numeric code within the module.
    pub code: u32,
    pub severity: Severity,
    pub text: String,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// Ordered collection of diagnostics owned by the environment.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, module: &'static str, code: u32, text: impl Into<String>) {
        self.messages.push(Diagnostic {
            module,
            code,
            severity: Severity::Error,
            text: text.into(),
        });
    }

    pub fn warning(&mut self, module: &'static str, code: u32, text: impl Into<String>) {
        self.messages.push(Diagnostic {
            module,
            code,
            severity: Severity::Warning,
            text: text.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.is_error())
    }

    pub fn warning_count(&self) -> usize {
        self.messages.iter().filter(|d| d.is_warning()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter()
    }

    /// First diagnostic with the given stable identifier.
    pub fn find(&self, module: &str, code: u32) -> Option<&Diagnostic> {
        self.messages
            .iter()
            .find(|d| d.module == module && d.code == code)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
