use std::fmt;

use crate::{CompilationError, FileId, Location};

/// Severity of a diagnostic message.
///
/// Only [`Severity::Critical`] and [`Severity::Internal`] mark a compilation
/// as failed; everything else is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// The enclosing unit was abandoned.
    Critical,
    /// Recoverable user error; compilation continues.
    Error,
    Warning,
    Hint,
    /// An optimization was applied.
    OptimizationNotice,
    /// An optimization was attempted and refused.
    FailedOptimization,
    /// A compiler invariant was broken.
    Internal,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Hint => "hint",
            Self::OptimizationNotice => "optimization",
            Self::FailedOptimization => "failed optimization",
            Self::Internal => "internal",
        }
    }

    /// Whether a diagnostic of this severity makes the compilation fail.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Critical | Self::Internal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single diagnostic message with optional location and nested notes.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
    /// Notes attached to this diagnostic, e.g. one per rejected overload.
    pub sub_diagnostics: Vec<Diagnostic>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            severity,
            message: message.into(),
            location,
            sub_diagnostics: Vec::new(),
        }
    }

    /// Attach a nested note.
    pub fn with_sub(mut self, sub: Diagnostic) -> Self {
        self.sub_diagnostics.push(sub);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}: {}", location, self.severity, self.message)?,
            None => write!(f, "{}: {}", self.severity, self.message)?,
        }
        for sub in &self.sub_diagnostics {
            write!(f, "\n  {sub}")?;
        }
        Ok(())
    }
}

/// Append-only collection of diagnostics produced by one compilation.
///
/// Diagnostics are never removed once added, except through
/// [`Diagnostics::truncate`] which speculative compilation uses to discard
/// messages from a rolled back attempt.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
    failed: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity.is_failure() {
            self.failed = true;
        }
        self.diagnostics.push(diagnostic);
    }

    fn add(&mut self, severity: Severity, message: impl Into<String>, location: Option<Location>) {
        self.push(Diagnostic::new(severity, message, location));
    }

    pub fn critical(&mut self, message: impl Into<String>, location: Option<Location>) {
        self.add(Severity::Critical, message, location);
    }

    pub fn error(&mut self, message: impl Into<String>, location: Option<Location>) {
        self.add(Severity::Error, message, location);
    }

    pub fn warning(&mut self, message: impl Into<String>, location: Option<Location>) {
        self.add(Severity::Warning, message, location);
    }

    pub fn hint(&mut self, message: impl Into<String>, location: Option<Location>) {
        self.add(Severity::Hint, message, location);
    }

    pub fn optimization(&mut self, message: impl Into<String>, location: Option<Location>) {
        self.add(Severity::OptimizationNotice, message, location);
    }

    pub fn failed_optimization(&mut self, message: impl Into<String>, location: Option<Location>) {
        self.add(Severity::FailedOptimization, message, location);
    }

    pub fn internal(&mut self, message: impl Into<String>) {
        self.add(Severity::Internal, message, None);
    }

    /// Record a critical error raised in `file`.
    pub fn report(&mut self, error: CompilationError, file: FileId) {
        self.push(error.into_diagnostic(file));
    }

    /// Whether any critical or internal diagnostic was recorded.
    pub fn has_failures(&self) -> bool {
        self.failed
    }

    pub fn has_critical(&self) -> bool {
        self.has(Severity::Critical)
    }

    pub fn has(&self, severity: Severity) -> bool {
        self.diagnostics.iter().any(|d| d.severity == severity)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.iter_severity(severity).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn iter_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.severity == severity)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Drop everything recorded after `len` entries.
    pub fn truncate(&mut self, len: usize) {
        self.diagnostics.truncate(len);
        self.failed = self.diagnostics.iter().any(|d| d.severity.is_failure());
    }

    /// Move all diagnostics out of `other` into `self`.
    pub fn extend(&mut self, other: Diagnostics) {
        for diagnostic in other.diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.iter()
    }
}
