//! Critical compilation errors.
//!
//! A [`CompilationError`] aborts the smallest enclosing unit (one statement,
//! one function body or one declaration). Lowering code returns
//! `Result<T, CompilationError>` and propagates with `?`; the unit boundary
//! converts the error into a [`Diagnostic`](crate::Diagnostic) and moves on.
//!
//! Recoverable problems (bad attribute usage, protection violations, stylistic
//! warnings) never become a `CompilationError`; they are pushed straight into
//! the [`Diagnostics`](crate::Diagnostics) collection.

use thiserror::Error;

use crate::{Diagnostic, Location, Severity, Span};

/// Errors that abort compiling the current statement or declaration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    #[error("at {span}: unknown type '{name}'")]
    UnknownType { name: String, span: Span },

    /// Identifier resolution failed; `reasons` has one entry per lookup that
    /// was attempted.
    #[error("at {span}: symbol '{name}' not found")]
    UnknownSymbol {
        name: String,
        reasons: Vec<String>,
        span: Span,
    },

    #[error("at {span}: duplicate definition '{name}'")]
    DuplicateDefinition { name: String, span: Span },

    #[error("at {span}: {name} expects {expected} argument(s), got {got}")]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("at {span}: no matching overload for '{name}({args})'")]
    NoMatchingOverload {
        name: String,
        args: String,
        notes: Vec<String>,
        span: Span,
    },

    #[error("at {span}: ambiguous call to '{name}': {candidates}")]
    AmbiguousOverload {
        name: String,
        candidates: String,
        span: Span,
    },

    #[error("at {span}: {message}")]
    TypeMismatch { message: String, span: Span },

    #[error("at {span}: cannot cast '{from}' to '{to}'")]
    InvalidCast { from: String, to: String, span: Span },

    #[error("at {span}: expression is not assignable")]
    NotAnLvalue { span: Span },

    #[error("at {span}: value of '{name}' is not known at compile time")]
    NotConstant { name: String, span: Span },

    #[error("at {span}: unknown field '{field}' on type '{type_name}'")]
    UnknownField {
        field: String,
        type_name: String,
        span: Span,
    },

    #[error("at {span}: not all paths of '{function}' return a value")]
    MissingReturn { function: String, span: Span },

    #[error("at {span}: invalid generator: {message}")]
    InvalidGenerator { message: String, span: Span },

    #[error("at {span}: invalid attribute '{name}': {message}")]
    InvalidAttribute {
        name: String,
        message: String,
        span: Span,
    },

    #[error("at {span}: '{name}' expects {expected} type argument(s), got {got}")]
    TemplateArgCountMismatch {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("at {span}: {message}")]
    Other { message: String, span: Span },

    /// A compiler invariant was broken. Reported with `Internal` severity.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CompilationError {
    /// Span the error points at; internal errors have no location.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnknownType { span, .. }
            | Self::UnknownSymbol { span, .. }
            | Self::DuplicateDefinition { span, .. }
            | Self::ArgumentCountMismatch { span, .. }
            | Self::NoMatchingOverload { span, .. }
            | Self::AmbiguousOverload { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::InvalidCast { span, .. }
            | Self::NotAnLvalue { span }
            | Self::NotConstant { span, .. }
            | Self::UnknownField { span, .. }
            | Self::MissingReturn { span, .. }
            | Self::InvalidGenerator { span, .. }
            | Self::InvalidAttribute { span, .. }
            | Self::TemplateArgCountMismatch { span, .. }
            | Self::Other { span, .. } => Some(*span),
            Self::Internal { .. } => None,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Internal { .. } => Severity::Internal,
            _ => Severity::Critical,
        }
    }

    /// Shorthand for [`CompilationError::Other`].
    pub fn other(message: impl Into<String>, span: Span) -> Self {
        Self::Other {
            message: message.into(),
            span,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Convert into a diagnostic located in `file`.
    ///
    /// Aggregated reasons and overload notes become sub-diagnostics.
    pub fn into_diagnostic(self, file: crate::FileId) -> Diagnostic {
        let location = self.span().map(|span| Location::new(file, span));
        let severity = self.severity();
        let notes = match &self {
            Self::UnknownSymbol { reasons, .. } => reasons.clone(),
            Self::NoMatchingOverload { notes, .. } => notes.clone(),
            _ => Vec::new(),
        };
        let message = match &self {
            Self::Internal { message } => message.clone(),
            other => strip_location(&other.to_string()),
        };
        let mut diagnostic = Diagnostic::new(severity, message, location);
        for note in notes {
            diagnostic
                .sub_diagnostics
                .push(Diagnostic::new(Severity::Hint, note, location));
        }
        diagnostic
    }
}

/// Drop the `at line:col: ` prefix since diagnostics carry their own location.
fn strip_location(message: &str) -> String {
    match message.strip_prefix("at ") {
        Some(rest) => match rest.split_once(": ") {
            Some((_, tail)) => tail.to_string(),
            None => message.to_string(),
        },
        None => message.to_string(),
    }
}
