//! Core types shared by the Corvid syntax tree and the semantic compiler.
//!
//! This crate has no knowledge of the syntax tree or of compiled declarations.
//! It provides:
//!
//! - [`Span`], [`Location`] and [`FileId`] for source positions
//! - [`CompilationError`] for critical user errors propagated with `?`
//! - [`Diagnostics`] for the append-only diagnostic collection
//! - [`BuiltinType`], [`BitWidth`] and [`CompiledValue`] for scalar semantics
//! - [`CompilerSettings`] and [`OptimizationFlags`] for compiler configuration

mod builtin;
mod diagnostics;
mod error;
mod settings;
mod span;
mod value;

pub use builtin::{BitWidth, BuiltinType};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::CompilationError;
pub use settings::{CompilerSettings, OptimizationFlags};
pub use span::{FileId, Location, Span};
pub use value::{CompiledValue, ValueError};
