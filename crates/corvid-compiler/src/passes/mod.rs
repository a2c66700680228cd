//! Compiler passes.
//!
//! - [`registration`]: declarations with complete signatures
//! - [`compilation`]: top-level statements, then every reachable body until
//!   nothing new is discovered

pub mod compilation;
pub mod registration;

pub use compilation::{CompilationOutput, CompilationPass};
pub use registration::{RegistrationOutput, RegistrationPass};
