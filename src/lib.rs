//! Corvid
//!
//! The semantic core of the Corvid compiler: parsed files go in, a
//! type-checked and partially optimized compiled statement tree comes out.
//!
//! ## Crates
//!
//! - [`corvid_core`]: spans, errors, diagnostics, scalar values and settings
//! - [`corvid_syntax`]: the syntax tree consumed from a parser
//! - [`corvid_compiler`]: type system, overload resolution, lowering and
//!   optimization
//!
//! ## Example
//!
//! ```
//! use corvid::{AstBuilder, Bump, CompilerInputs, FileId, compile};
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena, FileId(0));
//! let body = [b.ret(Some(b.int(0)))];
//! let main = b.function(b.ty("i32"), "main", &[], &body);
//! let main = b.with_attributes(main, &[b.attribute("export", &[])]);
//! let files = [b.file("main.cv", &[b.fn_item(main)])];
//!
//! let result = compile(&files, &CompilerInputs::default());
//! assert!(result.is_success());
//! assert!(result.body_of("main").is_some());
//! ```

pub use bumpalo::Bump;
pub use corvid_compiler::*;
pub use corvid_core::{
    BitWidth, BuiltinType, CompiledValue, CompilerSettings, Diagnostic, FileId, Location,
    OptimizationFlags, Span,
};
pub use corvid_syntax::{AstBuilder, ParsedFile};

/// The syntax tree.
pub mod syntax {
    pub use corvid_syntax::*;
}
