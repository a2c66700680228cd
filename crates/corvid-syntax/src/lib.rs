//! Corvid syntax tree.
//!
//! The semantic compiler consumes already-parsed files. This crate defines the
//! arena-allocated tree it consumes and an [`AstBuilder`] for constructing
//! trees without a parser.
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use corvid_core::FileId;
//! use corvid_syntax::AstBuilder;
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena, FileId(0));
//! let body = [b.ret(Some(b.int(0)))];
//! let main = b.function(b.ty("i32"), "main", &[], &body);
//! let file = b.file("main.cv", &[b.fn_item(main)]);
//! assert_eq!(file.items.len(), 1);
//! ```

pub mod ast;
mod builder;

pub use ast::*;
pub use builder::AstBuilder;
