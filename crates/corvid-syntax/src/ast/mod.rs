//! Abstract Syntax Tree (AST) for Corvid.
//!
//! All nodes are allocated in a [`bumpalo::Bump`] arena owned by the host
//! and borrow from it for `'ast`. Nodes are `Copy`; recursion goes through
//! arena references.

pub mod decl;
pub mod expr;
pub mod ops;
pub mod stmt;
pub mod types;

pub use decl::*;
pub use expr::*;
pub use ops::*;
pub use stmt::*;
pub use types::*;

use corvid_core::{FileId, Span};

/// An identifier with its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ident<'ast> {
    pub name: &'ast str,
    pub span: Span,
}

impl<'ast> Ident<'ast> {
    pub fn new(name: &'ast str, span: Span) -> Self {
        Self { name, span }
    }
}

/// A top-level item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'ast> {
    Struct(&'ast StructDecl<'ast>),
    Function(&'ast FunctionDecl<'ast>),
    /// Operator overload, named by its symbol
    Operator(&'ast FunctionDecl<'ast>),
    Alias(&'ast AliasDecl<'ast>),
    /// Top-level statement; outermost variable declarations become globals
    Statement(&'ast Stmt<'ast>),
}

/// A parsed source file handed over by the parser.
#[derive(Debug, Clone, Copy)]
pub struct ParsedFile<'ast> {
    pub file: FileId,
    pub path: &'ast str,
    pub items: &'ast [Item<'ast>],
}

impl<'ast> ParsedFile<'ast> {
    pub fn structs(&self) -> impl Iterator<Item = &'ast StructDecl<'ast>> {
        self.items.iter().filter_map(|i| match i {
            Item::Struct(s) => Some(*s),
            _ => None,
        })
    }

    pub fn aliases(&self) -> impl Iterator<Item = &'ast AliasDecl<'ast>> {
        self.items.iter().filter_map(|i| match i {
            Item::Alias(a) => Some(*a),
            _ => None,
        })
    }

    pub fn statements(&self) -> impl Iterator<Item = &'ast Stmt<'ast>> {
        self.items.iter().filter_map(|i| match i {
            Item::Statement(s) => Some(*s),
            _ => None,
        })
    }
}
