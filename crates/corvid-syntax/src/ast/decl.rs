//! Declaration AST nodes: structs, functions, operators, aliases.

use bitflags::bitflags;
use corvid_core::Span;

use crate::ast::{Block, Expr, Ident, LiteralExpr, TypeExpr};

/// An attribute attached to a declaration: `#external("puts")`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attribute<'ast> {
    pub name: Ident<'ast>,
    /// Literal arguments only.
    pub args: &'ast [LiteralExpr<'ast>],
    pub span: Span,
}

impl<'ast> Attribute<'ast> {
    /// First argument if it is a string literal.
    pub fn string_arg(&self) -> Option<&'ast str> {
        match self.args.first().map(|a| a.kind) {
            Some(crate::ast::LiteralKind::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// Find an attribute by name.
pub fn find_attribute<'a, 'ast>(
    attributes: &'a [Attribute<'ast>],
    name: &str,
) -> Option<&'a Attribute<'ast>> {
    attributes.iter().find(|a| a.name.name == name)
}

bitflags! {
    /// Parameter modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamModifiers: u8 {
        /// Receiver of method-call syntax.
        const THIS = 1 << 0;
        /// Passed by reference.
        const REF = 1 << 1;
        /// Callee takes ownership; fresh heap arguments are cleaned up after the call.
        const TEMP = 1 << 2;
        const CONST = 1 << 3;
    }
}

/// A function parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDecl<'ast> {
    pub modifiers: ParamModifiers,
    pub ty: TypeExpr<'ast>,
    pub name: Ident<'ast>,
    pub default: Option<Expr<'ast>>,
    pub span: Span,
}

/// A function, method, operator or constructor declaration.
///
/// Operators use the operator symbol as their name. Constructors and general
/// functions declared inside a struct receive their implicit `this` parameter
/// during declaration compilation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionDecl<'ast> {
    pub attributes: &'ast [Attribute<'ast>],
    pub private: bool,
    pub return_type: TypeExpr<'ast>,
    pub name: Ident<'ast>,
    pub template_params: &'ast [Ident<'ast>],
    pub params: &'ast [ParamDecl<'ast>],
    /// `None` for external, builtin and synthesized declarations.
    pub body: Option<Block<'ast>>,
    pub span: Span,
}

/// A struct field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDecl<'ast> {
    pub private: bool,
    pub ty: TypeExpr<'ast>,
    pub name: Ident<'ast>,
    pub span: Span,
}

/// Kinds of struct-bound general functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneralKind {
    /// `object[index]` read
    IndexerGet,
    /// `object[index] = value`
    IndexerSet,
    /// Called by `delete` and on `temp` cleanup
    Destructor,
}

impl GeneralKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::IndexerGet => "indexer_get",
            Self::IndexerSet => "indexer_set",
            Self::Destructor => "destructor",
        }
    }
}

/// A member of a struct body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StructMember<'ast> {
    Field(FieldDecl<'ast>),
    Method(FunctionDecl<'ast>),
    Constructor(FunctionDecl<'ast>),
    General(GeneralKind, FunctionDecl<'ast>),
}

/// `struct Name<T> { ... }`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructDecl<'ast> {
    pub attributes: &'ast [Attribute<'ast>],
    pub name: Ident<'ast>,
    pub template_params: &'ast [Ident<'ast>],
    pub members: &'ast [StructMember<'ast>],
    pub span: Span,
}

impl<'ast> StructDecl<'ast> {
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl<'ast>> {
        self.members.iter().filter_map(|m| match m {
            StructMember::Field(f) => Some(f),
            _ => None,
        })
    }
}

/// `alias Name = T;`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AliasDecl<'ast> {
    pub attributes: &'ast [Attribute<'ast>],
    pub name: Ident<'ast>,
    pub target: TypeExpr<'ast>,
    pub span: Span,
}
