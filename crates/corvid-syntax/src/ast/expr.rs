//! Expression AST nodes.
//!
//! Provides nodes for all expression types including:
//! - Literals (integers, floats, characters, strings, booleans)
//! - Identifiers with optional explicit template arguments
//! - Binary and unary operations
//! - Postfix operations (call, index, field access)
//! - Special expressions (cast, sizeof, new, lambda)

use corvid_core::Span;

use crate::ast::{BinaryOp, Block, Ident, ParamDecl, TypeExpr, UnaryOp};

/// An expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expr<'ast> {
    /// Literal value
    Literal(LiteralExpr<'ast>),
    /// Identifier reference
    Ident(IdentExpr<'ast>),
    /// Binary operation
    Binary(&'ast BinaryExpr<'ast>),
    /// Unary prefix operation
    Unary(&'ast UnaryExpr<'ast>),
    /// Function call, stack construction or call through a value
    Call(&'ast CallExpr<'ast>),
    /// Field access (`.`), through values and pointers alike
    Field(&'ast FieldExpr<'ast>),
    /// Array or indexer access
    Index(&'ast IndexExpr<'ast>),
    /// `expr as T`
    Cast(&'ast CastExpr<'ast>),
    /// `sizeof(T)`
    SizeOf(&'ast SizeOfExpr<'ast>),
    /// `new T(args)`
    New(&'ast NewExpr<'ast>),
    /// Anonymous function
    Lambda(&'ast LambdaExpr<'ast>),
    /// Parenthesized expression
    Paren(&'ast ParenExpr<'ast>),
}

impl<'ast> Expr<'ast> {
    /// Get the span of this expression.
    pub fn span(&self) -> Span {
        match self {
            Self::Literal(e) => e.span,
            Self::Ident(e) => e.span,
            Self::Binary(e) => e.span,
            Self::Unary(e) => e.span,
            Self::Call(e) => e.span,
            Self::Field(e) => e.span,
            Self::Index(e) => e.span,
            Self::Cast(e) => e.span,
            Self::SizeOf(e) => e.span,
            Self::New(e) => e.span,
            Self::Lambda(e) => e.span,
            Self::Paren(e) => e.span,
        }
    }

    /// Strip any number of parentheses.
    pub fn unparen(&self) -> &Expr<'ast> {
        match self {
            Self::Paren(p) => p.expr.unparen(),
            other => other,
        }
    }

    /// The identifier if this is a bare name.
    pub fn as_ident(&self) -> Option<&IdentExpr<'ast>> {
        match self.unparen() {
            Self::Ident(ident) => Some(ident),
            _ => None,
        }
    }
}

/// A literal value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiteralExpr<'ast> {
    pub kind: LiteralKind<'ast>,
    pub span: Span,
}

/// The kind of literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteralKind<'ast> {
    /// Integer literal without a decimal point
    Int(i64),
    /// Float literal
    Float(f32),
    /// Character literal
    Char(u16),
    /// `true` / `false`
    Bool(bool),
    /// String literal, without the terminating null
    String(&'ast str),
}

/// An identifier expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentExpr<'ast> {
    pub ident: Ident<'ast>,
    /// Explicit template arguments: `max<i32>`
    pub type_args: &'ast [TypeExpr<'ast>],
    pub span: Span,
}

/// A binary operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryExpr<'ast> {
    pub left: Expr<'ast>,
    pub op: BinaryOp,
    pub right: Expr<'ast>,
    pub span: Span,
}

/// A unary prefix operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnaryExpr<'ast> {
    pub op: UnaryOp,
    pub operand: Expr<'ast>,
    pub span: Span,
}

/// A call: `callee(args)`.
///
/// When the callee is a field access the call is a method call and the object
/// is passed as the implicit `this` argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallExpr<'ast> {
    pub callee: Expr<'ast>,
    pub args: &'ast [Expr<'ast>],
    pub span: Span,
}

/// Field access: `object.field`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldExpr<'ast> {
    pub object: Expr<'ast>,
    pub field: Ident<'ast>,
    pub span: Span,
}

/// Index access: `object[index]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexExpr<'ast> {
    pub object: Expr<'ast>,
    pub index: Expr<'ast>,
    pub span: Span,
}

/// Explicit cast: `expr as T`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastExpr<'ast> {
    pub expr: Expr<'ast>,
    pub target: TypeExpr<'ast>,
    pub span: Span,
}

/// `sizeof(T)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeOfExpr<'ast> {
    pub ty: TypeExpr<'ast>,
    pub span: Span,
}

/// Heap construction: `new T(args)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewExpr<'ast> {
    pub ty: TypeExpr<'ast>,
    pub args: &'ast [Expr<'ast>],
    pub span: Span,
}

/// Anonymous function: `fn(params) -> R { body }`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambdaExpr<'ast> {
    pub params: &'ast [ParamDecl<'ast>],
    /// `None` infers the return type from the first `return`.
    pub return_type: Option<TypeExpr<'ast>>,
    pub body: Block<'ast>,
    pub span: Span,
}

/// A parenthesized expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParenExpr<'ast> {
    pub expr: Expr<'ast>,
    pub span: Span,
}
