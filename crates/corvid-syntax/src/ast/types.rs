//! Type expressions as written in source.

use corvid_core::Span;

use crate::ast::{Expr, Ident};

/// A type as written in source.
///
/// Resolution into a semantic type happens in the compiler; this node keeps
/// only the syntax.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeExpr<'ast> {
    /// A named type with optional template arguments: `i32`, `List<u8>`.
    Named {
        name: Ident<'ast>,
        type_args: &'ast [TypeExpr<'ast>],
    },
    /// `T*`
    Pointer {
        to: &'ast TypeExpr<'ast>,
        span: Span,
    },
    /// `T[N]` or `T[]`
    Array {
        of: &'ast TypeExpr<'ast>,
        length: Option<&'ast Expr<'ast>>,
        span: Span,
    },
    /// `fn(A, B) -> R`
    Function {
        return_type: &'ast TypeExpr<'ast>,
        params: &'ast [TypeExpr<'ast>],
        span: Span,
    },
    /// `var`, inferred from the initializer.
    Inferred(Span),
}

impl<'ast> TypeExpr<'ast> {
    pub fn span(&self) -> Span {
        match self {
            Self::Named { name, .. } => name.span,
            Self::Pointer { span, .. }
            | Self::Array { span, .. }
            | Self::Function { span, .. }
            | Self::Inferred(span) => *span,
        }
    }

    /// The identifier if this is a plain name without template arguments.
    pub fn simple_name(&self) -> Option<&'ast str> {
        match self {
            Self::Named { name, type_args } if type_args.is_empty() => Some(name.name),
            _ => None,
        }
    }

    pub fn is_inferred(&self) -> bool {
        matches!(self, Self::Inferred(_))
    }
}
