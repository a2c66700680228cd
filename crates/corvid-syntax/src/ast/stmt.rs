//! Statement AST nodes.

use bitflags::bitflags;
use corvid_core::Span;

use crate::ast::{AssignOp, Attribute, Expr, Ident, TypeExpr};

/// A statement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stmt<'ast> {
    /// Expression evaluated for its side effects
    Expr(ExprStmt<'ast>),
    /// Variable or constant declaration
    VarDecl(&'ast VarDeclStmt<'ast>),
    /// Plain, compound, increment or decrement assignment
    Assign(&'ast AssignStmt<'ast>),
    Return(ReturnStmt<'ast>),
    Break(Span),
    /// Jump to an instruction label or a label address value
    Goto(GotoStmt<'ast>),
    /// Instruction label declaration
    Label(LabelStmt<'ast>),
    Block(Block<'ast>),
    If(&'ast IfStmt<'ast>),
    While(&'ast WhileStmt<'ast>),
    For(&'ast ForStmt<'ast>),
    /// `yield value;`, only valid inside generator functions
    Yield(YieldStmt<'ast>),
    /// `delete value;`
    Delete(DeleteStmt<'ast>),
}

impl<'ast> Stmt<'ast> {
    pub fn span(&self) -> Span {
        match self {
            Self::Expr(s) => s.span,
            Self::VarDecl(s) => s.span,
            Self::Assign(s) => s.span,
            Self::Return(s) => s.span,
            Self::Break(span) => *span,
            Self::Goto(s) => s.span,
            Self::Label(s) => s.span,
            Self::Block(b) => b.span,
            Self::If(s) => s.span,
            Self::While(s) => s.span,
            Self::For(s) => s.span,
            Self::Yield(s) => s.span,
            Self::Delete(s) => s.span,
        }
    }
}

/// A braced sequence of statements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block<'ast> {
    pub stmts: &'ast [Stmt<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExprStmt<'ast> {
    pub expr: Expr<'ast>,
    pub span: Span,
}

bitflags! {
    /// Modifiers on variable declarations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VarModifiers: u8 {
        /// Compile-time constant.
        const CONST = 1 << 0;
        /// Heap value destroyed and freed when the scope ends.
        const TEMP = 1 << 1;
    }
}

/// `T name = init;`, `var name = init;` or `const T name = init;`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarDeclStmt<'ast> {
    pub attributes: &'ast [Attribute<'ast>],
    pub modifiers: VarModifiers,
    pub ty: TypeExpr<'ast>,
    pub name: Ident<'ast>,
    pub init: Option<Expr<'ast>>,
    pub span: Span,
}

/// `target op value;`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignStmt<'ast> {
    pub target: Expr<'ast>,
    pub op: AssignOp,
    /// `None` for `++` and `--`
    pub value: Option<Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnStmt<'ast> {
    pub value: Option<Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GotoStmt<'ast> {
    pub target: Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelStmt<'ast> {
    pub name: Ident<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IfStmt<'ast> {
    pub condition: Expr<'ast>,
    pub then_branch: Stmt<'ast>,
    pub else_branch: Option<Stmt<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhileStmt<'ast> {
    pub condition: Expr<'ast>,
    pub body: Stmt<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForStmt<'ast> {
    pub init: Option<Stmt<'ast>>,
    pub condition: Option<Expr<'ast>>,
    pub step: Option<Stmt<'ast>>,
    pub body: Stmt<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldStmt<'ast> {
    pub value: Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeleteStmt<'ast> {
    pub value: Expr<'ast>,
    pub span: Span,
}
