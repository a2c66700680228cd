//! Statement lowering.
//!
//! The [`StmtCompiler`] lowers AST statements of the innermost frame into
//! [`CompiledStatement`]s, handling:
//! - Blocks with their own scope, labels and `temp` cleanup
//! - Variable and constant declarations, globals at the outermost top level
//! - Assignments through [`compile_assignment`](crate::expr::compile_assignment)
//! - `if`, `while` and `for`, trimmed when the condition is a known constant
//! - `return` with lambda return type inference and generator status codes
//! - `break`, `goto`, labels, `yield` and `delete`
//!
//! A failing statement is reported and skipped; the rest of the block is
//! still lowered.
//!
//! # Example
//!
//! ```ignore
//! let (block, frame) = ctx.in_frame(frame, |ctx| StmtCompiler::new(ctx).compile_block(&body));
//! ```

mod block;
mod for_stmt;
mod if_stmt;
mod jump;
mod return_stmt;
mod var_decl;
mod while_stmt;

use corvid_core::{CompilationError, OptimizationFlags, Span};
use corvid_syntax::{Expr, ExprStmt, Stmt};

use crate::context::CompilationContext;
use crate::expr::{ExprCompiler, compile_assignment};
use crate::inline;
use crate::ir::{CompiledExpr, CompiledStatement, ExprKind};

type Result<T> = std::result::Result<T, CompilationError>;

/// Lowers statements of the innermost frame.
pub struct StmtCompiler<'a, 'ast> {
    /// Compilation session with declarations, diagnostics and the frame stack
    ctx: &'a mut CompilationContext<'ast>,
}

impl<'a, 'ast> StmtCompiler<'a, 'ast> {
    pub fn new(ctx: &'a mut CompilationContext<'ast>) -> Self {
        Self { ctx }
    }

    /// Lower one statement; a statement may expand to several or to none.
    pub fn compile(&mut self, stmt: &Stmt<'ast>) -> Result<Vec<CompiledStatement>> {
        match stmt {
            Stmt::Expr(expr_stmt) => self.compile_expr_stmt(expr_stmt),
            Stmt::VarDecl(decl) => self.compile_var_decl(decl),
            Stmt::Assign(assignment) => {
                let mut compiler = self.expr_compiler();
                Ok(vec![compile_assignment(&mut compiler, assignment)?])
            }
            Stmt::Return(ret) => self.compile_return(ret),
            Stmt::Break(span) => self.compile_break(*span),
            Stmt::Goto(goto) => self.compile_goto(goto),
            Stmt::Label(label) => self.compile_label(label),
            Stmt::Block(block) => Ok(vec![CompiledStatement::Block(self.compile_block(block))]),
            Stmt::If(if_stmt) => self.compile_if(if_stmt),
            Stmt::While(while_stmt) => self.compile_while(while_stmt),
            Stmt::For(for_stmt) => self.compile_for(for_stmt),
            Stmt::Yield(yield_stmt) => self.compile_yield(yield_stmt),
            Stmt::Delete(delete) => self.compile_delete(delete),
        }
    }

    /// Evaluate an expression for its side effects.
    ///
    /// Calls in statement position may be replaced by the callee's single
    /// statement.
    fn compile_expr_stmt(&mut self, expr_stmt: &ExprStmt<'ast>) -> Result<Vec<CompiledStatement>> {
        let value = ExprCompiler::for_statement(self.ctx).infer(&expr_stmt.expr)?;
        if let ExprKind::Call { function, .. } = &value.kind {
            let forced = self.ctx.decls.function(*function).inline;
            if (forced || self.ctx.settings.optimizes(OptimizationFlags::FUNCTION_INLINING))
                && let Some(inlined) = inline::inline_statement(self.ctx, &value)
            {
                return Ok(inlined);
            }
        }
        Ok(vec![CompiledStatement::Expression(value.discarded())])
    }

    /// Lower a condition of `if`, `while` or `for`.
    ///
    /// Conditions are numbers or pointers; constant conditions come back as
    /// literals.
    fn condition(&mut self, condition: &Expr<'ast>) -> Result<CompiledExpr> {
        let mut compiler = self.expr_compiler();
        let value = compiler.infer(condition)?;
        if !value.ty.is_numeric() && !value.ty.is_pointer() {
            return Err(CompilationError::TypeMismatch {
                message: format!(
                    "condition must be a number or a pointer, got '{}'",
                    value.ty.display(&compiler.ctx.decls)
                ),
                span: value.span,
            });
        }
        Ok(compiler.fold(value))
    }

    /// Constant value of a condition when unreachable branches may be
    /// dropped.
    fn constant_condition(&self, condition: &CompiledExpr) -> Option<bool> {
        if !self.ctx.settings.optimizes(OptimizationFlags::TRIM_UNREACHABLE) {
            return None;
        }
        condition.as_literal().map(|value| value.is_truthy())
    }

    fn trimmed(&mut self, what: &str, span: Span) {
        self.ctx.optimization_notice(format!("{what} removed, its condition is constant"), span);
    }

    fn expr_compiler(&mut self) -> ExprCompiler<'_, 'ast> {
        ExprCompiler::new(self.ctx)
    }
}
