//! Blocks and their scopes.
//!
//! Labels of a block are declared before its statements so that `goto` may
//! jump forward. `temp` locals are deleted when the block ends.

use corvid_core::{CompilationError, Span};
use corvid_syntax::{Block, Stmt};

use super::{Result, StmtCompiler};
use crate::expr::{deallocator, destructor};
use crate::generator;
use crate::ir::{CompiledBlock, CompiledStatement};
use crate::return_checker::all_paths_return;

impl<'a, 'ast> StmtCompiler<'a, 'ast> {
    /// Lower a block in a fresh scope.
    pub fn compile_block(&mut self, block: &Block<'ast>) -> CompiledBlock {
        self.ctx
            .in_scope(|ctx| StmtCompiler::new(ctx).scoped_statements(block.stmts, block.span))
    }

    /// Lower the body of `if`, `while` or `for` in its own scope.
    pub(super) fn compile_branch(&mut self, stmt: &Stmt<'ast>) -> CompiledBlock {
        match stmt {
            Stmt::Block(block) => self.compile_block(block),
            other => self.ctx.in_scope(|ctx| {
                StmtCompiler::new(ctx).scoped_statements(std::slice::from_ref(other), other.span())
            }),
        }
    }

    fn scoped_statements(&mut self, stmts: &[Stmt<'ast>], span: Span) -> CompiledBlock {
        for stmt in stmts {
            if let Stmt::Label(label) = stmt {
                let declared = match self.ctx.frame_mut() {
                    Some(frame) => frame.declare_label(label.name.name, label.span),
                    None => continue,
                };
                if declared.is_err() {
                    self.ctx.report(CompilationError::DuplicateDefinition {
                        name: label.name.name.to_string(),
                        span: label.span,
                    });
                }
            }
        }

        let mut lowered = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            match self.compile(stmt) {
                Ok(compiled) => lowered.extend(compiled),
                Err(err) => self.ctx.report(err),
            }
        }

        let mut block = CompiledBlock::new(lowered, span);
        if !all_paths_return(&block) {
            match self.cleanup_temps(span) {
                Ok(cleanup) => block.stmts.extend(cleanup),
                Err(err) => self.ctx.report(err),
            }
        }
        block
    }

    /// Delete the `temp` locals of the innermost scope, latest first.
    fn cleanup_temps(&mut self, span: Span) -> Result<Vec<CompiledStatement>> {
        let Some(frame) = self.ctx.frame() else {
            return Ok(Vec::new());
        };
        let values: Vec<_> = frame
            .scope_temps()
            .into_iter()
            .map(|id| generator::local_expr(frame, id, span))
            .collect();

        let mut cleanup = Vec::with_capacity(values.len());
        for value in values {
            let destructor = destructor(self.ctx, &value.ty, span)?;
            let deallocator = deallocator(self.ctx, &value.ty, span)?;
            cleanup.push(CompiledStatement::Delete {
                value,
                destructor,
                deallocator,
                span,
            });
        }
        Ok(cleanup)
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{CompilerSettings, FileId, Severity};
    use corvid_syntax::{AstBuilder, VarModifiers};

    use super::*;
    use crate::context::{CompilationContext, CompilerInputs};
    use crate::scope::{Frame, FrameKind};
    use crate::types::GeneralType;

    fn function_frame() -> Frame {
        Frame::new(FrameKind::Function, None, Some(GeneralType::VOID))
    }

    #[test]
    fn failing_statements_do_not_stop_the_block() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let body = b.block(&[
            b.expr_stmt(b.name("missing")),
            b.var(b.ty("i32"), "x", Some(b.int(1))),
        ]);
        let (block, frame) = ctx.in_frame(function_frame(), |ctx| {
            StmtCompiler::new(ctx).compile_block(&body)
        });
        assert_eq!(block.stmts.len(), 1);
        assert_eq!(frame.locals.len(), 1);
        assert_eq!(ctx.diagnostics.count(Severity::Critical), 1);
    }

    #[test]
    fn block_locals_leave_scope() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let body = b.block(&[
            b.block_stmt(&[b.var(b.ty("i32"), "inner", Some(b.int(1)))]),
            b.expr_stmt(b.name("inner")),
        ]);
        let _ = ctx.in_frame(function_frame(), |ctx| StmtCompiler::new(ctx).compile_block(&body));
        assert_eq!(ctx.diagnostics.count(Severity::Critical), 1);
    }

    #[test]
    fn labels_are_visible_before_their_declaration() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let body = b.block(&[b.goto("done"), b.label("done")]);
        let (block, frame) = ctx.in_frame(function_frame(), |ctx| {
            StmtCompiler::new(ctx).compile_block(&body)
        });
        assert!(ctx.diagnostics.is_empty());
        assert!(matches!(block.stmts[0], CompiledStatement::Goto { .. }));
        assert!(matches!(block.stmts[1], CompiledStatement::Label { .. }));
        assert_eq!(frame.labels.len(), 1);
    }

    #[test]
    fn temp_locals_are_deleted_at_scope_end() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let body = b.block(&[b.var_with(
            VarModifiers::TEMP,
            b.pointer(b.ty("u8")),
            "buffer",
            Some(b.cast(b.name("SP"), b.pointer(b.ty("u8")))),
        )]);
        let (block, _) = ctx.in_frame(function_frame(), |ctx| {
            StmtCompiler::new(ctx).compile_block(&body)
        });
        assert_eq!(block.stmts.len(), 2);
        match &block.stmts[1] {
            CompiledStatement::Delete {
                destructor, deallocator, ..
            } => {
                assert!(destructor.is_none());
                assert!(deallocator.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
