//! `break`, `goto`, labels, `yield` and `delete`.

use corvid_core::{CompilationError, Span};
use corvid_syntax::{DeleteStmt, GotoStmt, LabelStmt, YieldStmt};

use super::{Result, StmtCompiler};
use crate::expr::{deallocator, destructor};
use crate::generator;
use crate::ir::{CompiledStatement, LabelRef};

impl<'a, 'ast> StmtCompiler<'a, 'ast> {
    pub fn compile_break(&mut self, span: Span) -> Result<Vec<CompiledStatement>> {
        if self.ctx.frame().is_none_or(|f| f.loop_depth == 0) {
            return Err(CompilationError::other("break statement not inside a loop", span));
        }
        Ok(vec![CompiledStatement::Break(span)])
    }

    /// `goto label;` or `goto pointer;`
    pub fn compile_goto(&mut self, goto: &GotoStmt<'ast>) -> Result<Vec<CompiledStatement>> {
        let mut compiler = self.expr_compiler();
        let target = compiler.infer(&goto.target)?;
        if !target.ty.is_pointer() {
            return Err(CompilationError::TypeMismatch {
                message: format!(
                    "goto needs a label or an address, got '{}'",
                    target.ty.display(&compiler.ctx.decls)
                ),
                span: goto.span,
            });
        }
        Ok(vec![CompiledStatement::Goto {
            target,
            span: goto.span,
        }])
    }

    /// Labels were declared when their block was entered.
    pub fn compile_label(&mut self, label: &LabelStmt<'ast>) -> Result<Vec<CompiledStatement>> {
        let name = label.name.name;
        let found = match self.ctx.frame() {
            Some(frame) if frame.is_global_scope() => self
                .ctx
                .decls
                .find_label(name, self.ctx.file())
                .map(LabelRef::Global),
            Some(frame) => frame.find_label(name).map(LabelRef::Local),
            None => None,
        };
        let Some(label_ref) = found else {
            return Err(CompilationError::internal(format!("label '{name}' was not declared")));
        };
        Ok(vec![CompiledStatement::Label {
            label: label_ref,
            span: label.span,
        }])
    }

    /// `yield value;` inside a generator function.
    pub fn compile_yield(
        &mut self,
        yield_stmt: &YieldStmt<'ast>,
    ) -> Result<Vec<CompiledStatement>> {
        let span = yield_stmt.span;
        let Some(element) = self
            .ctx
            .frame()
            .and_then(|f| f.generator.as_ref())
            .map(|g| g.element.clone())
        else {
            return Err(CompilationError::InvalidGenerator {
                message: "yield outside of a generator function".into(),
                span,
            });
        };
        let value = self.expr_compiler().check(&yield_stmt.value, &element)?;
        generator::lower_yield(self.ctx, value, span)
    }

    /// `delete pointer;` runs the destructor, then frees the memory.
    pub fn compile_delete(&mut self, delete: &DeleteStmt<'ast>) -> Result<Vec<CompiledStatement>> {
        let span = delete.span;
        let value = self.expr_compiler().infer(&delete.value)?;
        if !value.ty.is_pointer() {
            return Err(CompilationError::TypeMismatch {
                message: format!("cannot delete '{}'", value.ty.display(&self.ctx.decls)),
                span,
            });
        }
        let destructor = destructor(self.ctx, &value.ty, span)?;
        let deallocator = deallocator(self.ctx, &value.ty, span)?;
        if destructor.is_none() && deallocator.is_none() {
            self.ctx
                .warning("delete has no effect, neither a destructor nor 'free' exists", span);
        }
        Ok(vec![CompiledStatement::Delete {
            value,
            destructor,
            deallocator,
            span,
        }])
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{CompilerSettings, FileId};
    use corvid_syntax::AstBuilder;

    use super::*;
    use crate::context::{CompilationContext, CompilerInputs};
    use crate::scope::{Frame, FrameKind};
    use crate::types::GeneralType;

    #[test]
    fn yield_needs_a_generator() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let stmt = b.yield_stmt(b.int(1));
        let frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        let (result, _) = ctx.in_frame(frame, |ctx| {
            StmtCompiler::new(ctx).compile(&stmt)
        });
        assert!(matches!(result, Err(CompilationError::InvalidGenerator { .. })));
    }

    #[test]
    fn goto_needs_an_address() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let stmt = b.goto("__line__");
        let frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        let (result, _) = ctx.in_frame(frame, |ctx| {
            StmtCompiler::new(ctx).compile(&stmt)
        });
        assert!(matches!(result, Err(CompilationError::TypeMismatch { .. })));
    }
}
