//! `if` / `else`.

use corvid_syntax::IfStmt;

use super::{Result, StmtCompiler};
use crate::ir::CompiledStatement;

impl<'a, 'ast> StmtCompiler<'a, 'ast> {
    /// Lower an `if`; with a constant condition only the taken branch is
    /// kept.
    pub fn compile_if(&mut self, if_stmt: &IfStmt<'ast>) -> Result<Vec<CompiledStatement>> {
        let condition = self.condition(&if_stmt.condition)?;

        if let Some(taken) = self.constant_condition(&condition) {
            let branch = if taken {
                Some(&if_stmt.then_branch)
            } else {
                if_stmt.else_branch.as_ref()
            };
            self.trimmed(if taken { "else branch" } else { "then branch" }, if_stmt.span);
            return Ok(branch
                .map(|stmt| CompiledStatement::Block(self.compile_branch(stmt)))
                .into_iter()
                .collect());
        }

        let then_branch = self.compile_branch(&if_stmt.then_branch);
        let else_branch = if_stmt.else_branch.as_ref().map(|stmt| self.compile_branch(stmt));
        Ok(vec![CompiledStatement::If {
            condition,
            then_branch,
            else_branch,
            span: if_stmt.span,
        }])
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{CompilerSettings, Diagnostics, FileId, Severity};
    use corvid_syntax::AstBuilder;

    use super::*;
    use crate::context::{CompilationContext, CompilerInputs};
    use crate::scope::{Frame, FrameKind};
    use crate::types::GeneralType;

    fn lower(settings: CompilerSettings) -> (Vec<CompiledStatement>, Diagnostics) {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let stmt = b.if_stmt(
            b.boolean(false),
            b.expr_stmt(b.int(1)),
            Some(b.expr_stmt(b.int(2))),
        );
        let mut ctx = CompilationContext::new(&CompilerInputs::new(settings));
        let frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        let (result, _) = ctx.in_frame(frame, |ctx| {
            StmtCompiler::new(ctx).compile(&stmt)
        });
        (result.unwrap(), ctx.diagnostics)
    }

    #[test]
    fn constant_conditions_keep_only_the_taken_branch() {
        let (lowered, diagnostics) = lower(CompilerSettings::default());
        assert!(matches!(lowered.as_slice(), [CompiledStatement::Block(_)]));
        assert_eq!(diagnostics.count(Severity::OptimizationNotice), 1);
    }

    #[test]
    fn trimming_follows_settings() {
        let (lowered, diagnostics) = lower(CompilerSettings::unoptimized());
        assert!(matches!(
            lowered.as_slice(),
            [CompiledStatement::If { else_branch: Some(_), .. }]
        ));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn conditions_must_be_scalar() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let stmt = b.if_stmt(b.lambda(&[], None, &[]), b.expr_stmt(b.int(1)), None);
        let frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        let (result, _) = ctx.in_frame(frame, |ctx| {
            StmtCompiler::new(ctx).compile(&stmt)
        });
        assert!(result.is_err());
    }
}
