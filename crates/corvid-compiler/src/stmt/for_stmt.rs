//! `for` loops.
//!
//! The initializer opens a scope that covers the condition, the step and the
//! body.

use corvid_syntax::ForStmt;

use super::{Result, StmtCompiler};
use crate::ir::{CompiledBlock, CompiledStatement};

impl<'a, 'ast> StmtCompiler<'a, 'ast> {
    pub fn compile_for(&mut self, for_stmt: &ForStmt<'ast>) -> Result<Vec<CompiledStatement>> {
        let span = for_stmt.span;
        let lowered = self.ctx.in_scope(|ctx| -> Result<CompiledStatement> {
            let mut compiler = StmtCompiler::new(ctx);
            let init = match &for_stmt.init {
                Some(init) => compiler.compile(init)?,
                None => Vec::new(),
            };
            let condition = for_stmt
                .condition
                .as_ref()
                .map(|condition| compiler.condition(condition))
                .transpose()?;

            if let Some(condition) = &condition
                && compiler.constant_condition(condition) == Some(false)
            {
                compiler.trimmed("loop", span);
                return Ok(CompiledStatement::Block(CompiledBlock::new(init, span)));
            }

            let step = match &for_stmt.step {
                Some(step) => compiler.compile(step)?,
                None => Vec::new(),
            };
            let body = compiler.compile_loop_body(&for_stmt.body);
            Ok(CompiledStatement::For {
                init,
                condition,
                step,
                body,
                span,
            })
        })?;
        Ok(vec![lowered])
    }
}
