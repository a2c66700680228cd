//! `while` loops.

use corvid_syntax::{Stmt, WhileStmt};

use super::{Result, StmtCompiler};
use crate::ir::{CompiledBlock, CompiledStatement};

impl<'a, 'ast> StmtCompiler<'a, 'ast> {
    /// Lower a `while` loop; a loop whose condition is constantly false is
    /// dropped.
    pub fn compile_while(
        &mut self,
        while_stmt: &WhileStmt<'ast>,
    ) -> Result<Vec<CompiledStatement>> {
        let condition = self.condition(&while_stmt.condition)?;
        if self.constant_condition(&condition) == Some(false) {
            self.trimmed("loop", while_stmt.span);
            return Ok(Vec::new());
        }
        let body = self.compile_loop_body(&while_stmt.body);
        Ok(vec![CompiledStatement::While {
            condition,
            body,
            span: while_stmt.span,
        }])
    }

    /// Lower a loop body, where `break` is allowed.
    pub(super) fn compile_loop_body(&mut self, body: &Stmt<'ast>) -> CompiledBlock {
        if let Some(frame) = self.ctx.frame_mut() {
            frame.loop_depth += 1;
        }
        let block = self.compile_branch(body);
        if let Some(frame) = self.ctx.frame_mut() {
            frame.loop_depth -= 1;
        }
        block
    }
}
