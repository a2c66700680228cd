//! `return`.
//!
//! A lambda without a declared return type takes the type of its first
//! `return`. Inside a generator body every `return` reports exhaustion.

use corvid_core::CompilationError;
use corvid_syntax::ReturnStmt;

use super::{Result, StmtCompiler};
use crate::generator;
use crate::ir::CompiledStatement;
use crate::types::GeneralType;

impl<'a, 'ast> StmtCompiler<'a, 'ast> {
    pub fn compile_return(&mut self, ret: &ReturnStmt<'ast>) -> Result<Vec<CompiledStatement>> {
        let span = ret.span;
        let Some(frame) = self.ctx.frame() else {
            return Err(CompilationError::internal("return outside of a frame"));
        };
        if frame.generator.is_some() {
            if ret.value.is_some() {
                return Err(CompilationError::InvalidGenerator {
                    message: "generators return without a value".into(),
                    span,
                });
            }
            return Ok(vec![generator::lower_return(span)]);
        }

        let value = match (frame.return_type.clone(), &ret.value) {
            (None, value) => {
                let value = value.as_ref().map(|v| self.expr_compiler().infer(v)).transpose()?;
                let inferred = value.as_ref().map_or(GeneralType::VOID, |v| v.ty.clone());
                if let Some(frame) = self.ctx.frame_mut() {
                    frame.return_type = Some(inferred);
                }
                value
            }
            (Some(expected), None) if !expected.is_void() => {
                let expected = expected.display(&self.ctx.decls);
                return Err(CompilationError::TypeMismatch {
                    message: format!("missing return value of type '{expected}'"),
                    span,
                });
            }
            (Some(_), None) => None,
            (Some(expected), Some(_)) if expected.is_void() => {
                return Err(CompilationError::TypeMismatch {
                    message: "a void function cannot return a value".into(),
                    span,
                });
            }
            (Some(expected), Some(value)) => Some(self.expr_compiler().check(value, &expected)?),
        };
        Ok(vec![CompiledStatement::Return { value, span }])
    }
}
