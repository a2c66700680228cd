//! Assignment targets and stores.
//!
//! A [`Setter`] is the write side of an lvalue: either plain storage or the
//! `indexer_set` general function of a struct. Compound assignments read
//! through the matching getter, combine and store.

use corvid_core::{CompilationError, CompiledValue, Span};
use corvid_syntax::{AssignStmt, Expr, GeneralKind};

use super::{ExprCompiler, Result, binary, calls, is_source_literal, member};
use crate::ir::{AssignTarget, CompiledExpr, CompiledStatement};
use crate::overload::{FunctionQuery, QueryArgument, find_function};
use crate::registry::CallableKind;
use crate::types::GeneralType;

/// The write side of an assignment.
#[derive(Debug, Clone)]
pub enum Setter {
    Store {
        target: AssignTarget,
        ty: GeneralType,
    },
    /// `object[index] = value` on a struct.
    Indexer {
        object: CompiledExpr,
        index: CompiledExpr,
        literal: bool,
    },
}

impl Setter {
    /// Type a stored value must have, when known up front.
    pub fn value_type(&self) -> Option<&GeneralType> {
        match self {
            Self::Store { ty, .. } => Some(ty),
            Self::Indexer { .. } => None,
        }
    }

    /// Read the current value.
    pub fn current(&self, compiler: &mut ExprCompiler<'_, '_>, span: Span) -> Result<CompiledExpr> {
        match self {
            Self::Store { target, ty } => Ok(target.as_expr(ty.clone(), span)),
            Self::Indexer { object, index, literal } => {
                member::indexer_get(compiler, object.clone(), index.clone(), *literal, span)
            }
        }
    }
}

/// Lower the target of an assignment.
pub fn compile_setter<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    target: &Expr<'ast>,
) -> Result<Setter> {
    let span = target.span();
    let value = match target.unparen() {
        Expr::Index(index) => {
            let object = compiler.infer(&index.object)?;
            if object.ty.struct_or_pointee().is_some() {
                let position = compiler.infer(&index.index)?;
                return Ok(Setter::Indexer {
                    object,
                    index: position,
                    literal: is_source_literal(&index.index),
                });
            }
            member::index_into(compiler, object, &index.index, index.span)?
        }
        other => compiler.infer(other)?,
    };
    match AssignTarget::from_expr(&value) {
        Some(target) => Ok(Setter::Store { target, ty: value.ty }),
        None => Err(CompilationError::NotAnLvalue { span }),
    }
}

/// Store `value` through `setter`.
pub fn assign(
    compiler: &mut ExprCompiler<'_, '_>,
    setter: Setter,
    value: CompiledExpr,
    span: Span,
) -> Result<CompiledStatement> {
    match setter {
        Setter::Store { target, ty } => {
            let value = compiler.coerce(value, &ty)?;
            Ok(CompiledStatement::Assignment { target, value, span })
        }
        Setter::Indexer { object, index, literal } => {
            let file = compiler.ctx.file();
            let found = {
                let args = [
                    QueryArgument::Expr(&object),
                    QueryArgument::of(&index, literal),
                    QueryArgument::Expr(&value),
                ];
                let query = FunctionQuery::new(
                    CallableKind::GeneralFunction,
                    GeneralKind::IndexerSet.name(),
                    file,
                    &args,
                );
                find_function(compiler.ctx, &query, span)?
            };
            let values = vec![object, index, value];
            let arguments = calls::finish_arguments(compiler, found.function, 0, values, span)?;
            let call = calls::emit_call(compiler, found.function, arguments, span, true)?;
            Ok(CompiledStatement::Expression(call.discarded()))
        }
    }
}

/// Lower `target = value`, `target op= value`, `target++` and `target--`.
pub fn compile_assignment<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    assignment: &AssignStmt<'ast>,
) -> Result<CompiledStatement> {
    let span = assignment.span;
    let setter = compile_setter(compiler, &assignment.target)?;
    let value = match (assignment.op.binary(), &assignment.value) {
        (None, Some(value)) => {
            let expected = setter.value_type().cloned();
            compiler.compile(value, expected.as_ref())?
        }
        (Some(op), value) => {
            let current = setter.current(compiler, span)?;
            let (operand, literal) = match value {
                Some(value) => {
                    (compiler.compile(value, Some(&current.ty))?, is_source_literal(value))
                }
                None => (one(&current.ty, span), true),
            };
            binary::combine(compiler, op, current, false, operand, literal, span)?
        }
        (None, None) => return Err(CompilationError::internal("assignment without a value")),
    };
    assign(compiler, setter, value, span)
}

/// The step of `++` and `--`.
fn one(ty: &GeneralType, span: Span) -> CompiledExpr {
    match ty.as_builtin().filter(|b| b.is_numeric()) {
        Some(kind) => match CompiledValue::from_integer(kind, 1) {
            Ok(value) => CompiledExpr::literal(value, ty.clone(), span),
            Err(_) => CompiledExpr::literal(CompiledValue::I32(1), GeneralType::I32, span),
        },
        None => CompiledExpr::literal(CompiledValue::I32(1), GeneralType::I32, span),
    }
}
