//! Unary operator lowering.

use corvid_core::{CompilationError, Span};
use corvid_syntax::{Expr, LiteralKind, UnaryExpr, UnaryOp};

use super::{ExprCompiler, Result, calls, is_source_literal, literals};
use crate::decls::LiteralClass;
use crate::ir::{CompiledExpr, ExprKind};
use crate::overload::{FunctionQuery, QueryArgument, try_find_function};
use crate::registry::CallableKind;
use crate::types::{GeneralType, unary_result_type};

/// Lower a prefix operator.
pub fn compile_unary<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    unary: &UnaryExpr<'ast>,
    expected: Option<&GeneralType>,
) -> Result<CompiledExpr> {
    let span = unary.span;
    match unary.op {
        UnaryOp::Neg => {
            if let Expr::Literal(lit) = unary.operand.unparen() {
                match lit.kind {
                    LiteralKind::Int(v) => {
                        return Ok(literals::compile_integer(
                            compiler,
                            -(v as i128),
                            LiteralClass::Integer,
                            expected,
                            span,
                        ));
                    }
                    LiteralKind::Float(v) => {
                        let negated = LiteralKind::Float(-v);
                        return literals::compile_literal(compiler, &negated, expected, span);
                    }
                    _ => {}
                }
            }
            overloadable(compiler, unary, span)
        }
        UnaryOp::LogicalNot | UnaryOp::BitwiseNot => overloadable(compiler, unary, span),
        UnaryOp::AddressOf => {
            let operand = compiler.infer(&unary.operand)?;
            address_of(operand, span)
        }
        UnaryOp::Deref => {
            let operand = compiler.infer(&unary.operand)?;
            dereference(compiler, operand, span)
        }
    }
}

/// `&value`; function and label addresses are already addresses.
pub fn address_of(operand: CompiledExpr, span: Span) -> Result<CompiledExpr> {
    match operand.kind {
        ExprKind::FunctionAddress(_) | ExprKind::LabelAddress(_) => Ok(operand),
        _ if operand.is_lvalue() => {
            let ty = GeneralType::pointer_to(operand.ty.clone());
            Ok(CompiledExpr::new(ExprKind::AddressOf(operand.boxed()), ty, span))
        }
        _ => Err(CompilationError::NotAnLvalue { span }),
    }
}

fn dereference(
    compiler: &ExprCompiler<'_, '_>,
    operand: CompiledExpr,
    span: Span,
) -> Result<CompiledExpr> {
    match operand.ty.pointee() {
        Some(pointee) if !pointee.is_any() && !pointee.is_void() => {
            let ty = pointee.clone();
            Ok(CompiledExpr::new(ExprKind::Dereference(operand.boxed()), ty, span))
        }
        _ => Err(CompilationError::TypeMismatch {
            message: format!("cannot dereference '{}'", operand.ty.display(&compiler.ctx.decls)),
            span,
        }),
    }
}

/// `-x`, `!x`, `~x`: a user operator first, then the builtin rule.
fn overloadable<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    unary: &UnaryExpr<'ast>,
    span: Span,
) -> Result<CompiledExpr> {
    let operand = compiler.infer(&unary.operand)?;
    let literal = is_source_literal(&unary.operand);
    let file = compiler.ctx.file();
    let found = {
        let args = [QueryArgument::of(&operand, literal)];
        let query = FunctionQuery::new(CallableKind::Operator, unary.op.symbol(), file, &args);
        try_find_function(compiler.ctx, &query, span)?
    };
    if let Some(found) = found {
        let arguments = calls::finish_arguments(compiler, found.function, 0, vec![operand], span)?;
        return calls::emit_call(compiler, found.function, arguments, span, false);
    }

    let Some(ty) = unary_result_type(unary.op, &operand.ty, &compiler.ctx.settings) else {
        return Err(CompilationError::TypeMismatch {
            message: format!(
                "operator '{}' is not defined for '{}'",
                unary.op,
                operand.ty.display(&compiler.ctx.decls)
            ),
            span,
        });
    };
    let node = CompiledExpr::new(
        ExprKind::Unary {
            op: unary.op,
            operand: operand.boxed(),
        },
        ty,
        span,
    );
    Ok(compiler.fold(node))
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{BuiltinType, CompiledValue, CompilerSettings, FileId};
    use corvid_syntax::AstBuilder;

    use super::*;
    use crate::context::{CompilationContext, CompilerInputs};
    use crate::scope::Frame;

    #[test]
    fn negative_literal_fits_signed_byte() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let i8_type = GeneralType::Builtin(BuiltinType::I8);
        let (value, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            ExprCompiler::new(ctx).check(&b.unary(UnaryOp::Neg, b.int(128)), &i8_type)
        });
        assert_eq!(value.unwrap().as_literal(), Some(CompiledValue::I8(-128)));
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn address_of_requires_storage() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let (value, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            ExprCompiler::new(ctx).infer(&b.address_of(b.int(1)))
        });
        assert!(matches!(value, Err(CompilationError::NotAnLvalue { .. })));
    }

    #[test]
    fn logical_not_folds() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let (value, _) = ctx.in_frame(Frame::top_level(), |ctx| {
            ExprCompiler::new(ctx).infer(&b.unary(UnaryOp::LogicalNot, b.int(0)))
        });
        let value = value.unwrap();
        assert_eq!(value.ty, GeneralType::U8);
        assert_eq!(value.as_literal(), Some(CompiledValue::U8(1)));
    }
}
