//! Binary operator lowering.
//!
//! A user `operator` overload is looked up first; without one the builtin
//! numeric rules apply. A source literal on one side adapts to the type of
//! the other side.

use corvid_core::{CompilationError, Span};
use corvid_syntax::{BinaryExpr, BinaryOp};

use super::{ExprCompiler, Result, calls, find_statement_type, is_source_literal};
use crate::ir::{CompiledExpr, ExprKind};
use crate::overload::{FunctionQuery, QueryArgument, literal_fits, try_find_function};
use crate::registry::CallableKind;
use crate::types::binary_result_type;

/// Lower `left op right`.
pub fn compile_binary<'ast>(
    compiler: &mut ExprCompiler<'_, 'ast>,
    binary: &BinaryExpr<'ast>,
) -> Result<CompiledExpr> {
    let left_literal = is_source_literal(&binary.left);
    let right_literal = is_source_literal(&binary.right);

    // The literal adopts the type of the other side; lowering stays in source order.
    let (left, right) = if left_literal && !right_literal {
        let expected = find_statement_type(compiler.ctx, &binary.right);
        let left = compiler.compile(&binary.left, expected.as_ref())?;
        let right = compiler.infer(&binary.right)?;
        (left, right)
    } else {
        let left = compiler.infer(&binary.left)?;
        let expected = right_literal.then(|| left.ty.clone());
        let right = compiler.compile(&binary.right, expected.as_ref())?;
        (left, right)
    };
    combine(compiler, binary.op, left, left_literal, right, right_literal, binary.span)
}

/// Apply `op` to two lowered operands.
pub fn combine(
    compiler: &mut ExprCompiler<'_, '_>,
    op: BinaryOp,
    left: CompiledExpr,
    left_literal: bool,
    right: CompiledExpr,
    right_literal: bool,
    span: Span,
) -> Result<CompiledExpr> {
    if !op.is_logical() {
        let file = compiler.ctx.file();
        let found = {
            let args =
                [QueryArgument::of(&left, left_literal), QueryArgument::of(&right, right_literal)];
            let query = FunctionQuery::new(CallableKind::Operator, op.symbol(), file, &args);
            try_find_function(compiler.ctx, &query, span)?
        };
        if let Some(found) = found {
            let arguments =
                calls::finish_arguments(compiler, found.function, 0, vec![left, right], span)?;
            return calls::emit_call(compiler, found.function, arguments, span, false);
        }
    }

    let (left, right) = adapt_literals(left, left_literal, right, right_literal);
    let Some(ty) = binary_result_type(op, &left.ty, &right.ty, &compiler.ctx.settings) else {
        return Err(CompilationError::TypeMismatch {
            message: format!(
                "operator '{op}' is not defined for '{}' and '{}'",
                left.ty.display(&compiler.ctx.decls),
                right.ty.display(&compiler.ctx.decls)
            ),
            span,
        });
    };
    let node = CompiledExpr::new(
        ExprKind::Binary {
            op,
            left: left.boxed(),
            right: right.boxed(),
        },
        ty,
        span,
    );
    Ok(compiler.fold(node))
}

/// Retype a literal operand to the builtin type of the other operand.
fn adapt_literals(
    left: CompiledExpr,
    left_literal: bool,
    right: CompiledExpr,
    right_literal: bool,
) -> (CompiledExpr, CompiledExpr) {
    let retype = |literal: CompiledExpr, other: &CompiledExpr| -> CompiledExpr {
        match (literal.as_literal(), other.ty.as_builtin()) {
            (Some(value), Some(target))
                if !literal.ty.same_as(&other.ty) && literal_fits(value, target) =>
            {
                match value.cast(target) {
                    Ok(value) => CompiledExpr::literal(value, other.ty.clone(), literal.span),
                    Err(_) => literal,
                }
            }
            _ => literal,
        }
    };
    if left_literal && !right_literal {
        let left = retype(left, &right);
        (left, right)
    } else if right_literal && !left_literal {
        let right = retype(right, &left);
        (left, right)
    } else {
        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_core::{BuiltinType, CompiledValue, CompilerSettings, FileId};
    use corvid_syntax::AstBuilder;

    use super::*;
    use crate::context::{CompilationContext, CompilerInputs};
    use crate::scope::{Frame, FrameKind, LocalVariable};
    use crate::types::GeneralType;

    fn frame_with(name: &str, ty: GeneralType) -> Frame {
        let mut frame = Frame::new(FrameKind::Function, None, Some(GeneralType::VOID));
        frame
            .declare_variable(LocalVariable {
                name: name.into(),
                ty,
                span: Span::default(),
                temp: false,
                state_field: None,
            })
            .unwrap();
        frame
    }

    #[test]
    fn literal_operands_adopt_the_other_side() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let expr = b.binary(b.int(1), BinaryOp::Add, b.name("x"));
        let (value, _) = ctx.in_frame(frame_with("x", GeneralType::U8), |ctx| {
            ExprCompiler::new(ctx).infer(&expr)
        });
        let value = value.unwrap();
        assert_eq!(value.ty, GeneralType::U8);
        match value.kind {
            ExprKind::Binary { left, .. } => {
                assert_eq!(left.as_literal(), Some(CompiledValue::U8(1)))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn comparisons_produce_booleans() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let expr = b.binary(b.name("x"), BinaryOp::Less, b.int(3));
        let (value, _) = ctx.in_frame(frame_with("x", GeneralType::I32), |ctx| {
            ExprCompiler::new(ctx).infer(&expr)
        });
        assert_eq!(value.unwrap().ty, GeneralType::Builtin(BuiltinType::U8));
    }

    #[test]
    fn pointers_do_not_multiply() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut ctx = CompilationContext::new(&CompilerInputs::new(CompilerSettings::default()));
        let expr = b.binary(b.name("p"), BinaryOp::Mul, b.int(2));
        let (value, _) = ctx.in_frame(frame_with("p", GeneralType::any_pointer()), |ctx| {
            ExprCompiler::new(ctx).infer(&expr)
        });
        assert!(matches!(value, Err(CompilationError::TypeMismatch { .. })));
    }
}
