//! Literal expression lowering.
//!
//! Numeric literals adopt the expected type when it can hold their value.
//! Without one they use an alias registered with `#literal(...)` for their
//! class, and fall back to `i32`, `i64`, `u16` or `f32`.

use corvid_core::{BuiltinType, CompilationError, CompiledValue, Span};
use corvid_syntax::{Expr, LiteralKind, UnaryOp};

use super::{ExprCompiler, Result, allocator};
use crate::decls::LiteralClass;
use crate::ir::{CompiledExpr, ExprKind, StringAllocation};
use crate::types::{GeneralType, size_of};

/// Lower a literal.
pub fn compile_literal(
    compiler: &mut ExprCompiler<'_, '_>,
    kind: &LiteralKind<'_>,
    expected: Option<&GeneralType>,
    span: Span,
) -> Result<CompiledExpr> {
    match *kind {
        LiteralKind::Int(value) => {
            let class = LiteralClass::Integer;
            Ok(compile_integer(compiler, value as i128, class, expected, span))
        }
        LiteralKind::Char(value) => {
            let class = LiteralClass::Char;
            Ok(compile_integer(compiler, value as i128, class, expected, span))
        }
        LiteralKind::Float(value) => Ok(compile_float(compiler, value, expected, span)),
        LiteralKind::Bool(value) => {
            let kind = match expected.and_then(GeneralType::as_builtin) {
                Some(target) if target.is_integer() => target,
                _ => compiler.ctx.settings.boolean_type,
            };
            let ty = match expected {
                Some(expected) if expected.as_builtin() == Some(kind) => expected.clone(),
                _ => GeneralType::Builtin(kind),
            };
            Ok(CompiledExpr::literal(CompiledValue::from_bool(value, kind), ty, span))
        }
        LiteralKind::String(text) => compile_string(compiler, text, expected, span),
    }
}

/// Integer and character literals.
pub(crate) fn compile_integer(
    compiler: &mut ExprCompiler<'_, '_>,
    value: i128,
    class: LiteralClass,
    expected: Option<&GeneralType>,
    span: Span,
) -> CompiledExpr {
    let expected_numeric = expected.filter(|t| t.is_numeric());
    if let Some(expected) = expected_numeric
        && let Some(target) = expected.as_builtin()
        && CompiledValue::fits(value, target)
        && let Ok(literal) = CompiledValue::from_integer(target, value)
    {
        return CompiledExpr::literal(literal, expected.clone(), span);
    }

    let (literal, ty) = match literal_alias(compiler, class, value) {
        Some(found) => found,
        None => {
            let kind = match class {
                LiteralClass::Char if CompiledValue::fits(value, BuiltinType::Char) => {
                    BuiltinType::Char
                }
                _ if CompiledValue::fits(value, BuiltinType::I32) => BuiltinType::I32,
                _ => BuiltinType::I64,
            };
            let literal = CompiledValue::from_integer(kind, value)
                .unwrap_or(CompiledValue::I64(value as i64));
            (literal, GeneralType::Builtin(kind))
        }
    };
    if let Some(expected) = expected_numeric {
        let message = format!(
            "literal {value} does not fit '{}', using '{}'",
            expected.display(&compiler.ctx.decls),
            ty.display(&compiler.ctx.decls)
        );
        compiler.ctx.warning(message, span);
    }
    CompiledExpr::literal(literal, ty, span)
}

fn compile_float(
    compiler: &mut ExprCompiler<'_, '_>,
    value: f32,
    expected: Option<&GeneralType>,
    span: Span,
) -> CompiledExpr {
    if let Some(expected) = expected.filter(|t| t.is_float()) {
        return CompiledExpr::literal(CompiledValue::F32(value), expected.clone(), span);
    }
    let ty = compiler
        .ctx
        .decls
        .aliases()
        .find(|(_, a)| a.literal == Some(LiteralClass::Float))
        .map(|(id, a)| GeneralType::Alias {
            target: Box::new(a.target.clone()),
            id,
        })
        .unwrap_or(GeneralType::F32);
    CompiledExpr::literal(CompiledValue::F32(value), ty, span)
}

/// First `#literal` alias of `class` whose target holds `value`.
fn literal_alias(
    compiler: &ExprCompiler<'_, '_>,
    class: LiteralClass,
    value: i128,
) -> Option<(CompiledValue, GeneralType)> {
    compiler
        .ctx
        .decls
        .aliases()
        .filter(|(_, a)| a.literal == Some(class))
        .find_map(|(id, a)| {
            let target = a.target.as_builtin()?;
            let literal = CompiledValue::from_integer(target, value).ok()?;
            CompiledValue::fits(value, target).then(|| {
                (
                    literal,
                    GeneralType::Alias {
                        target: Box::new(a.target.clone()),
                        id,
                    },
                )
            })
        })
}

/// Strings live on the stack when a character array value is expected and on
/// the heap otherwise. Both are null terminated.
fn compile_string(
    compiler: &mut ExprCompiler<'_, '_>,
    text: &str,
    expected: Option<&GeneralType>,
    span: Span,
) -> Result<CompiledExpr> {
    let length = text.encode_utf16().count() as u32 + 1;
    let buffer = GeneralType::array_of(GeneralType::CHAR, Some(length));
    let on_stack = expected.is_some_and(|t| !t.is_pointer() && t.as_char_buffer().is_some());
    let (allocation, ty) = if on_stack {
        (StringAllocation::Stack, buffer)
    } else {
        let size = size_of(&buffer, &compiler.ctx.decls, &compiler.ctx.settings)
            .map_err(|e| CompilationError::other(e.to_string(), span))?;
        let allocator = allocator(compiler.ctx, size, span)?;
        (StringAllocation::Heap { allocator }, GeneralType::pointer_to(buffer))
    };
    Ok(CompiledExpr::new(
        ExprKind::String {
            value: text.to_string(),
            allocation,
        },
        ty,
        span,
    ))
}

/// A literal as written in source, including a negated one.
pub fn is_source_literal(expr: &Expr<'_>) -> bool {
    match expr.unparen() {
        Expr::Literal(_) => true,
        Expr::Unary(unary) => {
            unary.op == UnaryOp::Neg && matches!(unary.operand.unparen(), Expr::Literal(_))
        }
        _ => false,
    }
}
