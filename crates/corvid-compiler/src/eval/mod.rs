//! Compile-time evaluation.
//!
//! [`try_compute`] folds a single expression built from literals, `sizeof`,
//! casts and builtin operators. [`try_evaluate`] runs a whole compiled body
//! against literal arguments. Both give up with `None` on anything they have
//! no rule for; the caller then keeps the runtime code.

mod interpreter;

pub use interpreter::try_evaluate;

use corvid_core::{BuiltinType, CompiledValue, CompilerSettings};
use corvid_syntax::{BinaryOp, UnaryOp};
use tracing::trace;

use crate::ir::{CompiledExpr, ExprKind};

/// Source of values for nodes the folding rules do not cover.
pub(crate) trait Environment {
    /// Value of a leaf node such as a variable read or a call.
    fn read(&mut self, expr: &CompiledExpr) -> Option<CompiledValue>;
}

/// Folding without any variables in scope.
struct Pure;

impl Environment for Pure {
    fn read(&mut self, _: &CompiledExpr) -> Option<CompiledValue> {
        None
    }
}

/// Fold `expr` to a value if it only involves constants.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn try_compute(expr: &CompiledExpr, settings: &CompilerSettings) -> Option<CompiledValue> {
    let value = compute(expr, settings, &mut Pure);
    if let Some(value) = value {
        trace!(%value, "expression folded");
    }
    value
}

/// Evaluate `expr`, asking `env` for the nodes that need state.
pub(crate) fn compute(
    expr: &CompiledExpr,
    settings: &CompilerSettings,
    env: &mut dyn Environment,
) -> Option<CompiledValue> {
    match &expr.kind {
        ExprKind::Literal(value) => Some(*value),
        ExprKind::SizeOf { size, .. } => {
            let kind = expr.ty.as_builtin().unwrap_or(settings.size_of_type);
            CompiledValue::from_integer(kind, i128::from(*size)).ok()
        }
        ExprKind::Cast(inner) => {
            let target = scalar_kind(expr)?;
            compute(inner, settings, env)?.cast(target).ok()
        }
        ExprKind::Unary { op, operand } => {
            let kind = scalar_kind(expr)?;
            let value = compute(operand, settings, env)?;
            let result = match op {
                UnaryOp::Neg => value.neg().ok()?,
                UnaryOp::BitwiseNot => value.bit_not().ok()?,
                UnaryOp::LogicalNot => {
                    return Some(CompiledValue::from_bool(!value.is_truthy(), kind));
                }
                UnaryOp::AddressOf | UnaryOp::Deref => return None,
            };
            result.cast(kind).ok()
        }
        ExprKind::Binary { op, left, right } => {
            let kind = scalar_kind(expr)?;
            let lhs = compute(left, settings, env)?;
            match op {
                BinaryOp::LogicalOr if lhs.is_truthy() => {
                    return Some(CompiledValue::from_bool(true, kind));
                }
                BinaryOp::LogicalAnd if !lhs.is_truthy() => {
                    return Some(CompiledValue::from_bool(false, kind));
                }
                _ => {}
            }
            let rhs = compute(right, settings, env)?;
            apply_binary(*op, lhs, rhs, kind)
        }
        _ => env.read(expr),
    }
}

/// Builtin kind of an expression that folds to a scalar.
fn scalar_kind(expr: &CompiledExpr) -> Option<BuiltinType> {
    expr.ty.as_builtin().filter(|kind| kind.is_numeric())
}

/// Apply a builtin operator; logical operators see both sides here.
fn apply_binary(
    op: BinaryOp,
    lhs: CompiledValue,
    rhs: CompiledValue,
    kind: BuiltinType,
) -> Option<CompiledValue> {
    let result = match op {
        BinaryOp::LogicalOr => {
            return Some(CompiledValue::from_bool(lhs.is_truthy() || rhs.is_truthy(), kind));
        }
        BinaryOp::LogicalAnd => {
            return Some(CompiledValue::from_bool(lhs.is_truthy() && rhs.is_truthy(), kind));
        }
        BinaryOp::Equal
        | BinaryOp::NotEqual
        | BinaryOp::Less
        | BinaryOp::LessEqual
        | BinaryOp::Greater
        | BinaryOp::GreaterEqual => {
            let ordering = lhs.compare(&rhs)?;
            let holds = match op {
                BinaryOp::Equal => ordering.is_eq(),
                BinaryOp::NotEqual => ordering.is_ne(),
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEqual => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            return Some(CompiledValue::from_bool(holds, kind));
        }
        BinaryOp::BitwiseOr => lhs.bit_or(rhs),
        BinaryOp::BitwiseXor => lhs.bit_xor(rhs),
        BinaryOp::BitwiseAnd => lhs.bit_and(rhs),
        BinaryOp::ShiftLeft => lhs.shl(rhs),
        BinaryOp::ShiftRight => lhs.shr(rhs),
        BinaryOp::Add => lhs.add(rhs),
        BinaryOp::Sub => lhs.sub(rhs),
        BinaryOp::Mul => lhs.mul(rhs),
        BinaryOp::Div => lhs.div(rhs),
        BinaryOp::Mod => lhs.rem(rhs),
    };
    result.and_then(|value| value.cast(kind)).ok()
}

#[cfg(test)]
mod tests {
    use corvid_core::Span;

    use super::*;
    use crate::types::GeneralType;

    fn int(value: i32) -> CompiledExpr {
        CompiledExpr::literal(CompiledValue::I32(value), GeneralType::I32, Span::default())
    }

    fn flag(value: bool) -> CompiledExpr {
        let value = CompiledValue::from_bool(value, BuiltinType::U8);
        CompiledExpr::literal(value, GeneralType::U8, Span::default())
    }

    fn binary(
        left: CompiledExpr,
        op: BinaryOp,
        right: CompiledExpr,
        ty: GeneralType,
    ) -> CompiledExpr {
        CompiledExpr::new(
            ExprKind::Binary {
                op,
                left: left.boxed(),
                right: right.boxed(),
            },
            ty,
            Span::default(),
        )
    }

    #[test]
    fn arithmetic_and_comparison_fold() {
        let settings = CompilerSettings::default();
        let sum = binary(
            int(2),
            BinaryOp::Add,
            binary(int(3), BinaryOp::Mul, int(4), GeneralType::I32),
            GeneralType::I32,
        );
        assert_eq!(try_compute(&sum, &settings), Some(CompiledValue::I32(14)));

        let equal = binary(sum, BinaryOp::Equal, int(14), GeneralType::U8);
        assert_eq!(try_compute(&equal, &settings), Some(CompiledValue::U8(1)));
    }

    #[test]
    fn logical_operators_short_circuit() {
        let settings = CompilerSettings::default();
        let undefined = binary(int(1), BinaryOp::Div, int(0), GeneralType::I32);
        assert_eq!(try_compute(&undefined, &settings), None);

        let or = binary(flag(true), BinaryOp::LogicalOr, undefined.clone(), GeneralType::U8);
        assert_eq!(try_compute(&or, &settings), Some(CompiledValue::U8(1)));

        let and = binary(flag(false), BinaryOp::LogicalAnd, undefined.clone(), GeneralType::U8);
        assert_eq!(try_compute(&and, &settings), Some(CompiledValue::U8(0)));

        let needs_right = binary(flag(true), BinaryOp::LogicalAnd, undefined, GeneralType::U8);
        assert_eq!(try_compute(&needs_right, &settings), None);
    }

    #[test]
    fn casts_sizeof_and_unary() {
        let settings = CompilerSettings::default();
        let cast =
            CompiledExpr::new(ExprKind::Cast(int(300).boxed()), GeneralType::U8, Span::default());
        assert_eq!(try_compute(&cast, &settings), Some(CompiledValue::U8(44)));

        let size = CompiledExpr::new(
            ExprKind::SizeOf {
                of: GeneralType::Builtin(BuiltinType::I64),
                size: 8,
            },
            GeneralType::I32,
            Span::default(),
        );
        assert_eq!(try_compute(&size, &settings), Some(CompiledValue::I32(8)));

        let negated = CompiledExpr::new(
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: int(5).boxed(),
            },
            GeneralType::I32,
            Span::default(),
        );
        assert_eq!(try_compute(&negated, &settings), Some(CompiledValue::I32(-5)));
    }
}
