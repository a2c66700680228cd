//! Result types of builtin operators.

use corvid_core::CompilerSettings;
use corvid_syntax::{BinaryOp, UnaryOp};

use super::GeneralType;

/// Result type of a builtin binary operator, `None` if the operator is not
/// defined for the operand types.
pub fn binary_result_type(
    op: BinaryOp,
    left: &GeneralType,
    right: &GeneralType,
    settings: &CompilerSettings,
) -> Option<GeneralType> {
    let boolean = GeneralType::Builtin(settings.boolean_type);
    let scalar = |t: &GeneralType| t.is_numeric() || t.is_pointer();

    if op.is_logical() {
        return (scalar(left) && scalar(right)).then_some(boolean);
    }

    if op.is_comparison() {
        let comparable = (left.is_numeric() && right.is_numeric())
            || (left.is_pointer() && right.is_pointer())
            || (matches!(op, BinaryOp::Equal | BinaryOp::NotEqual)
                && ((left.is_pointer() && right.is_integer())
                    || (left.is_integer() && right.is_pointer())));
        return comparable.then_some(boolean);
    }

    // Pointer arithmetic keeps the pointer type.
    if matches!(op, BinaryOp::Add | BinaryOp::Sub) && left.is_pointer() && right.is_integer() {
        return Some(left.clone());
    }

    let (l, r) = (left.as_builtin()?, right.as_builtin()?);
    if op.is_integer_only() && !(l.is_integer() && r.is_integer()) {
        return None;
    }
    let promoted = l.promote(r)?;
    // Keep an alias when both operands share it.
    if left.same_as(right) && left.as_builtin() == Some(promoted) {
        Some(left.clone())
    } else {
        Some(GeneralType::Builtin(promoted))
    }
}

/// Result type of a builtin unary operator other than `&` and `*`.
pub fn unary_result_type(
    op: UnaryOp,
    operand: &GeneralType,
    settings: &CompilerSettings,
) -> Option<GeneralType> {
    match op {
        UnaryOp::Neg => operand.is_numeric().then(|| operand.clone()),
        UnaryOp::LogicalNot => (operand.is_numeric() || operand.is_pointer())
            .then_some(GeneralType::Builtin(settings.boolean_type)),
        UnaryOp::BitwiseNot => operand.is_integer().then(|| operand.clone()),
        UnaryOp::AddressOf => Some(GeneralType::pointer_to(operand.clone())),
        UnaryOp::Deref => operand.pointee().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use corvid_core::BuiltinType;

    use super::*;

    #[test]
    fn arithmetic_promotes() {
        let settings = CompilerSettings::default();
        let u8_ = GeneralType::U8;
        let i32_ = GeneralType::I32;
        assert_eq!(
            binary_result_type(BinaryOp::Add, &u8_, &i32_, &settings),
            Some(GeneralType::I32)
        );
        assert_eq!(
            binary_result_type(BinaryOp::Mul, &i32_, &GeneralType::F32, &settings),
            Some(GeneralType::F32)
        );
    }

    #[test]
    fn comparisons_yield_boolean_type() {
        let settings = CompilerSettings::default();
        let result =
            binary_result_type(BinaryOp::Less, &GeneralType::F32, &GeneralType::I32, &settings);
        assert_eq!(result, Some(GeneralType::Builtin(BuiltinType::U8)));
    }

    #[test]
    fn integer_only_operators_reject_floats() {
        let settings = CompilerSettings::default();
        assert_eq!(
            binary_result_type(BinaryOp::Mod, &GeneralType::F32, &GeneralType::I32, &settings),
            None
        );
        assert_eq!(
            binary_result_type(BinaryOp::ShiftLeft, &GeneralType::U8, &GeneralType::I32, &settings),
            Some(GeneralType::I32)
        );
    }

    #[test]
    fn pointer_arithmetic() {
        let settings = CompilerSettings::default();
        let ptr = GeneralType::pointer_to(GeneralType::U8);
        assert_eq!(
            binary_result_type(BinaryOp::Add, &ptr, &GeneralType::I32, &settings),
            Some(ptr.clone())
        );
        assert!(binary_result_type(BinaryOp::Mul, &ptr, &GeneralType::I32, &settings).is_none());
    }
}
