//! Compile-time scalar values.
//!
//! [`CompiledValue`] is the only value the compile-time evaluator can hold:
//! integers of every builtin width, characters and 32-bit floats. Booleans are
//! integers of the configured boolean kind. Aggregates are never represented.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

use crate::BuiltinType;

/// A tagged compile-time scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompiledValue {
    U8(u8),
    I8(i8),
    Char(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
}

/// Failure of a compile-time operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("operator '{op}' is not defined for {kind}")]
    UnsupportedOperand { op: &'static str, kind: BuiltinType },
    #[error("cannot represent a value of type {0}")]
    NotAScalar(BuiltinType),
}

type ValueResult = Result<CompiledValue, ValueError>;

impl CompiledValue {
    /// The builtin kind this value is tagged with.
    pub fn kind(&self) -> BuiltinType {
        match self {
            Self::U8(_) => BuiltinType::U8,
            Self::I8(_) => BuiltinType::I8,
            Self::Char(_) => BuiltinType::Char,
            Self::I16(_) => BuiltinType::I16,
            Self::U32(_) => BuiltinType::U32,
            Self::I32(_) => BuiltinType::I32,
            Self::U64(_) => BuiltinType::U64,
            Self::I64(_) => BuiltinType::I64,
            Self::F32(_) => BuiltinType::F32,
        }
    }

    /// Build an integer-kinded value, wrapping to the kind's width.
    pub fn from_integer(kind: BuiltinType, value: i128) -> Result<Self, ValueError> {
        Ok(match kind {
            BuiltinType::U8 => Self::U8(value as u8),
            BuiltinType::I8 => Self::I8(value as i8),
            BuiltinType::Char => Self::Char(value as u16),
            BuiltinType::I16 => Self::I16(value as i16),
            BuiltinType::U32 => Self::U32(value as u32),
            BuiltinType::I32 => Self::I32(value as i32),
            BuiltinType::U64 => Self::U64(value as u64),
            BuiltinType::I64 => Self::I64(value as i64),
            BuiltinType::F32 => Self::F32(value as f32),
            other => return Err(ValueError::NotAScalar(other)),
        })
    }

    /// Encode a boolean in the given boolean kind.
    pub fn from_bool(value: bool, kind: BuiltinType) -> Self {
        Self::from_integer(kind, value as i128).unwrap_or(Self::U8(value as u8))
    }

    /// Whether an integer fits into `kind` without wrapping.
    pub fn fits(value: i128, kind: BuiltinType) -> bool {
        let (min, max): (i128, i128) = match kind {
            BuiltinType::U8 => (0, u8::MAX as i128),
            BuiltinType::I8 => (i8::MIN as i128, i8::MAX as i128),
            BuiltinType::Char => (0, u16::MAX as i128),
            BuiltinType::I16 => (i16::MIN as i128, i16::MAX as i128),
            BuiltinType::U32 => (0, u32::MAX as i128),
            BuiltinType::I32 => (i32::MIN as i128, i32::MAX as i128),
            BuiltinType::U64 => (0, u64::MAX as i128),
            BuiltinType::I64 => (i64::MIN as i128, i64::MAX as i128),
            BuiltinType::F32 => (-(1 << 24), 1 << 24),
            BuiltinType::Void | BuiltinType::Any => return false,
        };
        value >= min && value <= max
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32(_))
    }

    /// Integer view of the value; floats are truncated.
    pub fn as_i128(&self) -> i128 {
        match *self {
            Self::U8(v) => v as i128,
            Self::I8(v) => v as i128,
            Self::Char(v) => v as i128,
            Self::I16(v) => v as i128,
            Self::U32(v) => v as i128,
            Self::I32(v) => v as i128,
            Self::U64(v) => v as i128,
            Self::I64(v) => v as i128,
            Self::F32(v) => v as i128,
        }
    }

    pub fn as_f32(&self) -> f32 {
        match *self {
            Self::F32(v) => v,
            _ => self.as_i128() as f32,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match *self {
            Self::F32(v) => v != 0.0,
            _ => self.as_i128() != 0,
        }
    }

    /// Convert to another kind with the same semantics as a runtime cast.
    pub fn cast(self, kind: BuiltinType) -> ValueResult {
        match kind {
            BuiltinType::F32 => Ok(Self::F32(self.as_f32())),
            _ => Self::from_integer(kind, self.as_i128()),
        }
    }

    fn binary_numeric(
        self,
        other: Self,
        op: &'static str,
        int_op: impl FnOnce(i128, i128) -> Result<i128, ValueError>,
        float_op: impl FnOnce(f32, f32) -> f32,
    ) -> ValueResult {
        let kind = self
            .kind()
            .promote(other.kind())
            .ok_or(ValueError::UnsupportedOperand { op, kind: self.kind() })?;
        if kind.is_float() {
            Ok(Self::F32(float_op(self.as_f32(), other.as_f32())))
        } else {
            Self::from_integer(kind, int_op(self.as_i128(), other.as_i128())?)
        }
    }

    fn binary_integer(
        self,
        other: Self,
        op: &'static str,
        int_op: impl FnOnce(i128, i128) -> Result<i128, ValueError>,
    ) -> ValueResult {
        for value in [self, other] {
            if value.is_float() {
                return Err(ValueError::UnsupportedOperand { op, kind: BuiltinType::F32 });
            }
        }
        let kind = self
            .kind()
            .promote(other.kind())
            .ok_or(ValueError::UnsupportedOperand { op, kind: self.kind() })?;
        Self::from_integer(kind, int_op(self.as_i128(), other.as_i128())?)
    }

    pub fn add(self, other: Self) -> ValueResult {
        self.binary_numeric(other, "+", |a, b| Ok(a.wrapping_add(b)), |a, b| a + b)
    }

    pub fn sub(self, other: Self) -> ValueResult {
        self.binary_numeric(other, "-", |a, b| Ok(a.wrapping_sub(b)), |a, b| a - b)
    }

    pub fn mul(self, other: Self) -> ValueResult {
        self.binary_numeric(other, "*", |a, b| Ok(a.wrapping_mul(b)), |a, b| a * b)
    }

    pub fn div(self, other: Self) -> ValueResult {
        if !other.is_truthy() {
            return Err(ValueError::DivisionByZero);
        }
        self.binary_numeric(other, "/", |a, b| Ok(a / b), |a, b| a / b)
    }

    pub fn rem(self, other: Self) -> ValueResult {
        if !other.is_truthy() {
            return Err(ValueError::DivisionByZero);
        }
        self.binary_integer(other, "%", |a, b| Ok(a % b))
    }

    pub fn bit_and(self, other: Self) -> ValueResult {
        self.binary_integer(other, "&", |a, b| Ok(a & b))
    }

    pub fn bit_or(self, other: Self) -> ValueResult {
        self.binary_integer(other, "|", |a, b| Ok(a | b))
    }

    pub fn bit_xor(self, other: Self) -> ValueResult {
        self.binary_integer(other, "^", |a, b| Ok(a ^ b))
    }

    pub fn shl(self, other: Self) -> ValueResult {
        let shift = other.as_i128().clamp(0, 127) as u32;
        self.binary_integer(other, "<<", |a, _| Ok(a.wrapping_shl(shift)))
            .and_then(|v| v.cast(self.kind()))
    }

    pub fn shr(self, other: Self) -> ValueResult {
        let shift = other.as_i128().clamp(0, 127) as u32;
        self.binary_integer(other, ">>", |a, _| Ok(a.wrapping_shr(shift)))
            .and_then(|v| v.cast(self.kind()))
    }

    pub fn neg(self) -> ValueResult {
        match self {
            Self::F32(v) => Ok(Self::F32(-v)),
            _ => Self::from_integer(self.kind(), -self.as_i128()),
        }
    }

    pub fn bit_not(self) -> ValueResult {
        match self {
            Self::F32(_) => Err(ValueError::UnsupportedOperand { op: "~", kind: BuiltinType::F32 }),
            _ => Self::from_integer(self.kind(), !self.as_i128()),
        }
    }

    /// Numeric comparison after promotion.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        if self.is_float() || other.is_float() {
            self.as_f32().partial_cmp(&other.as_f32())
        } else {
            Some(self.as_i128().cmp(&other.as_i128()))
        }
    }
}

impl fmt::Display for CompiledValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F32(v) => write!(f, "{v}f"),
            Self::Char(v) => match char::from_u32(*v as u32) {
                Some(c) => write!(f, "'{c}'"),
                None => write!(f, "{v}"),
            },
            other => write!(f, "{}", other.as_i128()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_promotes() {
        let value = CompiledValue::U8(200).add(CompiledValue::I32(100)).unwrap();
        assert_eq!(value, CompiledValue::I32(300));

        let value = CompiledValue::I32(3).mul(CompiledValue::F32(0.5)).unwrap();
        assert_eq!(value, CompiledValue::F32(1.5));
    }

    #[test]
    fn wrapping_in_narrow_kinds() {
        let value = CompiledValue::U8(250).add(CompiledValue::U8(10)).unwrap();
        assert_eq!(value, CompiledValue::U8(4));
    }

    #[test]
    fn division_by_zero_fails() {
        assert_eq!(
            CompiledValue::I32(1).div(CompiledValue::I32(0)),
            Err(ValueError::DivisionByZero)
        );
        assert_eq!(
            CompiledValue::I32(1).rem(CompiledValue::I32(0)),
            Err(ValueError::DivisionByZero)
        );
    }

    #[test]
    fn bitwise_rejects_floats() {
        assert!(CompiledValue::F32(1.0).bit_and(CompiledValue::I32(1)).is_err());
        assert_eq!(
            CompiledValue::I32(0b1100).bit_xor(CompiledValue::I32(0b1010)),
            Ok(CompiledValue::I32(0b0110))
        );
    }

    #[test]
    fn fits_checks_ranges() {
        assert!(CompiledValue::fits(255, BuiltinType::U8));
        assert!(!CompiledValue::fits(256, BuiltinType::U8));
        assert!(!CompiledValue::fits(-1, BuiltinType::Char));
        assert!(CompiledValue::fits(-128, BuiltinType::I8));
    }

    #[test]
    fn casts_truncate() {
        assert_eq!(CompiledValue::F32(3.9).cast(BuiltinType::I32), Ok(CompiledValue::I32(3)));
        assert_eq!(CompiledValue::I32(-1).cast(BuiltinType::U8), Ok(CompiledValue::U8(255)));
    }
}
