//! Builtin scalar kinds and bit widths.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Width of a scalar in bits, stored as its byte size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum BitWidth {
    _8 = 1,
    _16 = 2,
    _32 = 4,
    _64 = 8,
}

impl BitWidth {
    /// Number of bytes.
    #[inline]
    pub fn bytes(self) -> u32 {
        u8::from(self) as u32
    }

    /// Number of bits.
    #[inline]
    pub fn bits(self) -> u32 {
        self.bytes() * 8
    }

    /// Convert a byte count into a width, if it is one of the supported sizes.
    pub fn from_bytes(bytes: u32) -> Option<Self> {
        u8::try_from(bytes).ok().and_then(|b| BitWidth::try_from(b).ok())
    }
}

/// Builtin type kinds known to the compiler.
///
/// There is no dedicated boolean kind: booleans are values of the
/// `boolean_type` configured in [`CompilerSettings`](crate::CompilerSettings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Void,
    Any,
    U8,
    I8,
    /// 16-bit unsigned character.
    Char,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
}

impl BuiltinType {
    /// Resolve a builtin type keyword. `bool` is handled by the caller since
    /// it depends on settings.
    pub fn from_keyword(name: &str) -> Option<Self> {
        Some(match name {
            "void" => Self::Void,
            "any" => Self::Any,
            "u8" => Self::U8,
            "i8" => Self::I8,
            "char" | "u16" => Self::Char,
            "i16" => Self::I16,
            "u32" => Self::U32,
            "i32" => Self::I32,
            "u64" => Self::U64,
            "i64" => Self::I64,
            "f32" => Self::F32,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Any => "any",
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::Char => "char",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
        }
    }

    /// Bit width of a sized builtin; `None` for `void` and `any`.
    pub fn bit_width(self) -> Option<BitWidth> {
        match self {
            Self::Void | Self::Any => None,
            Self::U8 | Self::I8 => Some(BitWidth::_8),
            Self::Char | Self::I16 => Some(BitWidth::_16),
            Self::U32 | Self::I32 | Self::F32 => Some(BitWidth::_32),
            Self::U64 | Self::I64 => Some(BitWidth::_64),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::U8
                | Self::I8
                | Self::Char
                | Self::I16
                | Self::U32
                | Self::I32
                | Self::U64
                | Self::I64
        )
    }

    pub fn is_float(self) -> bool {
        self == Self::F32
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::F32)
    }

    /// The integer kind with the given width and signedness.
    pub fn integer(width: BitWidth, signed: bool) -> Self {
        match (width, signed) {
            (BitWidth::_8, false) => Self::U8,
            (BitWidth::_8, true) => Self::I8,
            (BitWidth::_16, false) => Self::Char,
            (BitWidth::_16, true) => Self::I16,
            (BitWidth::_32, false) => Self::U32,
            (BitWidth::_32, true) => Self::I32,
            (BitWidth::_64, false) => Self::U64,
            (BitWidth::_64, true) => Self::I64,
        }
    }

    /// Result kind of a numeric binary operator on `self` and `other`.
    ///
    /// Promotes to the wider width and to float if either side is float.
    /// Equal widths with mixed signedness promote to signed.
    pub fn promote(self, other: BuiltinType) -> Option<BuiltinType> {
        if !self.is_numeric() || !other.is_numeric() {
            return None;
        }
        if self.is_float() || other.is_float() {
            return Some(Self::F32);
        }
        let (a, b) = (self.bit_width()?, other.bit_width()?);
        let width = a.max(b);
        let signed = match a.cmp(&b) {
            std::cmp::Ordering::Greater => self.is_signed(),
            std::cmp::Ordering::Less => other.is_signed(),
            std::cmp::Ordering::Equal => self.is_signed() || other.is_signed(),
        };
        Some(Self::integer(width, signed))
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_round_trip_through_bytes() {
        assert_eq!(BitWidth::from_bytes(4), Some(BitWidth::_32));
        assert_eq!(BitWidth::from_bytes(3), None);
        assert_eq!(BitWidth::_16.bits(), 16);
    }

    #[test]
    fn promotion_prefers_wider_and_float() {
        assert_eq!(BuiltinType::U8.promote(BuiltinType::I32), Some(BuiltinType::I32));
        assert_eq!(BuiltinType::I64.promote(BuiltinType::F32), Some(BuiltinType::F32));
        assert_eq!(BuiltinType::U32.promote(BuiltinType::I32), Some(BuiltinType::I32));
        assert_eq!(BuiltinType::Void.promote(BuiltinType::I32), None);
    }

    #[test]
    fn keywords() {
        assert_eq!(BuiltinType::from_keyword("u16"), Some(BuiltinType::Char));
        assert_eq!(BuiltinType::from_keyword("bool"), None);
        assert_eq!(BuiltinType::I32.to_string(), "i32");
    }
}
