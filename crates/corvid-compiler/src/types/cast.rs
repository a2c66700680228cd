//! Castability between types.
//!
//! Implicit casts are deliberately narrow: identity, anything to `any`,
//! string literals into character buffers and a few pointer shapes. Numeric
//! conversions are always explicit; literals adapt to their context instead.

use corvid_core::CompilerSettings;
use thiserror::Error;

use crate::ir::{CompiledExpr, ExprKind};
use crate::registry::Declarations;

use super::GeneralType;

/// Why a cast was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CastError {
    #[error("cannot cast '{from}' to '{to}'")]
    Incompatible { from: String, to: String },

    #[error("array length mismatch: '{from}' has {from_len}, '{to}' has {to_len}")]
    ArrayLengthMismatch {
        from: String,
        to: String,
        from_len: String,
        to_len: String,
    },

    #[error("string literal of length {literal} does not fit '{to}'")]
    StringLength { literal: u32, to: String },
}

fn length_text(length: Option<u32>) -> String {
    length.map_or_else(|| "unspecified length".to_string(), |n| format!("length {n}"))
}

/// Whether `source` converts to `destination` without an explicit cast.
///
/// `value` is the expression being converted, when there is one; it enables
/// the string literal rule.
pub fn can_cast_implicitly(
    source: &GeneralType,
    destination: &GeneralType,
    value: Option<&CompiledExpr>,
    decls: &Declarations<'_>,
) -> Result<(), CastError> {
    if source.same_as(destination) || destination.is_any() {
        return Ok(());
    }

    if let Some(CompiledExpr {
        kind: ExprKind::String { value, .. },
        ..
    }) = value
        && let Some(length) = destination.as_char_buffer()
    {
        let literal = value.encode_utf16().count() as u32 + 1;
        return match length {
            None => Ok(()),
            Some(n) if n == literal => Ok(()),
            Some(_) => Err(CastError::StringLength {
                literal,
                to: destination.display(decls).to_string(),
            }),
        };
    }

    if let (Some(from), Some(to)) = (source.pointee(), destination.pointee()) {
        if from.same_as(to) || from.is_any() || to.is_any() {
            return Ok(());
        }
        if let (Some((from_of, from_len)), Some((to_of, to_len))) = (from.as_array(), to.as_array())
            && from_of.same_as(to_of)
        {
            return if from_len == to_len {
                Ok(())
            } else {
                Err(CastError::ArrayLengthMismatch {
                    from: source.display(decls).to_string(),
                    to: destination.display(decls).to_string(),
                    from_len: length_text(from_len),
                    to_len: length_text(to_len),
                })
            };
        }
    }

    Err(CastError::Incompatible {
        from: source.display(decls).to_string(),
        to: destination.display(decls).to_string(),
    })
}

/// Whether `value as destination` is allowed.
pub fn can_cast_explicitly(
    source: &GeneralType,
    destination: &GeneralType,
    settings: &CompilerSettings,
    decls: &Declarations<'_>,
) -> Result<(), CastError> {
    if can_cast_implicitly(source, destination, None, decls).is_ok() {
        return Ok(());
    }
    let pointer_like = |t: &GeneralType| t.is_pointer() || t.as_function().is_some();
    let pointer_sized_integer = |t: &GeneralType| {
        t.as_builtin()
            .and_then(|b| b.bit_width())
            .is_some_and(|w| w.bytes() == settings.pointer_size)
            && t.is_integer()
    };

    let allowed = (source.is_numeric() && destination.is_numeric())
        || (pointer_like(source) && pointer_like(destination))
        || (pointer_like(source) && pointer_sized_integer(destination))
        || (pointer_sized_integer(source) && pointer_like(destination));

    if allowed {
        Ok(())
    } else {
        Err(CastError::Incompatible {
            from: source.display(decls).to_string(),
            to: destination.display(decls).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use corvid_core::Span;

    use super::*;
    use crate::ir::StringAllocation;

    fn string_literal(text: &str) -> CompiledExpr {
        CompiledExpr::new(
            ExprKind::String {
                value: text.to_string(),
                allocation: StringAllocation::Stack,
            },
            GeneralType::array_of(GeneralType::CHAR, Some(text.len() as u32 + 1)),
            Span::default(),
        )
    }

    #[test]
    fn identity_and_any() {
        let decls = Declarations::default();
        let types = [
            GeneralType::I32,
            GeneralType::VOID,
            GeneralType::pointer_to(GeneralType::F32),
            GeneralType::array_of(GeneralType::CHAR, None),
        ];
        for ty in &types {
            assert!(can_cast_implicitly(ty, ty, None, &decls).is_ok());
            assert!(can_cast_implicitly(ty, &GeneralType::ANY, None, &decls).is_ok());
        }
    }

    #[test]
    fn numeric_conversions_are_explicit() {
        let decls = Declarations::default();
        let settings = CompilerSettings::default();
        assert!(can_cast_implicitly(&GeneralType::I32, &GeneralType::F32, None, &decls).is_err());
        assert!(
            can_cast_explicitly(&GeneralType::I32, &GeneralType::F32, &settings, &decls).is_ok()
        );
    }

    #[test]
    fn string_literal_lengths() {
        let decls = Declarations::default();
        let literal = string_literal("hi");
        let source = literal.ty.clone();
        let exact = GeneralType::array_of(GeneralType::CHAR, Some(3));
        let unsized_ptr = GeneralType::pointer_to(GeneralType::array_of(GeneralType::CHAR, None));
        let short = GeneralType::array_of(GeneralType::CHAR, Some(2));

        assert!(can_cast_implicitly(&source, &exact, Some(&literal), &decls).is_ok());
        assert!(can_cast_implicitly(&source, &unsized_ptr, Some(&literal), &decls).is_ok());
        assert!(matches!(
            can_cast_implicitly(&source, &short, Some(&literal), &decls),
            Err(CastError::StringLength { literal: 3, .. })
        ));
    }

    #[test]
    fn pointer_rules() {
        let decls = Declarations::default();
        let i32_ptr = GeneralType::pointer_to(GeneralType::I32);
        let f32_ptr = GeneralType::pointer_to(GeneralType::F32);
        assert!(can_cast_implicitly(&i32_ptr, &GeneralType::any_pointer(), None, &decls).is_ok());
        assert!(can_cast_implicitly(&GeneralType::any_pointer(), &f32_ptr, None, &decls).is_ok());
        assert!(can_cast_implicitly(&i32_ptr, &f32_ptr, None, &decls).is_err());
    }

    #[test]
    fn pointer_to_array_lengths() {
        let decls = Declarations::default();
        let sized = |n| GeneralType::pointer_to(GeneralType::array_of(GeneralType::U8, n));
        assert!(can_cast_implicitly(&sized(None), &sized(None), None, &decls).is_ok());
        assert!(can_cast_implicitly(&sized(Some(4)), &sized(Some(4)), None, &decls).is_ok());
        let err = can_cast_implicitly(&sized(Some(4)), &sized(Some(8)), None, &decls).unwrap_err();
        assert!(err.to_string().contains("array length mismatch"));
    }
}
