//! Storage size of types.

use corvid_core::{BitWidth, CompilerSettings};
use thiserror::Error;

use crate::registry::Declarations;

use super::GeneralType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeError {
    #[error("type '{0}' has no size")]
    Unsized(String),
    #[error("struct '{0}' is not complete")]
    Incomplete(String),
    #[error("type '{0}' is too large")]
    TooLarge(String),
}

/// Size in bytes. Structs are the plain sum of their field sizes.
pub fn size_of(
    ty: &GeneralType,
    decls: &Declarations<'_>,
    settings: &CompilerSettings,
) -> Result<u32, SizeError> {
    match ty.unaliased() {
        GeneralType::Builtin(b) => b
            .bit_width()
            .map(BitWidth::bytes)
            .ok_or_else(|| SizeError::Unsized(ty.display(decls).to_string())),
        GeneralType::Pointer(_) | GeneralType::Function { .. } => Ok(settings.pointer_size),
        GeneralType::Array { of, length } => match length {
            Some(n) => n
                .checked_mul(size_of(of, decls, settings)?)
                .ok_or_else(|| SizeError::TooLarge(ty.display(decls).to_string())),
            None => Err(SizeError::Unsized(ty.display(decls).to_string())),
        },
        GeneralType::Struct { id, type_args } => {
            let Some(fields) = decls.struct_fields(*id, type_args) else {
                return Err(SizeError::Incomplete(decls.structure(*id).name.clone()));
            };
            fields.iter().try_fold(0u32, |total, field| {
                total
                    .checked_add(size_of(&field.ty, decls, settings)?)
                    .ok_or_else(|| SizeError::TooLarge(ty.display(decls).to_string()))
            })
        }
        GeneralType::Generic(_) | GeneralType::Alias { .. } => {
            Err(SizeError::Unsized(ty.display(decls).to_string()))
        }
    }
}

/// Bit width of a scalar type; pointers use the configured pointer size.
pub fn bit_width(ty: &GeneralType, settings: &CompilerSettings) -> Option<BitWidth> {
    match ty.unaliased() {
        GeneralType::Builtin(b) => b.bit_width(),
        GeneralType::Pointer(_) | GeneralType::Function { .. } => {
            BitWidth::from_bytes(settings.pointer_size)
        }
        _ => None,
    }
}
