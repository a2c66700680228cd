//! Semantic type values.
//!
//! [`GeneralType`] is the closed set of types the compiler reasons about.
//! Equality through [`GeneralType::same_as`] is structural and looks through
//! aliases; derived `PartialEq`/`Hash` are exact and only used for cache keys
//! after [`GeneralType::canonical`].

mod cast;
mod numeric;
mod resolve;
mod size;

pub use cast::{CastError, can_cast_explicitly, can_cast_implicitly};
pub use numeric::{binary_result_type, unary_result_type};
pub use resolve::{TypeResolver, static_length};
pub use size::{SizeError, bit_width, size_of};

use std::fmt;

use corvid_core::BuiltinType;
use rustc_hash::FxHashMap;

use crate::registry::{AliasId, Declarations, StructId};

/// Substitution of template parameter names.
pub type Bindings = FxHashMap<String, GeneralType>;

/// A resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GeneralType {
    Builtin(BuiltinType),
    Pointer(Box<GeneralType>),
    /// `length` is `None` for unsized arrays.
    Array {
        of: Box<GeneralType>,
        length: Option<u32>,
    },
    /// A struct, with one type argument per template parameter.
    Struct {
        id: StructId,
        type_args: Vec<GeneralType>,
    },
    /// An unresolved template parameter; only valid inside template signatures
    /// and bodies.
    Generic(String),
    Function {
        return_type: Box<GeneralType>,
        params: Vec<GeneralType>,
        closure: bool,
    },
    Alias {
        target: Box<GeneralType>,
        id: AliasId,
    },
}

impl GeneralType {
    pub const VOID: GeneralType = GeneralType::Builtin(BuiltinType::Void);
    pub const ANY: GeneralType = GeneralType::Builtin(BuiltinType::Any);
    pub const I32: GeneralType = GeneralType::Builtin(BuiltinType::I32);
    pub const U8: GeneralType = GeneralType::Builtin(BuiltinType::U8);
    pub const F32: GeneralType = GeneralType::Builtin(BuiltinType::F32);
    pub const CHAR: GeneralType = GeneralType::Builtin(BuiltinType::Char);

    pub fn pointer_to(to: GeneralType) -> Self {
        Self::Pointer(Box::new(to))
    }

    pub fn array_of(of: GeneralType, length: Option<u32>) -> Self {
        Self::Array {
            of: Box::new(of),
            length,
        }
    }

    /// `any*`
    pub fn any_pointer() -> Self {
        Self::pointer_to(Self::ANY)
    }

    pub fn structure(id: StructId, type_args: Vec<GeneralType>) -> Self {
        Self::Struct { id, type_args }
    }

    pub fn function(return_type: GeneralType, params: Vec<GeneralType>, closure: bool) -> Self {
        Self::Function {
            return_type: Box::new(return_type),
            params,
            closure,
        }
    }

    /// Strip aliases at the top level.
    pub fn unaliased(&self) -> &GeneralType {
        let mut current = self;
        while let GeneralType::Alias { target, .. } = current {
            current = target;
        }
        current
    }

    /// Strip aliases everywhere; used to build cache keys.
    pub fn canonical(&self) -> GeneralType {
        match self.unaliased() {
            Self::Pointer(to) => Self::pointer_to(to.canonical()),
            Self::Array { of, length } => Self::array_of(of.canonical(), *length),
            Self::Struct { id, type_args } => Self::Struct {
                id: *id,
                type_args: type_args.iter().map(GeneralType::canonical).collect(),
            },
            Self::Function {
                return_type,
                params,
                closure,
            } => Self::function(
                return_type.canonical(),
                params.iter().map(GeneralType::canonical).collect(),
                *closure,
            ),
            other => other.clone(),
        }
    }

    /// Structural, alias-transparent equality.
    pub fn same_as(&self, other: &GeneralType) -> bool {
        match (self.unaliased(), other.unaliased()) {
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Pointer(a), Self::Pointer(b)) => a.same_as(b),
            (Self::Array { of: a, length: la }, Self::Array { of: b, length: lb }) => {
                la == lb && a.same_as(b)
            }
            (
                Self::Struct { id: a, type_args: aa },
                Self::Struct { id: b, type_args: ba },
            ) => a == b && aa.len() == ba.len() && aa.iter().zip(ba).all(|(x, y)| x.same_as(y)),
            (Self::Generic(a), Self::Generic(b)) => a == b,
            (
                Self::Function {
                    return_type: ra,
                    params: pa,
                    closure: ca,
                },
                Self::Function {
                    return_type: rb,
                    params: pb,
                    closure: cb,
                },
            ) => {
                ca == cb
                    && ra.same_as(rb)
                    && pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(x, y)| x.same_as(y))
            }
            _ => false,
        }
    }

    pub fn as_builtin(&self) -> Option<BuiltinType> {
        match self.unaliased() {
            Self::Builtin(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        self.as_builtin() == Some(BuiltinType::Void)
    }

    pub fn is_any(&self) -> bool {
        self.as_builtin() == Some(BuiltinType::Any)
    }

    pub fn is_numeric(&self) -> bool {
        self.as_builtin().is_some_and(BuiltinType::is_numeric)
    }

    pub fn is_integer(&self) -> bool {
        self.as_builtin().is_some_and(BuiltinType::is_integer)
    }

    pub fn is_float(&self) -> bool {
        self.as_builtin().is_some_and(BuiltinType::is_float)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.unaliased(), Self::Pointer(_))
    }

    pub fn pointee(&self) -> Option<&GeneralType> {
        match self.unaliased() {
            Self::Pointer(to) => Some(to),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<(StructId, &[GeneralType])> {
        match self.unaliased() {
            Self::Struct { id, type_args } => Some((*id, type_args)),
            _ => None,
        }
    }

    /// The struct behind a value or a pointer.
    pub fn struct_or_pointee(&self) -> Option<(StructId, &[GeneralType], bool)> {
        match self.unaliased() {
            Self::Struct { id, type_args } => Some((*id, type_args, false)),
            Self::Pointer(to) => to.as_struct().map(|(id, args)| (id, args, true)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<(&GeneralType, Option<u32>)> {
        match self.unaliased() {
            Self::Array { of, length } => Some((of, *length)),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<(&GeneralType, &[GeneralType], bool)> {
        match self.unaliased() {
            Self::Function {
                return_type,
                params,
                closure,
            } => Some((return_type, params, *closure)),
            _ => None,
        }
    }

    /// Character arrays and pointers to them, the shapes a string literal
    /// can take. Returns the array length.
    pub fn as_char_buffer(&self) -> Option<Option<u32>> {
        let array = match self.unaliased() {
            Self::Pointer(to) => to.unaliased(),
            other => other,
        };
        match array {
            Self::Array { of, length } if of.as_builtin() == Some(BuiltinType::Char) => {
                Some(*length)
            }
            _ => None,
        }
    }

    /// Whether a template parameter occurs anywhere in this type.
    pub fn contains_generic(&self) -> bool {
        match self {
            Self::Builtin(_) => false,
            Self::Generic(_) => true,
            Self::Pointer(to) => to.contains_generic(),
            Self::Array { of, .. } => of.contains_generic(),
            Self::Struct { type_args, .. } => type_args.iter().any(GeneralType::contains_generic),
            Self::Function {
                return_type,
                params,
                ..
            } => return_type.contains_generic() || params.iter().any(GeneralType::contains_generic),
            Self::Alias { target, .. } => target.contains_generic(),
        }
    }

    /// Replace template parameters by their bindings. Unbound parameters stay.
    pub fn substitute(&self, bindings: &Bindings) -> GeneralType {
        if bindings.is_empty() {
            return self.clone();
        }
        match self {
            Self::Generic(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Self::Builtin(_) => self.clone(),
            Self::Pointer(to) => Self::pointer_to(to.substitute(bindings)),
            Self::Array { of, length } => Self::array_of(of.substitute(bindings), *length),
            Self::Struct { id, type_args } => Self::Struct {
                id: *id,
                type_args: type_args.iter().map(|t| t.substitute(bindings)).collect(),
            },
            Self::Function {
                return_type,
                params,
                closure,
            } => Self::function(
                return_type.substitute(bindings),
                params.iter().map(|t| t.substitute(bindings)).collect(),
                *closure,
            ),
            Self::Alias { target, id } => Self::Alias {
                target: Box::new(target.substitute(bindings)),
                id: *id,
            },
        }
    }

    /// Render with declaration names.
    pub fn display<'a>(&'a self, decls: &'a Declarations<'_>) -> TypeDisplay<'a> {
        TypeDisplay { ty: self, decls }
    }
}

impl From<BuiltinType> for GeneralType {
    fn from(value: BuiltinType) -> Self {
        Self::Builtin(value)
    }
}

/// Display adapter resolving struct and alias names.
pub struct TypeDisplay<'a> {
    ty: &'a GeneralType,
    decls: &'a Declarations<'a>,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decls = self.decls;
        match self.ty {
            GeneralType::Builtin(b) => write!(f, "{b}"),
            GeneralType::Pointer(to) => write!(f, "{}*", to.display(decls)),
            GeneralType::Array { of, length } => match length {
                Some(n) => write!(f, "{}[{n}]", of.display(decls)),
                None => write!(f, "{}[]", of.display(decls)),
            },
            GeneralType::Struct { id, type_args } => {
                write!(f, "{}", decls.structure(*id).name)?;
                if !type_args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in type_args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg.display(decls))?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            GeneralType::Generic(name) => f.write_str(name),
            GeneralType::Function {
                return_type,
                params,
                ..
            } => {
                f.write_str("fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", param.display(decls))?;
                }
                write!(f, ") -> {}", return_type.display(decls))
            }
            GeneralType::Alias { id, .. } => f.write_str(&decls.alias(*id).name),
        }
    }
}
