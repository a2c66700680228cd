//! Declaration attributes and their validation.
//!
//! Compiler-known attributes:
//!
//! | name | placement | effect |
//! |---|---|---|
//! | `external("sym")` | callables, variables | binds to a host function or constant |
//! | `builtin("name")` | callables | binds to a compiler prototype (`alloc`, `free`, `next`) |
//! | `export` | functions | body is always compiled |
//! | `inline` | functions, operators | inlining failures become warnings |
//! | `literal("kind")` | aliases | default type of `integer`, `float` or `char` literals |
//! | `generator` | struct templates | lowered into a resumable state machine |
//!
//! Every other name must be registered as a [`UserAttribute`]; unknown names
//! are reported as errors and otherwise ignored.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use corvid_core::{CompilationError, CompiledValue, Span};
use corvid_syntax::{Attribute, LiteralKind};

use crate::context::CompilationContext;
use crate::decls::{Binding, BuiltinFunction, CompiledFunction, LiteralClass};
use crate::registry::CallableKind;
use crate::types::{GeneralType, size_of};

/// A literal attribute argument.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Float(f32),
    Char(u16),
    Bool(bool),
    String(String),
}

impl AttributeValue {
    pub fn literal_type(&self) -> LiteralType {
        match self {
            Self::Int(_) => LiteralType::Integer,
            Self::Float(_) => LiteralType::Float,
            Self::Char(_) => LiteralType::Char,
            Self::Bool(_) => LiteralType::Bool,
            Self::String(_) => LiteralType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<LiteralKind<'_>> for AttributeValue {
    fn from(kind: LiteralKind<'_>) -> Self {
        match kind {
            LiteralKind::Int(v) => Self::Int(v),
            LiteralKind::Float(v) => Self::Float(v),
            LiteralKind::Char(v) => Self::Char(v),
            LiteralKind::Bool(v) => Self::Bool(v),
            LiteralKind::String(s) => Self::String(s.to_string()),
        }
    }
}

/// Literal kinds a user attribute parameter can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralType {
    Integer,
    Float,
    Char,
    Bool,
    String,
}

impl fmt::Display for LiteralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Char => "char",
            Self::Bool => "bool",
            Self::String => "string",
        })
    }
}

/// An attribute after lowering; arguments are owned.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledAttribute {
    pub name: String,
    pub args: Vec<AttributeValue>,
    pub span: Span,
}

impl CompiledAttribute {
    pub fn string_arg(&self) -> Option<&str> {
        self.args.first().and_then(AttributeValue::as_str)
    }
}

pub fn compile_attributes(attributes: &[Attribute<'_>]) -> Vec<CompiledAttribute> {
    attributes
        .iter()
        .map(|a| CompiledAttribute {
            name: a.name.name.to_string(),
            args: a.args.iter().map(|l| AttributeValue::from(l.kind)).collect(),
            span: a.span,
        })
        .collect()
}

bitflags! {
    /// Where an attribute may appear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttributePlacement: u16 {
        const STRUCT = 1 << 0;
        const FUNCTION = 1 << 1;
        const METHOD = 1 << 2;
        const OPERATOR = 1 << 3;
        const CONSTRUCTOR = 1 << 4;
        const GENERAL_FUNCTION = 1 << 5;
        const ALIAS = 1 << 6;
        const VARIABLE = 1 << 7;
        const CALLABLE = Self::FUNCTION.bits()
            | Self::METHOD.bits()
            | Self::OPERATOR.bits()
            | Self::CONSTRUCTOR.bits()
            | Self::GENERAL_FUNCTION.bits();
    }
}

impl AttributePlacement {
    pub fn of_callable(function: &CompiledFunction<'_>) -> Self {
        match function.kind {
            CallableKind::Function if function.owner.is_some() => Self::METHOD,
            CallableKind::Function => Self::FUNCTION,
            CallableKind::Operator => Self::OPERATOR,
            CallableKind::Constructor => Self::CONSTRUCTOR,
            CallableKind::GeneralFunction => Self::GENERAL_FUNCTION,
        }
    }
}

/// Custom check run after a user attribute passed its arity and type checks.
pub type AttributeVerifier = Arc<dyn Fn(&CompiledAttribute) -> Result<(), String> + Send + Sync>;

/// A host-registered attribute.
#[derive(Clone)]
pub struct UserAttribute {
    pub name: String,
    pub params: Vec<LiteralType>,
    pub placement: AttributePlacement,
    pub verifier: Option<AttributeVerifier>,
}

impl UserAttribute {
    pub fn new(
        name: impl Into<String>,
        params: Vec<LiteralType>,
        placement: AttributePlacement,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            placement,
            verifier: None,
        }
    }

    pub fn with_verifier(
        mut self,
        verifier: impl Fn(&CompiledAttribute) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    fn check(
        &self,
        attribute: &CompiledAttribute,
        placement: AttributePlacement,
    ) -> Result<(), String> {
        if !self.placement.intersects(placement) {
            return Err("not allowed here".into());
        }
        if attribute.args.len() != self.params.len() {
            return Err(format!(
                "expects {} argument(s), got {}",
                self.params.len(),
                attribute.args.len()
            ));
        }
        for (i, (arg, expected)) in attribute.args.iter().zip(&self.params).enumerate() {
            if arg.literal_type() != *expected {
                return Err(format!(
                    "argument {} must be {expected}, got {}",
                    i + 1,
                    arg.literal_type()
                ));
            }
        }
        match &self.verifier {
            Some(verify) => verify(attribute),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for UserAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAttribute")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("placement", &self.placement)
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}

/// Descriptor of a host function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalFunction {
    pub name: String,
    /// Total size of all parameters in bytes.
    pub parameters_size: u32,
    pub return_size: u32,
}

impl ExternalFunction {
    pub fn new(name: impl Into<String>, parameters_size: u32, return_size: u32) -> Self {
        Self {
            name: name.into(),
            parameters_size,
            return_size,
        }
    }
}

/// A host-provided constant.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalConstant {
    pub name: String,
    pub value: CompiledValue,
}

impl ExternalConstant {
    pub fn new(name: impl Into<String>, value: CompiledValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

// ==========================================================================
// Validation
// ==========================================================================

fn invalid(attribute: &CompiledAttribute, message: impl Into<String>) -> CompilationError {
    CompilationError::InvalidAttribute {
        name: attribute.name.clone(),
        message: message.into(),
        span: attribute.span,
    }
}

fn string_argument(attribute: &CompiledAttribute) -> Result<&str, CompilationError> {
    match attribute.args.as_slice() {
        [AttributeValue::String(s)] => Ok(s),
        _ => Err(invalid(attribute, "expects one string argument")),
    }
}

fn no_arguments(attribute: &CompiledAttribute) -> Result<(), CompilationError> {
    if attribute.args.is_empty() {
        Ok(())
    } else {
        Err(invalid(attribute, "takes no arguments"))
    }
}

fn wrong_placement(attribute: &CompiledAttribute, expected: &str) -> CompilationError {
    invalid(attribute, format!("only allowed on {expected}"))
}

/// Check an attribute against the user registry; unknown names are errors.
fn check_user_attribute(
    ctx: &CompilationContext<'_>,
    attribute: &CompiledAttribute,
    placement: AttributePlacement,
) -> Result<(), CompilationError> {
    match ctx.user_attribute(&attribute.name) {
        Some(user) => user
            .check(attribute, placement)
            .map_err(|message| invalid(attribute, message)),
        None => Err(CompilationError::Other {
            message: format!("unknown attribute '{}'", attribute.name),
            span: attribute.span,
        }),
    }
}

/// Validate the attributes of a callable and apply their effects.
///
/// Attribute problems are errors, not critical: the declaration is kept.
pub fn apply_callable_attributes(
    ctx: &mut CompilationContext<'_>,
    function: &mut CompiledFunction<'_>,
) {
    let placement = AttributePlacement::of_callable(function);
    for attribute in function.attributes.clone() {
        let result = match attribute.name.as_str() {
            "external" => bind_external(ctx, function, &attribute),
            "builtin" => bind_builtin(function, &attribute),
            "export" => no_arguments(&attribute).and_then(|()| {
                if placement == AttributePlacement::FUNCTION {
                    function.exported = true;
                    Ok(())
                } else {
                    Err(wrong_placement(&attribute, "functions"))
                }
            }),
            "inline" => no_arguments(&attribute).and_then(|()| {
                let callable = AttributePlacement::FUNCTION | AttributePlacement::OPERATOR;
                if placement.intersects(callable) {
                    function.inline = true;
                    Ok(())
                } else {
                    Err(wrong_placement(&attribute, "functions and operators"))
                }
            }),
            "literal" => Err(wrong_placement(&attribute, "aliases")),
            "generator" => Err(wrong_placement(&attribute, "struct templates")),
            _ => check_user_attribute(ctx, &attribute, placement),
        };
        if let Err(err) = result {
            ctx.error_from(err);
        }
    }
}

fn bind_external(
    ctx: &CompilationContext<'_>,
    function: &mut CompiledFunction<'_>,
    attribute: &CompiledAttribute,
) -> Result<(), CompilationError> {
    let symbol = string_argument(attribute)?;
    if function.syntax.is_some_and(|s| s.body.is_some()) {
        return Err(invalid(attribute, "external functions cannot have a body"));
    }
    let Some(descriptor) = ctx.external_function(symbol) else {
        return Err(invalid(attribute, format!("no external function named '{symbol}'")));
    };

    let pointer_size = ctx.settings.pointer_size;
    let mut parameters_size = 0;
    for param in &function.params {
        parameters_size += if param.is_ref() {
            pointer_size
        } else {
            size_of(&param.ty, &ctx.decls, &ctx.settings)
                .map_err(|e| invalid(attribute, e.to_string()))?
        };
    }
    let return_size = if function.return_type.is_void() {
        0
    } else {
        size_of(&function.return_type, &ctx.decls, &ctx.settings)
            .map_err(|e| invalid(attribute, e.to_string()))?
    };

    if parameters_size != descriptor.parameters_size {
        return Err(invalid(
            attribute,
            format!(
                "'{symbol}' takes {} byte(s) of parameters, declaration has {parameters_size}",
                descriptor.parameters_size
            ),
        ));
    }
    if return_size != descriptor.return_size {
        return Err(invalid(
            attribute,
            format!(
                "'{symbol}' returns {} byte(s), declaration returns {return_size}",
                descriptor.return_size
            ),
        ));
    }
    function.binding = Binding::External {
        symbol: symbol.to_string(),
    };
    Ok(())
}

fn bind_builtin(
    function: &mut CompiledFunction<'_>,
    attribute: &CompiledAttribute,
) -> Result<(), CompilationError> {
    let name = string_argument(attribute)?;
    let Some(builtin) = BuiltinFunction::from_name(name) else {
        return Err(invalid(attribute, format!("unknown builtin '{name}'")));
    };
    if function.syntax.is_some_and(|s| s.body.is_some()) {
        return Err(invalid(attribute, "builtin functions cannot have a body"));
    }
    let types: Vec<&GeneralType> = function.params.iter().map(|p| &p.ty).collect();
    let matches = match builtin {
        BuiltinFunction::Alloc => {
            matches!(types.as_slice(), [size] if size.is_integer())
                && function.return_type.is_pointer()
        }
        BuiltinFunction::Free => {
            matches!(types.as_slice(), [pointer] if pointer.is_pointer())
                && function.return_type.is_void()
        }
        // The full contract is checked with the generator struct.
        BuiltinFunction::Next => function.owner.is_some(),
    };
    if !matches {
        let expected = match builtin {
            BuiltinFunction::Alloc => "fn(integer) -> pointer",
            BuiltinFunction::Free => "fn(pointer) -> void",
            BuiltinFunction::Next => "a generator struct method",
        };
        return Err(invalid(attribute, format!("builtin '{name}' must be {expected}")));
    }
    function.binding = Binding::Builtin(builtin);
    Ok(())
}

/// Validate alias attributes; returns the literal class claimed by the alias.
pub fn apply_alias_attributes(
    ctx: &mut CompilationContext<'_>,
    attributes: &[CompiledAttribute],
    target: &GeneralType,
) -> Option<LiteralClass> {
    let mut literal = None;
    for attribute in attributes {
        let result = match attribute.name.as_str() {
            "literal" => string_argument(attribute).and_then(|kind| {
                let class = LiteralClass::from_name(kind)
                    .ok_or_else(|| invalid(attribute, format!("unknown literal kind '{kind}'")))?;
                let fits = match class {
                    LiteralClass::Integer => target.is_integer(),
                    LiteralClass::Float => target.is_float(),
                    LiteralClass::Char => target.is_integer(),
                };
                if fits {
                    literal = Some(class);
                    Ok(())
                } else {
                    Err(invalid(attribute, format!("alias target cannot hold {kind} literals")))
                }
            }),
            "external" | "builtin" | "export" | "inline" => {
                Err(wrong_placement(attribute, "callables"))
            }
            "generator" => Err(wrong_placement(attribute, "struct templates")),
            _ => check_user_attribute(ctx, attribute, AttributePlacement::ALIAS),
        };
        if let Err(err) = result {
            ctx.error_from(err);
        }
    }
    literal
}

/// Validate struct attributes; returns whether the struct is a generator.
pub fn apply_struct_attributes(
    ctx: &mut CompilationContext<'_>,
    attributes: &[CompiledAttribute],
    is_template: bool,
) -> bool {
    let mut generator = false;
    for attribute in attributes {
        let result = match attribute.name.as_str() {
            "generator" => no_arguments(attribute).and_then(|()| {
                if is_template {
                    generator = true;
                    Ok(())
                } else {
                    Err(wrong_placement(attribute, "struct templates"))
                }
            }),
            "external" | "builtin" | "export" | "inline" => {
                Err(wrong_placement(attribute, "callables"))
            }
            "literal" => Err(wrong_placement(attribute, "aliases")),
            _ => check_user_attribute(ctx, attribute, AttributePlacement::STRUCT),
        };
        if let Err(err) = result {
            ctx.error_from(err);
        }
    }
    generator
}

/// Validate variable attributes; returns the bound external constant.
pub fn apply_variable_attributes(
    ctx: &mut CompilationContext<'_>,
    attributes: &[CompiledAttribute],
) -> Option<CompiledValue> {
    let mut value = None;
    for attribute in attributes {
        let result = match attribute.name.as_str() {
            "external" => string_argument(attribute).and_then(|symbol| {
                let constant = ctx
                    .external_constant(symbol)
                    .ok_or_else(|| {
                        invalid(attribute, format!("no external constant named '{symbol}'"))
                    })?;
                value = Some(constant.value);
                Ok(())
            }),
            "builtin" | "export" | "inline" => Err(wrong_placement(attribute, "callables")),
            "literal" => Err(wrong_placement(attribute, "aliases")),
            "generator" => Err(wrong_placement(attribute, "struct templates")),
            _ => check_user_attribute(ctx, attribute, AttributePlacement::VARIABLE),
        };
        if let Err(err) = result {
            ctx.error_from(err);
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribute(name: &str, args: Vec<AttributeValue>) -> CompiledAttribute {
        CompiledAttribute {
            name: name.into(),
            args,
            span: Span::default(),
        }
    }

    #[test]
    fn user_attribute_checks_placement_and_arity() {
        let user =
            UserAttribute::new("section", vec![LiteralType::String], AttributePlacement::FUNCTION);
        let ok = attribute("section", vec![AttributeValue::String(".text".into())]);
        assert!(user.check(&ok, AttributePlacement::FUNCTION).is_ok());
        assert_eq!(
            user.check(&ok, AttributePlacement::STRUCT),
            Err("not allowed here".to_string())
        );
        let missing = attribute("section", vec![]);
        assert!(user.check(&missing, AttributePlacement::FUNCTION).is_err());
        let wrong = attribute("section", vec![AttributeValue::Int(1)]);
        assert_eq!(
            user.check(&wrong, AttributePlacement::FUNCTION),
            Err("argument 1 must be string, got integer".to_string())
        );
    }

    #[test]
    fn verifier_runs_last() {
        let user =
            UserAttribute::new("align", vec![LiteralType::Integer], AttributePlacement::STRUCT)
                .with_verifier(|a| match a.args.first() {
                    Some(AttributeValue::Int(n)) if n.count_ones() == 1 => Ok(()),
                    _ => Err("alignment must be a power of two".into()),
                });
        let aligned = attribute("align", vec![AttributeValue::Int(8)]);
        let misaligned = attribute("align", vec![AttributeValue::Int(6)]);
        assert!(user.check(&aligned, AttributePlacement::STRUCT).is_ok());
        assert!(user.check(&misaligned, AttributePlacement::STRUCT).is_err());
    }

    #[test]
    fn compiles_syntax_attributes() {
        let arena = bumpalo::Bump::new();
        let b = corvid_syntax::AstBuilder::new(&arena, corvid_core::FileId(0));
        let attrs = [b.attribute_str("external", "puts"), b.attribute("inline", &[])];
        let compiled = compile_attributes(&attrs);
        assert_eq!(compiled.len(), 2);
        assert_eq!(compiled[0].string_arg(), Some("puts"));
        assert!(compiled[1].args.is_empty());
    }
}
