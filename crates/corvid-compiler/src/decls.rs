//! Compiled declarations.
//!
//! Declarations are created once by the registration pass. Afterwards only
//! the struct field list and the function body are filled in.

use corvid_core::{FileId, Location, Span};
use corvid_syntax::{Expr, FunctionDecl, GeneralKind, ParamModifiers, StructDecl};

use crate::attributes::CompiledAttribute;
use crate::ir::CompiledBlock;
use crate::registry::{CallableKind, FunctionId, StructId};
use crate::scope::{CapturedVariable, LabelInfo, LocalVariable};
use crate::types::{Bindings, GeneralType};

/// A function parameter.
#[derive(Debug, Clone)]
pub struct Parameter<'ast> {
    pub name: String,
    pub ty: GeneralType,
    pub modifiers: ParamModifiers,
    /// Lowered at each call site that omits the argument.
    pub default: Option<&'ast Expr<'ast>>,
    pub span: Span,
}

impl<'ast> Parameter<'ast> {
    pub fn new(name: impl Into<String>, ty: GeneralType, span: Span) -> Self {
        Self {
            name: name.into(),
            ty,
            modifiers: ParamModifiers::empty(),
            default: None,
            span,
        }
    }

    pub fn with_modifiers(mut self, modifiers: ParamModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[inline]
    pub fn is_this(&self) -> bool {
        self.modifiers.contains(ParamModifiers::THIS)
    }

    #[inline]
    pub fn is_ref(&self) -> bool {
        self.modifiers.contains(ParamModifiers::REF)
    }

    #[inline]
    pub fn is_temp(&self) -> bool {
        self.modifiers.contains(ParamModifiers::TEMP)
    }
}

/// A struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: GeneralType,
    pub private: bool,
    pub span: Span,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: GeneralType, span: Span) -> Self {
        Self {
            name: name.into(),
            ty,
            private: false,
            span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledStruct<'ast> {
    pub name: String,
    pub file: FileId,
    pub span: Span,
    pub template_params: Vec<String>,
    pub attributes: Vec<CompiledAttribute>,
    /// `None` until the second struct pass resolves the fields.
    pub fields: Option<Vec<Field>>,
    pub syntax: Option<&'ast StructDecl<'ast>>,
    /// Marked `#generator` and rewritten into the generator shape.
    pub generator: bool,
    /// Created by the compiler, e.g. generator state structs.
    pub synthesized: bool,
}

impl<'ast> CompiledStruct<'ast> {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.as_ref()?.iter().position(|f| f.name == name)
    }

    pub fn is_template(&self) -> bool {
        !self.template_params.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CompiledAlias {
    pub name: String,
    pub file: FileId,
    pub span: Span,
    pub target: GeneralType,
    pub attributes: Vec<CompiledAttribute>,
    /// Literal kind this alias is the default type for, from `#literal("...")`.
    pub literal: Option<LiteralClass>,
}

/// Literal classes an alias can claim with `#literal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralClass {
    Integer,
    Float,
    Char,
}

impl LiteralClass {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "integer" => Some(Self::Integer),
            "float" => Some(Self::Float),
            "char" => Some(Self::Char),
            _ => None,
        }
    }
}

/// How a function body is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Compiled from source or synthesized.
    Source,
    /// Provided by the runtime under `symbol`.
    External { symbol: String },
    /// A compiler-known prototype.
    Builtin(BuiltinFunction),
}

/// Compiler-known prototypes for `#builtin("...")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    /// `fn(integer size) -> pointer`
    Alloc,
    /// `fn(pointer) -> void`
    Free,
    /// Generator `next(this*, T*) -> u8`
    Next,
}

impl BuiltinFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "alloc" => Some(Self::Alloc),
            "free" => Some(Self::Free),
            "next" => Some(Self::Next),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Alloc => "alloc",
            Self::Free => "free",
            Self::Next => "next",
        }
    }
}

/// Which receiver form a synthesized member variant takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThisForm {
    Reference,
    Pointer,
}

/// Bodies the compiler generates instead of lowering source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesized {
    /// Stores the state and body function pointers of a generator.
    GeneratorConstructor,
    /// Forwards to the stored generator body function.
    GeneratorNext,
    /// The resumable body split out of a generator function.
    GeneratorBody { implementing: FunctionId },
    Lambda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyState {
    /// Not compiled yet.
    Pending,
    /// Being compiled; re-entrant uses see no body.
    Compiling,
    Compiled,
    /// Compilation aborted with a critical diagnostic.
    Failed,
}

/// Concrete instantiation of a template.
#[derive(Debug, Clone)]
pub struct TemplateInstance {
    pub template: FunctionId,
    pub type_args: Vec<GeneralType>,
    pub bindings: Bindings,
}

/// A lowered function body with its frame tables.
#[derive(Debug, Clone, Default)]
pub struct FunctionBody {
    pub block: CompiledBlock,
    pub locals: Vec<LocalVariable>,
    pub labels: Vec<LabelInfo>,
    pub captures: Vec<CapturedVariable>,
}

/// A function, operator, constructor or general function.
#[derive(Debug, Clone)]
pub struct CompiledFunction<'ast> {
    pub kind: CallableKind,
    pub name: String,
    pub file: FileId,
    pub span: Span,
    pub return_type: GeneralType,
    pub params: Vec<Parameter<'ast>>,
    pub template_params: Vec<String>,
    pub attributes: Vec<CompiledAttribute>,
    /// Struct a member, constructor or general function belongs to.
    pub owner: Option<StructId>,
    pub general: Option<GeneralKind>,
    pub this_form: Option<ThisForm>,
    pub private: bool,
    pub syntax: Option<&'ast FunctionDecl<'ast>>,
    pub binding: Binding,
    pub instance_of: Option<TemplateInstance>,
    pub synthesized: Option<Synthesized>,
    /// Call sites; a non-empty list makes the body reachable.
    pub references: Vec<Location>,
    pub exported: bool,
    pub inline: bool,
    pub state: BodyState,
    pub body: Option<FunctionBody>,
}

impl<'ast> CompiledFunction<'ast> {
    pub fn new(
        kind: CallableKind,
        name: impl Into<String>,
        file: FileId,
        span: Span,
        return_type: GeneralType,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            file,
            span,
            return_type,
            params: Vec::new(),
            template_params: Vec::new(),
            attributes: Vec::new(),
            owner: None,
            general: None,
            this_form: None,
            private: false,
            syntax: None,
            binding: Binding::Source,
            instance_of: None,
            synthesized: None,
            references: Vec::new(),
            exported: false,
            inline: false,
            state: BodyState::Pending,
            body: None,
        }
    }

    pub fn is_template(&self) -> bool {
        !self.template_params.is_empty() && self.instance_of.is_none()
    }

    /// Whether a body exists or can be produced.
    pub fn has_source_body(&self) -> bool {
        self.binding == Binding::Source
            && !self.is_template()
            && (self.synthesized.is_some() || self.syntax.is_some_and(|s| s.body.is_some()))
    }

    pub fn is_reachable(&self) -> bool {
        self.exported || !self.references.is_empty()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Type of a pointer to this function.
    pub fn function_type(&self) -> GeneralType {
        GeneralType::function(
            self.return_type.clone(),
            self.params.iter().map(|p| p.ty.clone()).collect(),
            false,
        )
    }

    /// Template bindings used for lowering the body.
    pub fn bindings(&self) -> Bindings {
        self.instance_of
            .as_ref()
            .map(|instance| instance.bindings.clone())
            .unwrap_or_default()
    }
}
