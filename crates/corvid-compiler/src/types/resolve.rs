//! Resolution of syntactic types.

use corvid_core::{BuiltinType, CompilationError, CompilerSettings, FileId, Span};
use corvid_syntax::{BinaryOp, Expr, LiteralKind, TypeExpr};

use crate::overload::{RankOutcome, RankedMatch};
use crate::registry::{AliasId, Declarations, StructId};

use super::{Bindings, GeneralType};

type Result<T> = std::result::Result<T, CompilationError>;

#[derive(Clone, Copy)]
enum NamedType {
    Struct(StructId),
    Alias(AliasId),
}

/// Resolves [`TypeExpr`]s against the declarations visible from one file.
pub struct TypeResolver<'c, 'ast> {
    decls: &'c Declarations<'ast>,
    settings: &'c CompilerSettings,
    file: FileId,
    /// Template parameters in scope; resolve to [`GeneralType::Generic`].
    generics: &'c [String],
    /// Bound template parameters; take precedence over `generics`.
    bindings: Option<&'c Bindings>,
}

impl<'c, 'ast> TypeResolver<'c, 'ast> {
    pub fn new(
        decls: &'c Declarations<'ast>,
        settings: &'c CompilerSettings,
        file: FileId,
    ) -> Self {
        Self {
            decls,
            settings,
            file,
            generics: &[],
            bindings: None,
        }
    }

    pub fn with_generics(mut self, generics: &'c [String]) -> Self {
        self.generics = generics;
        self
    }

    pub fn with_bindings(mut self, bindings: &'c Bindings) -> Self {
        self.bindings = Some(bindings);
        self
    }

    /// Resolve with array lengths limited to literals, global constants and
    /// arithmetic over them.
    pub fn resolve<'t>(&self, ty: &TypeExpr<'t>) -> Result<GeneralType> {
        let decls = self.decls;
        let file = self.file;
        let mut lengths = |expr: &Expr<'t>| static_length(expr, decls, file);
        self.resolve_with(ty, &mut lengths)
    }

    /// Resolve with a caller-supplied evaluator for array lengths.
    pub fn resolve_with<'t>(
        &self,
        ty: &TypeExpr<'t>,
        lengths: &mut dyn FnMut(&Expr<'t>) -> Result<u32>,
    ) -> Result<GeneralType> {
        match ty {
            TypeExpr::Named { name, type_args } => {
                let mut args = Vec::with_capacity(type_args.len());
                for arg in type_args.iter() {
                    args.push(self.resolve_with(arg, lengths)?);
                }
                self.resolve_name(name.name, args, name.span)
            }
            TypeExpr::Pointer { to, .. } => {
                Ok(GeneralType::pointer_to(self.resolve_with(to, lengths)?))
            }
            TypeExpr::Array { of, length, .. } => {
                let element = self.resolve_with(of, lengths)?;
                let length = match length {
                    Some(expr) => Some(lengths(*expr)?),
                    None => None,
                };
                Ok(GeneralType::array_of(element, length))
            }
            TypeExpr::Function {
                return_type, params, ..
            } => {
                let return_type = self.resolve_with(return_type, lengths)?;
                let mut resolved = Vec::with_capacity(params.len());
                for param in params.iter() {
                    resolved.push(self.resolve_with(param, lengths)?);
                }
                Ok(GeneralType::function(return_type, resolved, false))
            }
            TypeExpr::Inferred(span) => Err(CompilationError::Other {
                message: "type cannot be inferred here".into(),
                span: *span,
            }),
        }
    }

    /// Resolve a type name with already resolved template arguments.
    pub fn resolve_name(
        &self,
        name: &str,
        args: Vec<GeneralType>,
        span: Span,
    ) -> Result<GeneralType> {
        if let Some(bound) = self.bindings.and_then(|b| b.get(name)) {
            return self.no_type_args(name, bound.clone(), &args, span);
        }
        if self.generics.iter().any(|g| g == name) {
            return self.no_type_args(name, GeneralType::Generic(name.to_string()), &args, span);
        }
        if name == "bool" {
            let boolean = GeneralType::Builtin(self.settings.boolean_type);
            return self.no_type_args(name, boolean, &args, span);
        }
        if let Some(builtin) = BuiltinType::from_keyword(name) {
            return self.no_type_args(name, GeneralType::Builtin(builtin), &args, span);
        }

        let mut ranked = RankedMatch::new(self.file);
        for (id, s) in self.decls.structs() {
            if s.name == name && !s.synthesized {
                ranked.accept(NamedType::Struct(id), s.file, 0);
            }
        }
        for (id, a) in self.decls.aliases() {
            if a.name == name {
                ranked.accept(NamedType::Alias(id), a.file, 0);
            }
        }
        match ranked.finish() {
            RankOutcome::Found(found) => match found.item {
                NamedType::Struct(id) => {
                    let expected = self.decls.structure(id).template_params.len();
                    if expected != args.len() {
                        return Err(CompilationError::TemplateArgCountMismatch {
                            name: name.to_string(),
                            expected,
                            got: args.len(),
                            span,
                        });
                    }
                    Ok(GeneralType::structure(id, args))
                }
                NamedType::Alias(id) => {
                    let target = self.decls.alias(id).target.clone();
                    let alias = GeneralType::Alias {
                        target: Box::new(target),
                        id,
                    };
                    self.no_type_args(name, alias, &args, span)
                }
            },
            RankOutcome::Ambiguous(_) => Err(CompilationError::Other {
                message: format!("type name '{name}' is ambiguous"),
                span,
            }),
            RankOutcome::NotFound(_) => Err(CompilationError::UnknownType {
                name: name.to_string(),
                span,
            }),
        }
    }

    fn no_type_args(
        &self,
        name: &str,
        ty: GeneralType,
        args: &[GeneralType],
        span: Span,
    ) -> Result<GeneralType> {
        if args.is_empty() {
            Ok(ty)
        } else {
            Err(CompilationError::TemplateArgCountMismatch {
                name: name.to_string(),
                expected: 0,
                got: args.len(),
                span,
            })
        }
    }
}

/// Array length from literals, global constants and `+ - * /` over them.
pub fn static_length(expr: &Expr<'_>, decls: &Declarations<'_>, file: FileId) -> Result<u32> {
    let value = static_integer(expr, decls, file)?;
    u32::try_from(value).map_err(|_| CompilationError::Other {
        message: format!("array length {value} is out of range"),
        span: expr.span(),
    })
}

fn static_integer(expr: &Expr<'_>, decls: &Declarations<'_>, file: FileId) -> Result<i128> {
    let not_constant = |name: &str| CompilationError::NotConstant {
        name: name.to_string(),
        span: expr.span(),
    };
    match expr.unparen() {
        Expr::Literal(lit) => match lit.kind {
            LiteralKind::Int(v) => Ok(v as i128),
            LiteralKind::Char(v) => Ok(v as i128),
            _ => Err(not_constant("array length")),
        },
        Expr::Ident(ident) => match decls.find_constant(ident.ident.name, file) {
            RankOutcome::Found(found) => {
                let constant = &decls.constants()[found.item];
                if constant.value.is_float() {
                    Err(not_constant(ident.ident.name))
                } else {
                    Ok(constant.value.as_i128())
                }
            }
            _ => Err(not_constant(ident.ident.name)),
        },
        Expr::Binary(binary) => {
            let left = static_integer(&binary.left, decls, file)?;
            let right = static_integer(&binary.right, decls, file)?;
            match binary.op {
                BinaryOp::Add => Ok(left + right),
                BinaryOp::Sub => Ok(left - right),
                BinaryOp::Mul => Ok(left * right),
                BinaryOp::Div if right != 0 => Ok(left / right),
                _ => Err(not_constant("array length")),
            }
        }
        _ => Err(not_constant("array length")),
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use corvid_syntax::AstBuilder;

    use super::*;
    use crate::decls::{CompiledAlias, CompiledStruct};

    fn structure(name: &str, params: &[&str]) -> CompiledStruct<'static> {
        CompiledStruct {
            name: name.into(),
            file: FileId(0),
            span: Span::default(),
            template_params: params.iter().map(|p| p.to_string()).collect(),
            attributes: Vec::new(),
            fields: None,
            syntax: None,
            generator: false,
            synthesized: false,
        }
    }

    #[test]
    fn builtins_and_bool() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let decls = Declarations::default();
        let settings = CompilerSettings::default();
        let resolver = TypeResolver::new(&decls, &settings, FileId(0));
        assert_eq!(resolver.resolve(&b.ty("i32")).unwrap(), GeneralType::I32);
        assert_eq!(resolver.resolve(&b.ty("u16")).unwrap(), GeneralType::CHAR);
        assert_eq!(resolver.resolve(&b.ty("bool")).unwrap(), GeneralType::U8);
        assert_eq!(
            resolver.resolve(&b.pointer(b.ty("any"))).unwrap(),
            GeneralType::any_pointer()
        );
        assert!(matches!(
            resolver.resolve(&b.ty("Missing")),
            Err(CompilationError::UnknownType { .. })
        ));
    }

    #[test]
    fn struct_template_arity_is_checked() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut decls = Declarations::default();
        let id = decls.add_struct(structure("Box", &["T"]));
        let settings = CompilerSettings::default();
        let resolver = TypeResolver::new(&decls, &settings, FileId(0));

        let ok = resolver.resolve(&b.generic_ty("Box", &[b.ty("i32")])).unwrap();
        assert_eq!(ok, GeneralType::structure(id, vec![GeneralType::I32]));
        assert!(matches!(
            resolver.resolve(&b.ty("Box")),
            Err(CompilationError::TemplateArgCountMismatch { expected: 1, got: 0, .. })
        ));
    }

    #[test]
    fn generics_and_aliases() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let mut decls = Declarations::default();
        let alias = decls.add_alias(CompiledAlias {
            name: "size_t".into(),
            file: FileId(0),
            span: Span::default(),
            target: GeneralType::Builtin(BuiltinType::U32),
            attributes: Vec::new(),
            literal: None,
        });
        let settings = CompilerSettings::default();
        let generics = vec!["T".to_string()];
        let resolver = TypeResolver::new(&decls, &settings, FileId(0)).with_generics(&generics);

        assert_eq!(
            resolver.resolve(&b.pointer(b.ty("T"))).unwrap(),
            GeneralType::pointer_to(GeneralType::Generic("T".into()))
        );
        let resolved = resolver.resolve(&b.ty("size_t")).unwrap();
        assert!(matches!(resolved, GeneralType::Alias { id, .. } if id == alias));
        assert!(resolved.same_as(&GeneralType::Builtin(BuiltinType::U32)));
    }

    #[test]
    fn array_lengths_fold_literals() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena, FileId(0));
        let decls = Declarations::default();
        let settings = CompilerSettings::default();
        let resolver = TypeResolver::new(&decls, &settings, FileId(0));
        let length = b.binary(b.int(2), BinaryOp::Mul, b.int(8));
        assert_eq!(
            resolver.resolve(&b.array(b.ty("u8"), Some(length))).unwrap(),
            GeneralType::array_of(GeneralType::U8, Some(16))
        );
    }
}
